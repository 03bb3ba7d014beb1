//! Best-effort side effects of a credited donation.
//!
//! Channels run concurrently, each under its own timeout. A failing channel
//! is logged and reported; it never affects the others or the ledger.

use serde_json::json;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::automation::template_copy;
use super::{
    format_vnd, AutomationHook, ContentGenerator, CreditedDonation, DonorProjector, HookPayload,
    SideEffectError,
};
use crate::domain::{CampaignAggregate, Milestone, NewNotification, NotificationKind};
use crate::ports::LedgerStore;
use crate::realtime::{RealtimeHub, RealtimeMessage, Room};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    Done,
    Skipped,
    Failed(String),
}

impl ChannelStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, ChannelStatus::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    pub realtime: ChannelStatus,
    pub owner_notification: ChannelStatus,
    pub automation_hook: ChannelStatus,
    pub goal_notification: ChannelStatus,
    pub donor_projection: ChannelStatus,
}

/// Counts dispatched fanouts that have not finished yet.
#[derive(Clone, Default)]
struct InFlight {
    count: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

struct InFlightGuard(InFlight);

impl InFlight {
    fn enter(&self) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(self.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

#[derive(Clone)]
pub struct EventFanout {
    in_flight: InFlight,
    store: Arc<dyn LedgerStore>,
    realtime: RealtimeHub,
    projector: DonorProjector,
    hook: Option<Arc<dyn AutomationHook>>,
    generator: Option<Arc<dyn ContentGenerator>>,
    timeout: Duration,
    frontend_url: String,
}

impl EventFanout {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        realtime: RealtimeHub,
        projector: DonorProjector,
        timeout: Duration,
        frontend_url: String,
    ) -> Self {
        Self {
            in_flight: InFlight::default(),
            store,
            realtime,
            projector,
            hook: None,
            generator: None,
            timeout,
            frontend_url,
        }
    }

    pub fn with_automation_hook(mut self, hook: Arc<dyn AutomationHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn with_content_generator(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Runs the fanout on its own task so the caller can answer the provider
    /// immediately.
    pub fn dispatch(&self, donation: CreditedDonation) -> JoinHandle<FanoutReport> {
        let fanout = self.clone();
        let guard = self.in_flight.enter();
        tokio::spawn(async move {
            let report = fanout.run(&donation).await;
            drop(guard);
            report
        })
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Waits up to `limit` for dispatched fanouts to finish. Returns how many
    /// were still running when the limit elapsed.
    pub async fn drain(&self, limit: Duration) -> usize {
        let wait = async {
            loop {
                let idle = self.in_flight.idle.notified();
                if self.in_flight() == 0 {
                    return;
                }
                idle.await;
            }
        };

        if tokio::time::timeout(limit, wait).await.is_ok() {
            tracing::info!("All side-effect tasks finished");
            return 0;
        }
        let remaining = self.in_flight();
        tracing::error!(
            remaining,
            limit_secs = limit.as_secs(),
            "Side-effect tasks still running at shutdown; donor totals may lag the ledger"
        );
        remaining
    }

    pub async fn run(&self, donation: &CreditedDonation) -> FanoutReport {
        let (realtime, owner_notification, automation_hook, goal_notification, donor_projection) = tokio::join!(
            self.guarded("realtime", donation, self.push_realtime(donation)),
            self.guarded("owner_notification", donation, self.notify_owner(donation)),
            self.guarded("automation_hook", donation, self.fire_half_funded_hook(donation)),
            self.guarded("goal_notification", donation, self.notify_goal_reached(donation)),
            self.guarded("donor_projection", donation, self.project_donor(donation)),
        );

        FanoutReport {
            realtime,
            owner_notification,
            automation_hook,
            goal_notification,
            donor_projection,
        }
    }

    async fn guarded<F>(&self, channel: &'static str, donation: &CreditedDonation, fut: F) -> ChannelStatus
    where
        F: Future<Output = Result<bool, SideEffectError>>,
    {
        let order_code = &donation.transaction.provider_order_code;
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(true)) => ChannelStatus::Done,
            Ok(Ok(false)) => ChannelStatus::Skipped,
            Ok(Err(e)) => {
                tracing::warn!(channel, order_code = %order_code, error = %e, "Side effect failed");
                ChannelStatus::Failed(e.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    channel,
                    order_code = %order_code,
                    timeout_secs = self.timeout.as_secs(),
                    "Side effect timed out"
                );
                ChannelStatus::Failed("timed out".to_string())
            }
        }
    }

    /// Share of the channel timeout the content generator may use, leaving
    /// the rest for the hook call itself.
    pub fn generation_budget(&self) -> Duration {
        self.timeout / 2
    }

    fn campaign_link(&self, campaign: &CampaignAggregate) -> String {
        format!(
            "{}/campaigns/{}",
            self.frontend_url.trim_end_matches('/'),
            campaign.id
        )
    }

    async fn push_realtime(&self, donation: &CreditedDonation) -> Result<bool, SideEffectError> {
        let Some(credit) = &donation.credit else {
            return Ok(false);
        };
        let delivered = self
            .realtime
            .publish(
                Room::Campaign(credit.campaign.id),
                RealtimeMessage::new(
                    "new_donation",
                    json!({
                        "transaction": donation.transaction,
                        "currentAmount": credit.campaign.current_amount,
                        "campaignId": credit.campaign.id,
                    }),
                ),
            )
            .await;
        tracing::debug!(campaign_id = %credit.campaign.id, delivered, "Pushed new_donation");
        Ok(true)
    }

    async fn notify(&self, notification: NewNotification) -> Result<(), SideEffectError> {
        let recipient = notification.recipient_id;
        let record = self.store.insert_notification(notification).await?;
        let payload = serde_json::to_value(&record)
            .map_err(|e| SideEffectError::InvalidResponse(e.to_string()))?;
        self.realtime
            .publish(Room::User(recipient), RealtimeMessage::new("notification", payload))
            .await;
        Ok(())
    }

    async fn notify_owner(&self, donation: &CreditedDonation) -> Result<bool, SideEffectError> {
        let Some(credit) = &donation.credit else {
            return Ok(false);
        };
        let Some(owner_id) = credit.campaign.owner_id else {
            return Ok(false);
        };

        self.notify(NewNotification {
            recipient_id: owner_id,
            title: "New donation".to_string(),
            content: format!(
                "{} donated {} to \"{}\"",
                donation.transaction.donor_name,
                format_vnd(donation.amount),
                credit.campaign.title
            ),
            kind: NotificationKind::Donation,
            link: Some(self.campaign_link(&credit.campaign)),
        })
        .await?;
        Ok(true)
    }

    async fn fire_half_funded_hook(&self, donation: &CreditedDonation) -> Result<bool, SideEffectError> {
        if !donation.milestones.contains(&Milestone::HalfFunded) {
            return Ok(false);
        }
        let Some(credit) = &donation.credit else {
            return Ok(false);
        };
        let Some(hook) = &self.hook else {
            tracing::debug!(campaign_id = %credit.campaign.id, "No automation hook configured");
            return Ok(false);
        };

        let campaign = &credit.campaign;
        let content = match &self.generator {
            Some(generator) => {
                match tokio::time::timeout(self.generation_budget(), generator.generate(campaign)).await {
                    Ok(Ok(text)) => text,
                    Ok(Err(e)) => {
                        tracing::warn!(campaign_id = %campaign.id, error = %e, "Content generation failed, using template");
                        template_copy(campaign)
                    }
                    Err(_) => {
                        tracing::warn!(campaign_id = %campaign.id, "Content generation timed out, using template");
                        template_copy(campaign)
                    }
                }
            }
            None => template_copy(campaign),
        };

        hook.fire(&HookPayload {
            title: format!("{} is halfway to its goal", campaign.title),
            content,
            image: campaign.thumbnail.clone(),
            link: self.campaign_link(campaign),
        })
        .await?;

        tracing::info!(campaign_id = %campaign.id, "Half-funded automation hook fired");
        Ok(true)
    }

    async fn notify_goal_reached(&self, donation: &CreditedDonation) -> Result<bool, SideEffectError> {
        if !donation.milestones.contains(&Milestone::GoalReached) {
            return Ok(false);
        }
        let Some(credit) = &donation.credit else {
            return Ok(false);
        };
        let Some(owner_id) = credit.campaign.owner_id else {
            return Ok(false);
        };

        self.notify(NewNotification {
            recipient_id: owner_id,
            title: "Goal reached".to_string(),
            content: format!(
                "\"{}\" has reached its goal of {}",
                credit.campaign.title,
                format_vnd(credit.campaign.goal_amount)
            ),
            kind: NotificationKind::GoalReached,
            link: Some(self.campaign_link(&credit.campaign)),
        })
        .await?;

        tracing::info!(campaign_id = %credit.campaign.id, "Campaign goal reached");
        Ok(true)
    }

    async fn project_donor(&self, donation: &CreditedDonation) -> Result<bool, SideEffectError> {
        let title = donation.credit.as_ref().map(|c| c.campaign.title.as_str());
        let projected = self
            .projector
            .project(&donation.transaction, donation.amount, title)
            .await?;
        Ok(projected.is_some())
    }
}
