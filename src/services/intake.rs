//! Order intake: validate, record a pending transaction, open the remote order.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{NewTransaction, ProviderKind, Transaction, TransactionStatus};
use crate::ports::{LedgerStore, RepositoryError};
use crate::providers::{CheckoutPayload, OrderDraft, ProviderError, ProviderRegistry};

pub const ANONYMOUS_DONOR: &str = "Anonymous donor";
const ORDER_CODE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationRequest {
    #[serde(default, alias = "campaignRef")]
    pub campaign_id: Option<Uuid>,
    #[serde(default)]
    pub donor_display_name: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default)]
    pub contact: Option<String>,
}

/// Authenticated donor resolved upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Donor {
    pub id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationCheckout {
    pub transaction_id: Uuid,
    pub provider: ProviderKind,
    pub provider_order_code: String,
    pub amount: i64,
    #[serde(flatten)]
    pub checkout: CheckoutPayload,
}

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Amount is required")]
    MissingAmount,
    #[error("Amount {amount} is below the minimum of {minimum}")]
    BelowMinimum { amount: i64, minimum: i64 },
    #[error("Campaign {0} not found")]
    CampaignNotFound(Uuid),
    #[error("Payment provider {0} is not enabled")]
    ProviderDisabled(ProviderKind),
    #[error("Payment provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Storage error: {0}")]
    Storage(#[from] RepositoryError),
}

#[derive(Clone)]
pub struct DonationIntake {
    store: Arc<dyn LedgerStore>,
    providers: ProviderRegistry,
    minimum_amount: i64,
}

impl DonationIntake {
    pub fn new(store: Arc<dyn LedgerStore>, providers: ProviderRegistry, minimum_amount: i64) -> Self {
        Self {
            store,
            providers,
            minimum_amount,
        }
    }

    pub async fn open_donation(
        &self,
        kind: ProviderKind,
        donor: Option<&Donor>,
        request: DonationRequest,
    ) -> Result<DonationCheckout, IntakeError> {
        let provider = self
            .providers
            .get(kind)
            .ok_or(IntakeError::ProviderDisabled(kind))?;

        let amount = request.amount.ok_or(IntakeError::MissingAmount)?;
        let minimum = self.minimum_amount.max(provider.minimum_amount()).max(1);
        if amount < minimum {
            tracing::info!(provider = %kind, amount, minimum, "Donation rejected below minimum");
            return Err(IntakeError::BelowMinimum { amount, minimum });
        }

        let campaign = match request.campaign_id {
            Some(id) => match self.store.get_campaign(id).await {
                Ok(campaign) => Some(campaign),
                Err(RepositoryError::NotFound(_)) => return Err(IntakeError::CampaignNotFound(id)),
                Err(e) => return Err(e.into()),
            },
            None => None,
        };

        let donor_name = resolve_display_name(donor, &request);
        let contact = request
            .contact
            .clone()
            .filter(|c| !c.trim().is_empty())
            .or_else(|| donor.and_then(|d| d.email.clone()));

        let tx = self
            .insert_pending(|order_code| NewTransaction {
                campaign_id: request.campaign_id,
                donor_id: donor.map(|d| d.id),
                donor_name: donor_name.clone(),
                is_anonymous: request.anonymous,
                amount,
                message: request.message.clone(),
                contact: contact.clone(),
                provider: kind,
                provider_order_code: order_code,
            }, || provider.next_order_code())
            .await?;

        let description = match &campaign {
            Some(c) => format!("Donation {}", c.title),
            None => "Donation general fund".to_string(),
        };
        let draft = OrderDraft {
            order_code: tx.provider_order_code.clone(),
            amount,
            donor_name,
            donor_id: tx.donor_id,
            campaign_id: tx.campaign_id,
            description,
        };

        match provider.create_order(&draft).await {
            Ok(checkout) => {
                tracing::info!(
                    provider = %kind,
                    order_code = %tx.provider_order_code,
                    amount,
                    "Donation order opened"
                );
                Ok(DonationCheckout {
                    transaction_id: tx.id,
                    provider: kind,
                    provider_order_code: tx.provider_order_code,
                    amount,
                    checkout,
                })
            }
            Err(e) => {
                tracing::warn!(
                    provider = %kind,
                    order_code = %tx.provider_order_code,
                    error = %e,
                    "Provider order creation failed"
                );
                if let Err(mark_err) = self
                    .store
                    .transition(&tx.provider_order_code, TransactionStatus::Failed)
                    .await
                {
                    tracing::error!(
                        order_code = %tx.provider_order_code,
                        error = %mark_err,
                        "Failed to mark transaction failed after provider error"
                    );
                }
                Err(e.into())
            }
        }
    }

    async fn insert_pending(
        &self,
        build: impl Fn(String) -> NewTransaction,
        next_code: impl Fn() -> String,
    ) -> Result<Transaction, IntakeError> {
        let mut attempt = 1;
        loop {
            let tx = Transaction::pending(build(next_code()));
            match self.store.insert_pending(&tx).await {
                Ok(stored) => return Ok(stored),
                Err(RepositoryError::Conflict(detail)) if attempt < ORDER_CODE_ATTEMPTS => {
                    tracing::debug!(attempt, detail = %detail, "Order code collision, regenerating");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Authenticated donors show their profile name unless anonymous; guests
/// show the supplied name; everything else is the anonymous label.
pub fn resolve_display_name(donor: Option<&Donor>, request: &DonationRequest) -> String {
    if request.anonymous {
        return ANONYMOUS_DONOR.to_string();
    }
    let name = match donor {
        Some(d) => Some(d.display_name.as_str()),
        None => request.donor_display_name.as_deref(),
    };
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => ANONYMOUS_DONOR.to_string(),
    }
}
