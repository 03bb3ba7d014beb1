//! Applies verified provider events to the ledger exactly once.
//!
//! The pending → terminal compare-and-swap is the only synchronization
//! point: whoever wins it owns the campaign credit and the fanout for that
//! transaction. Losers observe a settled row and stop.

use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{EventFanout, FanoutReport};
use crate::domain::{
    CampaignCredit, IssueKind, Milestone, PaymentOutcome, ReconciliationIssue, Transaction,
    TransactionStatus, VerifiedEvent,
};
use crate::ports::{LedgerStore, RepositoryError, Transition};

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Duplicate delivery for {order_code}: already {status}")]
    Duplicate {
        order_code: String,
        status: TransactionStatus,
    },

    #[error("Unknown provider order code {0}")]
    NotFound(String),

    #[error("Transaction {order_code} settled but campaign credit failed: {reason}")]
    PartialCredit {
        order_code: String,
        transaction_id: Uuid,
        reason: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] RepositoryError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreditedDonation {
    pub transaction: Transaction,
    /// Amount actually credited, taken from the provider event.
    pub amount: i64,
    /// `None` for general-fund donations.
    pub credit: Option<CampaignCredit>,
    pub milestones: Vec<Milestone>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Credited(CreditedDonation),
    Failed(Transaction),
}

pub struct Reconciled {
    pub outcome: ReconcileOutcome,
    /// Present when a fanout was dispatched.
    pub fanout: Option<JoinHandle<FanoutReport>>,
}

#[derive(Clone)]
pub struct ReconciliationEngine {
    store: Arc<dyn LedgerStore>,
    fanout: EventFanout,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn LedgerStore>, fanout: EventFanout) -> Self {
        Self { store, fanout }
    }

    pub fn fanout(&self) -> &EventFanout {
        &self.fanout
    }

    /// Applies the event, then dispatches the fanout without waiting for it.
    pub async fn reconcile(&self, event: &VerifiedEvent) -> Result<Reconciled, ReconcileError> {
        let outcome = self.apply(event).await?;
        let fanout = match &outcome {
            ReconcileOutcome::Credited(donation) => Some(self.fanout.dispatch(donation.clone())),
            ReconcileOutcome::Failed(_) => None,
        };
        Ok(Reconciled { outcome, fanout })
    }

    /// Ledger-critical section: status transition, campaign credit, milestone
    /// detection. No side effects run here.
    pub async fn apply(&self, event: &VerifiedEvent) -> Result<ReconcileOutcome, ReconcileError> {
        let order_code = event.provider_order_code.as_str();
        let target = match event.outcome {
            PaymentOutcome::Paid => TransactionStatus::Success,
            PaymentOutcome::Failed => TransactionStatus::Failed,
        };

        let tx = match self.store.transition(order_code, target).await? {
            Transition::Applied(tx) => tx,
            Transition::AlreadySettled(tx)
                if tx.status == TransactionStatus::Failed && event.outcome == PaymentOutcome::Paid =>
            {
                tracing::error!(
                    order_code = %order_code,
                    transaction_id = %tx.id,
                    amount = event.amount,
                    "Payment received for a failed transaction; flagged for manual reconciliation"
                );
                self.flag(ReconciliationIssue::open(
                    tx.id,
                    order_code,
                    tx.campaign_id,
                    event.amount,
                    IssueKind::PaidAfterFailed,
                    format!("provider reported {} paid after intake marked the order failed", event.amount),
                ))
                .await;
                return Err(ReconcileError::Duplicate {
                    order_code: order_code.to_string(),
                    status: tx.status,
                });
            }
            Transition::AlreadySettled(tx) => {
                tracing::info!(
                    order_code = %order_code,
                    status = %tx.status,
                    "Duplicate delivery ignored"
                );
                return Err(ReconcileError::Duplicate {
                    order_code: order_code.to_string(),
                    status: tx.status,
                });
            }
            Transition::NotFound => {
                tracing::warn!(order_code = %order_code, "Verified event for unknown order code");
                return Err(ReconcileError::NotFound(order_code.to_string()));
            }
        };

        if event.outcome == PaymentOutcome::Failed {
            tracing::info!(order_code = %order_code, "Payment failed at provider");
            return Ok(ReconcileOutcome::Failed(tx));
        }

        if event.amount != tx.amount {
            tracing::warn!(
                order_code = %order_code,
                recorded = tx.amount,
                received = event.amount,
                "Provider amount differs from recorded amount"
            );
            self.flag(ReconciliationIssue::open(
                tx.id,
                order_code,
                tx.campaign_id,
                event.amount,
                IssueKind::AmountMismatch,
                format!("recorded {} but provider reported {}", tx.amount, event.amount),
            ))
            .await;
        }

        let credit = match tx.campaign_id {
            None => None,
            Some(campaign_id) => match self.store.credit_campaign(campaign_id, event.amount).await {
                Ok(credit) => Some(credit),
                Err(e) => {
                    let kind = match e {
                        RepositoryError::NotFound(_) => IssueKind::CampaignMissing,
                        _ => IssueKind::PartialCredit,
                    };
                    tracing::error!(
                        order_code = %order_code,
                        campaign_id = %campaign_id,
                        amount = event.amount,
                        error = %e,
                        "Transaction settled but campaign credit failed; flagged for manual reconciliation"
                    );
                    self.flag(ReconciliationIssue::open(
                        tx.id,
                        order_code,
                        Some(campaign_id),
                        event.amount,
                        kind,
                        e.to_string(),
                    ))
                    .await;
                    return Err(ReconcileError::PartialCredit {
                        order_code: order_code.to_string(),
                        transaction_id: tx.id,
                        reason: e.to_string(),
                    });
                }
            },
        };

        let milestones = credit
            .as_ref()
            .map(CampaignCredit::milestones)
            .unwrap_or_default();

        tracing::info!(
            order_code = %order_code,
            campaign_id = ?tx.campaign_id,
            amount = event.amount,
            current_amount = credit.as_ref().map(|c| c.campaign.current_amount),
            milestones = ?milestones,
            "Donation reconciled"
        );

        Ok(ReconcileOutcome::Credited(CreditedDonation {
            transaction: tx,
            amount: event.amount,
            credit,
            milestones,
        }))
    }

    async fn flag(&self, issue: ReconciliationIssue) {
        if let Err(e) = self.store.record_issue(&issue).await {
            tracing::error!(
                order_code = %issue.provider_order_code,
                kind = %issue.kind,
                error = %e,
                "Failed to record reconciliation issue"
            );
        }
    }
}
