//! Storage seams. Implemented by the Postgres adapter for production and by
//! the in-memory adapter for local runs and tests.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    CampaignAggregate, CampaignCredit, DonorAggregate, NewNotification, NotificationRecord,
    ReconciliationIssue, Transaction, TransactionStatus,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid stored value: {0}")]
    InvalidData(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Outcome of the conditional `pending -> terminal` update.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// This call moved the row out of `pending`.
    Applied(Transaction),
    /// The row had already left `pending`; nothing was written.
    AlreadySettled(Transaction),
    NotFound,
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn insert_pending(&self, tx: &Transaction) -> RepositoryResult<Transaction>;

    async fn get_transaction(&self, id: Uuid) -> RepositoryResult<Transaction>;

    async fn find_by_order_code(&self, order_code: &str) -> RepositoryResult<Option<Transaction>>;

    /// Compare-and-swap: writes `to` only while the stored status is still
    /// `pending`.
    async fn transition(
        &self,
        order_code: &str,
        to: TransactionStatus,
    ) -> RepositoryResult<Transition>;

    async fn ping(&self) -> RepositoryResult<()>;
}

#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn get_campaign(&self, id: Uuid) -> RepositoryResult<CampaignAggregate>;

    /// Single-statement increment of `current_amount`; returns the row as
    /// left by this increment.
    async fn credit_campaign(&self, id: Uuid, amount: i64) -> RepositoryResult<CampaignCredit>;
}

#[async_trait]
pub trait DonorRepository: Send + Sync {
    /// Creates the aggregate on first use, then adds `amount` to the lifetime
    /// total and to the campaign entry when a campaign is given.
    async fn add_contribution(
        &self,
        donor_id: Uuid,
        campaign_id: Option<Uuid>,
        amount: i64,
    ) -> RepositoryResult<DonorAggregate>;

    async fn get_donor(&self, donor_id: Uuid) -> RepositoryResult<Option<DonorAggregate>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> RepositoryResult<NotificationRecord>;
}

#[async_trait]
pub trait IssueRepository: Send + Sync {
    async fn record_issue(&self, issue: &ReconciliationIssue) -> RepositoryResult<()>;

    async fn list_issues(&self, include_resolved: bool) -> RepositoryResult<Vec<ReconciliationIssue>>;

    async fn resolve_issue(&self, id: Uuid, note: &str) -> RepositoryResult<ReconciliationIssue>;
}

/// Everything the reconciliation core persists.
pub trait LedgerStore:
    TransactionRepository + CampaignRepository + DonorRepository + NotificationRepository + IssueRepository
{
}

impl<T> LedgerStore for T where
    T: TransactionRepository
        + CampaignRepository
        + DonorRepository
        + NotificationRepository
        + IssueRepository
{
}
