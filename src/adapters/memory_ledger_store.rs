//! In-memory ledger used for local runs and tests. Every operation takes a
//! single mutex, which gives it the same atomicity as the Postgres
//! statements it stands in for.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    CampaignAggregate, CampaignCredit, DonorAggregate, NewNotification, NotificationRecord,
    ReconciliationIssue, Transaction, TransactionStatus,
};
use crate::ports::{
    CampaignRepository, DonorRepository, IssueRepository, NotificationRepository,
    RepositoryError, RepositoryResult, TransactionRepository, Transition,
};

#[derive(Default)]
struct Tables {
    transactions: HashMap<String, Transaction>,
    campaigns: HashMap<Uuid, CampaignAggregate>,
    donors: HashMap<Uuid, DonorAggregate>,
    notifications: Vec<NotificationRecord>,
    issues: Vec<ReconciliationIssue>,
}

#[derive(Default)]
pub struct MemoryLedgerStore {
    tables: Mutex<Tables>,
    fail_next_credit: AtomicBool,
    unavailable: AtomicBool,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_campaign(&self, campaign: CampaignAggregate) {
        self.tables.lock().await.campaigns.insert(campaign.id, campaign);
    }

    /// Makes the next `credit_campaign` call fail as if the database dropped
    /// the statement.
    pub fn fail_next_credit(&self) {
        self.fail_next_credit.store(true, Ordering::SeqCst);
    }

    /// Makes every transaction operation fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn transaction_count(&self) -> usize {
        self.tables.lock().await.transactions.len()
    }

    pub async fn transactions(&self) -> Vec<Transaction> {
        let mut all: Vec<_> = self.tables.lock().await.transactions.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }

    pub async fn donor_count(&self) -> usize {
        self.tables.lock().await.donors.len()
    }

    pub async fn notifications_for(&self, recipient_id: Uuid) -> Vec<NotificationRecord> {
        self.tables
            .lock()
            .await
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect()
    }

    fn check_available(&self) -> RepositoryResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionRepository for MemoryLedgerStore {
    async fn insert_pending(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        if tables.transactions.contains_key(&tx.provider_order_code) {
            return Err(RepositoryError::Conflict(format!(
                "order code {}",
                tx.provider_order_code
            )));
        }
        let mut stored = tx.clone();
        stored.status = TransactionStatus::Pending;
        tables
            .transactions
            .insert(stored.provider_order_code.clone(), stored.clone());
        Ok(stored)
    }

    async fn get_transaction(&self, id: Uuid) -> RepositoryResult<Transaction> {
        self.check_available()?;
        self.tables
            .lock()
            .await
            .transactions
            .values()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))
    }

    async fn find_by_order_code(&self, order_code: &str) -> RepositoryResult<Option<Transaction>> {
        self.check_available()?;
        Ok(self.tables.lock().await.transactions.get(order_code).cloned())
    }

    async fn transition(
        &self,
        order_code: &str,
        to: TransactionStatus,
    ) -> RepositoryResult<Transition> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let Some(tx) = tables.transactions.get_mut(order_code) else {
            return Ok(Transition::NotFound);
        };
        if tx.status != TransactionStatus::Pending {
            return Ok(Transition::AlreadySettled(tx.clone()));
        }
        tx.status = to;
        tx.updated_at = Utc::now();
        Ok(Transition::Applied(tx.clone()))
    }

    async fn ping(&self) -> RepositoryResult<()> {
        self.check_available()
    }
}

#[async_trait]
impl CampaignRepository for MemoryLedgerStore {
    async fn get_campaign(&self, id: Uuid) -> RepositoryResult<CampaignAggregate> {
        self.tables
            .lock()
            .await
            .campaigns
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("campaign {}", id)))
    }

    async fn credit_campaign(&self, id: Uuid, amount: i64) -> RepositoryResult<CampaignCredit> {
        if self.fail_next_credit.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "connection reset during increment".to_string(),
            ));
        }
        let mut tables = self.tables.lock().await;
        let campaign = tables
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("campaign {}", id)))?;
        campaign.current_amount += amount;
        Ok(CampaignCredit {
            campaign: campaign.clone(),
            amount,
        })
    }
}

#[async_trait]
impl DonorRepository for MemoryLedgerStore {
    async fn add_contribution(
        &self,
        donor_id: Uuid,
        campaign_id: Option<Uuid>,
        amount: i64,
    ) -> RepositoryResult<DonorAggregate> {
        let mut tables = self.tables.lock().await;
        let donor = tables
            .donors
            .entry(donor_id)
            .or_insert_with(|| DonorAggregate::new(donor_id));
        donor.add(campaign_id, amount);
        Ok(donor.clone())
    }

    async fn get_donor(&self, donor_id: Uuid) -> RepositoryResult<Option<DonorAggregate>> {
        Ok(self.tables.lock().await.donors.get(&donor_id).cloned())
    }
}

#[async_trait]
impl NotificationRepository for MemoryLedgerStore {
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> RepositoryResult<NotificationRecord> {
        let record = NotificationRecord::from_new(notification);
        self.tables.lock().await.notifications.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl IssueRepository for MemoryLedgerStore {
    async fn record_issue(&self, issue: &ReconciliationIssue) -> RepositoryResult<()> {
        self.tables.lock().await.issues.push(issue.clone());
        Ok(())
    }

    async fn list_issues(&self, include_resolved: bool) -> RepositoryResult<Vec<ReconciliationIssue>> {
        let mut issues: Vec<_> = self
            .tables
            .lock()
            .await
            .issues
            .iter()
            .filter(|i| include_resolved || !i.resolved)
            .cloned()
            .collect();
        issues.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(issues)
    }

    async fn resolve_issue(&self, id: Uuid, note: &str) -> RepositoryResult<ReconciliationIssue> {
        let mut tables = self.tables.lock().await;
        let issue = tables
            .issues
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("reconciliation issue {}", id)))?;
        issue.resolved = true;
        issue.resolved_note = Some(note.to_string());
        issue.resolved_at = Some(Utc::now());
        Ok(issue.clone())
    }
}
