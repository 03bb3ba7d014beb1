//! Postgres implementation of the ledger ports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::{
    CampaignAggregate, CampaignCredit, DonorAggregate, NewNotification, NotificationRecord,
    ReconciliationIssue, Transaction, TransactionStatus,
};
use crate::ports::{
    CampaignRepository, DonorRepository, IssueRepository, NotificationRepository,
    RepositoryError, RepositoryResult, TransactionRepository, Transition,
};

const TRANSACTION_COLUMNS: &str = "id, campaign_id, donor_id, donor_name, is_anonymous, amount, \
     message, contact, provider, provider_order_code, status, created_at, updated_at";

const CAMPAIGN_COLUMNS: &str = "id, title, goal_amount, current_amount, owner_id, thumbnail";

const ISSUE_COLUMNS: &str = "id, transaction_id, provider_order_code, campaign_id, amount, kind, \
     detail, resolved, resolved_note, created_at, resolved_at";

/// Postgres-backed ledger.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_insert_error(e: sqlx::Error, what: &str) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(what.to_string())
        }
        _ => RepositoryError::from(e),
    }
}

#[async_trait]
impl TransactionRepository for PostgresLedgerStore {
    async fn insert_pending(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO donation_transactions (
                id, campaign_id, donor_id, donor_name, is_anonymous, amount,
                message, contact, provider, provider_order_code, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(tx.id)
        .bind(tx.campaign_id)
        .bind(tx.donor_id)
        .bind(&tx.donor_name)
        .bind(tx.is_anonymous)
        .bind(tx.amount)
        .bind(&tx.message)
        .bind(&tx.contact)
        .bind(tx.provider.as_str())
        .bind(&tx.provider_order_code)
        .bind(TransactionStatus::Pending.as_str())
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &format!("order code {}", tx.provider_order_code)))?;

        row.into_domain()
    }

    async fn get_transaction(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM donation_transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?
            .into_domain()
    }

    async fn find_by_order_code(&self, order_code: &str) -> RepositoryResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM donation_transactions WHERE provider_order_code = $1"
        ))
        .bind(order_code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn transition(
        &self,
        order_code: &str,
        to: TransactionStatus,
    ) -> RepositoryResult<Transition> {
        let applied = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE donation_transactions
            SET status = $2, updated_at = NOW()
            WHERE provider_order_code = $1 AND status = 'pending'
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(order_code)
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = applied {
            return Ok(Transition::Applied(row.into_domain()?));
        }

        match self.find_by_order_code(order_code).await? {
            Some(existing) => Ok(Transition::AlreadySettled(existing)),
            None => Ok(Transition::NotFound),
        }
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CampaignRepository for PostgresLedgerStore {
    async fn get_campaign(&self, id: Uuid) -> RepositoryResult<CampaignAggregate> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM donation_campaigns WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CampaignRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(format!("campaign {}", id)))
    }

    async fn credit_campaign(&self, id: Uuid, amount: i64) -> RepositoryResult<CampaignCredit> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            r#"
            UPDATE donation_campaigns
            SET current_amount = current_amount + $2
            WHERE id = $1
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?;

        let campaign = row
            .map(CampaignRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(format!("campaign {}", id)))?;

        Ok(CampaignCredit { campaign, amount })
    }
}

#[async_trait]
impl DonorRepository for PostgresLedgerStore {
    async fn add_contribution(
        &self,
        donor_id: Uuid,
        campaign_id: Option<Uuid>,
        amount: i64,
    ) -> RepositoryResult<DonorAggregate> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO donor_aggregates (donor_id, total_donated)
            VALUES ($1, $2)
            ON CONFLICT (donor_id) DO UPDATE
            SET total_donated = donor_aggregates.total_donated + EXCLUDED.total_donated,
                updated_at = NOW()
            "#,
        )
        .bind(donor_id)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        if let Some(campaign_id) = campaign_id {
            sqlx::query(
                r#"
                INSERT INTO donor_campaign_totals (donor_id, campaign_id, amount)
                VALUES ($1, $2, $3)
                ON CONFLICT (donor_id, campaign_id) DO UPDATE
                SET amount = donor_campaign_totals.amount + EXCLUDED.amount
                "#,
            )
            .bind(donor_id)
            .bind(campaign_id)
            .bind(amount)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get_donor(donor_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("donor {}", donor_id)))
    }

    async fn get_donor(&self, donor_id: Uuid) -> RepositoryResult<Option<DonorAggregate>> {
        let total: Option<i64> =
            sqlx::query_scalar("SELECT total_donated FROM donor_aggregates WHERE donor_id = $1")
                .bind(donor_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(total_donated) = total else {
            return Ok(None);
        };

        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT campaign_id, amount FROM donor_campaign_totals WHERE donor_id = $1",
        )
        .bind(donor_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(DonorAggregate {
            donor_id,
            total_donated,
            per_campaign: rows.into_iter().collect::<BTreeMap<_, _>>(),
        }))
    }
}

#[async_trait]
impl NotificationRepository for PostgresLedgerStore {
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> RepositoryResult<NotificationRecord> {
        let record = NotificationRecord::from_new(notification);

        sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient_id, title, content, kind, link, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(record.recipient_id)
        .bind(&record.title)
        .bind(&record.content)
        .bind(record.kind.as_str())
        .bind(&record.link)
        .bind(record.is_read)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }
}

#[async_trait]
impl IssueRepository for PostgresLedgerStore {
    async fn record_issue(&self, issue: &ReconciliationIssue) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reconciliation_issues (
                id, transaction_id, provider_order_code, campaign_id, amount, kind,
                detail, resolved, resolved_note, created_at, resolved_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(issue.id)
        .bind(issue.transaction_id)
        .bind(&issue.provider_order_code)
        .bind(issue.campaign_id)
        .bind(issue.amount)
        .bind(issue.kind.as_str())
        .bind(&issue.detail)
        .bind(issue.resolved)
        .bind(&issue.resolved_note)
        .bind(issue.created_at)
        .bind(issue.resolved_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_issues(&self, include_resolved: bool) -> RepositoryResult<Vec<ReconciliationIssue>> {
        let rows = sqlx::query_as::<_, IssueRow>(&format!(
            r#"
            SELECT {ISSUE_COLUMNS} FROM reconciliation_issues
            WHERE $1 OR resolved = FALSE
            ORDER BY created_at DESC
            "#
        ))
        .bind(include_resolved)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(IssueRow::into_domain).collect()
    }

    async fn resolve_issue(&self, id: Uuid, note: &str) -> RepositoryResult<ReconciliationIssue> {
        let row = sqlx::query_as::<_, IssueRow>(&format!(
            r#"
            UPDATE reconciliation_issues
            SET resolved = TRUE, resolved_note = $2, resolved_at = NOW()
            WHERE id = $1
            RETURNING {ISSUE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(note)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("reconciliation issue {}", id)))?
            .into_domain()
    }
}

/// Internal row types for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    campaign_id: Option<Uuid>,
    donor_id: Option<Uuid>,
    donor_name: String,
    is_anonymous: bool,
    amount: i64,
    message: Option<String>,
    contact: Option<String>,
    provider: String,
    provider_order_code: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        Ok(Transaction {
            id: self.id,
            campaign_id: self.campaign_id,
            donor_id: self.donor_id,
            donor_name: self.donor_name,
            is_anonymous: self.is_anonymous,
            amount: self.amount,
            message: self.message,
            contact: self.contact,
            provider: self.provider.parse().map_err(RepositoryError::InvalidData)?,
            provider_order_code: self.provider_order_code,
            status: self.status.parse().map_err(RepositoryError::InvalidData)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CampaignRow {
    id: Uuid,
    title: String,
    goal_amount: i64,
    current_amount: i64,
    owner_id: Option<Uuid>,
    thumbnail: Option<String>,
}

impl CampaignRow {
    fn into_domain(self) -> CampaignAggregate {
        CampaignAggregate {
            id: self.id,
            title: self.title,
            goal_amount: self.goal_amount,
            current_amount: self.current_amount,
            owner_id: self.owner_id,
            thumbnail: self.thumbnail,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IssueRow {
    id: Uuid,
    transaction_id: Uuid,
    provider_order_code: String,
    campaign_id: Option<Uuid>,
    amount: i64,
    kind: String,
    detail: String,
    resolved: bool,
    resolved_note: Option<String>,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl IssueRow {
    fn into_domain(self) -> RepositoryResult<ReconciliationIssue> {
        Ok(ReconciliationIssue {
            id: self.id,
            transaction_id: self.transaction_id,
            provider_order_code: self.provider_order_code,
            campaign_id: self.campaign_id,
            amount: self.amount,
            kind: self.kind.parse().map_err(RepositoryError::InvalidData)?,
            detail: self.detail,
            resolved: self.resolved,
            resolved_note: self.resolved_note,
            created_at: self.created_at,
            resolved_at: self.resolved_at,
        })
    }
}
