//! Donation transaction domain entity.
//! Framework-agnostic record of one donation attempt and its lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Payment gateway that issued the order code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    ZaloPay,
    PayOs,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::ZaloPay => "zalopay",
            ProviderKind::PayOs => "payos",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zalopay" => Ok(ProviderKind::ZaloPay),
            "payos" => Ok(ProviderKind::PayOs),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// Lifecycle status. `Success` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "success" => Ok(TransactionStatus::Success),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

/// Domain entity representing a donation transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub donor_id: Option<Uuid>,
    pub donor_name: String,
    pub is_anonymous: bool,
    /// Minor currency unit.
    pub amount: i64,
    pub message: Option<String>,
    #[serde(skip_serializing)]
    pub contact: Option<String>,
    pub provider: ProviderKind,
    pub provider_order_code: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn pending(draft: NewTransaction) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            campaign_id: draft.campaign_id,
            donor_id: draft.donor_id,
            donor_name: draft.donor_name,
            is_anonymous: draft.is_anonymous,
            amount: draft.amount,
            message: draft.message,
            contact: draft.contact,
            provider: draft.provider,
            provider_order_code: draft.provider_order_code,
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields captured at order intake.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub campaign_id: Option<Uuid>,
    pub donor_id: Option<Uuid>,
    pub donor_name: String,
    pub is_anonymous: bool,
    pub amount: i64,
    pub message: Option<String>,
    pub contact: Option<String>,
    pub provider: ProviderKind,
    pub provider_order_code: String,
}
