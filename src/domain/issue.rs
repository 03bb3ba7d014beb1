//! Ledger inconsistencies left for an operator to repair by hand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Status flipped to success but the campaign increment failed.
    PartialCredit,
    /// Status flipped to success but the referenced campaign does not exist.
    CampaignMissing,
    /// Provider amount differs from the amount recorded at intake.
    AmountMismatch,
    /// Provider reported a payment for a transaction already marked failed.
    PaidAfterFailed,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::PartialCredit => "partial_credit",
            IssueKind::CampaignMissing => "campaign_missing",
            IssueKind::AmountMismatch => "amount_mismatch",
            IssueKind::PaidAfterFailed => "paid_after_failed",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "partial_credit" => Ok(IssueKind::PartialCredit),
            "campaign_missing" => Ok(IssueKind::CampaignMissing),
            "amount_mismatch" => Ok(IssueKind::AmountMismatch),
            "paid_after_failed" => Ok(IssueKind::PaidAfterFailed),
            other => Err(format!("unknown issue kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationIssue {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub provider_order_code: String,
    pub campaign_id: Option<Uuid>,
    pub amount: i64,
    pub kind: IssueKind,
    pub detail: String,
    pub resolved: bool,
    pub resolved_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ReconciliationIssue {
    pub fn open(
        transaction_id: Uuid,
        provider_order_code: impl Into<String>,
        campaign_id: Option<Uuid>,
        amount: i64,
        kind: IssueKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            provider_order_code: provider_order_code.into(),
            campaign_id,
            amount,
            kind,
            detail: detail.into(),
            resolved: false,
            resolved_note: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }
}
