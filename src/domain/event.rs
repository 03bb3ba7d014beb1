//! Canonical, provider-neutral payment event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Paid,
    Failed,
}

/// An authenticated callback, normalized so reconciliation never needs to
/// know which gateway sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedEvent {
    pub provider_order_code: String,
    pub amount: i64,
    pub outcome: PaymentOutcome,
    pub raw_provider_fields: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}
