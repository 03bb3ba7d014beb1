pub mod automation;
pub mod donor_projector;
pub mod fanout;
pub mod intake;
pub mod mailer;
pub mod reconciliation;
pub mod report;

use thiserror::Error;

use crate::ports::RepositoryError;

pub use automation::{
    AutomationHook, ContentGenerator, HookPayload, HttpAutomationHook, HttpContentGenerator,
};
pub use donor_projector::DonorProjector;
pub use fanout::{ChannelStatus, EventFanout, FanoutReport};
pub use intake::{DonationCheckout, DonationIntake, DonationRequest, Donor, IntakeError};
pub use mailer::{HttpMailRelay, Receipt, ReceiptMailer};
pub use reconciliation::{
    CreditedDonation, ReconcileError, ReconcileOutcome, Reconciled, ReconciliationEngine,
};

/// Failure of a best-effort side effect. Logged by the fanout, never
/// propagated to the ledger or the provider.
#[derive(Error, Debug)]
pub enum SideEffectError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Unexpected status {0}")]
    Status(u16),
    #[error("Circuit breaker open: {0}")]
    CircuitOpen(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Storage error: {0}")]
    Storage(#[from] RepositoryError),
}

/// `1234567` → `1.234.567 VND`
pub fn format_vnd(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        grouped.insert(0, '-');
    }
    format!("{} VND", grouped)
}
