pub mod campaign;
pub mod donor;
pub mod event;
pub mod issue;
pub mod notification;
pub mod transaction;

pub use campaign::{CampaignAggregate, CampaignCredit, Milestone};
pub use donor::DonorAggregate;
pub use event::{PaymentOutcome, VerifiedEvent};
pub use issue::{IssueKind, ReconciliationIssue};
pub use notification::{NewNotification, NotificationKind, NotificationRecord};
pub use transaction::{NewTransaction, ProviderKind, Transaction, TransactionStatus};
