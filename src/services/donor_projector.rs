use std::sync::Arc;

use super::{Receipt, ReceiptMailer, SideEffectError};
use crate::domain::{DonorAggregate, Transaction};
use crate::ports::LedgerStore;

/// Folds confirmed donations into per-donor totals and mails a receipt.
#[derive(Clone)]
pub struct DonorProjector {
    store: Arc<dyn LedgerStore>,
    mailer: Option<Arc<dyn ReceiptMailer>>,
}

impl DonorProjector {
    pub fn new(store: Arc<dyn LedgerStore>, mailer: Option<Arc<dyn ReceiptMailer>>) -> Self {
        Self { store, mailer }
    }

    /// Returns `None` for guest donations, which never touch an aggregate.
    pub async fn project(
        &self,
        tx: &Transaction,
        amount: i64,
        campaign_title: Option<&str>,
    ) -> Result<Option<DonorAggregate>, SideEffectError> {
        let Some(donor_id) = tx.donor_id else {
            tracing::debug!(order_code = %tx.provider_order_code, "Guest donation, skipping donor projection");
            return Ok(None);
        };

        let aggregate = self
            .store
            .add_contribution(donor_id, tx.campaign_id, amount)
            .await?;

        tracing::info!(
            donor_id = %donor_id,
            total_donated = aggregate.total_donated,
            "Donor aggregate updated"
        );

        if let (Some(mailer), Some(to)) = (&self.mailer, tx.contact.as_deref()) {
            let receipt = Receipt {
                to: to.to_string(),
                donor_name: tx.donor_name.clone(),
                order_code: tx.provider_order_code.clone(),
                amount,
                campaign_title: campaign_title.map(str::to_string),
                paid_at: tx.updated_at,
            };
            if let Err(e) = mailer.send_receipt(&receipt).await {
                tracing::warn!(order_code = %tx.provider_order_code, error = %e, "Receipt mail failed");
            }
        }

        Ok(Some(aggregate))
    }
}
