use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Lifetime totals for a registered donor. Never exists for guests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorAggregate {
    pub donor_id: Uuid,
    pub total_donated: i64,
    pub per_campaign: BTreeMap<Uuid, i64>,
}

impl DonorAggregate {
    pub fn new(donor_id: Uuid) -> Self {
        Self {
            donor_id,
            total_donated: 0,
            per_campaign: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, campaign_id: Option<Uuid>, amount: i64) {
        self.total_donated += amount;
        if let Some(campaign_id) = campaign_id {
            *self.per_campaign.entry(campaign_id).or_insert(0) += amount;
        }
    }

    pub fn donated_to(&self, campaign_id: Uuid) -> i64 {
        self.per_campaign.get(&campaign_id).copied().unwrap_or(0)
    }
}
