//! Campaign aggregate subset and funding milestone detection.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignAggregate {
    pub id: Uuid,
    pub title: String,
    pub goal_amount: i64,
    pub current_amount: i64,
    pub owner_id: Option<Uuid>,
    pub thumbnail: Option<String>,
}

/// Result of one atomic increment: the campaign as it stood right after
/// this credit, plus the amount that was added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignCredit {
    pub campaign: CampaignAggregate,
    pub amount: i64,
}

impl CampaignCredit {
    pub fn previous_amount(&self) -> i64 {
        self.campaign.current_amount - self.amount
    }

    pub fn milestones(&self) -> Vec<Milestone> {
        Milestone::crossed(
            self.campaign.goal_amount,
            self.previous_amount(),
            self.campaign.current_amount,
        )
    }
}

/// One-time funding thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    HalfFunded,
    GoalReached,
}

impl Milestone {
    /// Thresholds crossed by moving from `before` to `after`. A threshold
    /// counts only when `before` was strictly below it and `after` is at or
    /// above it. Percentages are compared in integer space to avoid rounding.
    pub fn crossed(goal: i64, before: i64, after: i64) -> Vec<Milestone> {
        if goal <= 0 || after <= before {
            return Vec::new();
        }

        let mut hits = Vec::new();
        let half_before = before.saturating_mul(2) < goal;
        let half_after = after.saturating_mul(2) >= goal;
        if half_before && half_after {
            hits.push(Milestone::HalfFunded);
        }
        if before < goal && after >= goal {
            hits.push(Milestone::GoalReached);
        }
        hits
    }
}
