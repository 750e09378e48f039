//! Milestone badges derived from the current run length.
//!
//! Nothing here is persisted; any client can recompute it from a record.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MILESTONES: [u32; 6] = [3, 7, 30, 100, 182, 365];

/// Ascending, de-duplicated day thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<u32>", into = "Vec<u32>")]
pub struct MilestoneTable(Vec<u32>);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextMilestone {
    pub threshold: u32,
    pub days_remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneProgress {
    pub earned: Vec<u32>,
    pub next: Option<NextMilestone>,
}

impl MilestoneTable {
    pub fn new(mut thresholds: Vec<u32>) -> Self {
        thresholds.retain(|&t| t > 0);
        thresholds.sort_unstable();
        thresholds.dedup();
        Self(thresholds)
    }

    pub fn thresholds(&self) -> &[u32] {
        &self.0
    }

    pub fn progress(&self, current_length: u32) -> MilestoneProgress {
        let split = self.0.partition_point(|&t| t <= current_length);
        let earned = self.0[..split].to_vec();
        let next = self.0.get(split).map(|&threshold| NextMilestone {
            threshold,
            days_remaining: threshold - current_length,
        });
        MilestoneProgress { earned, next }
    }
}

impl Default for MilestoneTable {
    fn default() -> Self {
        Self(DEFAULT_MILESTONES.to_vec())
    }
}

impl From<Vec<u32>> for MilestoneTable {
    fn from(thresholds: Vec<u32>) -> Self {
        Self::new(thresholds)
    }
}

impl From<MilestoneTable> for Vec<u32> {
    fn from(table: MilestoneTable) -> Self {
        table.0
    }
}
