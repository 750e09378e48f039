use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::streak::{Run, StreakId};

/// Every state change to a streak produces an event.
/// Clients use it to choose their messaging; the service logs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreakEvent {
    StreakCreated {
        streak_id: StreakId,
        position: i64,
        at: DateTime<Utc>,
    },
    /// The active run was extended to `at`.
    StreakExtended {
        streak_id: StreakId,
        current_length: u32,
        at: DateTime<Utc>,
    },
    /// Grace elapsed; the previous run was archived and a new one began.
    StreakReset {
        streak_id: StreakId,
        archived: Run,
        sequence: u32,
        finished_length: u32,
        longest_streak: u32,
        at: DateTime<Utc>,
    },
    /// The user closed the run on purpose.
    StreakEnded {
        streak_id: StreakId,
        archived: Run,
        sequence: u32,
        finished_length: u32,
        longest_streak: u32,
        at: DateTime<Utc>,
    },
    StreakUpdated {
        streak_id: StreakId,
        at: DateTime<Utc>,
    },
    StreakDeleted {
        streak_id: StreakId,
        at: DateTime<Utc>,
    },
    StreaksReordered {
        count: usize,
        at: DateTime<Utc>,
    },
}

impl StreakEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            StreakEvent::StreakCreated { at, .. }
            | StreakEvent::StreakExtended { at, .. }
            | StreakEvent::StreakReset { at, .. }
            | StreakEvent::StreakEnded { at, .. }
            | StreakEvent::StreakUpdated { at, .. }
            | StreakEvent::StreakDeleted { at, .. }
            | StreakEvent::StreaksReordered { at, .. } => *at,
        }
    }
}
