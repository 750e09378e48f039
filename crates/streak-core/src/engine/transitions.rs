//! Streak state transitions.
//!
//! The engine is a pure function of a streak snapshot, the current instant
//! and the caller's timezone offset. It does no I/O and never reads the
//! clock itself; persistence and locking belong to the caller.
//!
//! ## Extend
//!
//! ```text
//! elapsed = now - current_end_date
//! elapsed <= grace  -> Extended        (end := now)
//! elapsed >  grace  -> Reset           (archive run, longest := max, start := end := now)
//! ```
//!
//! Manual end always takes the archival path.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::length::run_length;
use crate::streak::{Color, NewStreak, OwnerId, PastStreaks, Run, Streak, ValidPatch};
use crate::timezone::TimezoneOffset;

/// How long a run may sit idle before the next extend breaks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GracePolicy {
    threshold: Duration,
}

impl GracePolicy {
    pub const DEFAULT_DAYS: u32 = 4;

    pub fn days(days: u32) -> Self {
        Self {
            threshold: Duration::days(i64::from(days)),
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Strictly greater than the threshold breaks; exactly equal does not.
    pub fn is_broken(&self, last_end: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - last_end > self.threshold
    }
}

impl Default for GracePolicy {
    fn default() -> Self {
        Self::days(Self::DEFAULT_DAYS)
    }
}

/// A run moved into history by a reset or a manual end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedRun {
    pub run: Run,
    pub sequence: u32,
    pub finished_length: u32,
}

/// Result of an extend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    /// The active run continues; only the end moved.
    Extended { previous_end: DateTime<Utc> },
    /// Grace elapsed: the old run was archived and a new one started.
    Reset(ClosedRun),
}

impl Transition {
    pub fn was_reset(&self) -> bool {
        matches!(self, Transition::Reset(_))
    }

    pub fn closed(&self) -> Option<&ClosedRun> {
        match self {
            Transition::Extended { .. } => None,
            Transition::Reset(closed) => Some(closed),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StreakEngine {
    grace: GracePolicy,
}

impl StreakEngine {
    pub fn new(grace: GracePolicy) -> Self {
        Self { grace }
    }

    pub fn grace(&self) -> GracePolicy {
        self.grace
    }

    /// Position for a new streak given the owner's current maximum.
    pub fn next_position(max_position: Option<i64>) -> i64 {
        max_position.map_or(1, |max| max.saturating_add(1))
    }

    /// Builds the initial record: a one-day run starting now, no history.
    pub fn new_streak(
        &self,
        owner_id: OwnerId,
        title: Option<String>,
        description: Option<String>,
        color: Color,
        position: i64,
        now: DateTime<Utc>,
    ) -> NewStreak {
        NewStreak {
            owner_id,
            title,
            description,
            color,
            current_start_date: now,
            current_end_date: now,
            longest_streak: 0,
            past_streaks: PastStreaks::new(),
            position,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records activity at `now`.
    ///
    /// Safe to call any number of times per day: within grace it only
    /// re-stamps the end of the run.
    pub fn extend(
        &self,
        streak: &mut Streak,
        now: DateTime<Utc>,
        offset: TimezoneOffset,
    ) -> Transition {
        if self.grace.is_broken(streak.current_end_date, now) {
            Transition::Reset(close_run(streak, now, offset))
        } else {
            let previous_end = streak.current_end_date;
            // A client clock behind the run start must not invert the run.
            streak.current_end_date = now.max(streak.current_start_date);
            streak.updated_at = now;
            Transition::Extended { previous_end }
        }
    }

    /// Closes the active run regardless of elapsed time.
    pub fn end(&self, streak: &mut Streak, now: DateTime<Utc>, offset: TimezoneOffset) -> ClosedRun {
        close_run(streak, now, offset)
    }

    /// Merges display metadata. Run state is untouched.
    pub fn apply_patch(&self, streak: &mut Streak, patch: ValidPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            streak.title = Some(title);
        }
        if let Some(description) = patch.description {
            streak.description = Some(description);
        }
        if let Some(color) = patch.color {
            streak.color = color;
        }
        streak.updated_at = now;
    }
}

fn close_run(streak: &mut Streak, now: DateTime<Utc>, offset: TimezoneOffset) -> ClosedRun {
    let run = streak.current_run();
    let finished_length = run_length(run.start, run.end, offset);
    let sequence = streak.past_streaks.push(run);
    streak.longest_streak = streak.longest_streak.max(finished_length);
    streak.current_start_date = now;
    streak.current_end_date = now;
    streak.updated_at = now;
    ClosedRun {
        run,
        sequence,
        finished_length,
    }
}
