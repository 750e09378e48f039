//! The record store contract consumed by the service.
//!
//! Every lookup and write is scoped by owner: a row that exists but belongs
//! to someone else is indistinguishable from a missing one.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::streak::{NewStreak, OwnerId, PositionUpdate, Streak, StreakId, ValidPatch};
use crate::timezone::TimezoneOffset;

pub trait StreakStore {
    fn get_by_id(&self, id: StreakId, owner: &OwnerId) -> Result<Option<Streak>>;

    /// Ordered by `position` ascending, then newest first.
    fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<Streak>>;

    fn max_position(&self, owner: &OwnerId) -> Result<Option<i64>>;

    /// Inserts and returns the stored row, id included.
    fn insert(&self, streak: &NewStreak) -> Result<Streak>;

    /// Merges display metadata; `None` when no owned row matched.
    fn update_fields(
        &self,
        id: StreakId,
        owner: &OwnerId,
        patch: &ValidPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Streak>>;

    /// Writes run boundaries, longest run and history of an existing row.
    /// Returns `false` when no owned row matched.
    fn save_run_state(&self, streak: &Streak) -> Result<bool>;

    /// Hard delete. Returns the row as it was before deletion.
    fn delete(&self, id: StreakId, owner: &OwnerId) -> Result<Option<Streak>>;

    /// Applies every position or none of them.
    fn batch_update_positions(&self, updates: &[PositionUpdate], owner: &OwnerId) -> Result<()>;

    /// Stored offset, UTC when the user never reported one.
    fn timezone_offset(&self, owner: &OwnerId) -> Result<TimezoneOffset>;

    fn set_timezone_offset(&self, owner: &OwnerId, offset: TimezoneOffset) -> Result<()>;

    /// Runs `f` as one serialized unit: the write lock is held from the
    /// first read, and any error rolls back everything `f` did. Nested
    /// calls join the outer unit.
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&Self) -> Result<T>;
}
