//! Client-facing streak operations.
//!
//! [`StreakService`] glues the pure [`StreakEngine`] to a [`StreakStore`]
//! and a [`Clock`]. Every call names its [`Caller`]; records owned by anyone
//! else are reported as not found. Streaks handed back to the caller have
//! their run dates shifted onto the caller's wall clock.

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::engine::{MilestoneTable, StreakEngine, Transition};
use crate::error::{CoreError, Result};
use crate::events::StreakEvent;
use crate::storage::{Config, StreakStore};
use crate::streak::{
    Caller, Color, HistoryEntry, PositionUpdate, Streak, StreakDraft, StreakId, StreakPatch,
    ValidPatch,
};
use crate::timezone::TimezoneOffset;
use crate::view::StreakView;

/// Result of [`StreakService::extend`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendOutcome {
    pub streak: Streak,
    pub was_reset: bool,
    pub event: StreakEvent,
}

/// One reading of the clock, in UTC and on the caller's wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientTime {
    pub utc: DateTime<Utc>,
    pub client: DateTime<Utc>,
    pub timezone_offset: TimezoneOffset,
}

/// Result of [`StreakService::end`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndOutcome {
    pub streak: Streak,
    pub was_ended_manually: bool,
    pub event: StreakEvent,
}

pub struct StreakService<S, C> {
    store: S,
    clock: C,
    engine: StreakEngine,
    milestones: MilestoneTable,
    default_color: Color,
}

impl<S: StreakStore, C: Clock> StreakService<S, C> {
    /// Service with the default grace period, milestones and color.
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            engine: StreakEngine::default(),
            milestones: MilestoneTable::default(),
            default_color: Color::default(),
        }
    }

    pub fn with_config(store: S, clock: C, config: &Config) -> Self {
        Self {
            store,
            clock,
            engine: config.engine(),
            milestones: config.milestone_table(),
            default_color: config.default_color(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn engine(&self) -> &StreakEngine {
        &self.engine
    }

    /// The clock at the precision the store keeps.
    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(6)
    }

    fn require(&self, caller: &Caller, id: StreakId) -> Result<Streak> {
        self.store.get_by_id(id, &caller.owner_id)?.ok_or_else(|| {
            tracing::warn!(owner = %caller.owner_id, streak_id = %id, "streak not found");
            CoreError::not_found("Streak", id)
        })
    }

    /// All of the caller's streaks in display order.
    pub fn get_streaks(&self, caller: &Caller) -> Result<Vec<Streak>> {
        let offset = self.store.timezone_offset(&caller.owner_id)?;
        let streaks = self.store.list_by_owner(&caller.owner_id)?;
        Ok(streaks.iter().map(|s| s.shifted(offset)).collect())
    }

    pub fn get_streak(&self, caller: &Caller, id: StreakId) -> Result<Streak> {
        let offset = self.store.timezone_offset(&caller.owner_id)?;
        Ok(self.require(caller, id)?.shifted(offset))
    }

    /// Streaks with their current length, milestones and whether they were
    /// already extended on the caller's local day.
    pub fn get_streak_views(&self, caller: &Caller) -> Result<Vec<StreakView>> {
        let now = self.now();
        let offset = self.store.timezone_offset(&caller.owner_id)?;
        let streaks = self.store.list_by_owner(&caller.owner_id)?;
        Ok(streaks
            .iter()
            .map(|s| StreakView::build(s, now, offset, &self.milestones))
            .collect())
    }

    /// Archived runs of one streak, oldest first, on the caller's wall clock.
    pub fn get_history(&self, caller: &Caller, id: StreakId) -> Result<Vec<HistoryEntry>> {
        let offset = self.store.timezone_offset(&caller.owner_id)?;
        let streak = self.require(caller, id)?;
        Ok(streak
            .history(offset)
            .into_iter()
            .map(|entry| HistoryEntry {
                start: offset.apply(entry.start),
                end: offset.apply(entry.end),
                ..entry
            })
            .collect())
    }

    /// The current instant on the caller's stored wall clock.
    pub fn client_date_time(&self, caller: &Caller) -> Result<DateTime<Utc>> {
        Ok(self.client_time(caller)?.client)
    }

    /// The current instant both in UTC and shifted by the stored offset.
    pub fn client_time(&self, caller: &Caller) -> Result<ClientTime> {
        let timezone_offset = self.store.timezone_offset(&caller.owner_id)?;
        let utc = self.now();
        Ok(ClientTime {
            utc,
            client: timezone_offset.apply(utc),
            timezone_offset,
        })
    }

    /// # Errors
    /// `Validation` when the color is malformed; nothing is written then.
    pub fn create(&self, caller: &Caller, draft: StreakDraft) -> Result<Streak> {
        let color = match draft.color.as_deref() {
            Some(color) => Color::parse(color)?,
            None => self.default_color.clone(),
        };

        let now = self.now();
        let (streak, offset) = self.store.transaction(|store| {
            let position = StreakEngine::next_position(store.max_position(&caller.owner_id)?);
            let new = self.engine.new_streak(
                caller.owner_id.clone(),
                draft.title,
                draft.description,
                color,
                position,
                now,
            );
            let streak = store.insert(&new)?;
            Ok((streak, store.timezone_offset(&caller.owner_id)?))
        })?;

        let event = StreakEvent::StreakCreated {
            streak_id: streak.id,
            position: streak.position,
            at: now,
        };
        tracing::info!(owner = %caller.owner_id, ?event, "streak created");
        Ok(streak.shifted(offset))
    }

    /// Merges display metadata. Run state is never touched.
    pub fn update(&self, caller: &Caller, id: StreakId, patch: StreakPatch) -> Result<Streak> {
        let patch = ValidPatch::try_from(patch)?;
        let now = self.now();

        let streak = self
            .store
            .update_fields(id, &caller.owner_id, &patch, now)?
            .ok_or_else(|| {
                tracing::warn!(owner = %caller.owner_id, streak_id = %id, "update of unknown streak");
                CoreError::not_found("Streak", id)
            })?;

        let event = StreakEvent::StreakUpdated { streak_id: id, at: now };
        tracing::info!(owner = %caller.owner_id, ?event, "streak updated");
        let offset = self.store.timezone_offset(&caller.owner_id)?;
        Ok(streak.shifted(offset))
    }

    /// Hard delete. Returns the record as it was.
    pub fn delete(&self, caller: &Caller, id: StreakId) -> Result<Streak> {
        let snapshot = self.store.delete(id, &caller.owner_id)?.ok_or_else(|| {
            tracing::warn!(owner = %caller.owner_id, streak_id = %id, "delete of unknown streak");
            CoreError::not_found("Streak", id)
        })?;

        let event = StreakEvent::StreakDeleted {
            streak_id: id,
            at: self.now(),
        };
        tracing::info!(owner = %caller.owner_id, ?event, "streak deleted");
        let offset = self.store.timezone_offset(&caller.owner_id)?;
        Ok(snapshot.shifted(offset))
    }

    /// Records activity now. Also stores `offset` as the caller's timezone.
    ///
    /// Read, transition, write and the timezone update happen as one unit:
    /// concurrent extends of the same streak apply one after the other.
    pub fn extend(
        &self,
        caller: &Caller,
        id: StreakId,
        offset: TimezoneOffset,
    ) -> Result<ExtendOutcome> {
        let (streak, transition, now) = self.store.transaction(|store| {
            let mut streak = store.get_by_id(id, &caller.owner_id)?.ok_or_else(|| {
                tracing::warn!(owner = %caller.owner_id, streak_id = %id, "extend of unknown streak");
                CoreError::not_found("Streak", id)
            })?;
            let now = self.now();
            let transition = self.engine.extend(&mut streak, now, offset);
            if !store.save_run_state(&streak)? {
                return Err(CoreError::Internal(format!(
                    "streak {id} vanished during extend"
                )));
            }
            store.set_timezone_offset(&caller.owner_id, offset)?;
            tracing::debug!(owner = %caller.owner_id, offset = offset.hours(), "timezone offset stored");
            Ok((streak, transition, now))
        })?;

        let event = match &transition {
            Transition::Extended { .. } => StreakEvent::StreakExtended {
                streak_id: id,
                current_length: streak.current_length(offset),
                at: now,
            },
            Transition::Reset(closed) => StreakEvent::StreakReset {
                streak_id: id,
                archived: closed.run,
                sequence: closed.sequence,
                finished_length: closed.finished_length,
                longest_streak: streak.longest_streak,
                at: now,
            },
        };
        if transition.was_reset() {
            tracing::info!(owner = %caller.owner_id, ?event, "streak broken and restarted");
        } else {
            tracing::info!(owner = %caller.owner_id, ?event, "streak extended");
        }

        Ok(ExtendOutcome {
            streak: streak.shifted(offset),
            was_reset: transition.was_reset(),
            event,
        })
    }

    /// Closes the active run now and starts a new one.
    pub fn end(&self, caller: &Caller, id: StreakId) -> Result<EndOutcome> {
        let (streak, closed, offset, now) = self.store.transaction(|store| {
            let mut streak = store.get_by_id(id, &caller.owner_id)?.ok_or_else(|| {
                tracing::warn!(owner = %caller.owner_id, streak_id = %id, "end of unknown streak");
                CoreError::not_found("Streak", id)
            })?;
            let offset = store.timezone_offset(&caller.owner_id)?;
            let now = self.now();
            let closed = self.engine.end(&mut streak, now, offset);
            if !store.save_run_state(&streak)? {
                return Err(CoreError::Internal(format!("streak {id} vanished during end")));
            }
            Ok((streak, closed, offset, now))
        })?;

        let event = StreakEvent::StreakEnded {
            streak_id: id,
            archived: closed.run,
            sequence: closed.sequence,
            finished_length: closed.finished_length,
            longest_streak: streak.longest_streak,
            at: now,
        };
        tracing::info!(owner = %caller.owner_id, ?event, "streak ended");

        Ok(EndOutcome {
            streak: streak.shifted(offset),
            was_ended_manually: true,
            event,
        })
    }

    /// Applies every position or none. An empty list succeeds untouched.
    pub fn reorder(&self, caller: &Caller, updates: &[PositionUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        self.store
            .batch_update_positions(updates, &caller.owner_id)
            .inspect_err(|e| {
                tracing::warn!(owner = %caller.owner_id, error = %e, "reorder rejected");
            })?;

        let event = StreakEvent::StreaksReordered {
            count: updates.len(),
            at: self.now(),
        };
        tracing::info!(owner = %caller.owner_id, ?event, "streaks reordered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::storage::StreakDb;
    use chrono::{Duration, TimeZone};

    fn day0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 10, 0, 0).unwrap()
    }

    fn service() -> StreakService<StreakDb, FixedClock> {
        StreakService::new(StreakDb::open_memory().unwrap(), FixedClock::new(day0()))
    }

    fn titled(title: &str) -> StreakDraft {
        StreakDraft {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    #[test]
    fn create_starts_a_one_day_run_at_next_position() {
        let svc = service();
        let alice = Caller::new("alice");

        let first = svc.create(&alice, titled("Read")).unwrap();
        let second = svc.create(&alice, titled("Run")).unwrap();

        assert_eq!(first.position, 1);
        assert_eq!(second.position, 2);
        assert_eq!(first.color.as_str(), "#000000");
        assert_eq!(first.current_start_date, day0());
        assert_eq!(first.current_end_date, day0());
        assert_eq!(first.current_length(TimezoneOffset::UTC), 1);
        assert_eq!(first.longest_streak, 0);
    }

    #[test]
    fn create_rejects_bad_color_without_writing() {
        let svc = service();
        let alice = Caller::new("alice");
        let draft = StreakDraft {
            color: Some("#12".into()),
            ..Default::default()
        };
        let err = svc.create(&alice, draft).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        assert!(svc.get_streaks(&alice).unwrap().is_empty());
    }

    #[test]
    fn create_uses_configured_default_color() {
        let mut config = Config::default();
        config.set("streaks.default_color", "#00aa00").unwrap();
        let svc = StreakService::with_config(
            StreakDb::open_memory().unwrap(),
            FixedClock::new(day0()),
            &config,
        );
        let streak = svc.create(&Caller::new("alice"), StreakDraft::default()).unwrap();
        assert_eq!(streak.color.as_str(), "#00aa00");
    }

    #[test]
    fn extend_scenario_resets_after_grace() {
        let svc = service();
        let alice = Caller::new("alice");
        let id = svc.create(&alice, titled("Read")).unwrap().id;

        svc.clock().set(day0() + Duration::days(2));
        let out = svc.extend(&alice, id, TimezoneOffset::UTC).unwrap();
        assert!(!out.was_reset);
        assert_eq!(out.streak.current_start_date, day0());
        assert_eq!(out.streak.current_end_date, day0() + Duration::days(2));
        assert!(matches!(out.event, StreakEvent::StreakExtended { current_length: 3, .. }));

        svc.clock().set(day0() + Duration::days(8));
        let out = svc.extend(&alice, id, TimezoneOffset::UTC).unwrap();
        assert!(out.was_reset);
        assert_eq!(out.streak.longest_streak, 3);
        assert_eq!(out.streak.current_start_date, day0() + Duration::days(8));
        let run = out.streak.past_streaks.get(1).unwrap();
        assert_eq!((run.start, run.end), (day0(), day0() + Duration::days(2)));
        assert!(matches!(
            out.event,
            StreakEvent::StreakReset { sequence: 1, finished_length: 3, longest_streak: 3, .. }
        ));
    }

    #[test]
    fn extend_stores_offset_and_shifts_result() {
        let svc = service();
        let alice = Caller::new("alice");
        let id = svc.create(&alice, titled("Read")).unwrap().id;
        let offset = TimezoneOffset::from_hours(5.5).unwrap();

        let out = svc.extend(&alice, id, offset).unwrap();
        assert_eq!(svc.store().timezone_offset(&alice.owner_id).unwrap(), offset);
        assert_eq!(
            out.streak.current_end_date,
            day0() + Duration::hours(5) + Duration::minutes(30)
        );
        assert_eq!(svc.client_date_time(&alice).unwrap(), offset.apply(day0()));

        // Stored rows stay in UTC.
        let stored = svc.store().get_by_id(id, &alice.owner_id).unwrap().unwrap();
        assert_eq!(stored.current_end_date, day0());
    }

    #[test]
    fn extend_unknown_streak_leaves_timezone_alone() {
        let svc = service();
        let alice = Caller::new("alice");
        let err = svc
            .extend(&alice, StreakId(404), TimezoneOffset::from_hours(3.0).unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
        assert_eq!(
            svc.store().timezone_offset(&alice.owner_id).unwrap(),
            TimezoneOffset::UTC
        );
    }

    #[test]
    fn end_archives_immediately() {
        let svc = service();
        let alice = Caller::new("alice");
        let id = svc.create(&alice, titled("Read")).unwrap().id;
        svc.clock().set(day0() + Duration::days(1));
        svc.extend(&alice, id, TimezoneOffset::UTC).unwrap();

        svc.clock().advance(Duration::hours(2));
        let out = svc.end(&alice, id).unwrap();
        assert!(out.was_ended_manually);
        assert_eq!(out.streak.past_streaks.len(), 1);
        assert_eq!(out.streak.longest_streak, 2);
        assert_eq!(out.streak.current_start_date, svc.clock().now());
        assert!(matches!(out.event, StreakEvent::StreakEnded { finished_length: 2, .. }));
    }

    #[test]
    fn returned_dates_match_stored_precision() {
        let svc = service();
        let alice = Caller::new("alice");
        let id = svc.create(&alice, titled("Read")).unwrap().id;

        svc.clock().set(day0() + Duration::hours(1) + Duration::nanoseconds(123_456_789));
        let extended = svc.extend(&alice, id, TimezoneOffset::UTC).unwrap();
        assert_eq!(extended.streak, svc.get_streak(&alice, id).unwrap());
        assert_eq!(
            extended.streak.current_end_date,
            day0() + Duration::hours(1) + Duration::microseconds(123_456)
        );

        svc.clock().advance(Duration::nanoseconds(999));
        let ended = svc.end(&alice, id).unwrap();
        assert_eq!(ended.streak, svc.get_streak(&alice, id).unwrap());
        assert!(matches!(ended.event, StreakEvent::StreakEnded { at, .. } if at == ended.streak.current_start_date));
    }

    #[test]
    fn client_time_reads_the_clock_once() {
        let svc = service();
        let alice = Caller::new("alice");
        let id = svc.create(&alice, titled("Read")).unwrap().id;
        let offset = TimezoneOffset::from_hours(-3.5).unwrap();
        svc.extend(&alice, id, offset).unwrap();

        svc.clock().set(day0() + Duration::nanoseconds(1_500));
        let time = svc.client_time(&alice).unwrap();
        assert_eq!(time.utc, day0() + Duration::microseconds(1));
        assert_eq!(time.client, time.utc - Duration::minutes(210));
        assert_eq!(time.timezone_offset, offset);
        assert_eq!(svc.client_date_time(&alice).unwrap(), time.client);
    }

    #[test]
    fn other_users_records_are_not_found() {
        let svc = service();
        let alice = Caller::new("alice");
        let bob = Caller::new("bob");
        let id = svc.create(&alice, titled("Read")).unwrap().id;

        assert!(matches!(svc.extend(&bob, id, TimezoneOffset::UTC), Err(CoreError::NotFound { .. })));
        assert!(matches!(svc.end(&bob, id), Err(CoreError::NotFound { .. })));
        assert!(matches!(
            svc.update(&bob, id, StreakPatch { title: Some("x".into()), ..Default::default() }),
            Err(CoreError::NotFound { .. })
        ));
        assert!(matches!(svc.delete(&bob, id), Err(CoreError::NotFound { .. })));
        assert!(matches!(svc.get_history(&bob, id), Err(CoreError::NotFound { .. })));
        assert!(svc.get_streaks(&bob).unwrap().is_empty());

        let untouched = svc.get_streak(&alice, id).unwrap();
        assert_eq!(untouched.title.as_deref(), Some("Read"));
        assert!(untouched.past_streaks.is_empty());
    }

    #[test]
    fn update_merges_and_bumps_updated_at() {
        let svc = service();
        let alice = Caller::new("alice");
        let created = svc.create(&alice, titled("Read")).unwrap();
        svc.clock().advance(Duration::minutes(3));

        let updated = svc
            .update(
                &alice,
                created.id,
                StreakPatch {
                    description: Some("20 pages".into()),
                    color: Some("#abcdef".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.title.as_deref(), Some("Read"));
        assert_eq!(updated.description.as_deref(), Some("20 pages"));
        assert_eq!(updated.color.as_str(), "#abcdef");
        assert_eq!(updated.updated_at, day0() + Duration::minutes(3));
        assert_eq!(updated.current_run(), created.current_run());
    }

    #[test]
    fn delete_returns_snapshot() {
        let svc = service();
        let alice = Caller::new("alice");
        let created = svc.create(&alice, titled("Read")).unwrap();
        let deleted = svc.delete(&alice, created.id).unwrap();
        assert_eq!(deleted, created);
        assert!(svc.get_streaks(&alice).unwrap().is_empty());
        assert!(svc.delete(&alice, created.id).is_err());
    }

    #[test]
    fn reorder_changes_listing_order() {
        let svc = service();
        let alice = Caller::new("alice");
        let a = svc.create(&alice, titled("A")).unwrap().id;
        let b = svc.create(&alice, titled("B")).unwrap().id;

        svc.reorder(
            &alice,
            &[
                PositionUpdate { id: a, position: 2 },
                PositionUpdate { id: b, position: 1 },
            ],
        )
        .unwrap();
        let ids: Vec<_> = svc.get_streaks(&alice).unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![b, a]);
        svc.reorder(&alice, &[]).unwrap();
    }

    #[test]
    fn history_and_views_reflect_archived_runs() {
        let svc = service();
        let alice = Caller::new("alice");
        let id = svc.create(&alice, titled("Read")).unwrap().id;
        svc.clock().set(day0() + Duration::days(3));
        svc.extend(&alice, id, TimezoneOffset::UTC).unwrap();
        svc.end(&alice, id).unwrap();

        let history = svc.get_history(&alice, id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sequence, 1);
        assert_eq!(history[0].length, 4);

        let views = svc.get_streak_views(&alice).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].current_length, 1);
        assert!(views[0].extended_today);
        assert_eq!(views[0].milestones.next.as_ref().unwrap().threshold, 3);
    }
}
