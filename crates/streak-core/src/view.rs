//! Client-ready projection of a streak.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{MilestoneProgress, MilestoneTable};
use crate::streak::Streak;
use crate::timezone::TimezoneOffset;

/// A streak with its run dates already on the caller's wall clock, plus the
/// values a card needs to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakView {
    #[serde(flatten)]
    pub streak: Streak,
    pub current_length: u32,
    /// Activity was already recorded on the caller's current local day.
    pub extended_today: bool,
    pub milestones: MilestoneProgress,
}

impl StreakView {
    /// `streak` must be the stored (UTC) record.
    pub fn build(
        streak: &Streak,
        now: DateTime<Utc>,
        offset: TimezoneOffset,
        milestones: &MilestoneTable,
    ) -> Self {
        let current_length = streak.current_length(offset);
        Self {
            streak: streak.shifted(offset),
            current_length,
            extended_today: offset.same_local_day(streak.current_end_date, now),
            milestones: milestones.progress(current_length),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StreakEngine;
    use crate::streak::{Color, OwnerId, StreakId};
    use chrono::{Duration, TimeZone};

    fn streak(start: DateTime<Utc>, end: DateTime<Utc>) -> Streak {
        let new = StreakEngine::default().new_streak(
            OwnerId::new("alice"),
            Some("Walk".into()),
            None,
            Color::default(),
            1,
            start,
        );
        Streak {
            id: StreakId(7),
            owner_id: new.owner_id,
            title: new.title,
            description: new.description,
            color: new.color,
            current_start_date: start,
            current_end_date: end,
            longest_streak: 0,
            past_streaks: new.past_streaks,
            position: new.position,
            created_at: new.created_at,
            updated_at: new.updated_at,
        }
    }

    #[test]
    fn view_reports_length_and_next_milestone() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let end = start + Duration::days(4);
        let view = StreakView::build(
            &streak(start, end),
            end + Duration::hours(1),
            TimezoneOffset::UTC,
            &MilestoneTable::default(),
        );
        assert_eq!(view.current_length, 5);
        assert!(view.extended_today);
        assert_eq!(view.milestones.earned, vec![3]);
        let next = view.milestones.next.unwrap();
        assert_eq!((next.threshold, next.days_remaining), (7, 2));
    }

    #[test]
    fn extended_today_follows_local_calendar() {
        // 23:30 UTC is already the next day at UTC+2.
        let end = Utc.with_ymd_and_hms(2025, 6, 1, 20, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 23, 30, 0).unwrap();
        let s = streak(end, end);
        let plus_two = TimezoneOffset::from_hours(2.0).unwrap();

        assert!(StreakView::build(&s, now, TimezoneOffset::UTC, &MilestoneTable::default()).extended_today);
        assert!(!StreakView::build(&s, now, plus_two, &MilestoneTable::default()).extended_today);
    }

    #[test]
    fn view_dates_are_shifted_and_flattened() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let offset = TimezoneOffset::from_hours(-5.0).unwrap();
        let view = StreakView::build(&streak(start, start), start, offset, &MilestoneTable::default());
        assert_eq!(view.streak.current_start_date, start - Duration::hours(5));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["currentLength"], 1);
        assert_eq!(json["extendedToday"], true);
        assert!(json.get("streak").is_none());
    }
}
