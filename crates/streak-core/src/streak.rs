//! Streak records and the values that flow in and out of the engine.
//!
//! A [`Streak`] is owned by exactly one user. Its active run is bounded by
//! `current_start_date..=current_end_date`; closed runs are archived in
//! [`PastStreaks`], an append-only list whose 1-based position is the run's
//! sequence number.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::engine::run_length;
use crate::error::ValidationError;
use crate::timezone::TimezoneOffset;

pub const DEFAULT_COLOR: &str = "#000000";

/// Identifier of a streak row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreakId(pub i64);

impl fmt::Display for StreakId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for StreakId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(StreakId)
    }
}

/// Identifier of the owning user, as issued by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The authenticated user an operation runs on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub owner_id: OwnerId,
}

impl Caller {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: OwnerId::new(owner_id),
        }
    }
}

/// A `#rrggbb` color. Opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(String);

impl Color {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let bytes = value.as_bytes();
        let valid = bytes.len() == 7
            && bytes[0] == b'#'
            && bytes[1..].iter().all(|b| b.is_ascii_hexdigit());
        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(ValidationError::InvalidColor(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Color {
    fn default() -> Self {
        Self(DEFAULT_COLOR.to_string())
    }
}

impl TryFrom<String> for Color {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::parse(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One closed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Run {
    /// Inclusive length in days on the given local calendar.
    pub fn length(&self, offset: TimezoneOffset) -> u32 {
        run_length(self.start, self.end, offset)
    }

    fn shifted(self, offset: TimezoneOffset) -> Self {
        Self {
            start: offset.apply(self.start),
            end: offset.apply(self.end),
        }
    }
}

/// Archived runs in the order they were closed.
///
/// On the wire this keeps the numbered form `{"1": {..}, "2": {..}}`;
/// decoding rejects gaps so sequence numbers stay contiguous from 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PastStreaks(Vec<Run>);

impl PastStreaks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends a run and returns its sequence number.
    pub fn push(&mut self, run: Run) -> u32 {
        self.0.push(run);
        self.0.len() as u32
    }

    /// Looks up a run by its 1-based sequence number.
    pub fn get(&self, sequence: u32) -> Option<&Run> {
        let index = (sequence as usize).checked_sub(1)?;
        self.0.get(index)
    }

    /// `(sequence, run)` pairs, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Run)> + '_ {
        self.0
            .iter()
            .enumerate()
            .map(|(index, run)| (index as u32 + 1, run))
    }

    fn shifted(&self, offset: TimezoneOffset) -> Self {
        Self(self.0.iter().map(|run| run.shifted(offset)).collect())
    }
}

impl Serialize for PastStreaks {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (sequence, run) in self.iter() {
            map.serialize_entry(&sequence.to_string(), run)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PastStreaks {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Run>::deserialize(deserializer)?;
        let mut numbered = BTreeMap::new();
        for (key, run) in raw {
            let sequence: u32 = key
                .parse()
                .map_err(|_| D::Error::custom(format!("invalid run number '{key}'")))?;
            numbered.insert(sequence, run);
        }
        let mut runs = Vec::with_capacity(numbered.len());
        for (expected, (sequence, run)) in (1u32..).zip(numbered) {
            if sequence != expected {
                return Err(D::Error::custom(format!(
                    "run numbers must be contiguous from 1, found {sequence} where {expected} was expected"
                )));
            }
            runs.push(run);
        }
        Ok(Self(runs))
    }
}

/// A persisted streak record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Streak {
    pub id: StreakId,
    pub owner_id: OwnerId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Color,
    pub current_start_date: DateTime<Utc>,
    pub current_end_date: DateTime<Utc>,
    pub longest_streak: u32,
    pub past_streaks: PastStreaks,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Streak {
    /// The active run.
    pub fn current_run(&self) -> Run {
        Run {
            start: self.current_start_date,
            end: self.current_end_date,
        }
    }

    /// Inclusive length of the active run in days.
    pub fn current_length(&self, offset: TimezoneOffset) -> u32 {
        self.current_run().length(offset)
    }

    /// Archived runs with their lengths, oldest first.
    pub fn history(&self, offset: TimezoneOffset) -> Vec<HistoryEntry> {
        self.past_streaks
            .iter()
            .map(|(sequence, run)| HistoryEntry {
                sequence,
                start: run.start,
                end: run.end,
                length: run.length(offset),
            })
            .collect()
    }

    /// Copy with every run boundary shifted into the caller's local time.
    ///
    /// Bookkeeping timestamps are left in UTC.
    pub fn shifted(&self, offset: TimezoneOffset) -> Self {
        Self {
            current_start_date: offset.apply(self.current_start_date),
            current_end_date: offset.apply(self.current_end_date),
            past_streaks: self.past_streaks.shifted(offset),
            ..self.clone()
        }
    }
}

/// One row of the history view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sequence: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub length: u32,
}

/// Input for creating a streak.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreakDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
}

/// A fully-formed row waiting for an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStreak {
    pub owner_id: OwnerId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Color,
    pub current_start_date: DateTime<Utc>,
    pub current_end_date: DateTime<Utc>,
    pub longest_streak: u32,
    pub past_streaks: PastStreaks,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Display metadata changes; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreakPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
}

impl StreakPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.color.is_none()
    }
}

/// Validated form of [`StreakPatch`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Option<Color>,
}

impl TryFrom<StreakPatch> for ValidPatch {
    type Error = ValidationError;

    fn try_from(patch: StreakPatch) -> Result<Self, Self::Error> {
        let color = patch.color.as_deref().map(Color::parse).transpose()?;
        Ok(Self {
            title: patch.title,
            description: patch.description,
            color,
        })
    }
}

/// New sort key for one streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub id: StreakId,
    pub position: i64,
}
