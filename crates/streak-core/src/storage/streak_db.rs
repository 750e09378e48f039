//! SQLite-backed [`StreakStore`].

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension};

use super::database::Database;
use super::store::StreakStore;
use crate::error::{CoreError, DatabaseError, Result};
use crate::streak::{
    Color, NewStreak, OwnerId, PastStreaks, PositionUpdate, Streak, StreakId, ValidPatch,
};
use crate::timezone::TimezoneOffset;

const STREAK_COLUMNS: &str = "id, owner_id, title, description, color, current_start_date, \
     current_end_date, longest_streak, past_streaks, position, created_at, updated_at";

// === Helper Functions ===

/// Fixed-width RFC 3339 so text order matches time order.
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn parse_datetime(row: &rusqlite::Row, column: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let text: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

fn encode_past_streaks(past: &PastStreaks) -> Result<String> {
    Ok(serde_json::to_string(past)?)
}

/// Build a Streak from a row selected with `STREAK_COLUMNS`.
fn row_to_streak(row: &rusqlite::Row) -> Result<Streak, rusqlite::Error> {
    let color_text: String = row.get(4)?;
    let color = Color::parse(&color_text).map_err(|e| conversion_error(4, e))?;

    let past_text: String = row.get(8)?;
    let past_streaks: PastStreaks =
        serde_json::from_str(&past_text).map_err(|e| conversion_error(8, e))?;

    Ok(Streak {
        id: StreakId(row.get(0)?),
        owner_id: OwnerId::new(row.get::<_, String>(1)?),
        title: row.get(2)?,
        description: row.get(3)?,
        color,
        current_start_date: parse_datetime(row, 5)?,
        current_end_date: parse_datetime(row, 6)?,
        longest_streak: row.get(7)?,
        past_streaks,
        position: row.get(9)?,
        created_at: parse_datetime(row, 10)?,
        updated_at: parse_datetime(row, 11)?,
    })
}

/// Streak storage on top of a [`Database`].
pub struct StreakDb {
    db: Database,
}

impl StreakDb {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open the store in the default data directory.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Ok(Self::new(Database::open()?))
    }

    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open_at(path)?))
    }

    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self> {
        Ok(Self::new(Database::open_memory()?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl StreakStore for StreakDb {
    fn get_by_id(&self, id: StreakId, owner: &OwnerId) -> Result<Option<Streak>> {
        let sql = format!("SELECT {STREAK_COLUMNS} FROM streaks WHERE id = ?1 AND owner_id = ?2");
        let streak = self
            .db
            .conn()
            .query_row(&sql, params![id.0, owner.as_str()], row_to_streak)
            .optional()?;
        Ok(streak)
    }

    fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<Streak>> {
        let sql = format!(
            "SELECT {STREAK_COLUMNS} FROM streaks
             WHERE owner_id = ?1
             ORDER BY position ASC, created_at DESC, id DESC"
        );
        let mut stmt = self.db.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![owner.as_str()], row_to_streak)?;
        let streaks = rows.collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(owner = %owner, count = streaks.len(), "listed streaks");
        Ok(streaks)
    }

    fn max_position(&self, owner: &OwnerId) -> Result<Option<i64>> {
        let max = self.db.conn().query_row(
            "SELECT MAX(position) FROM streaks WHERE owner_id = ?1",
            params![owner.as_str()],
            |row| row.get::<_, Option<i64>>(0),
        )?;
        Ok(max)
    }

    fn insert(&self, streak: &NewStreak) -> Result<Streak> {
        self.transaction(|store| {
            let conn = store.db.conn();
            conn.execute(
                "INSERT INTO streaks (owner_id, title, description, color, current_start_date,
                     current_end_date, longest_streak, past_streaks, position, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    streak.owner_id.as_str(),
                    streak.title,
                    streak.description,
                    streak.color.as_str(),
                    format_datetime(streak.current_start_date),
                    format_datetime(streak.current_end_date),
                    streak.longest_streak,
                    encode_past_streaks(&streak.past_streaks)?,
                    streak.position,
                    format_datetime(streak.created_at),
                    format_datetime(streak.updated_at),
                ],
            )?;
            let id = StreakId(conn.last_insert_rowid());
            store.get_by_id(id, &streak.owner_id)?.ok_or_else(|| {
                CoreError::Internal(format!("streak {id} missing right after insert"))
            })
        })
    }

    fn update_fields(
        &self,
        id: StreakId,
        owner: &OwnerId,
        patch: &ValidPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Streak>> {
        self.transaction(|store| {
            let changed = store.db.conn().execute(
                "UPDATE streaks
                 SET title = COALESCE(?1, title),
                     description = COALESCE(?2, description),
                     color = COALESCE(?3, color),
                     updated_at = ?4
                 WHERE id = ?5 AND owner_id = ?6",
                params![
                    patch.title,
                    patch.description,
                    patch.color.as_ref().map(Color::as_str),
                    format_datetime(updated_at),
                    id.0,
                    owner.as_str(),
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            store
                .get_by_id(id, owner)?
                .map(Some)
                .ok_or_else(|| CoreError::Internal(format!("streak {id} missing right after update")))
        })
    }

    fn save_run_state(&self, streak: &Streak) -> Result<bool> {
        let changed = self.db.conn().execute(
            "UPDATE streaks
             SET current_start_date = ?1,
                 current_end_date = ?2,
                 longest_streak = ?3,
                 past_streaks = ?4,
                 updated_at = ?5
             WHERE id = ?6 AND owner_id = ?7",
            params![
                format_datetime(streak.current_start_date),
                format_datetime(streak.current_end_date),
                streak.longest_streak,
                encode_past_streaks(&streak.past_streaks)?,
                format_datetime(streak.updated_at),
                streak.id.0,
                streak.owner_id.as_str(),
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete(&self, id: StreakId, owner: &OwnerId) -> Result<Option<Streak>> {
        self.transaction(|store| {
            let Some(snapshot) = store.get_by_id(id, owner)? else {
                return Ok(None);
            };
            store.db.conn().execute(
                "DELETE FROM streaks WHERE id = ?1 AND owner_id = ?2",
                params![id.0, owner.as_str()],
            )?;
            Ok(Some(snapshot))
        })
    }

    fn batch_update_positions(&self, updates: &[PositionUpdate], owner: &OwnerId) -> Result<()> {
        self.transaction(|store| {
            let mut stmt = store
                .db
                .conn()
                .prepare("UPDATE streaks SET position = ?1 WHERE id = ?2 AND owner_id = ?3")?;
            for update in updates {
                let changed = stmt.execute(params![update.position, update.id.0, owner.as_str()])?;
                if changed == 0 {
                    return Err(CoreError::not_found("Streak", update.id));
                }
            }
            Ok(())
        })
    }

    fn timezone_offset(&self, owner: &OwnerId) -> Result<TimezoneOffset> {
        let stored: Option<f64> = self
            .db
            .conn()
            .query_row(
                "SELECT timezone_offset FROM user_settings WHERE owner_id = ?1",
                params![owner.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match stored {
            None => Ok(TimezoneOffset::UTC),
            Some(hours) => TimezoneOffset::from_hours(hours).map_err(|e| {
                DatabaseError::CorruptValue {
                    column: "timezone_offset",
                    message: e.to_string(),
                }
                .into()
            }),
        }
    }

    fn set_timezone_offset(&self, owner: &OwnerId, offset: TimezoneOffset) -> Result<()> {
        self.db.conn().execute(
            "INSERT INTO user_settings (owner_id, timezone_offset) VALUES (?1, ?2)
             ON CONFLICT(owner_id) DO UPDATE SET timezone_offset = excluded.timezone_offset",
            params![owner.as_str(), offset.hours()],
        )?;
        Ok(())
    }

    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let conn = self.db.conn();
        if !conn.is_autocommit() {
            return f(self);
        }

        // IMMEDIATE takes the write lock up front, so a concurrent
        // read-modify-write waits here instead of reading a stale row.
        conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        match f(self) {
            Ok(value) => match conn.execute_batch("COMMIT;") {
                Ok(()) => Ok(value),
                Err(err) => {
                    let _ = conn.execute_batch("ROLLBACK;");
                    Err(err.into())
                }
            },
            Err(err) => {
                if let Err(rollback_err) = conn.execute_batch("ROLLBACK;") {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}
