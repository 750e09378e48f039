//! Database schema migrations for streaks.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub(crate) fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: streaks and per-user settings.
///
/// `past_streaks` holds the archived runs as a JSON object keyed by run
/// number, the same shape clients receive.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS streaks (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id            TEXT NOT NULL,
            title               TEXT,
            description         TEXT,
            color               TEXT NOT NULL DEFAULT '#000000',
            current_start_date  TEXT NOT NULL,
            current_end_date    TEXT NOT NULL,
            longest_streak      INTEGER NOT NULL DEFAULT 0,
            past_streaks        TEXT NOT NULL DEFAULT '{}',
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_settings (
            owner_id         TEXT PRIMARY KEY,
            timezone_offset  REAL NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_streaks_owner ON streaks(owner_id);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// Migration v2: user-controlled ordering.
///
/// Adds `position` and backfills it per owner so the existing newest-first
/// order is what users keep seeing.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE streaks ADD COLUMN position INTEGER NOT NULL DEFAULT 0;

         UPDATE streaks
         SET position = (
             SELECT COUNT(*) FROM streaks AS newer
             WHERE newer.owner_id = streaks.owner_id
               AND (newer.created_at > streaks.created_at
                    OR (newer.created_at = streaks.created_at AND newer.id >= streaks.id))
         );

         CREATE INDEX IF NOT EXISTS idx_streaks_owner_position ON streaks(owner_id, position);",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}
