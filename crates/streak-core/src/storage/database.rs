//! SQLite connection management.
//!
//! Opening a [`Database`] always brings the schema up to date, so callers
//! never see a half-migrated file.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use super::{data_dir, migrations};
use crate::error::{DatabaseError, Result};

/// How long a writer waits for another connection's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub const DATABASE_FILE: &str = "streaks.db";

/// SQLite database holding streaks and user settings.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data dir>/streaks.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(data_dir()?.join(DATABASE_FILE))
    }

    /// Open (or create) the database at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "opened database");
        Self::init(conn)
    }

    /// Open a private in-memory database, used by tests and dry runs.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_database_is_migrated() {
        let db = Database::open_memory().unwrap();
        assert_eq!(
            migrations::get_schema_version(db.conn()),
            migrations::SCHEMA_VERSION
        );
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DATABASE_FILE);
        {
            let db = Database::open_at(&path).unwrap();
            db.conn()
                .execute(
                    "INSERT INTO user_settings (owner_id, timezone_offset) VALUES ('a', 2.5)",
                    [],
                )
                .unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        let offset: f64 = db
            .conn()
            .query_row(
                "SELECT timezone_offset FROM user_settings WHERE owner_id = 'a'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(offset, 2.5);
    }
}
