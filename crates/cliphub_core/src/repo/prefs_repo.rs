//! Share preference repository.
//!
//! # Invariants
//! - Preferences live in one `preferences` row keyed by [`PREFS_KEY`].
//! - A missing row reads back as `SharePrefs::default()`.

use crate::model::prefs::SharePrefs;
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Storage key of the persisted share preference record.
pub const PREFS_KEY: &str = "cliphub_prefs_v1";

/// Persistence contract for share preferences.
pub trait PrefsRepository {
    fn load_prefs(&self) -> RepoResult<SharePrefs>;
    fn save_prefs(&self, prefs: &SharePrefs) -> RepoResult<()>;
}

/// SQLite-backed preference repository.
pub struct SqlitePrefsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePrefsRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "preferences")?;
        Ok(Self { conn })
    }
}

impl PrefsRepository for SqlitePrefsRepository<'_> {
    fn load_prefs(&self) -> RepoResult<SharePrefs> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1;",
                [PREFS_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(value) => serde_json::from_str(&value).map_err(|err| {
                RepoError::InvalidData(format!("invalid preferences.value for {PREFS_KEY}: {err}"))
            }),
            None => Ok(SharePrefs::default()),
        }
    }

    fn save_prefs(&self, prefs: &SharePrefs) -> RepoResult<()> {
        let value = serde_json::to_string(prefs)
            .map_err(|err| RepoError::InvalidData(format!("unserializable preferences: {err}")))?;
        self.conn.execute(
            "INSERT INTO preferences (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
            params![PREFS_KEY, value],
        )?;
        Ok(())
    }
}
