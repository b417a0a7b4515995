//! Clip repository contract and SQLite implementation.
//!
//! # Invariants
//! - Inserting a clip for a missing card fails on the foreign key.
//! - `list_clips_for_card` order is `created_at DESC, id ASC` (newest first).

use crate::model::card::CardId;
use crate::model::clip::{ClipId, ClipItem, ClipKind};
use crate::repo::{ensure_connection_ready, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

/// Persistence contract for clip items.
pub trait ClipRepository {
    fn insert_clip(&self, clip: &ClipItem) -> RepoResult<()>;
    fn list_clips_for_card(&self, card_id: CardId) -> RepoResult<Vec<ClipItem>>;
    /// Deletes one clip row. Returns `false` when no row matched.
    fn delete_clip(&self, id: ClipId) -> RepoResult<bool>;
}

/// SQLite-backed clip repository.
pub struct SqliteClipRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteClipRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "clip_items")?;
        Ok(Self { conn })
    }
}

impl ClipRepository for SqliteClipRepository<'_> {
    fn insert_clip(&self, clip: &ClipItem) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO clip_items (id, card_id, type, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                clip.id.to_string(),
                clip.card_id.to_string(),
                clip.kind.as_str(),
                clip.text.as_str(),
                clip.created_at,
            ],
        )?;
        Ok(())
    }

    fn list_clips_for_card(&self, card_id: CardId) -> RepoResult<Vec<ClipItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, card_id, type, text, created_at
             FROM clip_items
             WHERE card_id = ?1
             ORDER BY created_at DESC, id ASC;",
        )?;
        let mut rows = stmt.query([card_id.to_string()])?;
        let mut clips = Vec::new();
        while let Some(row) = rows.next()? {
            clips.push(parse_clip_row(row)?);
        }
        Ok(clips)
    }

    fn delete_clip(&self, id: ClipId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM clip_items WHERE id = ?1;", [id.to_string()])?;
        Ok(changed > 0)
    }
}

/// Counts clip rows for one card, including rows the cache has not seen.
pub fn count_clips_for_card(conn: &Connection, card_id: CardId) -> RepoResult<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM clip_items WHERE card_id = ?1;",
        [card_id.to_string()],
        |row| row.get(0),
    )?;
    u64::try_from(count).map_err(|_| RepoError::InvalidData(format!("negative clip count {count}")))
}

fn parse_clip_row(row: &Row<'_>) -> RepoResult<ClipItem> {
    let id_text: String = row.get("id")?;
    let card_id_text: String = row.get("card_id")?;
    let kind_text: String = row.get("type")?;
    let kind = ClipKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid clip type `{kind_text}` in clip_items.type"))
    })?;

    Ok(ClipItem {
        id: parse_uuid(&id_text, "clip_items.id")?,
        card_id: parse_uuid(&card_id_text, "clip_items.card_id")?,
        kind,
        text: row.get("text")?,
        created_at: row.get("created_at")?,
    })
}
