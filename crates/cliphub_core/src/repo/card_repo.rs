//! Card repository contract and SQLite implementation.
//!
//! # Invariants
//! - `list_cards` order is `updated_at DESC, id ASC`; pin priority is applied
//!   by the store, not by SQL.
//! - Deleting a card cascades to its `clip_items` rows via the foreign key.

use crate::model::card::{Card, CardId};
use crate::repo::{
    bool_to_int, ensure_connection_ready, parse_flag, parse_uuid, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const CARD_SELECT_SQL: &str = "SELECT
    id,
    title,
    pinned,
    archived,
    created_at,
    updated_at
FROM cards";

/// Partial card update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFieldsUpdate {
    pub title: Option<String>,
    pub pinned: Option<bool>,
    pub archived: Option<bool>,
    pub updated_at: Option<i64>,
}

impl CardFieldsUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.pinned.is_none()
            && self.archived.is_none()
            && self.updated_at.is_none()
    }
}

/// Persistence contract for cards.
pub trait CardRepository {
    fn insert_card(&self, card: &Card) -> RepoResult<()>;
    fn list_cards(&self) -> RepoResult<Vec<Card>>;
    fn get_card(&self, id: CardId) -> RepoResult<Option<Card>>;
    /// Applies a partial update in one statement. Empty updates are no-ops.
    fn update_card_fields(&self, id: CardId, fields: &CardFieldsUpdate) -> RepoResult<()>;
    /// Hard-deletes one card row and, by cascade, its clips.
    fn delete_card(&self, id: CardId) -> RepoResult<()>;
}

/// SQLite-backed card repository.
pub struct SqliteCardRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCardRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "cards")?;
        Ok(Self { conn })
    }
}

impl CardRepository for SqliteCardRepository<'_> {
    fn insert_card(&self, card: &Card) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO cards (id, title, pinned, archived, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                card.id.to_string(),
                card.title.as_str(),
                bool_to_int(card.pinned),
                bool_to_int(card.archived),
                card.created_at,
                card.updated_at,
            ],
        )?;
        Ok(())
    }

    fn list_cards(&self) -> RepoResult<Vec<Card>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CARD_SELECT_SQL} ORDER BY updated_at DESC, id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut cards = Vec::new();
        while let Some(row) = rows.next()? {
            cards.push(parse_card_row(row)?);
        }
        Ok(cards)
    }

    fn get_card(&self, id: CardId) -> RepoResult<Option<Card>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CARD_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_card_row(row)?)),
            None => Ok(None),
        }
    }

    fn update_card_fields(&self, id: CardId, fields: &CardFieldsUpdate) -> RepoResult<()> {
        if fields.is_empty() {
            return Ok(());
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(title) = fields.title.as_ref() {
            sets.push("title = ?");
            bind_values.push(Value::Text(title.clone()));
        }
        if let Some(pinned) = fields.pinned {
            sets.push("pinned = ?");
            bind_values.push(Value::Integer(bool_to_int(pinned)));
        }
        if let Some(archived) = fields.archived {
            sets.push("archived = ?");
            bind_values.push(Value::Integer(bool_to_int(archived)));
        }
        if let Some(updated_at) = fields.updated_at {
            sets.push("updated_at = ?");
            bind_values.push(Value::Integer(updated_at));
        }
        bind_values.push(Value::Text(id.to_string()));

        let sql = format!("UPDATE cards SET {} WHERE id = ?;", sets.join(", "));
        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "card", id });
        }
        Ok(())
    }

    fn delete_card(&self, id: CardId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM cards WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "card", id });
        }
        Ok(())
    }
}

fn parse_card_row(row: &Row<'_>) -> RepoResult<Card> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "cards.id")?;
    let title: String = row.get("title")?;
    if title.trim().is_empty() {
        return Err(RepoError::InvalidData(format!(
            "blank title in cards.title for {id}"
        )));
    }

    let created_at: i64 = row.get("created_at")?;
    let updated_at: i64 = row.get("updated_at")?;
    if updated_at < created_at {
        return Err(RepoError::InvalidData(format!(
            "cards.updated_at {updated_at} precedes created_at {created_at} for {id}"
        )));
    }

    Ok(Card {
        id,
        title,
        pinned: parse_flag(row.get("pinned")?, "cards.pinned")?,
        archived: parse_flag(row.get("archived")?, "cards.archived")?,
        created_at,
        updated_at,
    })
}
