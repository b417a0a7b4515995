//! Clip item domain model.
//!
//! # Responsibility
//! - Define the single saved fragment that belongs to one card.
//! - Classify clip kind from content; callers never choose it.
//!
//! # Invariants
//! - `text` is trimmed and non-empty.
//! - Clips are immutable once created; removal is by id.

use crate::model::card::CardId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z][a-z0-9+.\-]*://\S+$").expect("valid link regex")
});

/// Stable clip identifier.
pub type ClipId = Uuid;

/// Clip classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipKind {
    Text,
    Link,
    /// Produced by scanner capture flows outside this core.
    Qr,
    /// Produced by text-recognition capture flows outside this core.
    Ocr,
}

impl ClipKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Link => "link",
            Self::Qr => "qr",
            Self::Ocr => "ocr",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "link" => Some(Self::Link),
            "qr" => Some(Self::Qr),
            "ocr" => Some(Self::Ocr),
            _ => None,
        }
    }
}

/// Clip record as persisted in `clip_items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipItem {
    pub id: ClipId,
    pub card_id: CardId,
    /// Serialized as `type` to match the storage column.
    #[serde(rename = "type")]
    pub kind: ClipKind,
    pub text: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl ClipItem {
    /// Builds a clip from raw user or share input.
    ///
    /// Returns `None` when the text is blank after trimming.
    pub fn from_text(card_id: CardId, raw: &str, now_ms: i64) -> Option<Self> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }

        Some(Self {
            id: Uuid::new_v4(),
            card_id,
            kind: classify_clip_text(text),
            text: text.to_string(),
            created_at: now_ms,
        })
    }
}

/// Classifies trimmed text: `scheme://non-whitespace` is a link, anything
/// else is plain text.
pub fn classify_clip_text(text: &str) -> ClipKind {
    if LINK_RE.is_match(text.trim()) {
        ClipKind::Link
    } else {
        ClipKind::Text
    }
}

#[cfg(test)]
mod tests {
    use super::{classify_clip_text, ClipItem, ClipKind};
    use uuid::Uuid;

    #[test]
    fn classify_detects_scheme_links() {
        assert_eq!(classify_clip_text("https://example.com/x"), ClipKind::Link);
        assert_eq!(classify_clip_text("  HTTP://EXAMPLE.COM "), ClipKind::Link);
        assert_eq!(classify_clip_text("ftp://files.local/a"), ClipKind::Link);
    }

    #[test]
    fn classify_treats_prose_and_bare_hosts_as_text() {
        assert_eq!(classify_clip_text("see https://example.com"), ClipKind::Text);
        assert_eq!(classify_clip_text("example.com"), ClipKind::Text);
        assert_eq!(classify_clip_text("https://"), ClipKind::Text);
    }

    #[test]
    fn from_text_trims_and_rejects_blank() {
        let card_id = Uuid::new_v4();
        assert!(ClipItem::from_text(card_id, "  \n ", 1).is_none());

        let clip = ClipItem::from_text(card_id, "  https://a.io  ", 7).expect("clip");
        assert_eq!(clip.text, "https://a.io");
        assert_eq!(clip.kind, ClipKind::Link);
        assert_eq!(clip.card_id, card_id);
        assert_eq!(clip.created_at, 7);
    }

    #[test]
    fn kind_storage_names_are_stable() {
        for kind in [ClipKind::Text, ClipKind::Link, ClipKind::Qr, ClipKind::Ocr] {
            assert_eq!(ClipKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ClipKind::parse("image"), None);
    }
}
