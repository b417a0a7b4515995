//! Card domain model.
//!
//! # Responsibility
//! - Define the user-visible collection unit that owns clips.
//! - Own title normalization and the pin-priority ordering.
//!
//! # Invariants
//! - `title` is never blank; blank input normalizes to [`UNTITLED_CARD_TITLE`].
//! - `updated_at >= created_at` for every card produced by this module.
//! - `archived` is one-way; there is no unarchive helper.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Stable card identifier.
pub type CardId = Uuid;

/// Fallback title for blank card titles.
pub const UNTITLED_CARD_TITLE: &str = "Untitled";

/// Card record as persisted in `cards`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub title: String,
    pub pinned: bool,
    /// Soft delete flag. Archived cards are hidden from visible projections.
    pub archived: bool,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds. Never earlier than `created_at`.
    pub updated_at: i64,
}

impl Card {
    /// Creates a fresh, unpinned, unarchived card with a generated id.
    pub fn new(title: Option<&str>, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: normalize_title(title),
            pinned: false,
            archived: false,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Returns the `updated_at` value a mutation at `now_ms` should write.
    ///
    /// Clamped to `created_at` so a clock step backwards cannot break the
    /// timestamp invariant.
    pub fn touched_at(&self, now_ms: i64) -> i64 {
        now_ms.max(self.created_at)
    }

    /// Whether the card belongs to the visible (non-archived) projection.
    pub fn is_visible(&self) -> bool {
        !self.archived
    }
}

/// Trims a title and substitutes [`UNTITLED_CARD_TITLE`] when blank.
pub fn normalize_title(title: Option<&str>) -> String {
    match title.map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => trimmed.to_string(),
        _ => UNTITLED_CARD_TITLE.to_string(),
    }
}

/// Pin-priority ordering: pinned first, then `updated_at` descending, then
/// title, then id.
pub fn card_order(a: &Card, b: &Card) -> Ordering {
    b.pinned
        .cmp(&a.pinned)
        .then_with(|| b.updated_at.cmp(&a.updated_at))
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sorts cards in place by [`card_order`].
pub fn sort_cards(cards: &mut [Card]) {
    cards.sort_by(card_order);
}

#[cfg(test)]
mod tests {
    use super::{card_order, normalize_title, sort_cards, Card, UNTITLED_CARD_TITLE};
    use std::cmp::Ordering;

    fn card(title: &str, pinned: bool, updated_at: i64) -> Card {
        let mut card = Card::new(Some(title), 0);
        card.pinned = pinned;
        card.updated_at = updated_at;
        card
    }

    #[test]
    fn normalize_title_trims_and_falls_back() {
        assert_eq!(normalize_title(Some("  Groceries ")), "Groceries");
        assert_eq!(normalize_title(Some("   ")), UNTITLED_CARD_TITLE);
        assert_eq!(normalize_title(None), UNTITLED_CARD_TITLE);
    }

    #[test]
    fn new_card_has_equal_timestamps() {
        let card = Card::new(Some("x"), 42);
        assert_eq!(card.created_at, 42);
        assert_eq!(card.updated_at, 42);
        assert!(!card.pinned);
        assert!(!card.archived);
    }

    #[test]
    fn touched_at_never_precedes_created_at() {
        let card = Card::new(Some("x"), 1_000);
        assert_eq!(card.touched_at(500), 1_000);
        assert_eq!(card.touched_at(2_000), 2_000);
    }

    #[test]
    fn ordering_puts_pinned_first_then_recency_then_title() {
        let mut cards = vec![
            card("b-old", false, 10),
            card("pinned-old", true, 1),
            card("b-new", false, 20),
            card("a-new", false, 20),
        ];
        sort_cards(&mut cards);
        let titles: Vec<&str> = cards.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["pinned-old", "a-new", "b-new", "b-old"]);
    }

    #[test]
    fn ordering_falls_back_to_id_for_full_ties() {
        let a = card("same", false, 5);
        let b = card("same", false, 5);
        let expected = a.id.cmp(&b.id);
        assert_eq!(card_order(&a, &b), expected);
        assert_ne!(expected, Ordering::Equal);
    }
}
