//! Share-to-save user preferences.
//!
//! # Invariants
//! - Missing preferences resolve to [`SharePrefs::default`].
//! - Serialized names match the persisted JSON record (`new`,
//!   `append_current`, `append_last`).

use crate::model::card::CardId;
use serde::{Deserialize, Serialize};

/// What a captured share does when no card detail view is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShareBehavior {
    /// Every share creates a new card.
    #[serde(rename = "new")]
    AlwaysNew,
    /// Append to the card currently open; otherwise create a new card.
    #[default]
    #[serde(rename = "append_current")]
    AppendCurrent,
    /// Append to the last opened card when no card is open.
    #[serde(rename = "append_last")]
    AppendLastOpened,
}

impl ShareBehavior {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlwaysNew => "new",
            Self::AppendCurrent => "append_current",
            Self::AppendLastOpened => "append_last",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" => Some(Self::AlwaysNew),
            "append_current" => Some(Self::AppendCurrent),
            "append_last" => Some(Self::AppendLastOpened),
            _ => None,
        }
    }
}

/// Persisted routing preference record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharePrefs {
    #[serde(default)]
    pub share_behavior: ShareBehavior,
    #[serde(default)]
    pub last_opened_card_id: Option<CardId>,
}

#[cfg(test)]
mod tests {
    use super::{ShareBehavior, SharePrefs};

    #[test]
    fn default_behavior_is_append_current() {
        assert_eq!(
            SharePrefs::default().share_behavior,
            ShareBehavior::AppendCurrent
        );
    }

    #[test]
    fn behavior_parse_accepts_storage_names() {
        assert_eq!(ShareBehavior::parse(" NEW "), Some(ShareBehavior::AlwaysNew));
        assert_eq!(
            ShareBehavior::parse("append_last"),
            Some(ShareBehavior::AppendLastOpened)
        );
        assert_eq!(ShareBehavior::parse("sometimes"), None);
    }
}
