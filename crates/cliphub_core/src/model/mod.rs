//! Domain model for the clip vault.
//!
//! # Responsibility
//! - Define cards, clips and share preferences.
//! - Keep normalization and ordering rules next to the data they govern.

pub mod card;
pub mod clip;
pub mod prefs;
