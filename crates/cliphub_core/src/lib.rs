//! Core domain logic for the ClipHub clip vault.
//! This crate is the single source of truth for card/clip invariants and for
//! the share-to-save pipeline.

pub mod clock;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod share;

pub use clock::{Clock, ManualClock, SystemClock};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::card::{Card, CardId, UNTITLED_CARD_TITLE};
pub use model::clip::{ClipId, ClipItem, ClipKind};
pub use model::prefs::{ShareBehavior, SharePrefs};
pub use repo::card_repo::{CardFieldsUpdate, CardRepository, SqliteCardRepository};
pub use repo::clip_repo::{ClipRepository, SqliteClipRepository};
pub use repo::prefs_repo::{PrefsRepository, SqlitePrefsRepository};
pub use repo::{RepoError, RepoResult};
pub use service::card_store::{CardStore, StoreError, StoreResult};
pub use share::channel::{
    CaptureOutcome, ShareChannel, ShareIntent, SharePayload, SHARE_EVENT_NAME,
};
pub use share::router::{
    NavigationContext, NavigationError, NavigationState, RouteError, RouteOutcome, RouteTarget,
    ShareRouter,
};
pub use share::title::derive_auto_title;
pub use share::wiring::{Delivery, ShareToSave};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
