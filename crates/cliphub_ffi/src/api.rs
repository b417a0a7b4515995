//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose card, clip, preference and share-to-save use cases to Dart via
//!   FRB as sync calls with plain response envelopes.
//! - Own the process-wide share channel and router.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Every DB-backed call opens the vault, loads the card cache and drops
//!   both before returning.
//! - Ids cross the boundary as hyphenated UUID strings.

use cliphub_core::db::open_db;
use cliphub_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    CaptureOutcome, Card, CardId, CardStore, ClipItem, NavigationState, PrefsRepository,
    RouteOutcome, ShareBehavior, ShareChannel, ShareIntent, SharePayload, SharePrefs, ShareRouter,
    SqliteCardRepository, SqliteClipRepository, SqlitePrefsRepository, StoreError, SystemClock,
    SHARE_EVENT_NAME,
};
use log::warn;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use uuid::Uuid;

const VAULT_DB_FILE_NAME: &str = "cliphub.sqlite3";
static VAULT_DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static SHARE_CHANNEL: OnceLock<ShareChannel> = OnceLock::new();
static SHARE_ROUTER: OnceLock<Mutex<ShareRouter>> = OnceLock::new();

type VaultStore<'conn> = CardStore<SqliteCardRepository<'conn>, SqliteClipRepository<'conn>>;

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Card row projected for UI lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardItem {
    pub card_id: String,
    pub title: String,
    pub pinned: bool,
    pub archived: bool,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

/// Card list response in pin-priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardListResponse {
    pub items: Vec<CardItem>,
    /// Human-readable response message for diagnostics.
    pub message: String,
}

/// Clip row projected for the card detail view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipEntry {
    pub clip_id: String,
    pub card_id: String,
    /// Clip kind (`text|link|qr|ocr`).
    pub kind: String,
    pub text: String,
    pub created_at: i64,
}

/// Clip list response, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipListResponse {
    pub items: Vec<ClipEntry>,
    pub message: String,
}

/// Generic action response envelope for card and clip mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultActionResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    pub card_id: Option<String>,
    pub clip_id: Option<String>,
    /// Human-readable response message for diagnostics/UI alerts.
    pub message: String,
}

impl VaultActionResponse {
    fn success(message: impl Into<String>, card_id: CardId, clip_id: Option<Uuid>) -> Self {
        Self {
            ok: true,
            card_id: Some(card_id.to_string()),
            clip_id: clip_id.map(|id| id.to_string()),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            card_id: None,
            clip_id: None,
            message: message.into(),
        }
    }
}

/// Result of offering an OS share intent to the capture channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareCaptureResponse {
    /// `accepted|ignored_contract|ignored_blank|duplicate`.
    pub outcome: String,
    /// Event the host must emit to live listeners; set only when accepted.
    pub event_name: Option<String>,
    /// Trimmed payload text; set only when accepted.
    pub text: Option<String>,
}

/// Result of routing shared text into the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRouteResponse {
    pub ok: bool,
    /// `saved|duplicate|blank|error`.
    pub outcome: String,
    /// `active_card|last_opened|new_card` when saved.
    pub target: Option<String>,
    /// Card the host should bring into view when saved.
    pub card_id: Option<String>,
    pub clip_id: Option<String>,
    pub message: String,
}

impl ShareRouteResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            outcome: "error".to_string(),
            target: None,
            card_id: None,
            clip_id: None,
            message: message.into(),
        }
    }
}

/// Share preference snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefsResponse {
    pub ok: bool,
    /// `new|append_current|append_last`.
    pub share_behavior: String,
    pub last_opened_card_id: Option<String>,
    pub message: String,
}

impl PrefsResponse {
    fn from_prefs(prefs: &SharePrefs, message: impl Into<String>) -> Self {
        Self {
            ok: true,
            share_behavior: prefs.share_behavior.as_str().to_string(),
            last_opened_card_id: prefs.last_opened_card_id.map(|id| id.to_string()),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        let defaults = SharePrefs::default();
        Self {
            ok: false,
            share_behavior: defaults.share_behavior.as_str().to_string(),
            last_opened_card_id: None,
            message: message.into(),
        }
    }
}

/// Event name the host uses for live share deliveries.
#[flutter_rust_bridge::frb(sync)]
pub fn share_event_name() -> String {
    SHARE_EVENT_NAME.to_string()
}

/// Offers an OS share intent to the process-wide capture channel.
///
/// Only `android.intent.action.SEND` with MIME `text/plain` and non-blank
/// text is accepted. Redelivery of the last accepted text is reported as
/// `duplicate`.
///
/// # FFI contract
/// - Sync call, in-memory only.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn share_handle_intent(
    action: Option<String>,
    mime_type: Option<String>,
    text: Option<String>,
) -> ShareCaptureResponse {
    let intent = ShareIntent {
        action,
        mime_type,
        text,
    };
    let outcome = share_channel().handle_intent(&intent);
    let accepted = outcome == CaptureOutcome::Accepted;
    ShareCaptureResponse {
        outcome: outcome.as_str().to_string(),
        event_name: accepted.then(|| SHARE_EVENT_NAME.to_string()),
        text: if accepted {
            intent.text.map(|raw| raw.trim().to_string())
        } else {
            None
        },
    }
}

/// Pulls and consumes the pending share, if any.
///
/// A second call without a new share returns `None`.
#[flutter_rust_bridge::frb(sync)]
pub fn share_take_initial() -> Option<String> {
    share_channel()
        .take_initial_share()
        .map(|payload| payload.text)
}

/// Routes shared text into the vault.
///
/// Input semantics:
/// - `text`: delivered share text (pushed event or pulled payload).
/// - `active_card_id`: card shown by the active detail view, if any.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - On failure the payload is put back into the channel for a later pull.
/// - An unparsable `active_card_id` is treated as no active view.
#[flutter_rust_bridge::frb(sync)]
pub fn share_route(text: String, active_card_id: Option<String>) -> ShareRouteResponse {
    let active_card = match active_card_id.as_deref().map(parse_card_id).transpose() {
        Ok(active_card) => active_card,
        Err(err) => {
            warn!("event=share_route module=ffi status=degraded reason=active_card_unparsable error={err}");
            None
        }
    };
    let payload = SharePayload {
        text: text.trim().to_string(),
    };

    let routed = with_store(|store, conn| {
        let prefs_repo = SqlitePrefsRepository::try_new(conn)
            .map_err(|err| format!("prefs repo init failed: {err}"))?;
        let prefs = prefs_repo.load_prefs().map_err(|err| err.to_string())?;
        let mut nav = NavigationState {
            active_card,
            opened: Vec::new(),
        };

        let outcome = lock_router()
            .route(&payload.text, &mut nav, &prefs, store)
            .map_err(|err| err.to_string())?;

        if let Some(opened) = nav.opened.last().copied() {
            let recorded = prefs_repo.load_prefs().and_then(|mut current| {
                current.last_opened_card_id = Some(opened);
                prefs_repo.save_prefs(&current)
            });
            if let Err(err) = recorded {
                warn!("event=share_route module=ffi status=ok detail=last_opened_not_saved card_id={opened} error={err}");
            }
        }
        Ok(outcome)
    });

    match routed {
        Ok(RouteOutcome::Saved {
            card_id,
            clip_id,
            target,
        }) => {
            share_channel().acknowledge(&payload);
            ShareRouteResponse {
                ok: true,
                outcome: "saved".to_string(),
                target: Some(target.as_str().to_string()),
                card_id: Some(card_id.to_string()),
                clip_id: Some(clip_id.to_string()),
                message: "Clip saved.".to_string(),
            }
        }
        Ok(RouteOutcome::DuplicateSuppressed) => {
            share_channel().acknowledge(&payload);
            ShareRouteResponse {
                ok: true,
                outcome: "duplicate".to_string(),
                target: None,
                card_id: None,
                clip_id: None,
                message: "Duplicate share ignored.".to_string(),
            }
        }
        Ok(RouteOutcome::Blank) => ShareRouteResponse {
            ok: true,
            outcome: "blank".to_string(),
            target: None,
            card_id: None,
            clip_id: None,
            message: "Nothing to save.".to_string(),
        },
        Err(err) => {
            if !payload.text.is_empty() {
                share_channel().restore(payload);
            }
            ShareRouteResponse::failure(format!("share_route failed: {err}"))
        }
    }
}

/// Lists cards in pin-priority order.
///
/// Archived cards are included only when `include_archived` is true.
#[flutter_rust_bridge::frb(sync)]
pub fn card_list(include_archived: bool) -> CardListResponse {
    let listed = with_store(|store, _| {
        let items = store
            .cards()
            .iter()
            .filter(|card| include_archived || card.is_visible())
            .map(to_card_item)
            .collect::<Vec<_>>();
        Ok(items)
    });

    match listed {
        Ok(items) => {
            let message = if items.is_empty() {
                "No cards.".to_string()
            } else {
                format!("Found {} card(s).", items.len())
            };
            CardListResponse { items, message }
        }
        Err(err) => CardListResponse {
            items: Vec::new(),
            message: format!("card_list failed: {err}"),
        },
    }
}

/// Creates a card. Blank or missing titles become `Untitled`.
#[flutter_rust_bridge::frb(sync)]
pub fn card_create(title: Option<String>) -> VaultActionResponse {
    match with_store(|store, _| {
        store
            .create_card(title.as_deref())
            .map_err(|err| err.to_string())
    }) {
        Ok(card_id) => VaultActionResponse::success("Card created.", card_id, None),
        Err(err) => VaultActionResponse::failure(format!("card_create failed: {err}")),
    }
}

/// Flips the pinned flag of a card.
#[flutter_rust_bridge::frb(sync)]
pub fn card_toggle_pin(card_id: String) -> VaultActionResponse {
    card_action("card_toggle_pin", &card_id, "Card pin toggled.", |store, id| {
        store.toggle_pin(id).map_err(|err| err.to_string())
    })
}

/// Archives a card. Archived cards are hidden from the default list.
#[flutter_rust_bridge::frb(sync)]
pub fn card_archive(card_id: String) -> VaultActionResponse {
    card_action("card_archive", &card_id, "Card archived.", |store, id| {
        store.archive_card(id).map_err(|err| err.to_string())
    })
}

/// Renames a card. Blank titles become `Untitled`.
#[flutter_rust_bridge::frb(sync)]
pub fn card_rename(card_id: String, title: String) -> VaultActionResponse {
    card_action("card_rename", &card_id, "Card renamed.", |store, id| {
        store.rename_card(id, &title).map_err(|err| err.to_string())
    })
}

/// Records that the UI opened a card detail view.
///
/// Feeds the `append_last` share behavior.
#[flutter_rust_bridge::frb(sync)]
pub fn card_mark_opened(card_id: String) -> VaultActionResponse {
    card_action("card_mark_opened", &card_id, "Card marked opened.", |_, id| {
        update_prefs(|prefs| prefs.last_opened_card_id = Some(id)).map(|_| ())
    })
}

/// Lists clips of a card, newest first.
#[flutter_rust_bridge::frb(sync)]
pub fn clip_list(card_id: String) -> ClipListResponse {
    let listed = parse_card_id(&card_id).and_then(|id| {
        with_store(|store, _| {
            let clips = store.load_clips(id).map_err(|err| err.to_string())?;
            Ok(clips.iter().map(to_clip_entry).collect::<Vec<_>>())
        })
    });

    match listed {
        Ok(items) => {
            let message = if items.is_empty() {
                "No clips.".to_string()
            } else {
                format!("Found {} clip(s).", items.len())
            };
            ClipListResponse { items, message }
        }
        Err(err) => ClipListResponse {
            items: Vec::new(),
            message: format!("clip_list failed: {err}"),
        },
    }
}

/// Adds a clip to a card. Links are detected from a `scheme://` prefix.
#[flutter_rust_bridge::frb(sync)]
pub fn clip_add(card_id: String, text: String) -> VaultActionResponse {
    let added = parse_card_id(&card_id).and_then(|id| {
        with_store(|store, _| {
            require_card(store, id)?;
            match store.add_clip_item(id, &text) {
                Ok(clip) => Ok(clip.map(|clip| clip.id)),
                Err(StoreError::StaleCardRecency {
                    clip_id, source, ..
                }) => {
                    warn!("event=clip_add module=ffi status=ok detail=stale_card_recency card_id={id} clip_id={clip_id} error={source}");
                    Ok(Some(clip_id))
                }
                Err(err) => Err(err.to_string()),
            }
        })
        .map(|clip| (id, clip))
    });

    match added {
        Ok((id, Some(clip_id))) => VaultActionResponse::success("Clip added.", id, Some(clip_id)),
        Ok((_, None)) => VaultActionResponse::failure("clip_add failed: text is blank"),
        Err(err) => VaultActionResponse::failure(format!("clip_add failed: {err}")),
    }
}

/// Removes one clip from a card.
#[flutter_rust_bridge::frb(sync)]
pub fn clip_remove(card_id: String, clip_id: String) -> VaultActionResponse {
    let removed = parse_card_id(&card_id).and_then(|id| {
        let clip = Uuid::parse_str(clip_id.trim())
            .map_err(|_| format!("invalid clip_id `{}`", clip_id.trim()))?;
        with_store(|store, _| {
            store.load_clips(id).map_err(|err| err.to_string())?;
            store
                .remove_clip_item(id, clip)
                .map_err(|err| err.to_string())
        })
        .map(|removed| (id, clip, removed))
    });

    match removed {
        Ok((id, clip, true)) => VaultActionResponse::success("Clip removed.", id, Some(clip)),
        Ok((_, _, false)) => VaultActionResponse::failure("clip_remove failed: clip not found"),
        Err(err) => VaultActionResponse::failure(format!("clip_remove failed: {err}")),
    }
}

/// Reads the share preference.
#[flutter_rust_bridge::frb(sync)]
pub fn prefs_get() -> PrefsResponse {
    match with_prefs_repo(|repo| repo.load_prefs().map_err(|err| err.to_string())) {
        Ok(prefs) => PrefsResponse::from_prefs(&prefs, "Preferences loaded."),
        Err(err) => PrefsResponse::failure(format!("prefs_get failed: {err}")),
    }
}

/// Sets the share behavior (`new|append_current|append_last`).
#[flutter_rust_bridge::frb(sync)]
pub fn prefs_set_share_behavior(behavior: String) -> PrefsResponse {
    let Some(behavior) = ShareBehavior::parse(&behavior) else {
        return PrefsResponse::failure(format!(
            "prefs_set_share_behavior failed: unsupported behavior `{}`; expected new|append_current|append_last",
            behavior.trim()
        ));
    };
    match update_prefs(|prefs| prefs.share_behavior = behavior) {
        Ok(prefs) => PrefsResponse::from_prefs(&prefs, "Preferences saved."),
        Err(err) => PrefsResponse::failure(format!("prefs_set_share_behavior failed: {err}")),
    }
}

fn resolve_vault_db_path() -> PathBuf {
    VAULT_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("CLIPHUB_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(VAULT_DB_FILE_NAME)
        })
        .clone()
}

fn share_channel() -> &'static ShareChannel {
    SHARE_CHANNEL.get_or_init(ShareChannel::new)
}

fn lock_router() -> MutexGuard<'static, ShareRouter> {
    SHARE_ROUTER
        .get_or_init(|| Mutex::new(ShareRouter::new(Arc::new(SystemClock))))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn with_store<T>(
    f: impl FnOnce(&mut VaultStore<'_>, &Connection) -> Result<T, String>,
) -> Result<T, String> {
    let db_path = resolve_vault_db_path();
    let conn = open_db(&db_path).map_err(|err| format!("vault DB open failed: {err}"))?;
    let card_repo = SqliteCardRepository::try_new(&conn)
        .map_err(|err| format!("card repo init failed: {err}"))?;
    let clip_repo = SqliteClipRepository::try_new(&conn)
        .map_err(|err| format!("clip repo init failed: {err}"))?;
    let mut store = CardStore::new(card_repo, clip_repo, Arc::new(SystemClock));
    store.load_all().map_err(|err| err.to_string())?;
    f(&mut store, &conn)
}

fn with_prefs_repo<T>(
    f: impl FnOnce(&SqlitePrefsRepository<'_>) -> Result<T, String>,
) -> Result<T, String> {
    let db_path = resolve_vault_db_path();
    let conn = open_db(&db_path).map_err(|err| format!("vault DB open failed: {err}"))?;
    let repo = SqlitePrefsRepository::try_new(&conn)
        .map_err(|err| format!("prefs repo init failed: {err}"))?;
    f(&repo)
}

fn update_prefs(apply: impl FnOnce(&mut SharePrefs)) -> Result<SharePrefs, String> {
    with_prefs_repo(|repo| {
        let mut prefs = repo.load_prefs().map_err(|err| err.to_string())?;
        apply(&mut prefs);
        repo.save_prefs(&prefs).map_err(|err| err.to_string())?;
        Ok(prefs)
    })
}

fn card_action(
    operation: &str,
    raw_card_id: &str,
    success_message: &str,
    f: impl FnOnce(&mut VaultStore<'_>, CardId) -> Result<(), String>,
) -> VaultActionResponse {
    let applied = parse_card_id(raw_card_id).and_then(|id| {
        with_store(|store, _| {
            require_card(store, id)?;
            f(store, id)
        })
        .map(|()| id)
    });

    match applied {
        Ok(id) => VaultActionResponse::success(success_message, id, None),
        Err(err) => VaultActionResponse::failure(format!("{operation} failed: {err}")),
    }
}

fn require_card(store: &VaultStore<'_>, id: CardId) -> Result<(), String> {
    match store.get_card(id) {
        Some(_) => Ok(()),
        None => Err(format!("card not found: {id}")),
    }
}

fn parse_card_id(raw: &str) -> Result<CardId, String> {
    let trimmed = raw.trim();
    Uuid::parse_str(trimmed).map_err(|_| format!("invalid card_id `{trimmed}`"))
}

fn to_card_item(card: &Card) -> CardItem {
    CardItem {
        card_id: card.id.to_string(),
        title: card.title.clone(),
        pinned: card.pinned,
        archived: card.archived,
        created_at: card.created_at,
        updated_at: card.updated_at,
    }
}

fn to_clip_entry(clip: &ClipItem) -> ClipEntry {
    ClipEntry {
        clip_id: clip.id.to_string(),
        card_id: clip.card_id.to_string(),
        kind: clip.kind.as_str().to_string(),
        text: clip.text.clone(),
        created_at: clip.created_at,
    }
}
