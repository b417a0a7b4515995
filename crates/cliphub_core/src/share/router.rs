//! Share routing policy.
//!
//! # Responsibility
//! - Collapse near-simultaneous deliveries of the same text.
//! - Pick the card that receives a shared text and write it via the store.
//!
//! # Invariants
//! - An active card detail view wins over the stored preference.
//! - Navigation failures never fail a capture; routing degrades to creating
//!   a new card.
//! - Shared text is never logged, only its length and target ids.
//! - The dedup window only starts once a text is saved, so a retry of a
//!   failed route is never suppressed.
//! - A card created for a text whose clip write failed is reused when the
//!   same text is routed again.

use crate::clock::Clock;
use crate::model::card::CardId;
use crate::model::clip::ClipId;
use crate::model::prefs::{ShareBehavior, SharePrefs};
use crate::repo::card_repo::CardRepository;
use crate::repo::clip_repo::ClipRepository;
use crate::service::card_store::{CardStore, StoreError};
use crate::share::title::derive_auto_title;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

/// Window in which identical shared text is treated as one delivery.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_millis(1200);

/// Navigation context could not be read or driven.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationError(pub String);

impl Display for NavigationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "navigation context unavailable: {}", self.0)
    }
}

impl Error for NavigationError {}

/// View of the UI navigation stack used by the router.
pub trait NavigationContext {
    /// Card shown by the active card detail view, if any.
    fn active_card_detail(&self) -> Result<Option<CardId>, NavigationError>;
    /// Brings a card detail view to the front.
    fn open_card_detail(&mut self, card_id: CardId) -> Result<(), NavigationError>;
}

/// Plain navigation state for hosts that track the active view themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationState {
    pub active_card: Option<CardId>,
    pub opened: Vec<CardId>,
}

impl NavigationState {
    pub fn with_active_card(card_id: CardId) -> Self {
        Self {
            active_card: Some(card_id),
            opened: Vec::new(),
        }
    }
}

impl NavigationContext for NavigationState {
    fn active_card_detail(&self) -> Result<Option<CardId>, NavigationError> {
        Ok(self.active_card)
    }

    fn open_card_detail(&mut self, card_id: CardId) -> Result<(), NavigationError> {
        self.active_card = Some(card_id);
        self.opened.push(card_id);
        Ok(())
    }
}

/// Where a routed share landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    ActiveCard,
    LastOpened,
    NewCard,
}

impl RouteTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ActiveCard => "active_card",
            Self::LastOpened => "last_opened",
            Self::NewCard => "new_card",
        }
    }
}

/// Result of routing one shared text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Saved {
        card_id: CardId,
        clip_id: ClipId,
        target: RouteTarget,
    },
    /// Same text was routed within the dedup window.
    DuplicateSuppressed,
    /// Text was blank after trimming.
    Blank,
}

/// Routing failed before the clip was durably saved.
#[derive(Debug)]
pub enum RouteError {
    Store(StoreError),
    /// The target card vanished between resolution and the clip write.
    TargetMissing(CardId),
}

impl Display for RouteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::TargetMissing(card_id) => write!(f, "share target card missing: {card_id}"),
        }
    }
}

impl Error for RouteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::TargetMissing(_) => None,
        }
    }
}

impl From<StoreError> for RouteError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Decides which card receives a shared text.
pub struct ShareRouter {
    clock: Arc<dyn Clock>,
    dedup_window: Duration,
    last_routed: Option<(String, i64)>,
    unfilled_card: Option<(String, CardId)>,
}

impl ShareRouter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_dedup_window(clock, DEFAULT_DEDUP_WINDOW)
    }

    pub fn with_dedup_window(clock: Arc<dyn Clock>, dedup_window: Duration) -> Self {
        Self {
            clock,
            dedup_window,
            last_routed: None,
            unfilled_card: None,
        }
    }

    /// Routes one shared text into the store.
    ///
    /// Order: dedup window, active card view, last-opened card (when the
    /// preference asks for it), new card with a derived title.
    pub fn route<C: CardRepository, K: ClipRepository>(
        &mut self,
        raw: &str,
        nav: &mut dyn NavigationContext,
        prefs: &SharePrefs,
        store: &mut CardStore<C, K>,
    ) -> Result<RouteOutcome, RouteError> {
        let text = raw.trim();
        if text.is_empty() {
            return Ok(RouteOutcome::Blank);
        }

        let now_ms = self.clock.now_ms();
        if self.is_recent_duplicate(text, now_ms) {
            debug!(
                "event=share_route module=share status=skip reason=dedup_window text_len={}",
                text.chars().count()
            );
            return Ok(RouteOutcome::DuplicateSuppressed);
        }

        let (card_id, target) = match resolve_existing_target(nav, prefs, store) {
            Some(found) => found,
            None => (self.new_card_for(text, store)?, RouteTarget::NewCard),
        };

        let clip_id = match store.add_clip_item(card_id, text) {
            Ok(Some(clip)) => clip.id,
            Ok(None) => return Err(RouteError::TargetMissing(card_id)),
            Err(StoreError::StaleCardRecency {
                clip_id, source, ..
            }) => {
                warn!(
                    "event=share_route module=share status=ok detail=stale_card_recency card_id={card_id} error={source}"
                );
                clip_id
            }
            Err(err) => {
                if target == RouteTarget::NewCard {
                    self.unfilled_card = Some((text.to_string(), card_id));
                }
                return Err(err.into());
            }
        };
        self.last_routed = Some((text.to_string(), now_ms));
        if self
            .unfilled_card
            .as_ref()
            .is_some_and(|(_, unfilled)| *unfilled == card_id)
        {
            self.unfilled_card = None;
        }

        if let Err(err) = nav.open_card_detail(card_id) {
            warn!("event=share_route module=share status=ok detail=open_view_failed card_id={card_id} error={err}");
        }

        info!(
            "event=share_route module=share status=ok target={} card_id={card_id} clip_id={clip_id}",
            target.as_str()
        );
        Ok(RouteOutcome::Saved {
            card_id,
            clip_id,
            target,
        })
    }

    /// Card for the new-card path. Reuses the card left empty by a failed
    /// clip write of the same text.
    fn new_card_for<C: CardRepository, K: ClipRepository>(
        &mut self,
        text: &str,
        store: &mut CardStore<C, K>,
    ) -> Result<CardId, RouteError> {
        if let Some((pending_text, card_id)) = self.unfilled_card.take() {
            if pending_text == text && store.get_card(card_id).is_some() {
                debug!("event=share_route module=share status=ok detail=reuse_unfilled_card card_id={card_id}");
                return Ok(card_id);
            }
            self.unfilled_card = Some((pending_text, card_id));
        }
        let title = derive_auto_title(text);
        Ok(store.create_card(Some(&title))?)
    }

    fn is_recent_duplicate(&self, text: &str, now_ms: i64) -> bool {
        let window_ms = i64::try_from(self.dedup_window.as_millis()).unwrap_or(i64::MAX);
        match &self.last_routed {
            Some((last_text, routed_at)) => {
                last_text == text && now_ms.saturating_sub(*routed_at) < window_ms
            }
            None => false,
        }
    }
}

fn resolve_existing_target<C: CardRepository, K: ClipRepository>(
    nav: &dyn NavigationContext,
    prefs: &SharePrefs,
    store: &CardStore<C, K>,
) -> Option<(CardId, RouteTarget)> {
    let active = match nav.active_card_detail() {
        Ok(active) => active,
        Err(err) => {
            warn!("event=share_route module=share status=degraded reason=navigation_unavailable error={err}");
            return None;
        }
    };

    if let Some(card_id) = active {
        if store.get_card(card_id).is_some() {
            return Some((card_id, RouteTarget::ActiveCard));
        }
        debug!("event=share_route module=share status=skip reason=active_card_unknown card_id={card_id}");
    }

    match prefs.share_behavior {
        ShareBehavior::AppendLastOpened => prefs
            .last_opened_card_id
            .filter(|card_id| store.get_card(*card_id).is_some_and(|card| card.is_visible()))
            .map(|card_id| (card_id, RouteTarget::LastOpened)),
        ShareBehavior::AlwaysNew | ShareBehavior::AppendCurrent => None,
    }
}
