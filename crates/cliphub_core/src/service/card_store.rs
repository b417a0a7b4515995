//! Card/clip cache and mutator.
//!
//! # Responsibility
//! - Hold the single in-memory view of cards and their clips.
//! - Apply every mutation to persistence first, then to the cache.
//!
//! # Invariants
//! - The cache is only mutated after the matching repository call returned
//!   `Ok`. A failed persist leaves the cache exactly as it was.
//! - `cards` is kept in pin-priority order after every mutation (new cards
//!   are re-sorted eagerly on insert).
//! - Clip buckets are newest first.
//! - Unknown ids and blank text are no-ops, not errors.
//!
//! # Consistency gap
//! `add_clip_item` writes the clip and then touches the owning card in a
//! second, independent statement. When only the touch fails, the clip is
//! durable and cached but the card keeps its previous `updated_at`; the
//! caller receives [`StoreError::StaleCardRecency`].

use crate::clock::Clock;
use crate::model::card::{normalize_title, sort_cards, Card, CardId};
use crate::model::clip::{ClipId, ClipItem};
use crate::repo::card_repo::{CardFieldsUpdate, CardRepository};
use crate::repo::clip_repo::ClipRepository;
use crate::repo::RepoError;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level failure.
#[derive(Debug)]
pub enum StoreError {
    /// The initial load could not read the vault; the cache is empty.
    StorageUnavailable(RepoError),
    /// A persistence call failed; the cache is unchanged.
    Persistence(RepoError),
    /// The clip was saved but the owning card's `updated_at` touch failed.
    StaleCardRecency {
        card_id: CardId,
        clip_id: ClipId,
        source: RepoError,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StorageUnavailable(err) => write!(f, "vault storage unavailable: {err}"),
            Self::Persistence(err) => write!(f, "vault write failed: {err}"),
            Self::StaleCardRecency {
                card_id,
                clip_id,
                source,
            } => write!(
                f,
                "clip {clip_id} saved but card {card_id} recency update failed: {source}"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageUnavailable(err) => Some(err),
            Self::Persistence(err) => Some(err),
            Self::StaleCardRecency { source, .. } => Some(source),
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Persistence(value)
    }
}

/// Authoritative in-memory view over card and clip repositories.
pub struct CardStore<C: CardRepository, K: ClipRepository> {
    card_repo: C,
    clip_repo: K,
    clock: Arc<dyn Clock>,
    cards: Vec<Card>,
    clips_by_card: HashMap<CardId, Vec<ClipItem>>,
}

impl<C: CardRepository, K: ClipRepository> CardStore<C, K> {
    /// Creates an empty store. Call [`CardStore::load_all`] before reading.
    pub fn new(card_repo: C, clip_repo: K, clock: Arc<dyn Clock>) -> Self {
        Self {
            card_repo,
            clip_repo,
            clock,
            cards: Vec::new(),
            clips_by_card: HashMap::new(),
        }
    }

    /// Replaces the card cache with the persisted cards.
    ///
    /// Existing clip buckets are kept; cards without one get an empty bucket.
    ///
    /// # Errors
    /// - [`StoreError::StorageUnavailable`] when the vault cannot be read. The
    ///   cache is cleared so callers observe an empty vault until retried.
    pub fn load_all(&mut self) -> StoreResult<()> {
        let mut cards = match self.card_repo.list_cards() {
            Ok(cards) => cards,
            Err(err) => {
                error!(
                    "event=store_load module=store status=error error_code=storage_unavailable error={err}"
                );
                self.cards.clear();
                self.clips_by_card.clear();
                return Err(StoreError::StorageUnavailable(err));
            }
        };

        sort_cards(&mut cards);
        for card in &cards {
            self.clips_by_card.entry(card.id).or_default();
        }
        self.cards = cards;

        info!(
            "event=store_load module=store status=ok card_count={}",
            self.cards.len()
        );
        Ok(())
    }

    /// Reloads one card's clip bucket from persistence.
    ///
    /// Returns an empty slice without touching storage when the card is
    /// unknown to the cache.
    pub fn load_clips(&mut self, card_id: CardId) -> StoreResult<&[ClipItem]> {
        if self.card_index(card_id).is_none() {
            debug!("event=clips_load module=store status=skip reason=unknown_card card_id={card_id}");
            return Ok(&[][..]);
        }

        let clips = self.clip_repo.list_clips_for_card(card_id)?;
        debug!(
            "event=clips_load module=store status=ok card_id={card_id} clip_count={}",
            clips.len()
        );
        let bucket = self.clips_by_card.entry(card_id).or_default();
        *bucket = clips;
        Ok(bucket.as_slice())
    }

    /// Creates a card and returns its id.
    ///
    /// Callers must use the returned id; cache position is not a lookup key.
    pub fn create_card(&mut self, title: Option<&str>) -> StoreResult<CardId> {
        let card = Card::new(title, self.clock.now_ms());
        self.card_repo.insert_card(&card)?;

        let id = card.id;
        info!("event=card_create module=store status=ok card_id={id}");
        self.clips_by_card.entry(id).or_default();
        self.cards.insert(0, card);
        sort_cards(&mut self.cards);
        Ok(id)
    }

    /// Flips `pinned` and refreshes recency. Unknown ids are ignored.
    pub fn toggle_pin(&mut self, id: CardId) -> StoreResult<()> {
        let Some(index) = self.card_index(id) else {
            debug!("event=card_pin module=store status=skip reason=unknown_card card_id={id}");
            return Ok(());
        };

        let current = &self.cards[index];
        let pinned = !current.pinned;
        let updated_at = current.touched_at(self.clock.now_ms());
        self.card_repo.update_card_fields(
            id,
            &CardFieldsUpdate {
                pinned: Some(pinned),
                updated_at: Some(updated_at),
                ..CardFieldsUpdate::default()
            },
        )?;

        let card = &mut self.cards[index];
        card.pinned = pinned;
        card.updated_at = updated_at;
        sort_cards(&mut self.cards);
        info!("event=card_pin module=store status=ok card_id={id} pinned={pinned}");
        Ok(())
    }

    /// Archives a card. One-way; already archived and unknown ids are no-ops.
    pub fn archive_card(&mut self, id: CardId) -> StoreResult<()> {
        let Some(index) = self.card_index(id) else {
            debug!("event=card_archive module=store status=skip reason=unknown_card card_id={id}");
            return Ok(());
        };
        if self.cards[index].archived {
            return Ok(());
        }

        let updated_at = self.cards[index].touched_at(self.clock.now_ms());
        self.card_repo.update_card_fields(
            id,
            &CardFieldsUpdate {
                archived: Some(true),
                updated_at: Some(updated_at),
                ..CardFieldsUpdate::default()
            },
        )?;

        let card = &mut self.cards[index];
        card.archived = true;
        card.updated_at = updated_at;
        sort_cards(&mut self.cards);
        info!("event=card_archive module=store status=ok card_id={id}");
        Ok(())
    }

    /// Renames a card. Normalized titles equal to the current one are no-ops.
    pub fn rename_card(&mut self, id: CardId, new_title: &str) -> StoreResult<()> {
        let Some(index) = self.card_index(id) else {
            debug!("event=card_rename module=store status=skip reason=unknown_card card_id={id}");
            return Ok(());
        };

        let title = normalize_title(Some(new_title));
        if title == self.cards[index].title {
            return Ok(());
        }

        let updated_at = self.cards[index].touched_at(self.clock.now_ms());
        self.card_repo.update_card_fields(
            id,
            &CardFieldsUpdate {
                title: Some(title.clone()),
                updated_at: Some(updated_at),
                ..CardFieldsUpdate::default()
            },
        )?;

        let card = &mut self.cards[index];
        card.title = title;
        card.updated_at = updated_at;
        sort_cards(&mut self.cards);
        info!("event=card_rename module=store status=ok card_id={id}");
        Ok(())
    }

    /// Adds a clip to a card and refreshes the card's recency.
    ///
    /// Returns `Ok(None)` for blank text or an unknown card.
    ///
    /// # Errors
    /// - [`StoreError::Persistence`] when the clip insert fails (nothing
    ///   changed).
    /// - [`StoreError::StaleCardRecency`] when the clip was saved but the
    ///   card touch failed. The clip is cached; card order is stale.
    pub fn add_clip_item(&mut self, card_id: CardId, text: &str) -> StoreResult<Option<ClipItem>> {
        let Some(index) = self.card_index(card_id) else {
            debug!("event=clip_add module=store status=skip reason=unknown_card card_id={card_id}");
            return Ok(None);
        };

        let now_ms = self.clock.now_ms();
        let Some(clip) = ClipItem::from_text(card_id, text, now_ms) else {
            debug!("event=clip_add module=store status=skip reason=blank_text card_id={card_id}");
            return Ok(None);
        };

        self.clip_repo.insert_clip(&clip)?;

        let updated_at = self.cards[index].touched_at(now_ms);
        let touch = self.card_repo.update_card_fields(
            card_id,
            &CardFieldsUpdate {
                updated_at: Some(updated_at),
                ..CardFieldsUpdate::default()
            },
        );

        self.clips_by_card
            .entry(card_id)
            .or_default()
            .insert(0, clip.clone());

        if let Err(source) = touch {
            warn!(
                "event=clip_add module=store status=error error_code=card_touch_failed card_id={card_id} clip_id={} error={source}",
                clip.id
            );
            return Err(StoreError::StaleCardRecency {
                card_id,
                clip_id: clip.id,
                source,
            });
        }

        self.cards[index].updated_at = updated_at;
        sort_cards(&mut self.cards);
        info!(
            "event=clip_add module=store status=ok card_id={card_id} clip_id={} kind={} text_len={}",
            clip.id,
            clip.kind.as_str(),
            clip.text.chars().count()
        );
        Ok(Some(clip))
    }

    /// Removes one clip by id.
    ///
    /// The row is deleted even when the card's clips were never loaded.
    /// Returns `false` when neither the row nor a cached entry existed.
    pub fn remove_clip_item(&mut self, card_id: CardId, clip_id: ClipId) -> StoreResult<bool> {
        let deleted = self.clip_repo.delete_clip(clip_id)?;
        let cached = match self.clips_by_card.get_mut(&card_id) {
            Some(clips) => {
                let before = clips.len();
                clips.retain(|clip| clip.id != clip_id);
                clips.len() != before
            }
            None => false,
        };

        if !deleted && !cached {
            debug!(
                "event=clip_remove module=store status=skip reason=unknown_clip card_id={card_id} clip_id={clip_id}"
            );
            return Ok(false);
        }
        if !deleted {
            warn!(
                "event=clip_remove module=store status=ok detail=row_already_absent card_id={card_id} clip_id={clip_id}"
            );
        }
        info!("event=clip_remove module=store status=ok card_id={card_id} clip_id={clip_id}");
        Ok(true)
    }

    /// Cached clips for a card, newest first. Empty for unknown cards.
    pub fn get_clip_items(&self, card_id: CardId) -> &[ClipItem] {
        self.clips_by_card
            .get(&card_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All cached cards, archived included, in pin-priority order.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Non-archived cards in pin-priority order.
    pub fn visible_cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().filter(|card| card.is_visible())
    }

    pub fn get_card(&self, id: CardId) -> Option<&Card> {
        self.cards.iter().find(|card| card.id == id)
    }

    fn card_index(&self, id: CardId) -> Option<usize> {
        self.cards.iter().position(|card| card.id == id)
    }
}
