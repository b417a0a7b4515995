//! Share capture channel between the OS share sheet and the app.
//!
//! # Responsibility
//! - Validate incoming share intents against the `text/plain` send contract.
//! - Hold at most one pending payload (`Empty` or `Holding`).
//! - Deliver a payload by push (`subscribe`) and by pull
//!   (`take_initial_share`), both guarded by one duplicate marker.
//!
//! # Invariants
//! - A pull consumes the pending payload; a second pull returns `None` until
//!   a new share is accepted.
//! - Text equal to the last accepted text is discarded, even after the
//!   pending payload was drained.
//! - Subscribers run after the state lock is released, so handlers may call
//!   back into the channel.

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::mem;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Intent action accepted by the capture contract.
pub const ACTION_SEND: &str = "android.intent.action.SEND";
/// Only MIME type accepted by the capture contract.
pub const MIME_TEXT_PLAIN: &str = "text/plain";
/// Event name used when announcing a captured payload to the UI layer.
pub const SHARE_EVENT_NAME: &str = "share_to_save";

/// Raw share event as delivered by the OS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareIntent {
    pub action: Option<String>,
    pub mime_type: Option<String>,
    pub text: Option<String>,
}

impl ShareIntent {
    /// Builds a `text/plain` send intent.
    pub fn send_text(text: impl Into<String>) -> Self {
        Self {
            action: Some(ACTION_SEND.to_string()),
            mime_type: Some(MIME_TEXT_PLAIN.to_string()),
            text: Some(text.into()),
        }
    }

    fn matches_contract(&self) -> bool {
        self.action.as_deref() == Some(ACTION_SEND)
            && self.mime_type.as_deref() == Some(MIME_TEXT_PLAIN)
    }
}

/// Payload delivered on the `share_to_save` channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePayload {
    pub text: String,
}

/// Result of offering one intent to the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Accepted,
    /// Wrong action or MIME type.
    IgnoredContract,
    /// Missing or blank text.
    IgnoredBlank,
    /// Same text as the last accepted share.
    Duplicate,
}

impl CaptureOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::IgnoredContract => "ignored_contract",
            Self::IgnoredBlank => "ignored_blank",
            Self::Duplicate => "duplicate",
        }
    }
}

/// Handle returned by [`ShareChannel::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ShareHandler = Arc<dyn Fn(&SharePayload) + Send + Sync>;

#[derive(Debug, Default)]
enum PendingShare {
    #[default]
    Empty,
    Holding(SharePayload),
}

#[derive(Default)]
struct ChannelState {
    pending: PendingShare,
    last_accepted: Option<String>,
    subscribers: Vec<(SubscriptionId, ShareHandler)>,
    next_subscription: u64,
}

/// Single-slot share buffer with push and pull delivery.
#[derive(Default)]
pub struct ShareChannel {
    state: Mutex<ChannelState>,
}

impl ShareChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers one OS share event to the channel.
    ///
    /// Accepted payloads replace any pending payload and are announced to
    /// every subscriber.
    pub fn handle_intent(&self, intent: &ShareIntent) -> CaptureOutcome {
        if !intent.matches_contract() {
            debug!(
                "event=share_capture module=share status=skip reason=contract action={} mime={}",
                intent.action.as_deref().unwrap_or("none"),
                intent.mime_type.as_deref().unwrap_or("none")
            );
            return CaptureOutcome::IgnoredContract;
        }

        let text = intent.text.as_deref().map(str::trim).unwrap_or_default();
        if text.is_empty() {
            debug!("event=share_capture module=share status=skip reason=blank_text");
            return CaptureOutcome::IgnoredBlank;
        }

        let payload = SharePayload {
            text: text.to_string(),
        };
        let subscribers: Vec<ShareHandler> = {
            let mut state = self.lock_state();
            if state.last_accepted.as_deref() == Some(text) {
                debug!(
                    "event=share_capture module=share status=skip reason=duplicate text_len={}",
                    text.chars().count()
                );
                return CaptureOutcome::Duplicate;
            }
            state.pending = PendingShare::Holding(payload.clone());
            state.last_accepted = Some(payload.text.clone());
            state
                .subscribers
                .iter()
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };

        info!(
            "event=share_capture module=share status=ok text_len={} subscribers={}",
            payload.text.chars().count(),
            subscribers.len()
        );
        for handler in subscribers {
            if catch_unwind(AssertUnwindSafe(|| handler(&payload))).is_err() {
                error!(
                    "event=share_push module=share status=error error_code=handler_panicked event_name={SHARE_EVENT_NAME}"
                );
            }
        }

        CaptureOutcome::Accepted
    }

    /// Pulls and consumes the pending payload.
    pub fn take_initial_share(&self) -> Option<SharePayload> {
        let taken = mem::take(&mut self.lock_state().pending);
        match taken {
            PendingShare::Holding(payload) => {
                debug!(
                    "event=share_pull module=share status=ok text_len={}",
                    payload.text.chars().count()
                );
                Some(payload)
            }
            PendingShare::Empty => None,
        }
    }

    /// Clears the pending payload if it still holds `payload`.
    ///
    /// Called once a payload has been saved, so a later pull cannot replay it.
    pub fn acknowledge(&self, payload: &SharePayload) -> bool {
        let mut state = self.lock_state();
        match &state.pending {
            PendingShare::Holding(current) if current == payload => {
                state.pending = PendingShare::Empty;
                true
            }
            _ => false,
        }
    }

    /// Puts a pulled payload back when nothing newer is pending.
    ///
    /// Used when routing a pulled payload failed, so a later pull can retry.
    pub fn restore(&self, payload: SharePayload) -> bool {
        let mut state = self.lock_state();
        match state.pending {
            PendingShare::Empty => {
                state.pending = PendingShare::Holding(payload);
                true
            }
            PendingShare::Holding(_) => false,
        }
    }

    pub fn has_pending(&self) -> bool {
        matches!(self.lock_state().pending, PendingShare::Holding(_))
    }

    /// Registers a push handler for accepted payloads.
    pub fn subscribe(
        &self,
        handler: impl Fn(&SharePayload) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut state = self.lock_state();
        state.next_subscription += 1;
        let id = SubscriptionId(state.next_subscription);
        state.subscribers.push((id, Arc::new(handler)));
        id
    }

    /// Removes a push handler. Returns `false` for unknown ids.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.lock_state();
        let before = state.subscribers.len();
        state.subscribers.retain(|(current, _)| *current != id);
        state.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_state().subscribers.len()
    }

    fn lock_state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{CaptureOutcome, ShareChannel, ShareIntent, SharePayload, MIME_TEXT_PLAIN};
    use std::sync::{Arc, Mutex};

    fn payload(text: &str) -> SharePayload {
        SharePayload {
            text: text.to_string(),
        }
    }

    #[test]
    fn pull_is_consume_once() {
        let channel = ShareChannel::new();
        assert_eq!(
            channel.handle_intent(&ShareIntent::send_text("  hello  ")),
            CaptureOutcome::Accepted
        );
        assert_eq!(channel.take_initial_share(), Some(payload("hello")));
        assert_eq!(channel.take_initial_share(), None);
    }

    #[test]
    fn rejects_wrong_contract_and_blank_text() {
        let channel = ShareChannel::new();
        let mut wrong_mime = ShareIntent::send_text("x");
        wrong_mime.mime_type = Some("text/html".to_string());
        assert_eq!(
            channel.handle_intent(&wrong_mime),
            CaptureOutcome::IgnoredContract
        );

        let mut wrong_action = ShareIntent::send_text("x");
        wrong_action.action = Some("android.intent.action.VIEW".to_string());
        assert_eq!(
            channel.handle_intent(&wrong_action),
            CaptureOutcome::IgnoredContract
        );

        let blank = ShareIntent {
            text: Some("   ".to_string()),
            ..ShareIntent::send_text("")
        };
        assert_eq!(channel.handle_intent(&blank), CaptureOutcome::IgnoredBlank);
        let missing = ShareIntent {
            text: None,
            mime_type: Some(MIME_TEXT_PLAIN.to_string()),
            ..ShareIntent::send_text("")
        };
        assert_eq!(channel.handle_intent(&missing), CaptureOutcome::IgnoredBlank);
        assert!(!channel.has_pending());
    }

    #[test]
    fn redelivery_is_discarded_even_after_drain() {
        let channel = ShareChannel::new();
        channel.handle_intent(&ShareIntent::send_text("same"));
        assert!(channel.take_initial_share().is_some());

        assert_eq!(
            channel.handle_intent(&ShareIntent::send_text("same")),
            CaptureOutcome::Duplicate
        );
        assert_eq!(channel.take_initial_share(), None);

        assert_eq!(
            channel.handle_intent(&ShareIntent::send_text("other")),
            CaptureOutcome::Accepted
        );
        assert_eq!(channel.take_initial_share(), Some(payload("other")));
    }

    #[test]
    fn newer_share_replaces_pending_payload() {
        let channel = ShareChannel::new();
        channel.handle_intent(&ShareIntent::send_text("first"));
        channel.handle_intent(&ShareIntent::send_text("second"));
        assert_eq!(channel.take_initial_share(), Some(payload("second")));
    }

    #[test]
    fn push_notifies_subscribers_and_keeps_payload_for_pull() {
        let channel = ShareChannel::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = channel.subscribe(move |payload| {
            sink.lock().unwrap().push(payload.text.clone());
        });

        channel.handle_intent(&ShareIntent::send_text("pushed"));
        assert_eq!(*seen.lock().unwrap(), vec!["pushed".to_string()]);
        assert!(channel.has_pending());

        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));
        channel.handle_intent(&ShareIntent::send_text("after"));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn acknowledge_clears_only_matching_payload() {
        let channel = ShareChannel::new();
        channel.handle_intent(&ShareIntent::send_text("a"));
        assert!(!channel.acknowledge(&payload("b")));
        assert!(channel.has_pending());
        assert!(channel.acknowledge(&payload("a")));
        assert_eq!(channel.take_initial_share(), None);
    }

    #[test]
    fn restore_does_not_overwrite_newer_share() {
        let channel = ShareChannel::new();
        channel.handle_intent(&ShareIntent::send_text("old"));
        let pulled = channel.take_initial_share().unwrap();
        assert!(channel.restore(pulled.clone()));
        assert_eq!(channel.take_initial_share(), Some(pulled.clone()));

        channel.handle_intent(&ShareIntent::send_text("new"));
        assert!(!channel.restore(pulled));
        assert_eq!(channel.take_initial_share(), Some(payload("new")));
    }

    #[test]
    fn panicking_subscriber_does_not_block_capture() {
        let channel = ShareChannel::new();
        channel.subscribe(|_| panic!("handler failure"));
        assert_eq!(
            channel.handle_intent(&ShareIntent::send_text("survives")),
            CaptureOutcome::Accepted
        );
        assert_eq!(channel.take_initial_share(), Some(payload("survives")));
    }

    #[test]
    fn push_and_pull_race_across_threads() {
        let channel = Arc::new(ShareChannel::new());
        let producer = {
            let channel = Arc::clone(&channel);
            std::thread::spawn(move || {
                for index in 0..50 {
                    channel.handle_intent(&ShareIntent::send_text(format!("share-{index}")));
                }
            })
        };

        let mut pulled = Vec::new();
        while pulled.len() < 50 && !producer.is_finished() {
            if let Some(payload) = channel.take_initial_share() {
                pulled.push(payload.text);
            }
        }
        producer.join().unwrap();
        if let Some(payload) = channel.take_initial_share() {
            pulled.push(payload.text);
        }

        let mut unique = pulled.clone();
        unique.dedup();
        assert_eq!(unique.len(), pulled.len());
        assert!(channel.take_initial_share().is_none());
    }
}
