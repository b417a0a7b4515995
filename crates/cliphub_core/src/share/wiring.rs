//! Share-to-save wiring between the capture channel and the router.
//!
//! # Responsibility
//! - Subscribe to the capture channel exactly once (`Uninitialized` ->
//!   `Ready`) and pull the initial share at that moment.
//! - Queue every delivered payload and route them one at a time, so store
//!   mutations are never interleaved.
//!
//! # Invariants
//! - `wire` on a `Ready` instance is a no-op.
//! - A payload that fails to route stays (or is put back) in the channel for
//!   a later pull; a routed payload is acknowledged and cannot be replayed.

use crate::model::prefs::SharePrefs;
use crate::repo::card_repo::CardRepository;
use crate::repo::clip_repo::ClipRepository;
use crate::service::card_store::CardStore;
use crate::share::channel::{ShareChannel, SharePayload, SubscriptionId};
use crate::share::router::{NavigationContext, RouteError, RouteOutcome, ShareRouter};
use log::{debug, error, info, warn};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

enum WiringState {
    Uninitialized,
    Ready {
        subscription: SubscriptionId,
        inbox: Receiver<SharePayload>,
    },
}

/// Result of routing one queued payload.
#[derive(Debug)]
pub struct Delivery {
    pub payload: SharePayload,
    pub result: Result<RouteOutcome, RouteError>,
}

/// Owns the channel subscription and the serialized delivery queue.
pub struct ShareToSave {
    channel: Arc<ShareChannel>,
    router: ShareRouter,
    state: WiringState,
}

impl ShareToSave {
    pub fn new(channel: Arc<ShareChannel>, router: ShareRouter) -> Self {
        Self {
            channel,
            router,
            state: WiringState::Uninitialized,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, WiringState::Ready { .. })
    }

    /// Subscribes to pushes and queues the initial pulled share.
    ///
    /// Returns `false` when already wired.
    pub fn wire(&mut self) -> bool {
        if self.is_ready() {
            debug!("event=share_wire module=share status=skip reason=already_ready");
            return false;
        }

        let (sender, inbox) = mpsc::channel();
        let push_sender = sender.clone();
        let subscription = self.channel.subscribe(move |payload| {
            if push_sender.send(payload.clone()).is_err() {
                warn!("event=share_push module=share status=error error_code=inbox_closed");
            }
        });

        let initial = self.channel.take_initial_share();
        let has_initial = initial.is_some();
        if let Some(payload) = initial {
            if sender.send(payload).is_err() {
                warn!("event=share_pull module=share status=error error_code=inbox_closed");
            }
        }

        self.state = WiringState::Ready {
            subscription,
            inbox,
        };
        info!("event=share_wire module=share status=ok initial_share={has_initial}");
        true
    }

    /// Drops the subscription and returns to `Uninitialized`.
    pub fn unwire(&mut self) {
        if let WiringState::Ready { subscription, .. } = &self.state {
            self.channel.unsubscribe(*subscription);
        }
        self.state = WiringState::Uninitialized;
    }

    /// Routes every queued payload in arrival order.
    ///
    /// Failures are logged only; the failed payload remains pullable.
    pub fn drain<C: CardRepository, K: ClipRepository>(
        &mut self,
        nav: &mut dyn NavigationContext,
        prefs: &SharePrefs,
        store: &mut CardStore<C, K>,
    ) -> Vec<Delivery> {
        let WiringState::Ready { inbox, .. } = &self.state else {
            return Vec::new();
        };

        let mut deliveries = Vec::new();
        while let Ok(payload) = inbox.try_recv() {
            let result = self.router.route(&payload.text, nav, prefs, store);
            match &result {
                Ok(RouteOutcome::Saved { .. }) | Ok(RouteOutcome::DuplicateSuppressed) => {
                    self.channel.acknowledge(&payload);
                }
                Ok(RouteOutcome::Blank) => {}
                Err(err) => {
                    error!("event=share_deliver module=share status=error error={err}");
                    self.channel.restore(payload.clone());
                }
            }
            deliveries.push(Delivery { payload, result });
        }
        deliveries
    }
}

impl Drop for ShareToSave {
    fn drop(&mut self) {
        self.unwire();
    }
}
