//! Share-to-save pipeline: OS capture, delivery and routing.
//!
//! # Responsibility
//! - `channel`: hold and deliver captured share payloads exactly once.
//! - `router`: pick the receiving card and write through the store.
//! - `wiring`: connect both with a single serialized delivery queue.
//! - `title`: derive card titles from shared text.

pub mod channel;
pub mod router;
pub mod title;
pub mod wiring;
