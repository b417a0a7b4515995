//! Flutter-facing bindings for the ClipHub core.

pub mod api;
