//! Flutter-facing bindings for the VoteMon local store.

pub mod api;
