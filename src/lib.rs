//! Library crate for coop-sync-server, exposing modules for binaries and integration tests.
//!
//! The server keeps a small group of players in lockstep: it relays their game
//! events, broadcasts a `serverstate` snapshot whenever the shared state changes,
//! and holds everyone at level barriers until enough of the group has arrived.

/// Runtime configuration.
pub mod config;
/// Wire types.
pub mod dto;
/// Error taxonomy.
pub mod error;
/// HTTP routers.
pub mod routes;
/// Session actor, broadcast loop and connection handling.
pub mod services;
/// Connection lifecycle, participants, session counters and shared state.
pub mod state;
