//! # Relay Server Library
//!
//! Authoritative relay for a two-player side-scrolling obstacle game.
//! The server does not simulate the run itself; it owns the lobby, pairs
//! exactly two clients over UDP, forwards their position snapshots to
//! each other, and is the single source of obstacle spawns once a match
//! is running.
//!
//! ## Architecture
//!
//! All session state lives on one task. The relay loop alternates
//! between a bounded-wait receive on the UDP socket and housekeeping
//! (liveness sweep, obstacle scheduling), so there is no concurrent
//! mutation anywhere and no locking. UDP gives no delivery or ordering
//! guarantees; every protocol decision here treats a packet as an
//! independent, absolute statement that may be lost, duplicated, or
//! reordered.
//!
//! ## Module Organization
//!
//! - [`config`] — the tunable surface: port, timeouts, spawn intervals,
//!   world geometry.
//! - [`lobby`] — player registry and session state machine: join/ready/
//!   start transitions, liveness eviction, peer lookup.
//! - [`scheduler`] — randomized obstacle spawn timing and shapes, driven
//!   by an injected RNG and a caller-supplied clock.
//! - [`network`] — the relay engine: socket ownership, dispatch, and the
//!   fire-and-forget send/broadcast primitives.

pub mod config;
pub mod lobby;
pub mod network;
pub mod scheduler;
