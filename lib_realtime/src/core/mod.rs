//! # Core Synchronization Engine
//!
//! This module forms the heart of the memberhub real-time layer. It
//! aggregates all the fundamental components required for keeping a set of
//! dashboard data domains periodically refreshed, partially stale, and
//! observable without duplicated fetch logic or racing consumers.
//!
//! ## Core Components:
//!
//! - **`cache`**: The per-domain `DomainCache` record: last-known-good
//!   snapshot, freshness timestamp, explicit status, plus the selectors
//!   consumers read it through.
//!
//! - **`action`**: The closed set of state transitions. Every mutation of
//!   the store is one of these variants; there is no other write path.
//!
//! - **`reconciler`**: Pure merge functions (full replace, keyed patch,
//!   keyed remove) that produce a new immutable snapshot only when content
//!   actually changed.
//!
//! - **`reducer`**: The pure transition function folding an `Action` into
//!   the aggregate `StoreState`, including the derived global connection
//!   status.
//!
//! - **`store`**: The single mutation surface. Serializes dispatches,
//!   hands out snapshots, and fans committed transitions out to
//!   subscribers with panic isolation.
//!
//! - **`scheduler`**: Drives periodic refresh per domain on independent,
//!   cancellable timers with in-flight deduplication and exponential
//!   backoff on failure.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// The closed set of state-transition actions.
pub mod action;
/// The per-domain cache record and its selectors.
pub mod cache;
/// Pure merge functions for incoming payloads.
pub mod reconciler;
/// The pure state transition function.
pub mod reducer;
/// Independent, cancellable per-domain polling.
pub mod scheduler;
/// The single mutation surface and subscriber fan-out.
pub mod store;

// --- Public API Re-exports ---
// Make the primary types from the core modules directly accessible.
pub use action::{Action, ApplyMode};
pub use cache::{DomainCache, DomainKey, Status};
pub use reconciler::{default_key, key_by_field, KeyFn, KeyRegistry};
pub use reducer::{reduce, ConnectionStatus, StoreState};
pub use scheduler::PollScheduler;
pub use store::{RealtimeStore, StoreNotification, SubscriptionHandle};
