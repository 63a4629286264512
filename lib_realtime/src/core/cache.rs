//! # Domain Cache Model
//!
//! One `DomainCache` per data domain holds the last-known-good payload, an
//! explicit status, and a freshness timestamp. The record itself is
//! immutable: every committed transition swaps the whole `Arc`, so
//! consumers can detect change with a pointer comparison and can never
//! corrupt store state through a snapshot they were handed.
//!
//! Invariants maintained by the reducer:
//! - `Loading` implies `in_flight`.
//! - `Error` implies `error` is present and `data` still holds the last
//!   good value (stale-but-available).
//! - `last_fetched_at` is monotonically non-decreasing per domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use std::fmt;
use std::time::Duration;

use crate::errors::ErrorInfo;

/// Identifier for one category of dashboard data (members, events, ...).
///
/// The core never enumerates domains; they are registered dynamically on
/// first use, so adding a domain touches only the wiring layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainKey(String);

impl DomainKey {
    /// Creates a key from any string-ish name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The raw domain name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DomainKey {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for DomainKey {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for DomainKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Lifecycle state of a domain's cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Never fetched; the sentinel state for untouched domains.
    Idle,
    /// A fetch is in flight (first load or revalidation).
    Loading,
    /// Last fetch succeeded and the snapshot is within its staleness window.
    Fresh,
    /// Derived view of `Fresh` whose age exceeded the staleness window.
    /// Produced by [`DomainCache::status_at`], never stored by the reducer.
    Stale,
    /// Last fetch failed; `data` still carries the previous good snapshot.
    Error,
}

/// Immutable per-domain cache record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainCache {
    /// Last-known-good payload; opaque JSON from the upstream API. Never
    /// cleared on failure, only by an explicit reset.
    pub data: Option<Value>,
    /// Stored lifecycle status (`Idle`/`Loading`/`Fresh`/`Error`).
    pub status: Status,
    /// Completion time of the most recent successful fetch.
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Failure record of the most recent unsuccessful fetch, if it is the
    /// latest outcome.
    pub error: Option<ErrorInfo>,
    /// Whether a fetch for this domain is currently in flight.
    pub in_flight: bool,
}

impl DomainCache {
    /// The sentinel "uninitialized" record returned for untouched domains.
    pub fn idle() -> Self {
        Self {
            data: None,
            status: Status::Idle,
            last_fetched_at: None,
            error: None,
            in_flight: false,
        }
    }

    /// True once any successful fetch has populated this domain.
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Age of the snapshot relative to `now`, if it was ever fetched.
    pub fn age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.last_fetched_at.map(|at| now - at)
    }

    /// The status consumers should render at `now`: a `Fresh` entry whose
    /// age exceeds `stale_after` reads as `Stale` (stale-while-revalidate),
    /// every other state passes through unchanged.
    pub fn status_at(&self, now: DateTime<Utc>, stale_after: Duration) -> Status {
        if self.status != Status::Fresh {
            return self.status;
        }
        match self.age(now).and_then(|age| age.to_std().ok()) {
            Some(age) if age > stale_after => Status::Stale,
            _ => Status::Fresh,
        }
    }

    /// Borrow the payload as a collection, when the domain holds one.
    pub fn items(&self) -> Option<&Vec<Value>> {
        self.data.as_ref().and_then(|v| v.as_array())
    }
}

impl Default for DomainCache {
    fn default() -> Self {
        Self::idle()
    }
}
