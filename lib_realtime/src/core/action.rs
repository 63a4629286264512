//! Actions are the only write path into the store. The enum is closed, so
//! the reducer matches exhaustively instead of dispatching on strings, and
//! timestamps ride on the variants so the reducer never reads the clock.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::core::cache::DomainKey;
use crate::errors::ErrorInfo;

/// How a successful fetch payload is applied to the existing cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Full snapshot replace; the payload becomes the new collection.
    Replace,
    /// Incremental keyed upsert of the items contained in the payload,
    /// preserving items the patch does not mention.
    Patch,
}

/// A single state transition for one domain.
#[derive(Debug, Clone)]
pub enum Action {
    /// A fetch began; marks the domain loading/in-flight.
    FetchStart { domain: DomainKey },
    /// A fetch completed with a payload to apply.
    FetchSuccess {
        domain: DomainKey,
        payload: Value,
        mode: ApplyMode,
        fetched_at: DateTime<Utc>,
    },
    /// A fetch failed; the previous good data is retained.
    FetchError { domain: DomainKey, error: ErrorInfo },
    /// Push-style single-item upsert (socket or server-sent update).
    ItemUpsert { domain: DomainKey, item: Value },
    /// Push-style single-item removal by key; absent keys are a no-op.
    ItemRemove { domain: DomainKey, id: String },
    /// Clears the domain back to the uninitialized sentinel.
    Reset { domain: DomainKey },
}

impl Action {
    /// The domain this action targets.
    pub fn domain(&self) -> &DomainKey {
        match self {
            Action::FetchStart { domain }
            | Action::FetchSuccess { domain, .. }
            | Action::FetchError { domain, .. }
            | Action::ItemUpsert { domain, .. }
            | Action::ItemRemove { domain, .. }
            | Action::Reset { domain } => domain,
        }
    }

    /// Convenience constructor stamping the success with the current time.
    pub fn success_now(domain: DomainKey, payload: Value, mode: ApplyMode) -> Self {
        Action::FetchSuccess {
            domain,
            payload,
            mode,
            fetched_at: Utc::now(),
        }
    }
}
