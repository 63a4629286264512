//! Pure state transition: fold an [`Action`] into the aggregate
//! [`StoreState`]. No clock reads, no I/O, no side effects beyond logging:
//! given identical `(state, action, keys)` the output is identical, which
//! is what makes replay-based testing of the whole store possible.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::action::{Action, ApplyMode};
use crate::core::cache::{DomainCache, DomainKey, Status};
use crate::core::reconciler::{self, KeyRegistry};

/// Global reachability of the upstream API, derived from domain error
/// states after every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No initialized domain is failing.
    Online,
    /// At least one domain is failing while others still refresh.
    Degraded,
    /// Every initialized domain is failing.
    Offline,
}

/// The aggregate store state: one immutable cache per initialized domain
/// plus the derived connection status.
#[derive(Clone)]
pub struct StoreState {
    /// Caches are shared by `Arc`; a transition replaces only the entries
    /// it touched (copy-on-write at `DomainCache` granularity).
    pub domains: HashMap<DomainKey, Arc<DomainCache>>,
    /// Derived global status; never set directly.
    pub connection: ConnectionStatus,
}

impl StoreState {
    /// The empty initial state.
    pub fn new() -> Self {
        Self {
            domains: HashMap::new(),
            connection: ConnectionStatus::Online,
        }
    }

    /// The cache for `domain`, or the idle sentinel if never touched.
    pub fn snapshot(&self, domain: &DomainKey) -> Arc<DomainCache> {
        self.domains
            .get(domain)
            .cloned()
            .unwrap_or_else(|| Arc::new(DomainCache::idle()))
    }
}

impl Default for StoreState {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies one action, producing the next state.
///
/// An action referencing a domain the state has never seen simply
/// initializes a fresh cache for it first; "unknown domain" means "not
/// yet initialized", which is valid, never an error.
pub fn reduce(state: &StoreState, action: &Action, keys: &KeyRegistry) -> StoreState {
    let domain = action.domain();
    let entry = state.snapshot(domain);
    if !state.domains.contains_key(domain) {
        log::debug!("initializing cache for domain '{}'", domain);
    }

    let next: Arc<DomainCache> = match action {
        Action::FetchStart { .. } => {
            if entry.status == Status::Loading && entry.in_flight {
                Arc::clone(&entry)
            } else {
                Arc::new(DomainCache {
                    status: Status::Loading,
                    in_flight: true,
                    ..(*entry).clone()
                })
            }
        }
        Action::FetchSuccess {
            payload,
            mode,
            fetched_at,
            ..
        } => match mode {
            ApplyMode::Replace => reconciler::replace(&entry, payload.clone(), *fetched_at),
            ApplyMode::Patch => reconciler::patch(
                &entry,
                patch_items(payload),
                keys.get(domain),
                Some(*fetched_at),
            ),
        },
        Action::FetchError { error, .. } => Arc::new(DomainCache {
            status: Status::Error,
            error: Some(error.clone()),
            in_flight: false,
            // data and last_fetched_at deliberately untouched: consumers
            // keep rendering the stale snapshot next to the error.
            ..(*entry).clone()
        }),
        Action::ItemUpsert { item, .. } => {
            reconciler::patch(&entry, std::slice::from_ref(item), keys.get(domain), None)
        }
        Action::ItemRemove { id, .. } => reconciler::remove(&entry, id, keys.get(domain)),
        Action::Reset { .. } => {
            let idle = DomainCache::idle();
            if *entry == idle {
                Arc::clone(&entry)
            } else {
                Arc::new(idle)
            }
        }
    };

    let mut domains = state.domains.clone();
    domains.insert(domain.clone(), next);
    let connection = derive_connection(&domains);
    StoreState { domains, connection }
}

/// A patch payload is a list of items; a bare object is accepted as a
/// single-item list.
fn patch_items(payload: &Value) -> &[Value] {
    match payload {
        Value::Array(items) => items.as_slice(),
        other => std::slice::from_ref(other),
    }
}

fn derive_connection(domains: &HashMap<DomainKey, Arc<DomainCache>>) -> ConnectionStatus {
    let total = domains.len();
    let failing = domains
        .values()
        .filter(|cache| cache.status == Status::Error)
        .count();
    if failing == 0 {
        ConnectionStatus::Online
    } else if failing == total {
        ConnectionStatus::Offline
    } else {
        ConnectionStatus::Degraded
    }
}
