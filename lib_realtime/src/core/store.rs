//! # Realtime Store and Subscriber Fan-out
//!
//! The single mutation surface for all dashboard data. Every write is an
//! [`Action`] folded in by the pure reducer under one mutex, so dispatches
//! are processed strictly in the order they are issued and subscribers see
//! transitions in commit order.
//!
//! ## Fan-out contract:
//!
//! - After every dispatch the store computes the set of domains whose cache
//!   reference changed versus the prior state (pointer comparison, enabled
//!   by the reconciler's same-`Arc`-when-unchanged discipline).
//! - Each subscription watching an affected domain is invoked exactly once
//!   per committed transition, synchronously, in registration order.
//! - A panicking subscriber is caught and logged; delivery continues to the
//!   subscribers after it.
//!
//! Callbacks run on the dispatching task while the store mutex is held:
//! read snapshots from the [`StoreNotification`] they receive and hand any
//! real work to a channel; re-entering the store from a callback
//! deadlocks.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::core::action::Action;
use crate::core::cache::{DomainCache, DomainKey};
use crate::core::reconciler::{KeyFn, KeyRegistry};
use crate::core::reducer::{reduce, ConnectionStatus, StoreState};

/// What a subscriber receives for one committed transition: the domains
/// whose cache reference changed, plus the state they changed into. Reading
/// snapshots off the notification avoids touching the store mid-fan-out.
pub struct StoreNotification {
    /// Domains whose `DomainCache` reference changed in this transition.
    pub changed: Vec<DomainKey>,
    /// The committed state after the transition.
    pub state: StoreState,
}

impl StoreNotification {
    /// The committed cache for `domain`.
    pub fn snapshot(&self, domain: &DomainKey) -> Arc<DomainCache> {
        self.state.snapshot(domain)
    }
}

type SubscriberCallback = Arc<dyn Fn(&StoreNotification) + Send + Sync>;

struct Subscription {
    id: u64,
    /// `None` watches every domain.
    watched: Option<HashSet<DomainKey>>,
    callback: SubscriberCallback,
    /// Flipped off at unsubscribe so a removed subscription can never fire,
    /// even if removal races a dispatch already past the member list.
    active: Arc<AtomicBool>,
}

impl Subscription {
    fn watches(&self, changed: &[DomainKey]) -> bool {
        match &self.watched {
            None => true,
            Some(set) => changed.iter().any(|d| set.contains(d)),
        }
    }
}

struct StoreInner {
    state: StoreState,
    subscribers: Vec<Subscription>,
    keys: KeyRegistry,
}

/// The aggregate of all domain caches and the only object allowed to
/// mutate them. Constructed once at application start and shared by
/// reference (`Arc`) with every producer and consumer.
pub struct RealtimeStore {
    inner: Arc<Mutex<StoreInner>>,
    next_subscription_id: AtomicU64,
}

impl RealtimeStore {
    /// Creates an empty store; domains initialize lazily on first action.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                state: StoreState::new(),
                subscribers: Vec::new(),
                keys: KeyRegistry::new(),
            })),
            next_subscription_id: AtomicU64::new(1),
        }
    }

    /// Synchronously applies `action` and fans the committed transition out
    /// to subscribers. Never panics on unexpected input: an action for an
    /// uninitialized domain initializes it (logged at debug level).
    pub fn dispatch(&self, action: Action) {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        Self::apply(&mut inner, action);
    }

    /// Atomic check-and-dispatch of [`Action::FetchStart`]: returns `false`
    /// without dispatching when a fetch for `domain` is already in flight.
    /// Both the scheduler and manual refresh go through this gate, which is
    /// what holds the at-most-one-in-flight-per-domain invariant.
    pub fn try_begin_fetch(&self, domain: &DomainKey) -> bool {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if inner.state.snapshot(domain).in_flight {
            return false;
        }
        Self::apply(
            &mut inner,
            Action::FetchStart {
                domain: domain.clone(),
            },
        );
        true
    }

    /// O(1) read of the current cache for `domain`; untouched domains yield
    /// the idle sentinel.
    pub fn snapshot(&self, domain: &DomainKey) -> Arc<DomainCache> {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .state
            .snapshot(domain)
    }

    /// A clone of the full committed state (cheap: shared `Arc` entries).
    pub fn state(&self) -> StoreState {
        self.inner.lock().expect("store lock poisoned").state.clone()
    }

    /// The derived global connection status.
    pub fn connection_status(&self) -> ConnectionStatus {
        self.inner.lock().expect("store lock poisoned").state.connection
    }

    /// Overrides the item identity function for one domain (the default
    /// reads the `"id"` field).
    pub fn set_key_fn(&self, domain: DomainKey, key_fn: KeyFn) {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .keys
            .set(domain, key_fn);
    }

    /// Registers `callback` for transitions affecting any of `domains`.
    /// Invocation order across subscribers follows registration order.
    pub fn subscribe<I, K>(
        &self,
        domains: I,
        callback: impl Fn(&StoreNotification) + Send + Sync + 'static,
    ) -> SubscriptionHandle
    where
        I: IntoIterator<Item = K>,
        K: Into<DomainKey>,
    {
        let watched: HashSet<DomainKey> = domains.into_iter().map(Into::into).collect();
        self.register(Some(watched), Arc::new(callback))
    }

    /// Registers `callback` for transitions affecting any domain at all.
    pub fn subscribe_all(
        &self,
        callback: impl Fn(&StoreNotification) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.register(None, Arc::new(callback))
    }

    fn register(
        &self,
        watched: Option<HashSet<DomainKey>>,
        callback: SubscriberCallback,
    ) -> SubscriptionHandle {
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        let subscription = Subscription {
            id,
            watched,
            callback,
            active: Arc::clone(&active),
        };
        self.inner
            .lock()
            .expect("store lock poisoned")
            .subscribers
            .push(subscription);
        SubscriptionHandle {
            id,
            active,
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn apply(inner: &mut StoreInner, action: Action) {
        let next = reduce(&inner.state, &action, &inner.keys);
        let changed = changed_domains(&inner.state, &next);
        inner.state = next;
        if changed.is_empty() {
            return;
        }

        let notification = StoreNotification {
            changed,
            state: inner.state.clone(),
        };
        for subscription in &inner.subscribers {
            if !subscription.active.load(Ordering::SeqCst) {
                continue;
            }
            if !subscription.watches(&notification.changed) {
                continue;
            }
            let callback = subscription.callback.as_ref();
            if catch_unwind(AssertUnwindSafe(|| callback(&notification))).is_err() {
                log::error!(
                    "subscriber {} panicked during fan-out; continuing with remaining subscribers",
                    subscription.id
                );
            }
        }
    }
}

impl Default for RealtimeStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Domains whose cache reference changed between two states. A domain that
/// was merely initialized to the idle sentinel does not count as changed.
fn changed_domains(prev: &StoreState, next: &StoreState) -> Vec<DomainKey> {
    let mut changed = Vec::new();
    for (domain, cache) in &next.domains {
        match prev.domains.get(domain) {
            Some(previous) => {
                if !Arc::ptr_eq(previous, cache) {
                    changed.push(domain.clone());
                }
            }
            None => {
                if **cache != DomainCache::idle() {
                    changed.push(domain.clone());
                }
            }
        }
    }
    changed
}

/// Disposer for one subscription. `unsubscribe` is idempotent and safe to
/// call any number of times; the subscription never fires after the first
/// call. Dropping the handle without calling it leaves the subscription
/// owned by the store for the store's lifetime.
pub struct SubscriptionHandle {
    id: u64,
    active: Arc<AtomicBool>,
    inner: Weak<Mutex<StoreInner>>,
}

impl SubscriptionHandle {
    /// Deactivates and removes the subscription.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return; // already disposed
        }
        if let Some(inner) = self.inner.upgrade() {
            let mut inner = inner.lock().expect("store lock poisoned");
            let id = self.id;
            inner.subscribers.retain(|s| s.id != id);
        }
    }
}
