//! # Poll Scheduler
//!
//! Drives periodic refresh per domain. Each started domain owns an
//! independent, cancellable polling task; domains never block one another
//! and the scheduler holds no cross-domain lock.
//!
//! ## Scheduling behavior:
//!
//! - The first fetch fires immediately on `start` (configurable), so
//!   dashboards are not empty at first render.
//! - At most one fetch per domain is ever in flight: every attempt passes
//!   through the store's `try_begin_fetch` gate, and a tick that lands
//!   while a fetch is still running is skipped; correctness over
//!   freshness when the upstream is slow.
//! - On failure the next attempt is delayed with exponential backoff
//!   (doubling from the base interval up to the configured ceiling) and
//!   the cadence resets to the base interval on the next success.
//! - `stop` cancels future ticks only; a fetch already in flight completes
//!   and its result is still dispatched, so a stopped domain can receive
//!   one trailing update rather than silently losing state.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::adapters::FetchAdapter;
use crate::config::PollConfig;
use crate::core::action::Action;
use crate::core::cache::DomainKey;
use crate::core::store::RealtimeStore;

struct Runner {
    token: CancellationToken,
    adapter: Arc<dyn FetchAdapter>,
    config: PollConfig,
}

/// Owns one polling task per started domain.
pub struct PollScheduler {
    store: Arc<RealtimeStore>,
    runners: Mutex<HashMap<DomainKey, Runner>>,
}

impl PollScheduler {
    /// Creates a scheduler feeding actions into `store`.
    pub fn new(store: Arc<RealtimeStore>) -> Self {
        Self {
            store,
            runners: Mutex::new(HashMap::new()),
        }
    }

    /// Starts (or restarts) polling for `domain`. Restarting cancels the
    /// previous task's pending tick first; its in-flight fetch, if any,
    /// still completes under the one-in-flight gate.
    pub fn start(&self, domain: DomainKey, config: PollConfig, adapter: Arc<dyn FetchAdapter>) {
        let token = CancellationToken::new();
        {
            let mut runners = self.runners.lock().expect("scheduler lock poisoned");
            if let Some(previous) = runners.insert(
                domain.clone(),
                Runner {
                    token: token.clone(),
                    adapter: Arc::clone(&adapter),
                    config: config.clone(),
                },
            ) {
                log::info!("restarting poller for '{}'", domain);
                previous.token.cancel();
            }
        }

        let store = Arc::clone(&self.store);
        tokio::spawn(poll_loop(store, domain, config, adapter, token));
    }

    /// Cancels the pending tick for `domain`. Idempotent; unknown domains
    /// are a no-op.
    pub fn stop(&self, domain: &DomainKey) {
        let runner = self
            .runners
            .lock()
            .expect("scheduler lock poisoned")
            .remove(domain);
        if let Some(runner) = runner {
            runner.token.cancel();
            log::info!("polling cancelled for '{}'", domain);
        }
    }

    /// Cancels every polling task.
    pub fn stop_all(&self) {
        let mut runners = self.runners.lock().expect("scheduler lock poisoned");
        for (domain, runner) in runners.drain() {
            runner.token.cancel();
            log::info!("polling cancelled for '{}'", domain);
        }
    }

    /// Whether a poller was started (and not stopped) for `domain`.
    pub fn is_running(&self, domain: &DomainKey) -> bool {
        self.runners
            .lock()
            .expect("scheduler lock poisoned")
            .contains_key(domain)
    }

    /// Explicit user-action refresh, outside the polling cadence, through
    /// the registered adapter. Returns `false` when the domain has no
    /// poller or a fetch is already in flight (the refresh is then
    /// redundant: a result is on its way).
    pub async fn refresh_now(&self, domain: &DomainKey) -> bool {
        let (adapter, timeout) = {
            let runners = self.runners.lock().expect("scheduler lock poisoned");
            match runners.get(domain) {
                Some(runner) => (Arc::clone(&runner.adapter), runner.config.timeout),
                None => {
                    log::warn!("refresh requested for unmanaged domain '{}'", domain);
                    return false;
                }
            }
        };
        if !self.store.try_begin_fetch(domain) {
            log::debug!("refresh for '{}' skipped: fetch already in flight", domain);
            return false;
        }
        execute_fetch(&self.store, domain, timeout, adapter.as_ref()).await;
        true
    }
}

async fn poll_loop(
    store: Arc<RealtimeStore>,
    domain: DomainKey,
    config: PollConfig,
    adapter: Arc<dyn FetchAdapter>,
    token: CancellationToken,
) {
    log::info!("polling '{}' every {:?}", domain, config.interval);

    if !config.fetch_immediately {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(config.interval) => {}
        }
    }

    let mut consecutive_failures: u32 = 0;
    loop {
        if token.is_cancelled() {
            break;
        }

        if store.try_begin_fetch(&domain) {
            let succeeded =
                execute_fetch(&store, &domain, config.timeout, adapter.as_ref()).await;
            consecutive_failures = if succeeded {
                0
            } else {
                consecutive_failures.saturating_add(1)
            };
        } else {
            log::debug!("'{}' tick skipped: previous fetch still in flight", domain);
        }

        let delay = config.backoff_delay(consecutive_failures);
        if consecutive_failures > 0 {
            log::warn!(
                "'{}' refresh failing ({} in a row); next attempt in {:?}",
                domain,
                consecutive_failures,
                delay
            );
        }
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    log::info!("polling stopped for '{}'", domain);
}

/// Runs one fetch attempt to completion and dispatches its outcome. The
/// result is dispatched even if the domain was stopped meanwhile.
async fn execute_fetch(
    store: &RealtimeStore,
    domain: &DomainKey,
    timeout: Duration,
    adapter: &dyn FetchAdapter,
) -> bool {
    match adapter.fetch(timeout).await {
        Ok(response) => {
            store.dispatch(Action::success_now(
                domain.clone(),
                response.payload,
                response.mode,
            ));
            true
        }
        Err(error) => {
            log::warn!("fetch for '{}' failed: {}", domain, error);
            store.dispatch(Action::FetchError {
                domain: domain.clone(),
                error: error.into_info(chrono::Utc::now()),
            });
            false
        }
    }
}
