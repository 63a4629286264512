//! Scheduler behavior under a virtual clock: polling cadence, in-flight
//! deduplication, failure backoff and stop semantics, all without real
//! delays (`start_paused` auto-advances tokio's time).

use futures_util::future::BoxFuture;
use lib_realtime::{
    Action, ApplyMode, DomainKey, FetchAdapter, FetchError, FetchResponse, PollConfig,
    PollScheduler, RealtimeStore, Status,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Succeeds with a fixed payload after failing the first `fail_first`
/// calls; records the virtual instant of every call.
struct ScriptedAdapter {
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
    fail_first: usize,
}

impl ScriptedAdapter {
    fn new(fail_first: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
            fail_first,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn gaps(&self) -> Vec<Duration> {
        let times = self.call_times.lock().unwrap();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

impl FetchAdapter for ScriptedAdapter {
    fn fetch(&self, _timeout: Duration) -> BoxFuture<'_, Result<FetchResponse, FetchError>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());
        Box::pin(async move {
            if n < self.fail_first {
                Err(FetchError::Network("upstream 503".into()))
            } else {
                Ok(FetchResponse::replace(json!({"totalMembers": 1250})))
            }
        })
    }
}

/// Blocks every fetch until the test releases a permit.
struct GatedAdapter {
    calls: AtomicUsize,
    gate: Arc<Semaphore>,
}

impl GatedAdapter {
    fn new() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                calls: AtomicUsize::new(0),
                gate: Arc::clone(&gate),
            },
            gate,
        )
    }
}

impl FetchAdapter for GatedAdapter {
    fn fetch(&self, _timeout: Duration) -> BoxFuture<'_, Result<FetchResponse, FetchError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            let permit = self.gate.acquire().await.expect("gate closed");
            permit.forget();
            Ok(FetchResponse::replace(json!([{"id": 1, "name": "A"}])))
        })
    }
}

fn config(interval_secs: u64) -> PollConfig {
    PollConfig::for_interval(Duration::from_secs(interval_secs))
}

async fn settle() {
    // Lets spawned pollers run; under the paused clock this is instant.
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test(start_paused = true)]
async fn test_first_fetch_fires_immediately() {
    let store = Arc::new(RealtimeStore::new());
    let scheduler = PollScheduler::new(Arc::clone(&store));
    let adapter = Arc::new(ScriptedAdapter::new(0));
    let stats = DomainKey::from("stats");

    scheduler.start(stats.clone(), config(30), Arc::clone(&adapter) as _);
    settle().await;

    assert_eq!(adapter.calls(), 1, "first fetch must not wait one interval");
    let cache = store.snapshot(&stats);
    assert_eq!(cache.status, Status::Fresh);
    assert_eq!(cache.data, Some(json!({"totalMembers": 1250})));
}

#[tokio::test(start_paused = true)]
async fn test_deferred_first_fetch_waits_one_interval() {
    let store = Arc::new(RealtimeStore::new());
    let scheduler = PollScheduler::new(Arc::clone(&store));
    let adapter = Arc::new(ScriptedAdapter::new(0));

    let mut cfg = config(30);
    cfg.fetch_immediately = false;
    scheduler.start(DomainKey::from("content"), cfg, Arc::clone(&adapter) as _);

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(adapter.calls(), 0);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(adapter.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_polls_on_the_nominal_cadence() {
    let store = Arc::new(RealtimeStore::new());
    let scheduler = PollScheduler::new(Arc::clone(&store));
    let adapter = Arc::new(ScriptedAdapter::new(0));

    scheduler.start(DomainKey::from("members"), config(30), Arc::clone(&adapter) as _);
    tokio::time::sleep(Duration::from_secs(95)).await;

    assert_eq!(adapter.calls(), 4); // t=0, 30, 60, 90
    for gap in adapter.gaps() {
        assert_eq!(gap, Duration::from_secs(30));
    }
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_fetch_in_flight_per_domain() {
    let store = Arc::new(RealtimeStore::new());
    let scheduler = PollScheduler::new(Arc::clone(&store));
    let (adapter, gate) = GatedAdapter::new();
    let adapter = Arc::new(adapter);
    let members = DomainKey::from("members");

    scheduler.start(members.clone(), config(1), Arc::clone(&adapter) as _);
    settle().await;

    // Many nominal intervals elapse while the first fetch hangs; every
    // tick in between must be skipped, not queued.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
    assert!(store.snapshot(&members).in_flight);

    gate.add_permits(1);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(store.snapshot(&members).status, Status::Fresh);
    assert!(adapter.calls.load(Ordering::SeqCst) >= 2, "polling resumes");
}

#[tokio::test(start_paused = true)]
async fn test_refresh_now_is_deduplicated_against_polling() {
    let store = Arc::new(RealtimeStore::new());
    let scheduler = PollScheduler::new(Arc::clone(&store));
    let (adapter, gate) = GatedAdapter::new();
    let members = DomainKey::from("members");

    scheduler.start(members.clone(), config(60), Arc::new(adapter) as _);
    settle().await;
    assert!(store.snapshot(&members).in_flight);

    // The poll fetch is still hanging, so a manual refresh is refused.
    assert!(!scheduler.refresh_now(&members).await);

    gate.add_permits(2);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(scheduler.refresh_now(&members).await);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_now_for_unmanaged_domain_is_refused() {
    let store = Arc::new(RealtimeStore::new());
    let scheduler = PollScheduler::new(store);
    assert!(!scheduler.refresh_now(&DomainKey::from("publications")).await);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_doubles_then_caps_then_resets() {
    let store = Arc::new(RealtimeStore::new());
    let scheduler = PollScheduler::new(Arc::clone(&store));
    // Five failures, then permanent success.
    let adapter = Arc::new(ScriptedAdapter::new(5));
    let events = DomainKey::from("events");

    scheduler.start(events.clone(), config(10), Arc::clone(&adapter) as _);
    tokio::time::sleep(Duration::from_secs(400)).await;

    let gaps = adapter.gaps();
    // Failures at t=0,10,30,70,150 (x1, x2, x4, capped x8), success at
    // t=230, nominal cadence afterwards.
    assert_eq!(gaps[0], Duration::from_secs(10));
    assert_eq!(gaps[1], Duration::from_secs(20));
    assert_eq!(gaps[2], Duration::from_secs(40));
    assert_eq!(gaps[3], Duration::from_secs(80));
    assert_eq!(gaps[4], Duration::from_secs(80));
    assert_eq!(gaps[5], Duration::from_secs(10), "backoff resets on success");

    assert_eq!(store.snapshot(&events).status, Status::Fresh);
}

#[tokio::test(start_paused = true)]
async fn test_failure_marks_error_but_keeps_previous_data() {
    let store = Arc::new(RealtimeStore::new());
    let scheduler = PollScheduler::new(Arc::clone(&store));
    let stats = DomainKey::from("stats");

    // Seed last-known-good data, then poll a permanently failing upstream.
    store.dispatch(Action::success_now(
        stats.clone(),
        json!({"totalMembers": 99}),
        ApplyMode::Replace,
    ));
    let adapter = Arc::new(ScriptedAdapter::new(usize::MAX));
    scheduler.start(stats.clone(), config(10), Arc::clone(&adapter) as _);
    settle().await;

    let cache = store.snapshot(&stats);
    assert_eq!(cache.status, Status::Error);
    assert_eq!(cache.data, Some(json!({"totalMembers": 99})));
    assert!(cache.error.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_future_ticks_but_delivers_trailing_result() {
    let store = Arc::new(RealtimeStore::new());
    let scheduler = PollScheduler::new(Arc::clone(&store));
    let (adapter, gate) = GatedAdapter::new();
    let adapter = Arc::new(adapter);
    let members = DomainKey::from("members");

    scheduler.start(members.clone(), config(5), Arc::clone(&adapter) as _);
    settle().await;
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);

    scheduler.stop(&members);
    assert!(!scheduler.is_running(&members));

    // The in-flight fetch completes after stop and its result still lands.
    gate.add_permits(1);
    tokio::time::sleep(Duration::from_secs(1)).await;
    let cache = store.snapshot(&members);
    assert_eq!(cache.status, Status::Fresh);
    assert_eq!(cache.data, Some(json!([{"id": 1, "name": "A"}])));

    // ... but no further polls happen.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_domains_poll_independently() {
    let store = Arc::new(RealtimeStore::new());
    let scheduler = PollScheduler::new(Arc::clone(&store));
    let (stuck, _gate) = GatedAdapter::new();
    let healthy = Arc::new(ScriptedAdapter::new(0));

    scheduler.start(DomainKey::from("events"), config(10), Arc::new(stuck) as _);
    scheduler.start(DomainKey::from("stats"), config(10), Arc::clone(&healthy) as _);

    tokio::time::sleep(Duration::from_secs(35)).await;

    // The hung events fetch never blocks the stats cadence.
    assert_eq!(healthy.calls(), 4);
    assert_eq!(store.snapshot(&DomainKey::from("stats")).status, Status::Fresh);
    assert!(store.snapshot(&DomainKey::from("events")).in_flight);
}
