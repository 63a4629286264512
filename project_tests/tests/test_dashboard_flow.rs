//! End-to-end dashboard scenarios: several domains polling independently
//! into one store, widgets observing committed transitions, degraded and
//! recovered upstreams, and push-style updates between polls.

use lib_realtime::{
    Action, ApplyMode, ConnectionStatus, DomainKey, FetchError, FetchResponse, PollConfig,
    PollScheduler, RealtimeStore, Status,
};
use project_tests::{SequenceAdapter, StaticAdapter};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn config(interval_secs: u64) -> PollConfig {
    PollConfig::for_interval(Duration::from_secs(interval_secs))
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test(start_paused = true)]
async fn test_dashboard_bootstrap_populates_every_domain() {
    let store = Arc::new(RealtimeStore::new());
    let scheduler = PollScheduler::new(Arc::clone(&store));

    let notified = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&notified);
    store.subscribe_all(move |notification| {
        sink.lock().unwrap().extend(notification.changed.clone());
    });

    let payloads = [
        ("stats", json!({"totalMembers": 1250, "upcomingEvents": 3})),
        ("members", json!([{"id": 1, "name": "A"}])),
        ("events", json!([{"id": 10, "title": "AGM"}])),
        ("content", json!([{"slug": "welcome", "title": "Welcome"}])),
    ];
    for (domain, payload) in &payloads {
        scheduler.start(
            DomainKey::from(*domain),
            config(30),
            Arc::new(StaticAdapter::new(payload.clone())) as _,
        );
    }
    settle().await;

    for (domain, payload) in &payloads {
        let cache = store.snapshot(&DomainKey::from(*domain));
        assert_eq!(cache.status, Status::Fresh, "domain {}", domain);
        assert_eq!(cache.data.as_ref(), Some(payload), "domain {}", domain);
    }
    assert_eq!(store.connection_status(), ConnectionStatus::Online);

    // Every domain produced (at least) its loading and fresh transitions.
    let notified = notified.lock().unwrap();
    for (domain, _) in &payloads {
        assert!(
            notified.contains(&DomainKey::from(*domain)),
            "no notification for {}",
            domain
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_degraded_upstream_recovers() {
    let store = Arc::new(RealtimeStore::new());
    let scheduler = PollScheduler::new(Arc::clone(&store));

    scheduler.start(
        DomainKey::from("stats"),
        config(30),
        Arc::new(StaticAdapter::new(json!({"totalMembers": 1}))) as _,
    );

    // Members fails twice, then comes back with data.
    let members_adapter = Arc::new(SequenceAdapter::new(vec![
        Err(FetchError::Network("502 bad gateway".into())),
        Err(FetchError::Timeout(Duration::from_secs(10))),
        Ok(FetchResponse::replace(json!([{"id": 1, "name": "A"}]))),
    ]));
    scheduler.start(
        DomainKey::from("members"),
        config(30),
        Arc::clone(&members_adapter) as _,
    );
    settle().await;

    // One failing domain among healthy ones: degraded, not offline.
    assert_eq!(store.snapshot(&DomainKey::from("members")).status, Status::Error);
    assert_eq!(store.connection_status(), ConnectionStatus::Degraded);

    // Walk the virtual clock past both backoff retries (30s, then 60s).
    tokio::time::sleep(Duration::from_secs(100)).await;
    assert!(members_adapter.calls() >= 3);
    let members = store.snapshot(&DomainKey::from("members"));
    assert_eq!(members.status, Status::Fresh);
    assert!(members.error.is_none());
    assert_eq!(store.connection_status(), ConnectionStatus::Online);
}

#[tokio::test(start_paused = true)]
async fn test_push_updates_merge_between_polls() {
    let store = Arc::new(RealtimeStore::new());
    let scheduler = PollScheduler::new(Arc::clone(&store));
    let members = DomainKey::from("members");

    scheduler.start(
        members.clone(),
        config(300),
        Arc::new(StaticAdapter::new(json!([
            {"id": 1, "name": "A"},
            {"id": 2, "name": "B"}
        ]))) as _,
    );
    settle().await;

    // A push transport feeds the same reducer between polls.
    store.dispatch(Action::ItemUpsert {
        domain: members.clone(),
        item: json!({"id": 2, "name": "B2"}),
    });
    store.dispatch(Action::ItemUpsert {
        domain: members.clone(),
        item: json!({"id": 3, "name": "C"}),
    });
    store.dispatch(Action::ItemRemove {
        domain: members.clone(),
        id: "1".into(),
    });

    assert_eq!(
        store.snapshot(&members).data,
        Some(json!([
            {"id": 2, "name": "B2"},
            {"id": 3, "name": "C"}
        ]))
    );
    // Push merges do not count as fetches.
    assert_eq!(store.snapshot(&members).status, Status::Fresh);
}

#[tokio::test(start_paused = true)]
async fn test_widget_subscriptions_fire_per_watched_domain() {
    let store = Arc::new(RealtimeStore::new());
    let scheduler = PollScheduler::new(Arc::clone(&store));

    let stats_seen = Arc::new(Mutex::new(0usize));
    let events_seen = Arc::new(Mutex::new(0usize));

    let sink = Arc::clone(&stats_seen);
    store.subscribe(["stats"], move |_| *sink.lock().unwrap() += 1);
    let sink = Arc::clone(&events_seen);
    store.subscribe(["events"], move |_| *sink.lock().unwrap() += 1);

    scheduler.start(
        DomainKey::from("stats"),
        config(30),
        Arc::new(StaticAdapter::new(json!({"totalMembers": 1}))) as _,
    );
    settle().await;

    // The stats widget saw loading + fresh; the events widget nothing.
    assert_eq!(*stats_seen.lock().unwrap(), 2);
    assert_eq!(*events_seen.lock().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_identical_payload_does_not_renotify_data_change() {
    let store = Arc::new(RealtimeStore::new());
    let scheduler = PollScheduler::new(Arc::clone(&store));
    let stats = DomainKey::from("stats");

    let adapter = Arc::new(StaticAdapter::new(json!({"totalMembers": 1})));
    scheduler.start(stats.clone(), config(30), Arc::clone(&adapter) as _);
    settle().await;

    let first = store.snapshot(&stats);
    tokio::time::sleep(Duration::from_secs(31)).await;
    let second = store.snapshot(&stats);

    assert_eq!(adapter.calls(), 2);
    // Content is idempotent; only freshness advanced.
    assert_eq!(first.data, second.data);
    assert_eq!(first.status, second.status);
    assert!(second.last_fetched_at > first.last_fetched_at);
}

#[tokio::test(start_paused = true)]
async fn test_reset_returns_domain_to_uninitialized_shape() {
    let store = Arc::new(RealtimeStore::new());
    let scheduler = PollScheduler::new(Arc::clone(&store));
    let content = DomainKey::from("content");

    scheduler.start(
        content.clone(),
        config(30),
        Arc::new(StaticAdapter::new(json!([{"id": 5}]))) as _,
    );
    settle().await;
    assert_eq!(store.snapshot(&content).status, Status::Fresh);

    scheduler.stop(&content);
    store.dispatch(Action::Reset {
        domain: content.clone(),
    });

    let cache = store.snapshot(&content);
    assert_eq!(cache.status, Status::Idle);
    assert!(cache.data.is_none());
    assert!(cache.last_fetched_at.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_fetch_success_patch_mode_merges_into_collection() {
    let store = Arc::new(RealtimeStore::new());
    let events = DomainKey::from("events");

    store.dispatch(Action::success_now(
        events.clone(),
        json!([{"id": 1, "title": "AGM"}, {"id": 2, "title": "Social"}]),
        ApplyMode::Replace,
    ));
    // An incremental endpoint delivers only what changed.
    store.dispatch(Action::success_now(
        events.clone(),
        json!([{"id": 2, "title": "Summer Social"}]),
        ApplyMode::Patch,
    ));

    let cache = store.snapshot(&events);
    assert_eq!(
        cache.data,
        Some(json!([
            {"id": 1, "title": "AGM"},
            {"id": 2, "title": "Summer Social"}
        ]))
    );
    assert_eq!(cache.status, Status::Fresh);
}
