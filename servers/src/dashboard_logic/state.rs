use chrono::Utc;
use lib_realtime::{DomainKey, PollScheduler, RealtimeStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::dashboard_logic::config::Config;
use crate::dashboard_logic::domains;

#[derive(Clone)]
pub struct AppState {
    config: Config,
    store: Arc<RealtimeStore>,
    scheduler: Arc<PollScheduler>,
    // Committed domain changes, re-broadcast to all websocket sessions
    pub change_tx: broadcast::Sender<Arc<Vec<DomainKey>>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let store = Arc::new(RealtimeStore::new());
        let scheduler = Arc::new(PollScheduler::new(Arc::clone(&store)));
        let (change_tx, _) = broadcast::channel(256);

        // Bridge the store's synchronous fan-out into the async world:
        // the callback only hands the changed-domain list to the channel,
        // websocket sessions read snapshots on their own tasks.
        let tx = change_tx.clone();
        store.subscribe_all(move |notification| {
            let _ = tx.send(Arc::new(notification.changed.clone()));
        });

        Self {
            config,
            store,
            scheduler,
            change_tx,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<RealtimeStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &Arc<PollScheduler> {
        &self.scheduler
    }

    /// The wire view of one domain cache: the stored record plus the
    /// staleness-aware status dashboards actually render.
    pub fn snapshot_json(&self, domain: &str) -> Value {
        let key = DomainKey::from(domain);
        let cache = self.store.snapshot(&key);
        let effective = cache.status_at(Utc::now(), self.config.stale_after());

        let mut value = serde_json::to_value(&*cache).unwrap_or(Value::Null);
        if let Some(object) = value.as_object_mut() {
            object.insert("domain".to_string(), json!(domain));
            object.insert("status".to_string(), json!(effective));
        }
        value
    }

    /// Global health summary: derived connection status plus one line per
    /// dashboard domain (domains not yet polled report as idle).
    pub fn status_json(&self) -> Value {
        let now = Utc::now();
        let stale_after = self.config.stale_after();

        let domains: serde_json::Map<String, Value> = domains::ALL
            .iter()
            .map(|name| {
                let cache = self.store.snapshot(&DomainKey::from(*name));
                (
                    name.to_string(),
                    json!({
                        "status": cache.status_at(now, stale_after),
                        "lastFetchedAt": cache.last_fetched_at,
                        "inFlight": cache.in_flight,
                        "hasData": cache.has_data(),
                    }),
                )
            })
            .collect();

        json!({
            "connection": self.store.connection_status(),
            "domains": domains,
        })
    }

    pub async fn refresh(&self, domain: &str) -> bool {
        self.scheduler.refresh_now(&DomainKey::from(domain)).await
    }
}
