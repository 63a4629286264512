use lib_realtime::{key_by_field, DomainKey, HttpFetchAdapter};
use std::sync::Arc;

use crate::dashboard_logic::state::AppState;

// The association data domains surfaced on the admin dashboard.
pub const STATS: &str = "stats";
pub const MEMBERS: &str = "members";
pub const EVENTS: &str = "events";
pub const CONTENT: &str = "content";

pub const ALL: [&str; 4] = [STATS, MEMBERS, EVENTS, CONTENT];

/// Registers every association domain with the store and starts its
/// poller against the configured association API.
pub fn start_polling(app_state: &AppState) {
    let config = app_state.config().clone();
    let base_url = config.api_base_url();
    let token = config.api_token.clone();

    // Published content is keyed by slug in the CMS API; everything else
    // uses the default "id" identity.
    app_state
        .store()
        .set_key_fn(DomainKey::from(CONTENT), key_by_field("slug"));

    let endpoints = [
        (STATS, "api/admin/stats", config.stats_interval_seconds()),
        (MEMBERS, "api/admin/members", config.members_interval_seconds()),
        (EVENTS, "api/admin/events", config.events_interval_seconds()),
        (CONTENT, "api/admin/content", config.content_interval_seconds()),
    ];

    for (domain, path, interval_seconds) in endpoints {
        let adapter = Arc::new(HttpFetchAdapter::new(&base_url, path, token.clone()));
        app_state.scheduler().start(
            DomainKey::from(domain),
            config.poll_config(interval_seconds),
            adapter,
        );
        log::info!(
            "polling '{}' from {}{} every {}s",
            domain,
            base_url,
            path,
            interval_seconds
        );
    }
}
