//! # Fetch Adapters
//!
//! An adapter performs the actual network call for one data domain and is
//! the only place the core touches a transport. The store and scheduler
//! see nothing but the [`FetchAdapter`] contract: resolve exactly once,
//! within the caller's deadline, with either a payload or a typed error,
//! never a panic, never an indefinite hang.

use futures_util::future::BoxFuture;
use serde_json::Value;
use std::time::Duration;

use crate::core::action::ApplyMode;
use crate::errors::FetchError;

/// The HTTP implementation used against the association API.
pub mod http;

// --- Public API Re-exports ---
pub use http::HttpFetchAdapter;

/// One successful fetch: an opaque payload plus how to apply it.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Opaque domain payload as returned by the upstream.
    pub payload: Value,
    /// Full replace (polling snapshot) or keyed patch (incremental delta).
    pub mode: ApplyMode,
}

impl FetchResponse {
    /// A full-snapshot response.
    pub fn replace(payload: Value) -> Self {
        Self {
            payload,
            mode: ApplyMode::Replace,
        }
    }

    /// An incremental keyed-delta response.
    pub fn patch(payload: Value) -> Self {
        Self {
            payload,
            mode: ApplyMode::Patch,
        }
    }
}

/// Transport for one data domain.
pub trait FetchAdapter: Send + Sync {
    /// Performs one fetch attempt, resolving within `timeout`. A timeout
    /// resolves as [`FetchError::Timeout`]; the future never hangs past the
    /// deadline and never panics.
    fn fetch(&self, timeout: Duration) -> BoxFuture<'_, Result<FetchResponse, FetchError>>;
}
