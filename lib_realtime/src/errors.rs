//! # Error Taxonomy
//!
//! Every failure in this core degrades gracefully to a visible cache state;
//! nothing here is fatal and nothing crosses the store boundary as a panic.
//! Fetch failures are captured as `ErrorInfo` inside the affected
//! `DomainCache` and surfaced to consumers as data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failure of a single fetch attempt against an upstream data source.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Transport-level failure: connection refused, DNS, non-2xx status.
    #[error("network failure: {0}")]
    Network(String),

    /// The adapter did not produce a result within the caller's deadline.
    /// Timeouts always resolve as this error; an adapter never hangs.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The upstream responded but the payload could not be decoded.
    /// Terminal for this fetch attempt; never retried faster than the
    /// regular backoff cadence.
    #[error("malformed payload: {0}")]
    Decode(String),
}

/// Coarse classification of a [`FetchError`], stable across the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Network,
    Timeout,
    Decode,
}

/// The error record stored in a `DomainCache` after a failed refresh.
///
/// Consumers render this next to the retained last-known-good data rather
/// than blanking the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    /// When the failing fetch completed.
    pub at: DateTime<Utc>,
}

impl FetchError {
    /// Maps the error onto its wire classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Network(_) => ErrorKind::Network,
            FetchError::Timeout(_) => ErrorKind::Timeout,
            FetchError::Decode(_) => ErrorKind::Decode,
        }
    }

    /// Converts the error into the cacheable record, stamped with the
    /// completion time of the failing fetch.
    pub fn into_info(self, at: DateTime<Utc>) -> ErrorInfo {
        ErrorInfo {
            kind: self.kind(),
            message: self.to_string(),
            at,
        }
    }
}
