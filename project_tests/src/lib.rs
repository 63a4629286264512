//! Shared test doubles for the end-to-end dashboard scenarios: fetch
//! adapters with fully scripted outcomes and call accounting.

use futures_util::future::BoxFuture;
use lib_realtime::{FetchAdapter, FetchError, FetchResponse};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Always succeeds with the same full-snapshot payload.
pub struct StaticAdapter {
    payload: Value,
    calls: AtomicUsize,
}

impl StaticAdapter {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FetchAdapter for StaticAdapter {
    fn fetch(&self, _timeout: Duration) -> BoxFuture<'_, Result<FetchResponse, FetchError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let payload = self.payload.clone();
        Box::pin(async move { Ok(FetchResponse::replace(payload)) })
    }
}

/// Replays a scripted sequence of outcomes, then repeats the last one.
pub struct SequenceAdapter {
    script: Mutex<VecDeque<Result<FetchResponse, FetchError>>>,
    last: Mutex<Option<Result<FetchResponse, FetchError>>>,
    calls: AtomicUsize,
}

impl SequenceAdapter {
    pub fn new(script: Vec<Result<FetchResponse, FetchError>>) -> Self {
        assert!(!script.is_empty(), "script must contain at least one outcome");
        Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> Result<FetchResponse, FetchError> {
        let mut script = self.script.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(outcome) = script.pop_front() {
            *last = Some(clone_outcome(&outcome));
            outcome
        } else {
            clone_outcome(last.as_ref().expect("script was not empty"))
        }
    }
}

impl FetchAdapter for SequenceAdapter {
    fn fetch(&self, _timeout: Duration) -> BoxFuture<'_, Result<FetchResponse, FetchError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.next_outcome();
        Box::pin(async move { outcome })
    }
}

fn clone_outcome(
    outcome: &Result<FetchResponse, FetchError>,
) -> Result<FetchResponse, FetchError> {
    match outcome {
        Ok(response) => Ok(response.clone()),
        Err(error) => Err(error.clone()),
    }
}
