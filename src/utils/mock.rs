//! In-memory transport for tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use http::{Method, StatusCode};
use tokio::sync::Semaphore;

use crate::core::{
    request::{RawResponse, RestRequest},
    traits::Transport,
    DataError, DataResult,
};

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub method: Method,
    pub href: String,
    pub body: Option<Bytes>,
}

/// Canned responses keyed by href; unknown hrefs answer 404.
///
/// A gated transport holds every call until `release` hands out a permit.
pub(crate) struct MockTransport {
    responses: DashMap<String, (StatusCode, Bytes)>,
    unreachable: DashMap<String, ()>,
    calls: Mutex<Vec<RecordedCall>>,
    call_count: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            responses: DashMap::new(),
            unreachable: DashMap::new(),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::new()
        }
    }

    pub fn respond(&self, href: &str, status: StatusCode, body: &str) {
        self.responses
            .insert(href.to_string(), (status, Bytes::copy_from_slice(body.as_bytes())));
    }

    /// Calls to `href` fail without a response.
    pub fn unreachable(&self, href: &str) {
        self.unreachable.insert(href.to_string(), ());
    }

    pub fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &RestRequest) -> DataResult<RawResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                method: request.method.clone(),
                href: request.href.clone(),
                body: request.body.clone(),
            });
        }

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| DataError::Internal(e.to_string()))?
                .forget();
        }

        if self.unreachable.contains_key(&request.href) {
            return Err(DataError::Network(format!(
                "connection refused: {}",
                request.href
            )));
        }

        Ok(match self.responses.get(&request.href) {
            Some(entry) => {
                let (status, body) = entry.value().clone();
                RawResponse::new(status, body)
            }
            None => RawResponse::new(StatusCode::NOT_FOUND, Bytes::new()),
        })
    }
}
