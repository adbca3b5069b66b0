//! Fan-out delivery subsystem.
//!
//! # Responsibilities
//! - Broadcast each record to every known collector endpoint
//! - Race each attempt against the configured timeout
//! - Isolate per-endpoint failures from each other and from the caller
//!
//! # Design Decisions
//! - Zero known endpoints is a no-op, not an error
//! - Timeout and connect-class failures are expected churn of a locally
//!   discovered collector and are swallowed; anything else goes to tracing
//! - No retry; the caller's action must never wait on its own telemetry

pub mod payload;

pub use payload::Record;

use arc_swap::ArcSwap;
use futures_util::future::join_all;
use reqwest::header::CONTENT_TYPE;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;
use crate::registry::EndpointRegistry;

/// Kind of record being delivered; doubles as the collector path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Log,
    Network,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Log => "log",
            RecordKind::Network => "network",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broadcasts records to every endpoint in the registry snapshot.
pub struct DeliveryService {
    client: reqwest::Client,
    registry: Arc<EndpointRegistry>,
    /// Innermost merge layer, fixed at construction (device metadata).
    device_data: Record,
    /// Caller-supplied layer, replaced wholesale by `set_base_data`.
    base_data: ArcSwap<Record>,
    timeout_ms: AtomicU64,
}

impl DeliveryService {
    pub fn new(registry: Arc<EndpointRegistry>, device_data: Record, timeout_ms: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            registry,
            device_data,
            base_data: ArcSwap::from_pointee(Record::new()),
            timeout_ms: AtomicU64::new(timeout_ms),
        }
    }

    /// Replace the caller-supplied base data merged into every record.
    pub fn set_base_data(&self, data: Record) {
        self.base_data.store(Arc::new(data));
    }

    /// Update the per-endpoint delivery timeout.
    pub fn set_timeout(&self, timeout_ms: u64) {
        self.timeout_ms.store(timeout_ms, Ordering::Relaxed);
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.load(Ordering::Relaxed)
    }

    /// Fan the record out to every known collector. Never fails; per-endpoint
    /// outcomes are reported through metrics and tracing only.
    pub async fn deliver(&self, kind: RecordKind, record: Record) {
        let endpoints = self.registry.current();
        if endpoints.is_empty() {
            return;
        }

        let base = self.base_data.load_full();
        let body = payload::merge(&[&self.device_data, base.as_ref(), &record]);
        let timeout = Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed));

        let attempts = endpoints
            .into_iter()
            .map(|address| self.attempt(address, kind, &body, timeout));
        join_all(attempts).await;
    }

    async fn attempt(&self, address: String, kind: RecordKind, body: &Record, timeout: Duration) {
        let url = format!("{address}/{kind}");
        let request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json;charset=utf-8")
            .json(body)
            .send();

        match tokio::time::timeout(timeout, request).await {
            Ok(Ok(_response)) => {
                metrics::record_delivered(kind.as_str());
            }
            Ok(Err(err)) if err.is_connect() || err.is_timeout() => {
                metrics::record_delivery_failure(kind.as_str(), "network");
                tracing::debug!(%url, error = %err, "collector unreachable");
            }
            Ok(Err(err)) => {
                metrics::record_delivery_failure(kind.as_str(), "unexpected");
                tracing::warn!(%url, error = %err, "delivery failed");
            }
            Err(_) => {
                metrics::record_delivery_failure(kind.as_str(), "timeout");
                tracing::debug!(%url, timeout_ms = timeout.as_millis() as u64, "delivery timed out");
            }
        }
    }
}
