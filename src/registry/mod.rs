//! Endpoint registry subsystem.
//!
//! # Responsibilities
//! - Maintain the identity → address map of reachable collectors
//! - Normalize configured addresses (scheme prefix, default port)
//! - Notify subscribers whenever the set changes
//!
//! # Design Decisions
//! - One well-known identity, "Default", backs static configuration;
//!   discovery-assigned identities come from the advertised service name
//! - Each identity maps to exactly one address; the same address may appear
//!   under two identities the registry did not create itself
//! - Change notification carries a fresh snapshot so subscribers never read
//!   the map mid-mutation

pub mod discovery;

pub use discovery::{DiscoveryEvent, DiscoveryRunner, ResolvedService, ServiceDiscovery};

use dashmap::DashMap;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use url::Url;

use crate::observability::metrics;

/// Port collectors listen on when the address does not name one.
pub const DEFAULT_COLLECTOR_PORT: u16 = 27751;

const STATIC_IDENTITY: &str = "Default";

type ChangeListener = Arc<dyn Fn(&[String]) + Send + Sync>;

/// The set of currently-reachable collector endpoints.
#[derive(Default)]
pub struct EndpointRegistry {
    endpoints: DashMap<String, String>,
    change_listeners: Mutex<Vec<ChangeListener>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the "Default" static endpoint. An empty address
    /// removes it.
    pub fn set_static(&self, address: &str) {
        if address.trim().is_empty() {
            if self.endpoints.remove(STATIC_IDENTITY).is_some() {
                self.notify();
            }
            return;
        }

        match normalize_address(address) {
            Some(normalized) => {
                self.endpoints
                    .insert(STATIC_IDENTITY.to_string(), normalized);
                self.notify();
            }
            None => {
                tracing::warn!(address, "ignoring unparseable collector address");
            }
        }
    }

    /// Register a discovered identity → address mapping.
    pub(crate) fn insert_identity(&self, identity: String, address: String) {
        self.endpoints.insert(identity, address);
        self.notify();
    }

    /// Delete a discovered identity; no-op when unknown.
    pub(crate) fn remove_identity(&self, identity: &str) -> bool {
        let removed = self.endpoints.remove(identity).is_some();
        if removed {
            self.notify();
        }
        removed
    }

    /// Whether any identity already maps to this address.
    pub fn address_known(&self, address: &str) -> bool {
        self.endpoints.iter().any(|entry| entry.value() == address)
    }

    /// Snapshot of the distinct addresses currently reachable.
    pub fn current(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.endpoints
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|addr| seen.insert(addr.clone()))
            .collect()
    }

    /// Subscribe to set changes; the callback receives the new snapshot.
    pub fn on_change(&self, listener: ChangeListener) {
        lock(&self.change_listeners).push(listener);
    }

    fn notify(&self) {
        let snapshot = self.current();
        metrics::record_endpoint_count(snapshot.len());
        let listeners: Vec<ChangeListener> = lock(&self.change_listeners).clone();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&snapshot))).is_err() {
                tracing::warn!("endpoint change listener panicked");
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Normalize a collector address: prefix `http://` when the scheme is
/// missing and append the default collector port when none is named.
pub(crate) fn normalize_address(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let with_scheme = if trimmed.contains("http") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let mut parsed = Url::parse(&with_scheme).ok()?;
    parsed.host_str()?;
    if parsed.port().is_none() {
        parsed.set_port(Some(DEFAULT_COLLECTOR_PORT)).ok()?;
    }
    Some(parsed.to_string().trim_end_matches('/').to_string())
}
