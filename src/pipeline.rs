//! The relay facade.
//!
//! # Responsibilities
//! - Own and wire the subsystems: filter, correlation engine, endpoint
//!   registry, discovery, delivery
//! - Expose the host surface: log/warn/error/tag, base url/data/timeout,
//!   request-moment listeners, enable/disable, auto-record
//! - Keep the relay's own collector traffic out of the capture path
//!
//! # Design Decisions
//! - Delivery is spawned, never awaited by the action being logged
//! - Collector addresses are fed back into the filter on every endpoint-set
//!   change, static or discovered
//! - Disabling removes only the relay's own recording listeners; host
//!   listeners stay registered

use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::{validation, RelayConfig};
use crate::delivery::{payload, DeliveryService, Record, RecordKind};
use crate::device::{self, DeviceMetadata};
use crate::error::RelayError;
use crate::filter::FilterEngine;
use crate::intercept::types::now_millis;
use crate::intercept::{CorrelationEngine, EventKind, Listener, TransportHook};
use crate::registry::discovery::JoinIdentity;
use crate::registry::{DiscoveryRunner, EndpointRegistry, ServiceDiscovery};

const DEFAULT_TAG: &str = "default";

/// The embedded telemetry pipeline.
///
/// Construct it inside a tokio runtime; delivery and discovery run as
/// spawned tasks.
pub struct LogRelay {
    filter: Arc<FilterEngine>,
    engine: Arc<CorrelationEngine>,
    registry: Arc<EndpointRegistry>,
    delivery: Arc<DeliveryService>,
    force_enable: bool,
    enabled: AtomicBool,
    auto_record: AtomicBool,
    hook: Mutex<Option<Arc<dyn TransportHook>>>,
    own_listeners: Mutex<Vec<(EventKind, Listener)>>,
}

impl LogRelay {
    /// Build a relay with no optional capabilities.
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        Self::with_capabilities(config, None, None)
    }

    /// Build a relay, resolving the optional device-metadata and discovery
    /// capabilities once.
    pub fn with_capabilities(
        config: RelayConfig,
        device: Option<Arc<dyn DeviceMetadata>>,
        discovery: Option<Arc<dyn ServiceDiscovery>>,
    ) -> Result<Self, RelayError> {
        validation::validate(&config)?;

        let filter = Arc::new(FilterEngine::from_config(&config.filter)?);
        let engine = Arc::new(CorrelationEngine::new(filter.clone()));
        let registry = Arc::new(EndpointRegistry::new());

        let metadata = device::resolve(device.as_ref());
        let delivery = Arc::new(DeliveryService::new(
            registry.clone(),
            device::as_record(&metadata),
            config.delivery.timeout_ms,
        ));

        // Registered before the first endpoint lands so no collector address
        // ever escapes the exclusion set. Only the two ingestion URLs are
        // excluded; other services on the collector's host stay observable.
        let change_filter = filter.clone();
        registry.on_change(Arc::new(move |addresses: &[String]| {
            for address in addresses {
                change_filter.extend_ignored_urls([
                    format!("{address}/log"),
                    format!("{address}/network"),
                ]);
            }
        }));

        if let Some(base_url) = &config.delivery.base_url {
            registry.set_static(base_url);
        }

        if config.discovery.enabled {
            match discovery {
                Some(capability) => {
                    let identity = JoinIdentity::from_metadata(&metadata);
                    let _ = DiscoveryRunner::new(registry.clone(), config.discovery.clone(), identity)
                        .spawn(capability);
                }
                None => {
                    tracing::debug!("no discovery capability installed; static collectors only");
                }
            }
        }

        Ok(Self {
            filter,
            engine,
            registry,
            delivery,
            force_enable: config.filter.force_enable,
            enabled: AtomicBool::new(false),
            auto_record: AtomicBool::new(false),
            hook: Mutex::new(None),
            own_listeners: Mutex::new(Vec::new()),
        })
    }

    // ----- log surface -----

    pub fn log<I: IntoIterator<Item = Value>>(&self, message: I) {
        self.send_log("log", DEFAULT_TAG, message);
    }

    pub fn warn<I: IntoIterator<Item = Value>>(&self, message: I) {
        self.send_log("warn", DEFAULT_TAG, message);
    }

    pub fn error<I: IntoIterator<Item = Value>>(&self, message: I) {
        self.send_log("error", DEFAULT_TAG, message);
    }

    /// A log-level record under a caller-chosen tag.
    pub fn tag<I: IntoIterator<Item = Value>>(&self, tag: &str, message: I) {
        self.send_log("log", tag, message);
    }

    fn send_log<I: IntoIterator<Item = Value>>(&self, level: &str, tag: &str, message: I) {
        let record = payload::record_from([
            ("message", Value::Array(message.into_iter().collect())),
            ("tag", Value::String(tag.to_string())),
            ("level", Value::String(level.to_string())),
            ("createTime", Value::from(now_millis())),
        ]);
        self.spawn_deliver(RecordKind::Log, record);
    }

    // ----- configuration surface -----

    /// Create or replace the static collector. An empty address clears it
    /// and disables interception; a fresh address re-installs recording when
    /// it was requested via [`LogRelay::auto_record`].
    pub fn set_base_url(&self, address: &str) {
        if address.trim().is_empty() {
            self.registry.set_static("");
            self.disable();
            return;
        }
        self.registry.set_static(address);

        if self.auto_record.load(Ordering::SeqCst) && !self.enabled.load(Ordering::SeqCst) {
            let retained = lock(&self.hook).clone();
            if let Some(hook) = retained {
                if let Err(err) = self.enable(hook) {
                    tracing::warn!(error = %err, "automatic recording could not reinstall the hook");
                }
            }
        }
    }

    /// Replace the base data merged into every outbound record.
    pub fn set_base_data(&self, data: Record) {
        self.delivery.set_base_data(data);
    }

    /// Update the per-endpoint delivery timeout in milliseconds.
    pub fn set_timeout(&self, timeout_ms: u64) {
        self.delivery.set_timeout(timeout_ms);
    }

    // ----- listener surface -----

    /// Subscribe to a request lifecycle moment.
    pub fn add_listener(
        &self,
        event: EventKind,
        listener: Listener,
    ) -> Option<impl FnOnce() + Send + 'static> {
        self.engine.listeners().add(event, listener)
    }

    pub fn remove_listener(&self, event: EventKind, listener: &Listener) {
        self.engine.listeners().remove(event, listener);
    }

    /// Clear every listener, the relay's own recording listeners included.
    pub fn remove_all_listeners(&self) {
        self.engine.listeners().remove_all();
        lock(&self.own_listeners).clear();
    }

    // ----- interception surface -----

    /// Install the transport hook and start recording network traffic.
    ///
    /// A no-op when already enabled. Fails with [`RelayError::HookBusy`]
    /// when another observer owns the hook and `force_enable` is off.
    /// Request network recording that follows the collector configuration.
    ///
    /// Installs the hook immediately when a collector is already known;
    /// otherwise the hook is retained and installed by the next non-empty
    /// [`LogRelay::set_base_url`]. Clearing the base url uninstalls it, and
    /// a later address installs it again.
    pub fn auto_record(&self, hook: Arc<dyn TransportHook>) -> Result<(), RelayError> {
        self.auto_record.store(true, Ordering::SeqCst);
        if self.registry.current().is_empty() {
            *lock(&self.hook) = Some(hook);
            return Ok(());
        }
        self.enable(hook)
    }

    pub fn enable(&self, hook: Arc<dyn TransportHook>) -> Result<(), RelayError> {
        if self.enabled.load(Ordering::SeqCst) {
            return Ok(());
        }
        if hook.is_active() && !self.force_enable {
            tracing::warn!(
                "network interception not enabled: another interceptor is active; \
                 set filter.force_enable to take over"
            );
            return Err(RelayError::HookBusy);
        }

        hook.install(self.engine.handlers())?;
        self.install_recording_listeners();
        *lock(&self.hook) = Some(hook);
        self.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Uninstall the hook and detach the relay's recording listeners.
    /// Idempotent. The hook stays retained so automatic recording can
    /// reinstall it.
    pub fn disable(&self) {
        if !self.enabled.swap(false, Ordering::SeqCst) {
            return;
        }
        let retained = lock(&self.hook).clone();
        if let Some(hook) = retained {
            hook.uninstall();
        }
        let listeners = self.engine.listeners();
        for (event, listener) in lock(&self.own_listeners).drain(..) {
            listeners.remove(event, &listener);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    // ----- component access -----

    pub fn engine(&self) -> &Arc<CorrelationEngine> {
        &self.engine
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    pub fn delivery(&self) -> &Arc<DeliveryService> {
        &self.delivery
    }

    pub fn filter(&self) -> &Arc<FilterEngine> {
        &self.filter
    }

    // ----- internals -----

    /// Wire the two delivery listeners: request side at the send moment,
    /// response side at the response moment.
    fn install_recording_listeners(&self) {
        let delivery = self.delivery.clone();
        let send_listener: Listener = Arc::new(move |record| {
            let Some(pending) = record.as_pending() else {
                return;
            };
            let body = payload::record_from([
                ("id", Value::String(pending.id.clone())),
                ("url", Value::String(pending.url.clone())),
                ("method", Value::String(pending.method.clone())),
                (
                    "headers",
                    serde_json::to_value(&pending.request_headers).unwrap_or(Value::Null),
                ),
                ("body", pending.request_data.clone()),
                (
                    "createTime",
                    pending.start_time.map(Value::from).unwrap_or(Value::Null),
                ),
            ]);
            let delivery = delivery.clone();
            tokio::spawn(async move {
                delivery.deliver(RecordKind::Network, body).await;
            });
        });

        let delivery = self.delivery.clone();
        let response_listener: Listener = Arc::new(move |record| {
            let Some(completed) = record.as_completed() else {
                return;
            };
            let body = payload::record_from([
                ("id", Value::String(completed.request.id.clone())),
                ("url", Value::String(completed.request.url.clone())),
                ("method", Value::String(completed.request.method.clone())),
                ("statusCode", Value::from(completed.status)),
                ("responseData", completed.response_data.clone()),
                (
                    "headers",
                    serde_json::to_value(&completed.request.response_headers)
                        .unwrap_or(Value::Null),
                ),
                ("endTime", Value::from(completed.end_time)),
                ("duration", Value::from(completed.duration)),
            ]);
            let delivery = delivery.clone();
            tokio::spawn(async move {
                delivery.deliver(RecordKind::Network, body).await;
            });
        });

        let registry = self.engine.listeners();
        let mut own = lock(&self.own_listeners);
        if registry.add(EventKind::Send, send_listener.clone()).is_some() {
            own.push((EventKind::Send, send_listener));
        }
        if registry
            .add(EventKind::Response, response_listener.clone())
            .is_some()
        {
            own.push((EventKind::Response, response_listener));
        }
    }

    fn spawn_deliver(&self, kind: RecordKind, record: Record) {
        let delivery = self.delivery.clone();
        tokio::spawn(async move {
            delivery.deliver(kind, record).await;
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_base_url_is_excluded_from_capture() {
        let mut config = RelayConfig::default();
        config.delivery.base_url = Some("collector.local".to_string());
        let relay = LogRelay::new(config).unwrap();

        assert_eq!(
            relay.registry().current(),
            vec!["http://collector.local:27751".to_string()]
        );
        assert!(relay
            .filter()
            .should_ignore("POST", "http://collector.local:27751/log"));
        assert!(relay
            .filter()
            .should_ignore("POST", "http://collector.local:27751/network"));
    }

    #[tokio::test]
    async fn collector_host_is_excluded_only_on_ingestion_urls() {
        let mut config = RelayConfig::default();
        config.delivery.base_url = Some("192.168.1.10:27751".to_string());
        let relay = LogRelay::new(config).unwrap();

        assert!(relay
            .filter()
            .should_ignore("POST", "http://192.168.1.10:27751/log"));
        // A different service on the same dev machine is still captured.
        assert!(!relay
            .filter()
            .should_ignore("GET", "http://192.168.1.10:3000/api/users"));
        assert!(!relay
            .filter()
            .should_ignore("GET", "http://192.168.1.10:27751/healthz"));
    }

    #[tokio::test]
    async fn empty_base_url_clears_default_endpoint() {
        let mut config = RelayConfig::default();
        config.delivery.base_url = Some("collector.local".to_string());
        let relay = LogRelay::new(config).unwrap();

        relay.set_base_url("");
        assert!(relay.registry().current().is_empty());
    }

    #[tokio::test]
    async fn set_timeout_reaches_delivery() {
        let relay = LogRelay::new(RelayConfig::default()).unwrap();
        relay.set_timeout(1_234);
        assert_eq!(relay.delivery().timeout_ms(), 1_234);
    }
}
