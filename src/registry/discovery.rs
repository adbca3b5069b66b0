//! Collector discovery and the join handshake.
//!
//! # Responsibilities
//! - Consume service advertisements from an optional discovery capability
//! - Authorize each advertised collector with a one-shot join handshake
//! - Keep the endpoint registry in sync with advertisement removal
//!
//! # Design Decisions
//! - Discovery is best-effort: every failure is logged and skipped, never
//!   surfaced to the host or allowed to abort discovery of other services
//! - A join succeeds only on HTTP 200 together with an application-level
//!   `code == 0` in the response body
//! - Already-known addresses are skipped before the handshake

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::DiscoveryConfig;
use crate::error::RelayError;
use crate::registry::EndpointRegistry;

/// A service advertisement observed by the discovery capability.
#[derive(Debug, Clone)]
pub struct ResolvedService {
    /// Stable advertised name; becomes the endpoint identity.
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Advertised txt records; the join variant reads `path` and `token`.
    pub txt: HashMap<String, String>,
}

/// Events reported by a discovery capability.
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    Resolved(ResolvedService),
    Removed(String),
    Error(String),
}

/// Optional capability advertising collectors on the local network.
///
/// Hosts without a discovery mechanism simply never install one; the relay
/// then operates on static configuration alone.
pub trait ServiceDiscovery: Send + Sync {
    /// Begin scanning for the given protocol hint. Advertisements flow
    /// through the returned channel until the capability is dropped.
    fn scan(&self, protocol: &str) -> mpsc::UnboundedReceiver<DiscoveryEvent>;
}

/// Identity presented to collectors during the join handshake.
#[derive(Debug, Clone)]
pub struct JoinIdentity {
    pub model: String,
    pub id: String,
}

impl JoinIdentity {
    /// Derive the identity from device metadata, falling back to
    /// `{systemName}v{osVersion}` and then to "unknown".
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Self {
        let model = metadata
            .get("model")
            .cloned()
            .or_else(|| {
                match (metadata.get("systemName"), metadata.get("osVersion")) {
                    (Some(system), Some(version)) => Some(format!("{system}v{version}")),
                    _ => None,
                }
            })
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            model,
            id: Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JoinResponse {
    code: i64,
}

/// Consumes discovery events and mutates the endpoint registry.
pub struct DiscoveryRunner {
    registry: Arc<EndpointRegistry>,
    client: reqwest::Client,
    config: DiscoveryConfig,
    identity: JoinIdentity,
}

impl DiscoveryRunner {
    pub fn new(
        registry: Arc<EndpointRegistry>,
        config: DiscoveryConfig,
        identity: JoinIdentity,
    ) -> Self {
        Self {
            registry,
            client: reqwest::Client::new(),
            config,
            identity,
        }
    }

    /// Start scanning and consume events until the capability closes its
    /// channel.
    pub fn spawn(self, discovery: Arc<dyn ServiceDiscovery>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut events = discovery.scan(&self.config.protocol);
            while let Some(event) = events.recv().await {
                match event {
                    DiscoveryEvent::Resolved(service) => self.handle_resolved(service).await,
                    DiscoveryEvent::Removed(name) => {
                        if self.registry.remove_identity(&name) {
                            tracing::info!(service = %name, "collector left");
                        }
                    }
                    DiscoveryEvent::Error(message) => {
                        tracing::warn!(%message, "discovery reported an error");
                    }
                }
            }
            tracing::debug!("discovery channel closed");
        })
    }

    async fn handle_resolved(&self, service: ResolvedService) {
        let (Some(path), Some(token)) = (service.txt.get("path"), service.txt.get("token"))
        else {
            tracing::debug!(service = %service.name, "advertisement lacks join records, skipping");
            return;
        };

        let address = format!("http://{}:{}", service.host, service.port);
        if self.registry.address_known(&address) {
            return;
        }

        match self.request_join(&address, path, token).await {
            Ok(true) => {
                tracing::info!(service = %service.name, %address, "collector joined");
                self.registry.insert_identity(service.name, address);
            }
            Ok(false) => {
                tracing::debug!(service = %service.name, %address, "collector declined join");
            }
            Err(err) => {
                tracing::warn!(service = %service.name, %address, error = %err, "join handshake failed");
            }
        }
    }

    /// One-shot join request. `Ok(true)` only on HTTP 200 plus `code == 0`.
    async fn request_join(
        &self,
        address: &str,
        path: &str,
        token: &str,
    ) -> Result<bool, RelayError> {
        let url = format!("{address}{path}");
        let payload = join_payload(token, &self.identity);
        let timeout = Duration::from_millis(self.config.join_timeout_ms);

        let request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json;charset=utf-8")
            .json(&payload)
            .send();

        let response = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| RelayError::JoinFailed {
                url: url.clone(),
                reason: "timeout".to_string(),
            })??;

        if response.status() != StatusCode::OK {
            return Ok(false);
        }
        let body: JoinResponse = response.json().await?;
        Ok(body.code == 0)
    }
}

/// The join payload of the token+path protocol variant. Kept in one place
/// because collector generations disagree on the exact shape.
fn join_payload(token: &str, identity: &JoinIdentity) -> Value {
    json!({
        "token": token,
        "model": identity.model,
        "id": identity.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_prefers_model_key() {
        let meta = HashMap::from([
            ("model".to_string(), "Pixel 8".to_string()),
            ("systemName".to_string(), "Android".to_string()),
        ]);
        assert_eq!(JoinIdentity::from_metadata(&meta).model, "Pixel 8");
    }

    #[test]
    fn identity_falls_back_to_system_and_version() {
        let meta = HashMap::from([
            ("systemName".to_string(), "Android".to_string()),
            ("osVersion".to_string(), "14".to_string()),
        ]);
        assert_eq!(JoinIdentity::from_metadata(&meta).model, "Androidv14");
    }

    #[test]
    fn identity_defaults_to_unknown() {
        assert_eq!(JoinIdentity::from_metadata(&HashMap::new()).model, "unknown");
    }

    #[test]
    fn join_payload_carries_token_and_identity() {
        let identity = JoinIdentity {
            model: "m".to_string(),
            id: "i".to_string(),
        };
        let payload = join_payload("t", &identity);
        assert_eq!(payload["token"], "t");
        assert_eq!(payload["model"], "m");
        assert_eq!(payload["id"], "i");
    }
}
