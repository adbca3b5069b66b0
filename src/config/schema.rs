//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config sources.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Request exclusion rules.
    pub filter: FilterConfig,

    /// Outbound delivery settings.
    pub delivery: DeliveryConfig,

    /// Collector discovery settings.
    pub discovery: DiscoveryConfig,
}

/// Exclusion rules applied when a request is opened.
///
/// A request matching any one criterion is fully excluded: it never enters
/// the in-flight table and never reaches listeners.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FilterConfig {
    /// Exact hosts to exclude, e.g. `services.test.com`.
    pub ignored_hosts: HashSet<String>,

    /// Exact URLs to exclude, e.g. `https://services.test.com/test`.
    pub ignored_urls: HashSet<String>,

    /// Patterns matched against `"{METHOD} {URL}"`,
    /// e.g. `^GET https://test\.com/pages/.*$`.
    pub ignored_patterns: Vec<String>,

    /// Install the transport hook even if another interceptor
    /// (e.g. a debugging tool) is already active.
    pub force_enable: bool,
}

/// Outbound delivery settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Static collector address. `None` means discovery-only operation.
    pub base_url: Option<String>,

    /// Per-endpoint delivery timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 30_000,
        }
    }
}

/// Collector discovery settings.
///
/// The join payload shape is a protocol detail of the collector generation
/// in use, not a fixed contract; the fields here parameterize it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Consume advertisements when a discovery capability is installed.
    pub enabled: bool,

    /// Protocol hint handed to the discovery capability's scan.
    pub protocol: String,

    /// Join handshake timeout in milliseconds.
    pub join_timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            protocol: "http".to_string(),
            join_timeout_ms: 5_000,
        }
    }
}
