//! Error definitions for the relay.
//!
//! Only setup-time operations (configuration, hook installation, the join
//! handshake) surface these. Everything downstream degrades to
//! log-and-continue: observability infrastructure must never be the reason
//! the host crashes.

use thiserror::Error;

/// Errors returned by the relay's fallible public operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Another transport hook is already active and `force_enable` is off.
    #[error("transport hook already in use by another interceptor")]
    HookBusy,

    /// The transport hook rejected installation.
    #[error("hook installation failed: {0}")]
    Hook(String),

    /// A discovered collector declined or failed the join handshake.
    #[error("join handshake with {url} failed: {reason}")]
    JoinFailed { url: String, reason: String },

    /// Configuration failed semantic validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration source could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Outbound HTTP failure during a join handshake.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
