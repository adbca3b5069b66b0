//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! toml string (host-provided)
//!     → from_toml_str (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → handed to LogRelay at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the relay is constructed; runtime knobs
//!   (timeout, base data, static collector) have dedicated setters instead
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod schema;
pub mod validation;

pub use schema::{DeliveryConfig, DiscoveryConfig, FilterConfig, RelayConfig};

use crate::error::RelayError;

impl RelayConfig {
    /// Parse and validate a configuration from a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, RelayError> {
        let config: RelayConfig = toml::from_str(source)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
