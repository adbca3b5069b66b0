//! Device metadata capability.
//!
//! Optional collaborator describing the environment the host runs on. The
//! capability is resolved once at relay construction; absence degrades to an
//! empty map, never to a probe at call time.

use std::collections::HashMap;
use std::sync::Arc;

use crate::delivery::Record;

/// Describes the device/environment the host application runs on.
///
/// Conventional keys: `brand`, `model`, `systemName`, `osVersion`,
/// `appVersion`.
pub trait DeviceMetadata: Send + Sync {
    fn metadata(&self) -> HashMap<String, String>;
}

/// Resolve the capability once, yielding the flat metadata map.
pub(crate) fn resolve(provider: Option<&Arc<dyn DeviceMetadata>>) -> HashMap<String, String> {
    provider.map(|p| p.metadata()).unwrap_or_default()
}

/// The metadata map as the innermost record layer.
pub(crate) fn as_record(metadata: &HashMap<String, String>) -> Record {
    metadata
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl DeviceMetadata for Fixed {
        fn metadata(&self) -> HashMap<String, String> {
            HashMap::from([("model".to_string(), "Pixel 8".to_string())])
        }
    }

    #[test]
    fn missing_capability_yields_empty_map() {
        assert!(resolve(None).is_empty());
    }

    #[test]
    fn present_capability_is_queried() {
        let provider: Arc<dyn DeviceMetadata> = Arc::new(Fixed);
        let metadata = resolve(Some(&provider));
        assert_eq!(metadata.get("model").map(String::as_str), Some("Pixel 8"));
        let record = as_record(&metadata);
        assert_eq!(record["model"], serde_json::json!("Pixel 8"));
    }
}
