//! Outbound record construction.
//!
//! Records are plain JSON objects merged from layers (device metadata,
//! caller base data, event payload). The helpers here turn value kinds that
//! have no JSON representation into representable ones, so delivery can
//! never fail purely because of payload shape.

use serde_json::{Map, Number, Value};

/// An outbound key/value record.
pub type Record = Map<String, Value>;

/// Merge layers left to right; later layers win per key.
pub fn merge(layers: &[&Record]) -> Record {
    let mut merged = Record::new();
    for layer in layers {
        for (key, value) in layer.iter() {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// A float as a JSON value; non-finite floats become their string form
/// instead of poisoning serialization.
pub fn float_value(value: f64) -> Value {
    match Number::from_f64(value) {
        Some(n) => Value::Number(n),
        None => Value::String(value.to_string()),
    }
}

/// An error as its descriptive string.
pub fn error_value(error: &(dyn std::error::Error + 'static)) -> Value {
    Value::String(error.to_string())
}

/// Raw bytes read to text, lossily.
pub fn text_value(bytes: &[u8]) -> Value {
    Value::String(String::from_utf8_lossy(bytes).into_owned())
}

/// Convenience for building a record from string keys and JSON values.
pub fn record_from<I>(entries: I) -> Record
where
    I: IntoIterator<Item = (&'static str, Value)>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layer(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn later_layers_win() {
        let inner = layer(&[("a", json!(1)), ("b", json!("base"))]);
        let outer = layer(&[("b", json!("event"))]);
        let merged = merge(&[&inner, &outer]);
        assert_eq!(merged["a"], json!(1));
        assert_eq!(merged["b"], json!("event"));
    }

    #[test]
    fn non_finite_floats_become_strings() {
        assert_eq!(float_value(1.5), json!(1.5));
        assert_eq!(float_value(f64::NAN), json!("NaN"));
        assert_eq!(float_value(f64::INFINITY), json!("inf"));
    }

    #[test]
    fn errors_become_their_description() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(error_value(&err), json!("boom"));
    }

    #[test]
    fn invalid_utf8_is_read_lossily() {
        let value = text_value(&[0x68, 0x69, 0xff]);
        assert_eq!(value, json!("hi\u{fffd}"));
    }
}
