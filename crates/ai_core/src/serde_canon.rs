//! Canonical JSON serialization for deterministic hashing
//!
//! Object keys are sorted recursively and output is compact, so the same
//! model always yields the same bytes and therefore the same BLAKE3 digest.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanonicalError {
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Serialize a value to canonical JSON (sorted keys, no whitespace)
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    let canonical = canonicalize(serde_json::to_value(value)?);
    Ok(serde_json::to_string(&canonical)?)
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut sorted = Map::with_capacity(entries.len());
            for (key, val) in entries {
                sorted.insert(key, canonicalize(val));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// BLAKE3 digest of raw bytes as lowercase hex
pub fn hash_bytes_hex(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

/// BLAKE3 digest of the canonical JSON form as lowercase hex
pub fn hash_canonical_hex<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    let json = to_canonical_json(value)?;
    Ok(hash_bytes_hex(json.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct LeafSummary {
        support: u32,
        label: String,
        confidence: f32,
    }

    fn summary(support: u32) -> LeafSummary {
        LeafSummary {
            support,
            label: "A".to_string(),
            confidence: 0.5,
        }
    }

    #[test]
    fn test_keys_are_sorted_and_compact() {
        let json = to_canonical_json(&summary(3)).unwrap();
        assert_eq!(json, r#"{"confidence":0.5,"label":"A","support":3}"#);
    }

    #[test]
    fn test_hash_map_order_does_not_leak() {
        let mut first = HashMap::new();
        let mut second = HashMap::new();
        for letter in ["Y", "B", "K", "A"] {
            first.insert(letter, 1);
        }
        for letter in ["A", "K", "B", "Y"] {
            second.insert(letter, 1);
        }

        assert_eq!(
            hash_canonical_hex(&first).unwrap(),
            hash_canonical_hex(&second).unwrap()
        );
    }

    #[test]
    fn test_hash_changes_with_data() {
        let h1 = hash_canonical_hex(&summary(3)).unwrap();
        let h2 = hash_canonical_hex(&summary(4)).unwrap();
        assert_ne!(h1, h2);
        assert_eq!(h1.len(), 64);
    }
}
