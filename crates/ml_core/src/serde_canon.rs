//! Canonical JSON serialization for artifact fingerprints
//!
//! Provides canonical JSON serialization with:
//! - Sorted map keys so hash maps fingerprint identically
//! - No whitespace or pretty-printing
//! - Blake3 hashing for artifact verification

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanonicalError {
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Serialize a value to canonical JSON (sorted keys, no whitespace)
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    let json_value = serde_json::to_value(value)
        .map_err(|e| CanonicalError::SerializationError(e.to_string()))?;

    let canonical = canonicalize_value(&json_value);
    serde_json::to_string(&canonical).map_err(|e| CanonicalError::SerializationError(e.to_string()))
}

/// Canonicalize a JSON value by sorting all object keys recursively
fn canonicalize_value(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut btree = BTreeMap::new();
            for (k, v) in map {
                btree.insert(k.clone(), canonicalize_value(v));
            }
            serde_json::Value::Object(btree.into_iter().collect())
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(canonicalize_value).collect())
        }
        other => other.clone(),
    }
}

/// Compute Blake3 hash of canonical JSON representation
pub fn hash_canonical<T: Serialize>(value: &T) -> Result<[u8; 32], CanonicalError> {
    let json = to_canonical_json(value)?;
    let hash = blake3::hash(json.as_bytes());
    Ok(*hash.as_bytes())
}

/// Compute Blake3 hash and return as hex string
pub fn hash_canonical_hex<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    let hash = hash_canonical(value)?;
    Ok(hex::encode(hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct Encoded {
        global_median: f64,
        te_dict: HashMap<String, f64>,
    }

    fn sample(order: &[(&str, f64)]) -> Encoded {
        Encoded {
            global_median: 900.0,
            te_dict: order.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let json = to_canonical_json(&sample(&[("Tractor", 1200.0), ("Harvester", 2500.0)]))
            .unwrap();
        let g = json.find("global_median").unwrap();
        let t = json.find("te_dict").unwrap();
        assert!(g < t);
        assert!(json.find("Harvester").unwrap() < json.find("Tractor").unwrap());
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_hash_independent_of_map_order() {
        let a = sample(&[("Tractor", 1200.0), ("Harvester", 2500.0), ("Rotavator", 600.0)]);
        let b = sample(&[("Rotavator", 600.0), ("Tractor", 1200.0), ("Harvester", 2500.0)]);
        let ha = hash_canonical_hex(&a).unwrap();
        assert_eq!(ha, hash_canonical_hex(&b).unwrap());
        assert_eq!(ha.len(), 64);
    }

    #[test]
    fn test_hash_changes_with_data() {
        let a = sample(&[("Tractor", 1200.0)]);
        let b = sample(&[("Tractor", 1201.0)]);
        assert_ne!(hash_canonical_hex(&a).unwrap(), hash_canonical_hex(&b).unwrap());
    }
}
