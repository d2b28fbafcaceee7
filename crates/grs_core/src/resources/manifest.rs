//! Pack manifests and canonical checksum computation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};

/// Top-level manifest of a resource pack document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceManifest {
    pub resource_type: String,
    pub schema_version: String,
    pub resource_version: String,
    pub generated_at: String,
    pub checksum: String,
}

/// Canonical JSON: object keys sorted, compact separators, UTF-8. The
/// checksum in a manifest is SHA-256 hex over the canonical form of the
/// pack's `resources` array, so reordering keys never changes identity while
/// any payload byte flip does.
pub fn canonical_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_default());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

pub fn payload_checksum(resources: &serde_json::Value) -> String {
    let canonical = canonical_json(resources);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Schema versions this build can load. A different major is a hard
/// incompatibility; minors within the major are accepted.
pub const SUPPORTED_SCHEMA_MAJOR: u32 = 1;

pub fn check_schema_version(resource_type: &str, schema_version: &str) -> Result<()> {
    let major = schema_version
        .split('.')
        .next()
        .and_then(|s| s.parse::<u32>().ok());
    match major {
        Some(m) if m == SUPPORTED_SCHEMA_MAJOR => Ok(()),
        _ => Err(EngineError::VersionIncompatibility {
            resource_type: resource_type.to_string(),
            found: schema_version.to_string(),
            supported: format!("{SUPPORTED_SCHEMA_MAJOR}.x"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_keys_recursively() {
        let value = json!({"b": {"z": 1, "a": [2, {"y": 3, "x": 4}]}, "a": "s"});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":"s","b":{"a":[2,{"x":4,"y":3}],"z":1}}"#
        );
    }

    #[test]
    fn checksum_changes_on_single_byte_flip() {
        let a = json!([{"id": "iz_11_base", "family": "zone_run"}]);
        let b = json!([{"id": "iz_11_basf", "family": "zone_run"}]);
        assert_ne!(payload_checksum(&a), payload_checksum(&b));
    }

    #[test]
    fn schema_version_gate() {
        assert!(check_schema_version("formation", "1.0").is_ok());
        assert!(check_schema_version("formation", "1.3").is_ok());
        let err = check_schema_version("formation", "2.0").unwrap_err();
        assert!(matches!(err, EngineError::VersionIncompatibility { .. }));
        assert!(check_schema_version("formation", "garbage").is_err());
    }
}
