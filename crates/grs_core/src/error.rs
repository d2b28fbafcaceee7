use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Non-recoverable engine failures.
///
/// Every variant is terminal at the point of detection: no retry, no default
/// substitution, no partial continuation. Callers are expected to emit a
/// forensic artifact (see [`crate::forensic`]) and restart from a freshly
/// validated snap context.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineError {
    #[error("schema error in {scope}: {message}")]
    Schema { scope: String, message: String },

    #[error("checksum mismatch for {resource_type}: expected {expected}, found {found}")]
    Checksum {
        resource_type: String,
        expected: String,
        found: String,
    },

    #[error("schema version incompatible for {resource_type}: found {found}, supported {supported}")]
    VersionIncompatibility {
        resource_type: String,
        found: String,
        supported: String,
    },

    #[error("completeness violation for '{entity_id}': missing {missing:?}")]
    Completeness {
        entity_id: String,
        missing: Vec<String>,
    },

    #[error("trait '{trait_code}' out of range for '{entity_id}': {value} outside [{min}, {max}]")]
    Range {
        entity_id: String,
        trait_code: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("referential integrity violation at {field_path}: unknown id '{id}'")]
    ReferentialIntegrity { field_path: String, id: String },

    #[error("consistency violation: {0}")]
    Consistency(String),

    #[error("contest input error: {0}")]
    ContestInput(String),

    #[error("model domain violation: {quantity} = {value} is outside its physical domain")]
    ModelDomain { quantity: String, value: f64 },

    #[error("invalid spawn policy: substream '{spawn_id}' already derived in scope '{scope}'")]
    InvalidSpawnPolicy { scope: String, spawn_id: String },

    #[error("causality order violation: {0}")]
    CausalityOrder(String),

    #[error("forensic emission failed: {0}")]
    ForensicEmission(String),
}

impl EngineError {
    /// Stable error code used in forensic artifacts and external responses.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Schema { .. } => "SCHEMA_ERROR",
            EngineError::Checksum { .. } => "CHECKSUM_MISMATCH",
            EngineError::VersionIncompatibility { .. } => "VERSION_INCOMPATIBLE",
            EngineError::Completeness { .. } => "COMPLETENESS_VIOLATION",
            EngineError::Range { .. } => "TRAIT_OUT_OF_RANGE",
            EngineError::ReferentialIntegrity { .. } => "REFERENTIAL_INTEGRITY",
            EngineError::Consistency(_) => "CONSISTENCY_VIOLATION",
            EngineError::ContestInput(_) => "CONTEST_INPUT_ERROR",
            EngineError::ModelDomain { .. } => "MODEL_DOMAIN_ERROR",
            EngineError::InvalidSpawnPolicy { .. } => "INVALID_SPAWN_POLICY",
            EngineError::CausalityOrder(_) => "CAUSALITY_ORDER_ERROR",
            EngineError::ForensicEmission(_) => "FORENSIC_EMISSION_FAILED",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Domain check for values that must stay inside the closed unit interval.
/// Out-of-domain intermediates are hard fails, never forced into range.
pub fn ensure_unit_interval(quantity: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(EngineError::ModelDomain {
            quantity: quantity.to_string(),
            value,
        });
    }
    Ok(value)
}

/// Domain check for values that only need to be finite.
pub fn ensure_finite(quantity: &str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(EngineError::ModelDomain {
            quantity: quantity.to_string(),
            value,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_interval_rejects_out_of_domain() {
        assert!(ensure_unit_interval("p", 0.0).is_ok());
        assert!(ensure_unit_interval("p", 1.0).is_ok());
        let err = ensure_unit_interval("completion_probability", 1.2).unwrap_err();
        assert_eq!(err.code(), "MODEL_DOMAIN_ERROR");
        assert!(ensure_unit_interval("p", f64::NAN).is_err());
    }

    #[test]
    fn error_codes_are_stable() {
        let err = EngineError::InvalidSpawnPolicy {
            scope: "snap".into(),
            spawn_id: "terminal".into(),
        };
        assert_eq!(err.code(), "INVALID_SPAWN_POLICY");
    }
}
