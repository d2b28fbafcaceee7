//! Trait canon and player trait vector validation.
//!
//! The canon is a versioned, capability-driven catalog of atomic player
//! attributes. `core_now` traits are actively consumed by resolution math;
//! `reserved_phasal` traits are schema-reserved for later phases and are not
//! range-enforced until promoted. Any add/remove/rename of a trait requires a
//! catalog version bump.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};

pub const TRAIT_CATALOG_VERSION: &str = "1.0";
pub const TRAIT_MIN: f64 = 1.0;
pub const TRAIT_MAX: f64 = 99.0;

/// Whether a trait participates in resolution math today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitStatus {
    CoreNow,
    ReservedPhasal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitDefinition {
    pub trait_code: String,
    pub category: String,
    pub status: TraitStatus,
    pub min_value: f64,
    pub max_value: f64,
    /// Traits in the same overlap group measure adjacent capability and are
    /// checked for accidental duplication at catalog load.
    pub overlap_group: Option<String>,
}

/// Canonical trait table: (code, category, overlap group).
///
/// Mirrors the shipped trait canon one-to-one; ordering here is the canonical
/// catalog ordering.
const TRAIT_DEFS: &[(&str, &str, Option<&str>)] = &[
    ("strength", "athletic", None),
    ("burst", "athletic", Some("speed_profile")),
    ("top_speed", "athletic", Some("speed_profile")),
    ("acceleration", "athletic", Some("speed_profile")),
    ("agility", "athletic", None),
    ("balance", "athletic", None),
    ("stamina", "athletic", None),
    ("body_control", "movement", None),
    ("leverage_control", "movement", None),
    ("momentum_management", "movement", None),
    ("pursuit_angles", "movement", None),
    ("awareness", "cognition", None),
    ("processing_speed", "cognition", None),
    ("recognition", "cognition", None),
    ("anticipation", "cognition", None),
    ("discipline", "cognition", None),
    ("decision_quality", "cognition", None),
    ("communication", "cognition", Some("communication")),
    ("communication_secondary", "cognition", Some("communication")),
    ("composure", "cognition", None),
    ("short_accuracy", "qb", Some("accuracy")),
    ("intermediate_accuracy", "qb", Some("accuracy")),
    ("deep_accuracy", "qb", Some("accuracy")),
    ("throw_power", "qb", None),
    ("throw_touch", "qb", None),
    ("release_quickness", "qb", None),
    ("pocket_sense", "qb", None),
    ("timing_precision", "qb", None),
    ("play_action_craft", "qb", None),
    ("blitz_identification", "qb", None),
    ("cadence_control", "qb", None),
    ("snap_operation", "qb", None),
    ("hands", "ball", None),
    ("catch_radius", "ball", None),
    ("contested_catch", "ball", None),
    ("ball_tracking", "ball", None),
    ("route_fidelity", "ball", None),
    ("release_quality", "ball", None),
    ("yac_vision", "ball", None),
    ("ball_security", "ball", None),
    ("pass_set", "blocking", None),
    ("hand_placement", "blocking", None),
    ("mirror_skill", "blocking", None),
    ("anchor", "blocking", None),
    ("recovery_blocking", "blocking", None),
    ("run_block_drive", "blocking", None),
    ("run_block_positioning", "blocking", None),
    ("combo_coordination", "blocking", None),
    ("get_off", "front7", None),
    ("hand_fighting", "front7", None),
    ("rush_plan_diversity", "front7", None),
    ("edge_contain", "front7", None),
    ("block_shed", "front7", Some("shed")),
    ("gap_integrity", "front7", None),
    ("stack_shed", "front7", Some("shed")),
    ("closing_speed", "front7", None),
    ("tackle_power", "front7", Some("tackling")),
    ("tackle_form", "front7", Some("tackling")),
    ("man_footwork", "coverage", None),
    ("route_match_skill", "coverage", None),
    ("leverage_management", "coverage", None),
    ("transition_speed", "coverage", None),
    ("ball_skills_defense", "coverage", None),
    ("press_technique", "coverage", None),
    ("jam_strength", "coverage", None),
    ("recovery_speed", "coverage", None),
    ("dpi_risk_control", "coverage", None),
    ("kick_power", "special_teams", None),
    ("kick_accuracy", "special_teams", None),
    ("hang_time_control", "special_teams", None),
    ("soft_tissue_risk", "availability", Some("injury_risk")),
    ("contact_injury_risk", "availability", Some("injury_risk")),
    ("re_injury_risk", "availability", Some("injury_risk")),
    ("durability", "availability", None),
    ("pain_tolerance", "availability", None),
    ("recovery_rate", "availability", None),
    ("volatility_profile", "availability", None),
];

/// Codes carried in the schema today but not yet consumed by resolution math.
const RESERVED_PHASAL: &[&str] = &[
    "play_action_craft",
    "cadence_control",
    "snap_operation",
    "jam_strength",
    "volatility_profile",
];

/// One trait violation found while validating a player vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TraitViolation {
    Missing {
        trait_code: String,
    },
    OutOfRange {
        trait_code: String,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Versioned, immutable trait catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitCatalog {
    version: String,
    defs: BTreeMap<String, TraitDefinition>,
}

impl TraitCatalog {
    /// Build the canonical catalog. Hard-fails if two entries share a trait
    /// code, or if a code is duplicated inside one overlap group.
    pub fn canonical() -> Result<Self> {
        let mut defs: BTreeMap<String, TraitDefinition> = BTreeMap::new();
        let mut seen_overlap: BTreeMap<(String, String), ()> = BTreeMap::new();
        for (code, category, overlap) in TRAIT_DEFS {
            let status = if RESERVED_PHASAL.contains(code) {
                TraitStatus::ReservedPhasal
            } else {
                TraitStatus::CoreNow
            };
            if let Some(group) = overlap {
                // A code may only appear once per overlap group.
                if seen_overlap
                    .insert((group.to_string(), code.to_string()), ())
                    .is_some()
                {
                    return Err(EngineError::Schema {
                        scope: "trait_catalog".into(),
                        message: format!("duplicate code '{code}' in overlap group '{group}'"),
                    });
                }
            }
            let def = TraitDefinition {
                trait_code: code.to_string(),
                category: category.to_string(),
                status,
                min_value: TRAIT_MIN,
                max_value: TRAIT_MAX,
                overlap_group: overlap.map(str::to_string),
            };
            if defs.insert(code.to_string(), def).is_some() {
                return Err(EngineError::Schema {
                    scope: "trait_catalog".into(),
                    message: format!("duplicate trait_code '{code}'"),
                });
            }
        }
        Ok(TraitCatalog {
            version: TRAIT_CATALOG_VERSION.to_string(),
            defs,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn get(&self, trait_code: &str) -> Option<&TraitDefinition> {
        self.defs.get(trait_code)
    }

    pub fn contains(&self, trait_code: &str) -> bool {
        self.defs.contains_key(trait_code)
    }

    pub fn core_now_codes(&self) -> impl Iterator<Item = &str> {
        self.defs
            .values()
            .filter(|d| d.status == TraitStatus::CoreNow)
            .map(|d| d.trait_code.as_str())
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }

    /// Validate one player trait vector against the catalog, returning every
    /// violation. Every `core_now` trait must be present and in range.
    /// `reserved_phasal` traits must be present (schema-required) but are not
    /// range-enforced until promoted.
    pub fn validate_vector(&self, vector: &BTreeMap<String, f64>) -> Vec<TraitViolation> {
        let mut violations = Vec::new();
        for def in self.defs.values() {
            match vector.get(&def.trait_code) {
                None => violations.push(TraitViolation::Missing {
                    trait_code: def.trait_code.clone(),
                }),
                Some(&value) => {
                    if def.status == TraitStatus::CoreNow
                        && (!value.is_finite() || value < def.min_value || value > def.max_value)
                    {
                        violations.push(TraitViolation::OutOfRange {
                            trait_code: def.trait_code.clone(),
                            value,
                            min: def.min_value,
                            max: def.max_value,
                        });
                    }
                }
            }
        }
        violations
    }

    /// Strict form used inside resolution: first violation becomes a typed
    /// hard fail for `player_id`.
    pub fn check_vector(&self, player_id: &str, vector: &BTreeMap<String, f64>) -> Result<()> {
        let violations = self.validate_vector(vector);
        match violations.into_iter().next() {
            None => Ok(()),
            Some(TraitViolation::Missing { trait_code }) => Err(EngineError::Completeness {
                entity_id: player_id.to_string(),
                missing: vec![trait_code],
            }),
            Some(TraitViolation::OutOfRange {
                trait_code,
                value,
                min,
                max,
            }) => Err(EngineError::Range {
                entity_id: player_id.to_string(),
                trait_code,
                value,
                min,
                max,
            }),
        }
    }
}

/// Deterministically derive a full trait vector from identity truths.
///
/// Hash-jittered around `overall_truth`, with availability risks inverted
/// from susceptibility. Used by fixtures and roster bootstrap; values
/// leaving the trait domain are a hard fail, not a clamp.
pub fn generate_player_traits(
    player_id: &str,
    position: &str,
    overall_truth: f64,
    volatility_truth: f64,
    injury_susceptibility_truth: f64,
) -> Result<BTreeMap<String, f64>> {
    let mut traits = BTreeMap::new();
    for (code, _, _) in TRAIT_DEFS {
        let mut hasher = Sha256::new();
        hasher.update(format!("{player_id}:{position}:{code}").as_bytes());
        let digest = hasher.finalize();
        let word = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        let jitter = (word as f64 / u32::MAX as f64) * 10.0 - 5.0;

        let mut base = overall_truth + jitter;
        if code.ends_with("risk") {
            base = (100.0 - injury_susceptibility_truth * 100.0) + jitter;
        }
        if *code == "volatility_profile" {
            base = (100.0 - volatility_truth * 100.0) + jitter;
        }

        let value = (base * 1000.0).round() / 1000.0;
        if !(TRAIT_MIN..=TRAIT_MAX).contains(&value) {
            return Err(EngineError::ModelDomain {
                quantity: format!("derived trait '{code}' for '{player_id}'"),
                value,
            });
        }
        traits.insert(code.to_string(), value);
    }
    Ok(traits)
}
