//! Typed resource payloads.
//!
//! Heterogeneous resource shapes are tagged variants keyed by resource type,
//! each with its own schema validated at load. There is no open-ended dynamic
//! field access and no implicit defaulting for required fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::PlayType;
use crate::resolver::phase::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    PersonnelPackage,
    Formation,
    ConceptOffense,
    ConceptDefense,
    CoachingPolicy,
    TraitInfluenceProfile,
    PlaybookEntry,
    AssignmentTemplate,
    RulesProfile,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::PersonnelPackage => "personnel_package",
            ResourceType::Formation => "formation",
            ResourceType::ConceptOffense => "concept_offense",
            ResourceType::ConceptDefense => "concept_defense",
            ResourceType::CoachingPolicy => "coaching_policy",
            ResourceType::TraitInfluenceProfile => "trait_influence_profile",
            ResourceType::PlaybookEntry => "playbook_entry",
            ResourceType::AssignmentTemplate => "assignment_template",
            ResourceType::RulesProfile => "rules_profile",
        }
    }
}

/// On-field grouping a personnel package demands, by position role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonnelPackage {
    pub id: String,
    pub label: String,
    /// role → required count; must sum to 11.
    pub positions: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormationDef {
    pub id: String,
    pub label: String,
    pub allowed_personnel: Vec<String>,
    /// Alignment slots, exactly 11.
    pub slots: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptDef {
    pub id: String,
    pub label: String,
    pub play_types: Vec<PlayType>,
    /// Offensive concepts restrict formations; empty means unrestricted
    /// (defensive concepts key off play type only).
    #[serde(default)]
    pub allowed_formations: Vec<String>,
}

/// What a coaching posture calls by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostureDefaults {
    pub personnel: String,
    pub formation_run: String,
    pub formation_pass: String,
    pub offense_run: String,
    pub offense_pass: String,
    pub defense_base: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoachingPolicy {
    pub id: String,
    pub label: String,
    pub defaults: BTreeMap<String, PostureDefaults>,
    pub playbook_by_posture: BTreeMap<String, Vec<String>>,
}

/// Per-family trait influence profile for one play type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyProfile {
    pub family: String,
    pub offense_weights: BTreeMap<String, f64>,
    pub defense_weights: BTreeMap<String, f64>,
    pub fatigue_sensitivity: f64,
    pub wear_sensitivity: f64,
    #[serde(default)]
    pub context_modifiers: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeProfile {
    pub noise_scale: f64,
    pub explosive_threshold: i32,
    pub turnover_scale: f64,
    pub score_scale: f64,
    pub clock_delta_min: i32,
    pub clock_delta_max: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitInfluenceProfile {
    /// Resource id doubles as the play type key.
    pub id: String,
    pub families: Vec<FamilyProfile>,
    pub outcome_profile: OutcomeProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookEntry {
    pub id: String,
    pub play_type: PlayType,
    pub family: String,
    pub personnel_id: String,
    pub formation_id: String,
    pub offensive_concept_id: String,
    pub defensive_concept_id: String,
    pub assignment_template_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

///// One resource-defined contest pairing: which roles meet in which phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestGroup {
    pub phase: Phase,
    pub family: String,
    pub offense_roles: Vec<String>,
    pub defense_roles: Vec<String>,
    pub group_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentTemplate {
    pub id: String,
    pub offense_roles: Vec<String>,
    pub defense_roles: Vec<String>,
    pub default_technique: String,
    pub contest_groups: Vec<ContestGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesProfile {
    pub id: String,
    pub quarters: u8,
    pub quarter_seconds: i32,
    pub overtime_seconds: i32,
    pub max_downs: u8,
    pub first_down_distance: u8,
}

/// Tagged payload variants, keyed by [`ResourceType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourcePayload {
    PersonnelPackage(PersonnelPackage),
    Formation(FormationDef),
    ConceptOffense(ConceptDef),
    ConceptDefense(ConceptDef),
    CoachingPolicy(CoachingPolicy),
    TraitInfluenceProfile(TraitInfluenceProfile),
    PlaybookEntry(PlaybookEntry),
    AssignmentTemplate(AssignmentTemplate),
    RulesProfile(RulesProfile),
}

impl ResourcePayload {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ResourcePayload::PersonnelPackage(_) => ResourceType::PersonnelPackage,
            ResourcePayload::Formation(_) => ResourceType::Formation,
            ResourcePayload::ConceptOffense(_) => ResourceType::ConceptOffense,
            ResourcePayload::ConceptDefense(_) => ResourceType::ConceptDefense,
            ResourcePayload::CoachingPolicy(_) => ResourceType::CoachingPolicy,
            ResourcePayload::TraitInfluenceProfile(_) => ResourceType::TraitInfluenceProfile,
            ResourcePayload::PlaybookEntry(_) => ResourceType::PlaybookEntry,
            ResourcePayload::AssignmentTemplate(_) => ResourceType::AssignmentTemplate,
            ResourcePayload::RulesProfile(_) => ResourceType::RulesProfile,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ResourcePayload::PersonnelPackage(p) => &p.id,
            ResourcePayload::Formation(p) => &p.id,
            ResourcePayload::ConceptOffense(p) | ResourcePayload::ConceptDefense(p) => &p.id,
            ResourcePayload::CoachingPolicy(p) => &p.id,
            ResourcePayload::TraitInfluenceProfile(p) => &p.id,
            ResourcePayload::PlaybookEntry(p) => &p.id,
            ResourcePayload::AssignmentTemplate(p) => &p.id,
            ResourcePayload::RulesProfile(p) => &p.id,
        }
    }
}

/// Versioned, read-only resource record: manifest identity plus typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceBundle {
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub schema_version: String,
    pub resource_version: String,
    pub checksum: String,
    pub generated_at: String,
    pub payload: ResourcePayload,
}
