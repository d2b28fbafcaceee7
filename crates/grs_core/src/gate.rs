//! Pre-sim validation gate.
//!
//! A fixed ten-stage checklist runs over every candidate snap context before
//! resolution. Stages execute in order and never short-circuit: the report
//! carries every violation found across all ten stages, but a single failing
//! stage makes the terminal status a hard fail and resolution never proceeds
//! past it. The gate mutates nothing.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::{SnapContextPackage, SCP_SCHEMA_VERSION};
use crate::resources::{ResourceCatalog, ResourceType};
use crate::traits::{TraitCatalog, TraitViolation};

// ============================================================================
// Team sheets
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterPlayer {
    pub player_id: String,
    pub name: String,
    pub position: String,
}

/// Per-team gate input: who is on the roster, who fills which depth slot,
/// and which coaching policy the staff runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSheet {
    pub team_id: String,
    pub coaching_policy_id: String,
    pub roster: BTreeMap<String, RosterPlayer>,
    /// depth slot → player_id.
    pub depth_chart: BTreeMap<String, String>,
}

// ============================================================================
// Report structures
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStage {
    SchemaVersion,
    TraitCompleteness,
    RosterDepth,
    PersonnelCompatibility,
    FormationCompatibility,
    ConceptCompatibility,
    CoachingPolicy,
    ReferentialIntegrity,
    RngAvailability,
    ScpCompleteness,
}

impl GateStage {
    pub const SEQUENCE: [GateStage; 10] = [
        GateStage::SchemaVersion,
        GateStage::TraitCompleteness,
        GateStage::RosterDepth,
        GateStage::PersonnelCompatibility,
        GateStage::FormationCompatibility,
        GateStage::ConceptCompatibility,
        GateStage::CoachingPolicy,
        GateStage::ReferentialIntegrity,
        GateStage::RngAvailability,
        GateStage::ScpCompleteness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GateStage::SchemaVersion => "schema_version",
            GateStage::TraitCompleteness => "trait_completeness",
            GateStage::RosterDepth => "roster_depth",
            GateStage::PersonnelCompatibility => "personnel_compatibility",
            GateStage::FormationCompatibility => "formation_compatibility",
            GateStage::ConceptCompatibility => "concept_compatibility",
            GateStage::CoachingPolicy => "coaching_policy",
            GateStage::ReferentialIntegrity => "referential_integrity",
            GateStage::RngAvailability => "rng_availability",
            GateStage::ScpCompleteness => "scp_completeness",
        }
    }
}

/// One violation found by a stage, carrying the typed failure it maps to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub stage: GateStage,
    pub error: EngineError,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: GateStage,
    pub issues: Vec<ValidationIssue>,
}

impl StageResult {
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Pass,
    HardFail,
}

/// Ordered ten-item result. Consumed by the runtime before any resolution
/// call is permitted; no play result exists without a passing report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub stages: Vec<StageResult>,
    pub status: GateStatus,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.status == GateStatus::Pass
    }

    pub fn violations(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.stages.iter().flat_map(|s| s.issues.iter())
    }

    pub fn stage(&self, stage: GateStage) -> &StageResult {
        // SEQUENCE order is fixed, so index lookup is safe.
        &self.stages[GateStage::SEQUENCE
            .iter()
            .position(|s| *s == stage)
            .unwrap_or(0)]
    }

    /// First violation as a typed failure, for callers that need a terminal
    /// error signal alongside the full report.
    pub fn first_error(&self) -> Option<EngineError> {
        self.violations().next().map(|issue| issue.error.clone())
    }
}

// ============================================================================
// Gate
// ============================================================================

struct IssueCollector {
    stage: GateStage,
    issues: Vec<ValidationIssue>,
}

impl IssueCollector {
    fn new(stage: GateStage) -> Self {
        IssueCollector {
            stage,
            issues: Vec::new(),
        }
    }

    fn push(&mut self, error: EngineError) {
        let message = error.to_string();
        self.issues.push(ValidationIssue {
            stage: self.stage,
            error,
            message,
        });
    }

    fn finish(self) -> StageResult {
        StageResult {
            stage: self.stage,
            issues: self.issues,
        }
    }
}

pub struct PreSimGate<'a> {
    catalog: &'a ResourceCatalog,
    traits: &'a TraitCatalog,
}

impl<'a> PreSimGate<'a> {
    pub fn new(catalog: &'a ResourceCatalog, traits: &'a TraitCatalog) -> Self {
        PreSimGate { catalog, traits }
    }

    /// Run all ten stages over a candidate package and its team sheets.
    pub fn validate(
        &self,
        scp: &SnapContextPackage,
        offense: &TeamSheet,
        defense: &TeamSheet,
    ) -> ValidationReport {
        let stages = vec![
            self.schema_version(scp),
            self.trait_completeness(scp),
            self.roster_depth(scp, offense, defense),
            self.personnel_compatibility(scp),
            self.formation_compatibility(scp),
            self.concept_compatibility(scp),
            self.coaching_policy(scp, offense, defense),
            self.referential_integrity(scp),
            self.rng_availability(scp),
            self.scp_completeness(scp),
        ];
        let status = if stages.iter().all(StageResult::passed) {
            GateStatus::Pass
        } else {
            GateStatus::HardFail
        };
        ValidationReport { stages, status }
    }

    // -- stage 1 -------------------------------------------------------------

    fn schema_version(&self, scp: &SnapContextPackage) -> StageResult {
        let mut out = IssueCollector::new(GateStage::SchemaVersion);
        if scp.schema_version != SCP_SCHEMA_VERSION {
            out.push(EngineError::VersionIncompatibility {
                resource_type: "snap_context_package".into(),
                found: scp.schema_version.to_string(),
                supported: SCP_SCHEMA_VERSION.to_string(),
            });
        }
        out.finish()
    }

    // -- stage 2 -------------------------------------------------------------

    fn trait_completeness(&self, scp: &SnapContextPackage) -> StageResult {
        let mut out = IssueCollector::new(GateStage::TraitCompleteness);
        for participant in &scp.participants {
            let Some(vector) = scp.trait_vectors.get(&participant.player_id) else {
                out.push(EngineError::Completeness {
                    entity_id: participant.player_id.clone(),
                    missing: vec!["<entire trait vector>".into()],
                });
                continue;
            };
            for violation in self.traits.validate_vector(vector) {
                match violation {
                    TraitViolation::Missing { trait_code } => out.push(EngineError::Completeness {
                        entity_id: participant.player_id.clone(),
                        missing: vec![trait_code],
                    }),
                    TraitViolation::OutOfRange {
                        trait_code,
                        value,
                        min,
                        max,
                    } => out.push(EngineError::Range {
                        entity_id: participant.player_id.clone(),
                        trait_code,
                        value,
                        min,
                        max,
                    }),
                }
            }
        }
        out.finish()
    }

    // -- stage 3 -------------------------------------------------------------

    fn roster_depth(
        &self,
        scp: &SnapContextPackage,
        offense: &TeamSheet,
        defense: &TeamSheet,
    ) -> StageResult {
        let mut out = IssueCollector::new(GateStage::RosterDepth);
        for sheet in [offense, defense] {
            for (slot, player_id) in &sheet.depth_chart {
                if !sheet.roster.contains_key(player_id) {
                    out.push(EngineError::ReferentialIntegrity {
                        field_path: format!("team.{}.depth_chart.{slot}", sheet.team_id),
                        id: player_id.clone(),
                    });
                }
            }
        }
        for participant in &scp.participants {
            let sheet = if participant.team_id == offense.team_id {
                offense
            } else if participant.team_id == defense.team_id {
                defense
            } else {
                out.push(EngineError::ReferentialIntegrity {
                    field_path: "participant.team_id".into(),
                    id: participant.team_id.clone(),
                });
                continue;
            };
            if !sheet.roster.contains_key(&participant.player_id) {
                out.push(EngineError::ReferentialIntegrity {
                    field_path: format!("team.{}.roster", sheet.team_id),
                    id: participant.player_id.clone(),
                });
            }
        }
        out.finish()
    }

    // -- stage 4 -------------------------------------------------------------

    fn personnel_compatibility(&self, scp: &SnapContextPackage) -> StageResult {
        let mut out = IssueCollector::new(GateStage::PersonnelCompatibility);
        let package = match self.catalog.personnel(&scp.intent.personnel) {
            Ok(p) => p,
            Err(err) => {
                out.push(err);
                return out.finish();
            }
        };
        let mut fielded: BTreeMap<&str, u32> = BTreeMap::new();
        for participant in scp.participants_of(scp.offense_team_id()) {
            *fielded.entry(participant.role.as_str()).or_default() += 1;
        }
        for (role, required) in &package.positions {
            let actual = fielded.get(role.as_str()).copied().unwrap_or(0);
            if actual != *required {
                out.push(EngineError::Consistency(format!(
                    "personnel '{}' requires {required} {role}, offense fields {actual}",
                    package.id
                )));
            }
        }
        for role in fielded.keys() {
            if !package.positions.contains_key(*role) {
                out.push(EngineError::Consistency(format!(
                    "offense fields role '{role}' not in personnel '{}'",
                    package.id
                )));
            }
        }
        out.finish()
    }

    // -- stage 5 -------------------------------------------------------------

    fn formation_compatibility(&self, scp: &SnapContextPackage) -> StageResult {
        let mut out = IssueCollector::new(GateStage::FormationCompatibility);
        match self.catalog.formation(&scp.intent.formation) {
            Ok(formation) => {
                if !formation.allowed_personnel.contains(&scp.intent.personnel) {
                    out.push(EngineError::Consistency(format!(
                        "formation '{}' does not allow personnel '{}'",
                        formation.id, scp.intent.personnel
                    )));
                }
            }
            Err(err) => out.push(err),
        }
        out.finish()
    }

    // -- stage 6 -------------------------------------------------------------

    fn concept_compatibility(&self, scp: &SnapContextPackage) -> StageResult {
        let mut out = IssueCollector::new(GateStage::ConceptCompatibility);
        let play_type = scp.intent.play_type;
        match self.catalog.offense_concept(&scp.intent.offensive_concept) {
            Ok(concept) => {
                if !concept.play_types.contains(&play_type) {
                    out.push(EngineError::Consistency(format!(
                        "offensive concept '{}' does not support play type '{}'",
                        concept.id,
                        play_type.as_str()
                    )));
                }
                if !concept.allowed_formations.is_empty()
                    && !concept.allowed_formations.contains(&scp.intent.formation)
                {
                    out.push(EngineError::Consistency(format!(
                        "offensive concept '{}' not runnable from formation '{}'",
                        concept.id, scp.intent.formation
                    )));
                }
            }
            Err(err) => out.push(err),
        }
        match self.catalog.defense_concept(&scp.intent.defensive_concept) {
            Ok(concept) => {
                if !concept.play_types.contains(&play_type) {
                    out.push(EngineError::Consistency(format!(
                        "defensive concept '{}' does not support play type '{}'",
                        concept.id,
                        play_type.as_str()
                    )));
                }
            }
            Err(err) => out.push(err),
        }
        out.finish()
    }

    // -- stage 7 -------------------------------------------------------------

    fn coaching_policy(
        &self,
        scp: &SnapContextPackage,
        offense: &TeamSheet,
        defense: &TeamSheet,
    ) -> StageResult {
        let mut out = IssueCollector::new(GateStage::CoachingPolicy);
        for sheet in [offense, defense] {
            if let Err(err) = self.catalog.coaching_policy(&sheet.coaching_policy_id) {
                out.push(err);
            }
        }
        if let Ok(policy) = self.catalog.coaching_policy(&offense.coaching_policy_id) {
            if !policy.defaults.contains_key(&scp.intent.posture) {
                out.push(EngineError::Consistency(format!(
                    "policy '{}' defines no posture '{}'",
                    policy.id, scp.intent.posture
                )));
            }
        }
        out.finish()
    }

    // -- stage 8 -------------------------------------------------------------

    fn referential_integrity(&self, scp: &SnapContextPackage) -> StageResult {
        let mut out = IssueCollector::new(GateStage::ReferentialIntegrity);
        match self.catalog.playbook_entry_for_intent(
            scp.intent.play_type,
            &scp.intent.personnel,
            &scp.intent.formation,
            &scp.intent.offensive_concept,
            &scp.intent.defensive_concept,
        ) {
            Ok(entry) => {
                // Template validity past existence (role counts, groups) is a
                // load-time concern; here only the closure matters.
                if !self
                    .catalog
                    .contains(ResourceType::AssignmentTemplate, &entry.assignment_template_id)
                {
                    out.push(EngineError::ReferentialIntegrity {
                        field_path: format!("playbook_entry.{}.assignment_template_id", entry.id),
                        id: entry.assignment_template_id.clone(),
                    });
                }
            }
            Err(err) => out.push(err),
        }
        if let Err(err) = self.catalog.trait_influence(scp.intent.play_type.as_str()) {
            out.push(err);
        }
        out.finish()
    }

    // -- stage 9 -------------------------------------------------------------

    fn rng_availability(&self, scp: &SnapContextPackage) -> StageResult {
        let mut out = IssueCollector::new(GateStage::RngAvailability);
        let path = scp.substream.path();
        if path.is_empty() {
            // Snaps must resolve on a derived substream, never the shared root.
            out.push(EngineError::InvalidSpawnPolicy {
                scope: "snap".into(),
                spawn_id: "<root>".into(),
            });
        } else if path.split('/').any(str::is_empty) {
            out.push(EngineError::InvalidSpawnPolicy {
                scope: "snap".into(),
                spawn_id: path.to_string(),
            });
        }
        out.finish()
    }

    // -- stage 10 ------------------------------------------------------------

    fn scp_completeness(&self, scp: &SnapContextPackage) -> StageResult {
        let mut out = IssueCollector::new(GateStage::ScpCompleteness);

        if scp.participants.len() != 22 {
            out.push(EngineError::Consistency(format!(
                "snap requires exactly 22 participants, found {}",
                scp.participants.len()
            )));
        }
        let mut slots: BTreeSet<(&str, &str)> = BTreeSet::new();
        let mut teams: BTreeMap<&str, usize> = BTreeMap::new();
        for participant in &scp.participants {
            *teams.entry(participant.team_id.as_str()).or_default() += 1;
            if !slots.insert((participant.team_id.as_str(), participant.slot.as_str())) {
                out.push(EngineError::Consistency(format!(
                    "alignment slot '{}' assigned twice on team '{}'",
                    participant.slot, participant.team_id
                )));
            }
            if !scp.in_game_states.contains_key(&participant.player_id) {
                out.push(EngineError::Completeness {
                    entity_id: participant.player_id.clone(),
                    missing: vec!["in_game_state".into()],
                });
            }
        }
        if teams.len() == 2 {
            for (team_id, count) in &teams {
                if *count != 11 {
                    out.push(EngineError::Consistency(format!(
                        "team '{team_id}' fields {count} participants, expected 11"
                    )));
                }
            }
        } else if !scp.participants.is_empty() {
            out.push(EngineError::Consistency(format!(
                "snap requires exactly two teams, found {}",
                teams.len()
            )));
        }
        if !teams.contains_key(scp.situation.possession_team_id.as_str())
            && !scp.participants.is_empty()
        {
            out.push(EngineError::Consistency(format!(
                "possession team '{}' fields no participants",
                scp.situation.possession_team_id
            )));
        }

        for (player_id, state) in &scp.in_game_states {
            for (name, value) in [
                ("fatigue", state.fatigue),
                ("acute_wear", state.acute_wear),
                ("discipline_risk", state.discipline_risk),
            ] {
                if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                    out.push(EngineError::Range {
                        entity_id: player_id.clone(),
                        trait_code: name.to_string(),
                        value,
                        min: 0.0,
                        max: 1.0,
                    });
                }
            }
            if !state.confidence_tilt.is_finite() {
                out.push(EngineError::ModelDomain {
                    quantity: format!("in_game_state.{player_id}.confidence_tilt"),
                    value: state.confidence_tilt,
                });
            }
        }

        let situation = &scp.situation;
        let range_checks: [(&str, i64, i64, i64); 5] = [
            ("quarter", i64::from(situation.quarter), 1, 6),
            ("clock_seconds", i64::from(situation.clock_seconds), 0, 3600),
            ("down", i64::from(situation.down), 1, 4),
            ("distance", i64::from(situation.distance), 1, 99),
            ("yard_line", i64::from(situation.yard_line), 1, 99),
        ];
        for (name, value, min, max) in range_checks {
            if value < min || value > max {
                out.push(EngineError::Consistency(format!(
                    "situation.{name} = {value} outside [{min}, {max}]"
                )));
            }
        }
        out.finish()
    }
}
