//! Snap Context Package: the frozen input bundle for resolving one play.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::rng::SubstreamHandle;

/// Schema version of the snap context contract itself.
pub const SCP_SCHEMA_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayType {
    Run,
    Pass,
    Punt,
    Kickoff,
    FieldGoal,
    ExtraPoint,
    TwoPoint,
}

impl PlayType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayType::Run => "run",
            PlayType::Pass => "pass",
            PlayType::Punt => "punt",
            PlayType::Kickoff => "kickoff",
            PlayType::FieldGoal => "field_goal",
            PlayType::ExtraPoint => "extra_point",
            PlayType::TwoPoint => "two_point",
        }
    }

    pub fn all() -> &'static [PlayType] {
        &[
            PlayType::Run,
            PlayType::Pass,
            PlayType::Punt,
            PlayType::Kickoff,
            PlayType::FieldGoal,
            PlayType::ExtraPoint,
            PlayType::TwoPoint,
        ]
    }
}

/// Caller mode. The identical resolver function serves all three; only
/// downstream consumption of detail differs (mode invariance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimMode {
    Play,
    Sim,
    Offscreen,
}

impl SimMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimMode::Play => "play",
            SimMode::Sim => "sim",
            SimMode::Offscreen => "offscreen",
        }
    }
}

/// Game situation at the snap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Situation {
    pub quarter: u8,
    pub clock_seconds: i32,
    pub down: u8,
    pub distance: u8,
    /// Offense-relative spot, 1..=99 (99 = one yard out).
    pub yard_line: u8,
    pub possession_team_id: String,
    pub score_diff: i32,
    pub timeouts_offense: u8,
    pub timeouts_defense: u8,
}

/// One of the exactly 22 participants on the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub player_id: String,
    pub team_id: String,
    /// Position role (QB, RB, OL, CB, ...).
    pub role: String,
    /// Alignment slot (QB1, LT, CB2, ...); disjoint across the package.
    pub slot: String,
}

/// Personnel position role for a depth/alignment slot. Numbered slots drop
/// their ordinal ("WR2" → "WR"), side-suffixed slots drop the side
/// ("GUN_L" → "GUN"), and the five interior line slots collapse to "OL".
pub fn position_for_slot(slot: &str) -> String {
    if matches!(slot, "LT" | "LG" | "C" | "RG" | "RT") {
        return "OL".to_string();
    }
    let base = slot
        .strip_suffix("_L")
        .or_else(|| slot.strip_suffix("_R"))
        .unwrap_or(slot);
    base.trim_end_matches(|c: char| c.is_ascii_digit()).to_string()
}

/// Per-participant in-game state, frozen for the duration of the snap.
/// Mutated only by external lifecycle processes between snaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InGameState {
    pub fatigue: f64,
    pub acute_wear: f64,
    pub confidence_tilt: f64,
    pub injury_limitation: String,
    pub discipline_risk: f64,
}

/// Parameterized intent: what the caller wants to run, never raw movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterizedIntent {
    pub personnel: String,
    pub formation: String,
    pub offensive_concept: String,
    pub defensive_concept: String,
    pub posture: String,
    pub play_type: PlayType,
}

/// Frozen input bundle for one snap. Built fresh per snap; immutable once the
/// pre-sim gate passes. Carries its own RNG substream handle so resolution is
/// reproducible from the package alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapContextPackage {
    pub schema_version: u8,
    pub game_id: String,
    pub play_id: String,
    pub mode: SimMode,
    pub situation: Situation,
    pub participants: Vec<ParticipantRecord>,
    pub in_game_states: BTreeMap<String, InGameState>,
    pub trait_vectors: BTreeMap<String, BTreeMap<String, f64>>,
    pub intent: ParameterizedIntent,
    pub substream: SubstreamHandle,
    #[serde(default)]
    pub weather_flags: Vec<String>,
}

impl SnapContextPackage {
    /// Offense/defense split derived from possession. Exactly two teams is a
    /// gate invariant; this accessor assumes a validated package.
    pub fn offense_team_id(&self) -> &str {
        &self.situation.possession_team_id
    }

    pub fn defense_team_id(&self) -> Option<&str> {
        self.participants
            .iter()
            .map(|p| p.team_id.as_str())
            .find(|t| *t != self.situation.possession_team_id)
    }

    pub fn participants_of(&self, team_id: &str) -> Vec<&ParticipantRecord> {
        self.participants
            .iter()
            .filter(|p| p.team_id == team_id)
            .collect()
    }
}
