//! Official play results and next-state deltas.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnoverType {
    Interception,
    Fumble,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreEvent {
    Touchdown,
    FieldGoalGood,
    FieldGoalMiss,
    ExtraPointGood,
    ExtraPointMiss,
    TwoPointGood,
    TwoPointFail,
    ReturnTouchdown,
    Safety,
}

impl ScoreEvent {
    /// Points awarded, from the offense's perspective unless the event
    /// belongs to the return/defense side.
    pub fn points(&self) -> i32 {
        match self {
            ScoreEvent::Touchdown | ScoreEvent::ReturnTouchdown => 6,
            ScoreEvent::FieldGoalGood => 3,
            ScoreEvent::TwoPointGood | ScoreEvent::Safety => 2,
            ScoreEvent::ExtraPointGood => 1,
            ScoreEvent::FieldGoalMiss
            | ScoreEvent::ExtraPointMiss
            | ScoreEvent::TwoPointFail => 0,
        }
    }

    pub fn scores_for_defense(&self) -> bool {
        matches!(self, ScoreEvent::ReturnTouchdown | ScoreEvent::Safety)
    }
}

/// The single terminal event a snap resolves to; also the head of the
/// causality chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalEvent {
    Interception,
    Fumble,
    Touchdown,
    ReturnTouchdown,
    Safety,
    FieldGoalGood,
    FieldGoalMiss,
    ExtraPointGood,
    ExtraPointMiss,
    TwoPointGood,
    TwoPointFail,
    FirstDown,
    NegativePlay,
    NormalPlay,
    Incompletion,
}

impl TerminalEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalEvent::Interception => "interception",
            TerminalEvent::Fumble => "fumble",
            TerminalEvent::Touchdown => "touchdown",
            TerminalEvent::ReturnTouchdown => "return_touchdown",
            TerminalEvent::Safety => "safety",
            TerminalEvent::FieldGoalGood => "field_goal_good",
            TerminalEvent::FieldGoalMiss => "field_goal_miss",
            TerminalEvent::ExtraPointGood => "extra_point_good",
            TerminalEvent::ExtraPointMiss => "extra_point_miss",
            TerminalEvent::TwoPointGood => "two_point_good",
            TerminalEvent::TwoPointFail => "two_point_fail",
            TerminalEvent::FirstDown => "first_down",
            TerminalEvent::NegativePlay => "negative_play",
            TerminalEvent::NormalPlay => "normal_play",
            TerminalEvent::Incompletion => "incompletion",
        }
    }
}

/// Penalty surfaced during resolution, with its enforcement rationale kept
/// for the film room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyArtifact {
    pub code: String,
    pub against_team_id: String,
    pub yards: i32,
    pub enforcement_rationale: String,
}

/// Official result of one snap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayResult {
    pub play_id: String,
    pub outcome: TerminalEvent,
    pub yards: i32,
    pub new_spot: u8,
    pub turnover: Option<TurnoverType>,
    pub score_event: Option<ScoreEvent>,
    pub penalties: Vec<PenaltyArtifact>,
    pub clock_delta: i32,
    pub next_down: u8,
    pub next_distance: u8,
    pub next_possession_team_id: String,
}

/// Rules adjudication applied over the raw terminal outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesAdjudication {
    pub score_event: Option<ScoreEvent>,
    pub enforcement_notes: Vec<String>,
    pub next_down: u8,
    pub next_distance: u8,
    pub next_possession_team_id: String,
    pub clock_delta: i32,
}

/// Everything the session layer needs to advance its state after a snap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapStateDelta {
    pub next_down: u8,
    pub next_distance: u8,
    pub next_possession_team_id: String,
    pub new_spot: u8,
    pub clock_delta: i32,
    pub score_delta_by_team: BTreeMap<String, i32>,
    pub drive_increment: bool,
    pub fatigue_delta: BTreeMap<String, f64>,
}
