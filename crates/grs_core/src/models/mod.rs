//! Core data contracts: snap context, play results, session state.

pub mod play;
pub mod scp;

pub use play::{
    PenaltyArtifact, PlayResult, RulesAdjudication, ScoreEvent, SnapStateDelta, TerminalEvent,
    TurnoverType,
};
pub use scp::{
    position_for_slot, InGameState, ParameterizedIntent, ParticipantRecord, PlayType, SimMode,
    Situation, SnapContextPackage, SCP_SCHEMA_VERSION,
};
