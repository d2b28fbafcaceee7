//! Session orchestration: full games, week slates, replay.

pub mod engine;
pub mod replay;

pub use engine::{
    run_week_slate, ActionRecord, GameParams, GameResponse, GameSessionEngine, GameSessionState,
    TeamContext,
};
pub use replay::{stream_fingerprint, ReplayArtifact};
