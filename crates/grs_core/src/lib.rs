//! # grs_core - Deterministic Gridiron Snap-Resolution Engine
//!
//! Resolves one football snap at a time through a fixed six-phase state
//! machine, with every input validated up front and every outcome fully
//! attributed and replayable.
//!
//! ## Guarantees
//! - 100% deterministic: identical snap context + RNG root ⇒ byte-identical
//!   play result, ledger, and causality chain
//! - Fail-fast integrity: a snap fully completes or fully hard-fails with a
//!   forensic artifact; no partial result is ever authoritative
//! - Mode invariance: interactive, background, and off-screen callers share
//!   one resolver function
//!
//! ## Layout
//! - [`resources`] / [`traits`] — versioned catalogs, checksummed at load
//! - [`gate`] — the ten-stage pre-sim validation gate
//! - [`resolver`] — the phasal resolver and contest machinery
//! - [`ledger`] — responsibility attribution and causality recording
//! - [`session`] — full games, week slates, replay
//! - [`forensic`] — artifact emission for every hard-fail path

// Game-state assembly occasionally needs wide constructors
#![allow(clippy::too_many_arguments)]

pub mod error;
pub mod forensic;
pub mod gate;
pub mod ledger;
pub mod models;
pub mod resolver;
pub mod resources;
pub mod rng;
pub mod session;
pub mod traits;

#[cfg(test)]
pub mod testkit;

pub use error::{EngineError, Result};
pub use forensic::{ArtifactHandle, ArtifactSink, ForensicArtifact, JsonDirSink, MemorySink};
pub use gate::{GateStage, GateStatus, PreSimGate, TeamSheet, ValidationReport};
pub use ledger::{
    CausalityChain, DefaultRetentionAdvisor, RepLedgerEntry, RetentionAdvisor, RetentionHint,
};
pub use models::{PlayResult, PlayType, SimMode, SnapContextPackage, TerminalEvent};
pub use resolver::{Phase, SnapResolution, SnapResolver};
pub use resources::ResourceCatalog;
pub use rng::SubstreamHandle;
pub use session::{GameParams, GameResponse, GameSessionEngine, ReplayArtifact};
pub use traits::TraitCatalog;

/// Crate version, from the manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Snap context package schema version accepted by this build.
pub const SCHEMA_VERSION: u8 = models::SCP_SCHEMA_VERSION;
