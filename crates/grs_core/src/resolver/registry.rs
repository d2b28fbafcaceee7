//! Registry mapping (phase, contest family) to a pure contest function.
//!
//! Data-driven contest kinds resolve through this table, so a new kind is an
//! added registration rather than another branch in the resolver loop. A
//! template naming a pairing with no registered function is a contest-input
//! hard fail.

use std::collections::BTreeMap;

use crate::error::{EngineError, Result};
use crate::resolver::contest::{ContestEvaluator, ContestOutcome, ContestRequest};
use crate::resolver::phase::Phase;
use crate::resources::FamilyProfile;

pub type ContestFn =
    fn(&ContestEvaluator, &ContestRequest<'_>, &FamilyProfile) -> Result<ContestOutcome>;

pub struct ContestRegistry {
    entries: BTreeMap<(Phase, String), ContestFn>,
}

impl ContestRegistry {
    /// The standard gridiron registration set. The kick leg contest gets its
    /// own function; every other family uses the standard evaluation.
    pub fn standard() -> Self {
        let mut registry = ContestRegistry {
            entries: BTreeMap::new(),
        };
        for (phase, family) in [
            (Phase::EarlyLeverage, "lane_creation"),
            (Phase::EarlyLeverage, "separation_window"),
            (Phase::Engagement, "fit_integrity"),
            (Phase::Engagement, "pressure_emergence"),
            (Phase::Engagement, "tackle_finish"),
            (Phase::Engagement, "block_pressure"),
            (Phase::Engagement, "coverage_lane_integrity"),
            (Phase::Decision, "decision_risk"),
            (Phase::Decision, "catch_point_contest"),
            (Phase::Decision, "yac_continuation"),
            (Phase::Decision, "ball_security"),
            (Phase::Decision, "return_vision_convergence"),
        ] {
            registry.register(phase, family, standard_contest);
        }
        registry.register(Phase::EarlyLeverage, "kick_quality", kick_leg_contest);
        registry
    }

    pub fn register(&mut self, phase: Phase, family: &str, contest_fn: ContestFn) {
        self.entries.insert((phase, family.to_string()), contest_fn);
    }

    pub fn resolve(&self, phase: Phase, family: &str) -> Result<ContestFn> {
        self.entries
            .get(&(phase, family.to_string()))
            .copied()
            .ok_or_else(|| {
                EngineError::ContestInput(format!(
                    "no contest function registered for family '{family}' in phase '{}'",
                    phase.as_str()
                ))
            })
    }
}

fn standard_contest(
    evaluator: &ContestEvaluator,
    request: &ContestRequest<'_>,
    profile: &FamilyProfile,
) -> Result<ContestOutcome> {
    evaluator.evaluate(request, profile)
}

/// Kick quality is a specialist rep: the leg swing is isolated from team
/// fatigue far more than a scrimmage rep, so sensitivity is halved.
fn kick_leg_contest(
    evaluator: &ContestEvaluator,
    request: &ContestRequest<'_>,
    profile: &FamilyProfile,
) -> Result<ContestOutcome> {
    let mut specialist = profile.clone();
    specialist.fatigue_sensitivity *= 0.5;
    specialist.wear_sensitivity *= 0.5;
    evaluator.evaluate(request, &specialist)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_set_covers_scrimmage_families() {
        let registry = ContestRegistry::standard();
        assert!(registry.resolve(Phase::EarlyLeverage, "lane_creation").is_ok());
        assert!(registry.resolve(Phase::Decision, "ball_security").is_ok());
        assert!(registry.resolve(Phase::EarlyLeverage, "kick_quality").is_ok());
    }

    #[test]
    fn unregistered_pairing_is_contest_input_error() {
        let registry = ContestRegistry::standard();
        let err = registry.resolve(Phase::Aftermath, "lane_creation").unwrap_err();
        assert_eq!(err.code(), "CONTEST_INPUT_ERROR");
        let err = registry.resolve(Phase::Engagement, "seance").unwrap_err();
        assert_eq!(err.code(), "CONTEST_INPUT_ERROR");
    }
}
