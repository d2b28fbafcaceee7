//! Weighted trait contests between opposing participant groups.
//!
//! A contest compares two actor groups through a family's trait weight
//! tables, adjusted for fatigue, acute wear, and situation context, and
//! squashes the raw difference into an advantage score in (0, 1). Missing
//! actors or traits are contest-input hard fails; nothing is substituted
//! and nothing is clamped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, ensure_unit_interval, EngineError, Result};
use crate::models::{InGameState, Situation};
use crate::resolver::phase::Phase;
use crate::resources::FamilyProfile;

const KNOWN_CONTEXT_MODIFIERS: &[&str] = &[
    "short_yardage_bonus",
    "long_yardage_bonus",
    "redzone_bonus",
    "goal_line_bonus",
    "trailing_bonus",
    "leading_bonus",
];

/// One contest request, fully resolved to actor ids by the snap resolver.
#[derive(Debug, Clone)]
pub struct ContestRequest<'a> {
    pub contest_id: String,
    pub play_id: &'a str,
    pub play_type: &'a str,
    pub phase: Phase,
    pub family: &'a str,
    pub offense_actor_ids: Vec<String>,
    pub defense_actor_ids: Vec<String>,
    pub situation: &'a Situation,
    pub in_game_states: &'a BTreeMap<String, InGameState>,
    pub trait_vectors: &'a BTreeMap<String, BTreeMap<String, f64>>,
}

/// Resolved contest: advantage score plus the per-actor and per-trait traces
/// that responsibility attribution and the film room consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestOutcome {
    pub contest_id: String,
    pub play_id: String,
    pub phase: Phase,
    pub family: String,
    /// Offense advantage in (0, 1); 0.5 is a dead-even rep.
    pub score: f64,
    pub offense_score: f64,
    pub defense_score: f64,
    /// Signed per-actor contribution; defense contributions are negative.
    pub actor_contributions: BTreeMap<String, f64>,
    pub trait_contributions: BTreeMap<String, f64>,
    pub variance_hint: f64,
    pub evidence_handles: Vec<String>,
}

impl ContestOutcome {
    /// Distance from a dead-even rep; feeds responsibility attribution.
    pub fn margin(&self) -> f64 {
        self.score - 0.5
    }
}

struct GroupBreakdown {
    group_score: f64,
    actor_contributions: BTreeMap<String, f64>,
    trait_contributions: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContestEvaluator;

impl ContestEvaluator {
    pub fn new() -> Self {
        ContestEvaluator
    }

    pub fn evaluate(
        &self,
        request: &ContestRequest<'_>,
        profile: &FamilyProfile,
    ) -> Result<ContestOutcome> {
        let offense = self.group_breakdown(
            &request.offense_actor_ids,
            request,
            &profile.offense_weights,
            Side::Offense,
            profile,
        )?;
        let defense = self.group_breakdown(
            &request.defense_actor_ids,
            request,
            &profile.defense_weights,
            Side::Defense,
            profile,
        )?;

        let context = self.context_adjustment(&profile.context_modifiers, request.situation)?;
        let raw = ensure_finite(
            "contest_raw_advantage",
            (offense.group_score - defense.group_score) + context,
        )?;
        let score = ensure_unit_interval("contest_score", logistic(raw * 3.0))?;

        let mut actor_contributions = offense.actor_contributions;
        actor_contributions.extend(defense.actor_contributions);
        let mut trait_contributions = offense.trait_contributions;
        for (code, value) in defense.trait_contributions {
            *trait_contributions.entry(code).or_insert(0.0) += value;
        }

        let mut volatility = 0.0;
        let all_actors = request
            .offense_actor_ids
            .iter()
            .chain(request.defense_actor_ids.iter());
        let mut count = 0usize;
        for actor_id in all_actors {
            volatility += normalized_trait(request.trait_vectors, actor_id, "volatility_profile")?;
            count += 1;
        }
        let variance_hint = volatility / count as f64;

        Ok(ContestOutcome {
            contest_id: request.contest_id.clone(),
            play_id: request.play_id.to_string(),
            phase: request.phase,
            family: request.family.to_string(),
            score: round6(score),
            offense_score: round6(offense.group_score),
            defense_score: round6(defense.group_score),
            actor_contributions: actor_contributions
                .into_iter()
                .map(|(k, v)| (k, round6(v)))
                .collect(),
            trait_contributions: trait_contributions
                .into_iter()
                .map(|(k, v)| (k, round6(v)))
                .collect(),
            variance_hint: round6(variance_hint),
            evidence_handles: vec![
                format!("contest:{}", request.contest_id),
                format!("family:{}", request.family),
                format!("play_type:{}", request.play_type),
            ],
        })
    }

    fn group_breakdown(
        &self,
        actor_ids: &[String],
        request: &ContestRequest<'_>,
        trait_weights: &BTreeMap<String, f64>,
        side: Side,
        profile: &FamilyProfile,
    ) -> Result<GroupBreakdown> {
        if actor_ids.is_empty() {
            return Err(EngineError::ContestInput(format!(
                "{} actor group is empty for family '{}'",
                side.as_str(),
                request.family
            )));
        }
        if trait_weights.is_empty() {
            return Err(EngineError::ContestInput(format!(
                "{} trait weights are empty for family '{}'",
                side.as_str(),
                request.family
            )));
        }
        let total_weight: f64 = trait_weights.values().sum();
        if total_weight <= 0.0 {
            return Err(EngineError::ContestInput(format!(
                "{} trait weights for family '{}' must sum to a positive value",
                side.as_str(),
                request.family
            )));
        }

        let mut actor_contributions = BTreeMap::new();
        let mut trait_contributions: BTreeMap<String, f64> =
            trait_weights.keys().map(|k| (k.clone(), 0.0)).collect();
        let mut group_sum = 0.0;
        for actor_id in actor_ids {
            let vector = request.trait_vectors.get(actor_id).ok_or_else(|| {
                EngineError::ContestInput(format!("missing trait vector for actor '{actor_id}'"))
            })?;
            let mut weighted = 0.0;
            for (trait_code, weight) in trait_weights {
                let Some(raw) = vector.get(trait_code) else {
                    return Err(EngineError::ContestInput(format!(
                        "actor '{actor_id}' missing required trait '{trait_code}'"
                    )));
                };
                let value = (raw - 1.0) / 98.0;
                weighted += value * weight;
                *trait_contributions.entry(trait_code.clone()).or_insert(0.0) += value * weight;
            }
            let actor_score = weighted / total_weight;
            group_sum += actor_score;
            actor_contributions.insert(
                actor_id.clone(),
                match side {
                    Side::Offense => actor_score,
                    Side::Defense => -actor_score,
                },
            );
        }
        let group_score = group_sum / actor_ids.len() as f64;

        let mut fatigue = 0.0;
        let mut wear = 0.0;
        for actor_id in actor_ids {
            let state = request.in_game_states.get(actor_id).ok_or_else(|| {
                EngineError::ContestInput(format!("missing in_game_state for actor '{actor_id}'"))
            })?;
            fatigue += state.fatigue;
            wear += state.acute_wear;
        }
        let count = actor_ids.len() as f64;
        let modifier =
            1.0 - (fatigue / count) * profile.fatigue_sensitivity
                - (wear / count) * profile.wear_sensitivity;
        let adjusted = ensure_finite("group_score", group_score * modifier)?;

        // Signed directional influence, normalized for explainability.
        let direction = match side {
            Side::Offense => 1.0,
            Side::Defense => -1.0,
        };
        let trait_contributions = trait_contributions
            .into_iter()
            .map(|(code, value)| (code, direction * (value / count) / total_weight))
            .collect();

        Ok(GroupBreakdown {
            group_score: adjusted,
            actor_contributions,
            trait_contributions,
        })
    }

    fn context_adjustment(
        &self,
        modifiers: &BTreeMap<String, f64>,
        situation: &Situation,
    ) -> Result<f64> {
        let mut adjustment = 0.0;
        for (key, value) in modifiers {
            if !KNOWN_CONTEXT_MODIFIERS.contains(&key.as_str()) {
                return Err(EngineError::ContestInput(format!(
                    "unknown context modifier '{key}'"
                )));
            }
            let applies = match key.as_str() {
                "short_yardage_bonus" => situation.distance <= 2,
                "long_yardage_bonus" => situation.distance >= 8,
                "redzone_bonus" => situation.yard_line >= 80,
                "goal_line_bonus" => situation.yard_line >= 95,
                "trailing_bonus" => situation.score_diff < 0,
                "leading_bonus" => situation.score_diff > 0,
                _ => false,
            };
            if applies {
                adjustment += value;
            }
        }
        Ok(adjustment)
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Offense,
    Defense,
}

impl Side {
    fn as_str(&self) -> &'static str {
        match self {
            Side::Offense => "offense",
            Side::Defense => "defense",
        }
    }
}

fn normalized_trait(
    vectors: &BTreeMap<String, BTreeMap<String, f64>>,
    actor_id: &str,
    trait_code: &str,
) -> Result<f64> {
    let value = vectors
        .get(actor_id)
        .and_then(|v| v.get(trait_code))
        .ok_or_else(|| {
            EngineError::ContestInput(format!(
                "actor '{actor_id}' missing required trait '{trait_code}'"
            ))
        })?;
    Ok((value - 1.0) / 98.0)
}

pub(crate) fn logistic(raw: f64) -> f64 {
    1.0 / (1.0 + (-raw).exp())
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceCatalog;
    use crate::testkit;
    use crate::traits::TraitCatalog;

    fn request_for<'a>(
        scp: &'a crate::models::SnapContextPackage,
        family: &'a str,
        offense: Vec<String>,
        defense: Vec<String>,
    ) -> ContestRequest<'a> {
        ContestRequest {
            contest_id: "ct_1".to_string(),
            play_id: &scp.play_id,
            play_type: "run",
            phase: Phase::EarlyLeverage,
            family,
            offense_actor_ids: offense,
            defense_actor_ids: defense,
            situation: &scp.situation,
            in_game_states: &scp.in_game_states,
            trait_vectors: &scp.trait_vectors,
        }
    }

    fn fixture() -> (ResourceCatalog, TraitCatalog) {
        (
            ResourceCatalog::load_embedded().unwrap(),
            TraitCatalog::canonical().unwrap(),
        )
    }

    #[test]
    fn score_stays_in_open_unit_interval() {
        let (catalog, traits) = fixture();
        let (scp, _, _) = testkit::valid_run_snap(&catalog, &traits, 11);
        let profile = &catalog.trait_influence("run").unwrap().families[0];
        let request = request_for(
            &scp,
            &profile.family,
            vec!["HOME_LT".into(), "HOME_LG".into(), "HOME_C".into()],
            vec!["AWAY_DE1".into(), "AWAY_DT1".into(), "AWAY_DT2".into()],
        );
        let outcome = ContestEvaluator::new().evaluate(&request, profile).unwrap();
        assert!(outcome.score > 0.0 && outcome.score < 1.0);
        assert_eq!(outcome.actor_contributions.len(), 6);
        assert!(outcome.actor_contributions["AWAY_DE1"] < 0.0);
        assert!(outcome.actor_contributions["HOME_LT"] > 0.0);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let (catalog, traits) = fixture();
        let (scp, _, _) = testkit::valid_run_snap(&catalog, &traits, 11);
        let profile = &catalog.trait_influence("run").unwrap().families[0];
        let request = request_for(
            &scp,
            &profile.family,
            vec!["HOME_LT".into(), "HOME_LG".into()],
            vec!["AWAY_DE1".into(), "AWAY_DT1".into()],
        );
        let evaluator = ContestEvaluator::new();
        let a = evaluator.evaluate(&request, profile).unwrap();
        let b = evaluator.evaluate(&request, profile).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_trait_is_contest_input_error() {
        let (catalog, traits) = fixture();
        let (mut scp, _, _) = testkit::valid_run_snap(&catalog, &traits, 11);
        scp.trait_vectors
            .get_mut("HOME_LT")
            .unwrap()
            .remove("run_block_drive");
        let profile = &catalog.trait_influence("run").unwrap().families[0];
        let request = request_for(
            &scp,
            &profile.family,
            vec!["HOME_LT".into()],
            vec!["AWAY_DE1".into()],
        );
        let err = ContestEvaluator::new()
            .evaluate(&request, profile)
            .unwrap_err();
        assert_eq!(err.code(), "CONTEST_INPUT_ERROR");
    }

    #[test]
    fn empty_group_is_contest_input_error() {
        let (catalog, traits) = fixture();
        let (scp, _, _) = testkit::valid_run_snap(&catalog, &traits, 11);
        let profile = &catalog.trait_influence("run").unwrap().families[0];
        let request = request_for(&scp, &profile.family, vec![], vec!["AWAY_DE1".into()]);
        let err = ContestEvaluator::new()
            .evaluate(&request, profile)
            .unwrap_err();
        assert_eq!(err.code(), "CONTEST_INPUT_ERROR");
    }

    #[test]
    fn unknown_context_modifier_hard_fails() {
        let (catalog, traits) = fixture();
        let (scp, _, _) = testkit::valid_run_snap(&catalog, &traits, 11);
        let mut profile = catalog.trait_influence("run").unwrap().families[0].clone();
        profile
            .context_modifiers
            .insert("full_moon_bonus".into(), 0.2);
        let request = request_for(
            &scp,
            &profile.family,
            vec!["HOME_LT".into()],
            vec!["AWAY_DE1".into()],
        );
        let err = ContestEvaluator::new()
            .evaluate(&request, &profile)
            .unwrap_err();
        assert_eq!(err.code(), "CONTEST_INPUT_ERROR");
    }

    #[test]
    fn fatigue_depresses_group_score() {
        let (catalog, traits) = fixture();
        let (mut scp, _, _) = testkit::valid_run_snap(&catalog, &traits, 11);
        let profile = &catalog.trait_influence("run").unwrap().families[0];
        let fresh = ContestEvaluator::new()
            .evaluate(
                &request_for(
                    &scp,
                    &profile.family,
                    vec!["HOME_LT".into()],
                    vec!["AWAY_DE1".into()],
                ),
                profile,
            )
            .unwrap();
        scp.in_game_states.get_mut("HOME_LT").unwrap().fatigue = 0.9;
        let gassed = ContestEvaluator::new()
            .evaluate(
                &request_for(
                    &scp,
                    &profile.family,
                    vec!["HOME_LT".into()],
                    vec!["AWAY_DE1".into()],
                ),
                profile,
            )
            .unwrap();
        assert!(gassed.offense_score < fresh.offense_score);
        assert!(gassed.score < fresh.score);
    }
}
