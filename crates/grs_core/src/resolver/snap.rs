//! Phasal snap resolution.
//!
//! One resolver function serves interactive, background, and off-screen
//! callers; it never reads the caller mode, so identical packages and seeds
//! resolve identically regardless of who is asking. Resolution walks the
//! phase machine in order, runs the contests the assignment template
//! schedules for each phase, and combines the measured advantages with
//! sampled randomness only at the terminal phase.

use std::collections::BTreeMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_unit_interval, EngineError, Result};
use crate::ledger::{
    distribute_responsibility, CausalityChain, CausalityRecorder, RepLedger, RepLedgerEntry,
    RetentionAdvisor, RetentionHint,
};
use crate::models::{
    ParticipantRecord, PenaltyArtifact, PlayResult, PlayType, RulesAdjudication, ScoreEvent,
    SnapContextPackage, SnapStateDelta, TerminalEvent, TurnoverType,
};
use crate::resolver::contest::{logistic, ContestEvaluator, ContestOutcome, ContestRequest};
use crate::resolver::phase::{Phase, PhaseCursor};
use crate::resolver::registry::ContestRegistry;
use crate::resources::{FamilyProfile, OutcomeProfile, ResourceCatalog};
use crate::rng::SubstreamScope;

/// Everything one resolved snap produces: the official result, the
/// adjudication behind it, and the full explanatory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapResolution {
    pub play_result: PlayResult,
    pub adjudication: RulesAdjudication,
    pub contests: Vec<ContestOutcome>,
    pub rep_ledger: Vec<RepLedgerEntry>,
    pub causality: CausalityChain,
    pub retention: RetentionHint,
    pub state_delta: SnapStateDelta,
    pub phase_trace: Vec<Phase>,
}

pub struct SnapResolver<'a> {
    catalog: &'a ResourceCatalog,
    evaluator: ContestEvaluator,
    registry: ContestRegistry,
}

impl<'a> SnapResolver<'a> {
    pub fn new(catalog: &'a ResourceCatalog) -> Self {
        SnapResolver {
            catalog,
            evaluator: ContestEvaluator::new(),
            registry: ContestRegistry::standard(),
        }
    }

    /// Resolve one validated snap. The package must have passed the pre-sim
    /// gate; resolution itself re-checks only what it touches and hard-fails
    /// on anything out of contract.
    pub fn resolve(
        &self,
        scp: &SnapContextPackage,
        retention: &dyn RetentionAdvisor,
    ) -> Result<SnapResolution> {
        let offense = scp.offense_team_id().to_string();
        let defense = scp
            .defense_team_id()
            .ok_or_else(|| {
                EngineError::Consistency("unable to partition participants into two teams".into())
            })?
            .to_string();

        let entry = self.catalog.playbook_entry_for_intent(
            scp.intent.play_type,
            &scp.intent.personnel,
            &scp.intent.formation,
            &scp.intent.offensive_concept,
            &scp.intent.defensive_concept,
        )?;
        let template = self
            .catalog
            .assignment_template(&entry.assignment_template_id)?;
        let influence = self.catalog.trait_influence(scp.intent.play_type.as_str())?;
        let profiles: BTreeMap<&str, &FamilyProfile> = influence
            .families
            .iter()
            .map(|f| (f.family.as_str(), f))
            .collect();
        for family in profiles.keys() {
            if !template.contest_groups.iter().any(|g| g.family == *family) {
                return Err(EngineError::ContestInput(format!(
                    "template '{}' schedules no contest for required family '{family}'",
                    template.id
                )));
            }
        }

        let mut scope = SubstreamScope::new(&format!("snap:{}:{}", scp.game_id, scp.play_id));
        let mut cursor = PhaseCursor::start();
        let mut ledger = RepLedger::new();
        let mut causality = CausalityRecorder::new();
        let mut contests: Vec<ContestOutcome> = Vec::new();
        let mut contest_ordinal = 0usize;

        // PRE_SNAP: assignments compile; no stochastic draw happens here.
        scope.derive(&scp.substream, Phase::PreSnap.as_str())?;
        let mut previous_node = causality.push_node(
            Phase::PreSnap,
            &format!(
                "assignments compiled from template '{}' for play '{}'",
                template.id, entry.id
            ),
            Vec::new(),
        )?;

        // EARLY_LEVERAGE, ENGAGEMENT, DECISION: template-scheduled contests.
        for _ in 0..3 {
            let phase = cursor.advance()?;
            scope.derive(&scp.substream, phase.as_str())?;
            for group in template
                .contest_groups
                .iter()
                .filter(|g| g.phase == phase && profiles.contains_key(g.family.as_str()))
            {
                contest_ordinal += 1;
                let contest_fn = self.registry.resolve(phase, &group.family)?;
                let request = ContestRequest {
                    contest_id: format!("{}:{:02}:{}", scp.play_id, contest_ordinal, group.family),
                    play_id: &scp.play_id,
                    play_type: scp.intent.play_type.as_str(),
                    phase,
                    family: &group.family,
                    offense_actor_ids: select_actor_ids(
                        &scp.participants_of(&offense),
                        &group.offense_roles,
                        group.group_size,
                        &group.family,
                    )?,
                    defense_actor_ids: select_actor_ids(
                        &scp.participants_of(&defense),
                        &group.defense_roles,
                        group.group_size,
                        &group.family,
                    )?,
                    situation: &scp.situation,
                    in_game_states: &scp.in_game_states,
                    trait_vectors: &scp.trait_vectors,
                };
                let outcome = contest_fn(&self.evaluator, &request, profiles[group.family.as_str()])?;

                let weights = distribute_responsibility(&outcome.actor_contributions)?;
                let mut refs = Vec::with_capacity(weights.len());
                for (actor_id, weight) in &weights {
                    refs.push(ledger.record(
                        phase,
                        actor_id,
                        *weight,
                        &format!("contest:{}", outcome.contest_id),
                    )?);
                }
                let node = causality.push_node(
                    phase,
                    &format!(
                        "'{}' contest resolved {} (score {:.3})",
                        outcome.family,
                        if outcome.score >= 0.5 { "to the offense" } else { "to the defense" },
                        outcome.score
                    ),
                    refs,
                )?;
                causality.link(previous_node, node)?;
                previous_node = node;
                contests.push(outcome);
            }
        }

        // TERMINAL: advantage meets sampled randomness.
        let phase = cursor.advance()?;
        let terminal_handle = scope.derive(&scp.substream, phase.as_str())?;
        let by_family: BTreeMap<&str, &ContestOutcome> =
            contests.iter().map(|c| (c.family.as_str(), c)).collect();

        let penalties = self.resolve_penalties(
            scp,
            &offense,
            &defense,
            &by_family,
            &mut terminal_handle.derive("penalties").rng(),
        )?;
        let raw = self.resolve_terminal(
            scp,
            &by_family,
            &influence.outcome_profile,
            &penalties,
            &offense,
            &mut terminal_handle.derive("outcome").rng(),
        )?;
        let terminal_margins = terminal_attribution(&contests)?;
        let mut terminal_refs = Vec::with_capacity(terminal_margins.len());
        for (actor_id, weight) in &terminal_margins {
            terminal_refs.push(ledger.record(
                phase,
                actor_id,
                *weight,
                &format!("terminal:{}", raw.outcome.as_str()),
            )?);
        }
        let terminal_node = causality.push_node(
            phase,
            &format!("terminal event '{}'", raw.outcome.as_str()),
            terminal_refs,
        )?;
        causality.link(previous_node, terminal_node)?;

        // AFTERMATH: adjudication, clock, and sealing.
        let phase = cursor.advance()?;
        let aftermath_handle = scope.derive(&scp.substream, phase.as_str())?;
        let clock_delta = {
            let profile = &influence.outcome_profile;
            aftermath_handle
                .derive("clock")
                .rng()
                .gen_range(profile.clock_delta_min..=profile.clock_delta_max)
        };
        let adjudication = self.adjudicate(scp, &offense, &defense, &raw, clock_delta);
        let play_result = PlayResult {
            play_id: scp.play_id.clone(),
            outcome: raw.outcome,
            yards: raw.yards,
            new_spot: raw.new_spot,
            turnover: raw.turnover,
            score_event: adjudication.score_event,
            penalties: penalties.clone(),
            clock_delta: adjudication.clock_delta,
            next_down: adjudication.next_down,
            next_distance: adjudication.next_distance,
            next_possession_team_id: adjudication.next_possession_team_id.clone(),
        };
        let aftermath_node = causality.push_node(
            phase,
            "result adjudicated, ledger sealed, retention tagged",
            Vec::new(),
        )?;
        causality.link(terminal_node, aftermath_node)?;
        debug_assert!(cursor.is_terminal());

        let rep_ledger = ledger.into_entries();
        let retention = retention.advise(&play_result, &rep_ledger);
        let state_delta = SnapStateDelta {
            next_down: play_result.next_down,
            next_distance: play_result.next_distance,
            next_possession_team_id: play_result.next_possession_team_id.clone(),
            new_spot: play_result.new_spot,
            clock_delta: play_result.clock_delta,
            score_delta_by_team: score_delta(play_result.score_event, &offense, &defense),
            drive_increment: play_result.next_possession_team_id != offense,
            fatigue_delta: scp
                .participants
                .iter()
                .map(|p| (p.player_id.clone(), 0.01))
                .collect(),
        };

        Ok(SnapResolution {
            play_result,
            adjudication,
            contests,
            rep_ledger,
            causality: causality.finish(),
            retention,
            state_delta,
            phase_trace: cursor.visited().to_vec(),
        })
    }

    fn resolve_penalties(
        &self,
        scp: &SnapContextPackage,
        offense: &str,
        defense: &str,
        by_family: &BTreeMap<&str, &ContestOutcome>,
        rng: &mut ChaCha8Rng,
    ) -> Result<Vec<PenaltyArtifact>> {
        let discipline = |team: &str| -> f64 {
            let members = scp.participants_of(team);
            let total: f64 = members
                .iter()
                .filter_map(|p| scp.in_game_states.get(&p.player_id))
                .map(|s| s.discipline_risk)
                .sum();
            total / members.len().max(1) as f64
        };
        let off_discipline = discipline(offense);
        let def_discipline = discipline(defense);

        let mut penalties = Vec::new();
        if let Some(catch) = by_family.get("catch_point_contest") {
            let p = ensure_unit_interval(
                "dpi_probability",
                (1.0 - catch.score) * 0.25 + def_discipline * 0.1,
            )?;
            if rng.gen::<f64>() < p {
                penalties.push(PenaltyArtifact {
                    code: "DPI".to_string(),
                    against_team_id: defense.to_string(),
                    yards: 15,
                    enforcement_rationale: "defender lost leverage at the catch point".to_string(),
                });
            }
        }
        let hold_stress = by_family
            .get("lane_creation")
            .map(|lane| 1.0 - lane.score)
            .unwrap_or(0.5);
        let p = ensure_unit_interval(
            "holding_probability",
            hold_stress * 0.22 + off_discipline * 0.1,
        )?;
        if rng.gen::<f64>() < p {
            penalties.push(PenaltyArtifact {
                code: "HOLD".to_string(),
                against_team_id: offense.to_string(),
                yards: 10,
                enforcement_rationale: "blocker reached while losing leverage".to_string(),
            });
        }
        Ok(penalties)
    }

    fn resolve_terminal(
        &self,
        scp: &SnapContextPackage,
        by_family: &BTreeMap<&str, &ContestOutcome>,
        profile: &OutcomeProfile,
        penalties: &[PenaltyArtifact],
        offense: &str,
        rng: &mut ChaCha8Rng,
    ) -> Result<RawTerminal> {
        let score_of = |family: &str| -> Result<f64> {
            by_family.get(family).map(|c| c.score).ok_or_else(|| {
                EngineError::ContestInput(format!(
                    "terminal resolution requires family '{family}' which was never contested"
                ))
            })
        };

        let mut yards: i32;
        let mut turnover = None;
        let mut outcome;

        match scp.intent.play_type {
            PlayType::Run => {
                let lane = score_of("lane_creation")?;
                let fit = score_of("fit_integrity")?;
                let tackle = score_of("tackle_finish")?;
                let security = score_of("ball_security")?;
                yards = ((lane - fit) * 16.0
                    + (1.0 - tackle) * 5.0
                    + (rng.gen::<f64>() - 0.5) * 4.0 * profile.noise_scale)
                    .round() as i32;
                let fumble_p =
                    ensure_unit_interval("fumble_probability", profile.turnover_scale * (1.0 - security))?;
                if rng.gen::<f64>() < fumble_p {
                    turnover = Some(TurnoverType::Fumble);
                }
                outcome = TerminalEvent::NormalPlay;
            }
            PlayType::Pass | PlayType::TwoPoint => {
                let pressure = score_of("pressure_emergence")?;
                let separation = score_of("separation_window")?;
                let decision = score_of("decision_risk")?;
                let catch = score_of("catch_point_contest")?;
                let security = score_of("ball_security")?;
                // All group scores live in (0, 1), so this composition is
                // domain-safe without clamping.
                let completion_p = ensure_unit_interval(
                    "completion_probability",
                    0.25 + separation * 0.3 + decision * 0.25 + catch * 0.2 - pressure * 0.2,
                )?;
                let complete = rng.gen::<f64>() < completion_p;
                if complete {
                    yards = ((separation - pressure) * 14.0
                        + (rng.gen::<f64>() - 0.5) * 8.0 * profile.noise_scale)
                        .round() as i32;
                    outcome = TerminalEvent::NormalPlay;
                } else {
                    yards = 0;
                    outcome = TerminalEvent::Incompletion;
                }
                let int_p = profile.turnover_scale * (1.0 - decision) * (1.0 - catch) * (0.7 + pressure);
                let fumble_p = profile.turnover_scale * (1.0 - security) * 0.35;
                ensure_unit_interval("turnover_probability", int_p + fumble_p)?;
                let roll = rng.gen::<f64>();
                if roll < int_p {
                    turnover = Some(TurnoverType::Interception);
                    yards = 0;
                } else if roll < int_p + fumble_p && complete {
                    turnover = Some(TurnoverType::Fumble);
                }
            }
            PlayType::Punt | PlayType::Kickoff => {
                let kick = score_of("kick_quality")?;
                let cover = score_of("coverage_lane_integrity")?;
                let ret = score_of("return_vision_convergence")?;
                let gross = 28.0 + kick * 36.0 + (rng.gen::<f64>() - 0.5) * 8.0 * profile.noise_scale;
                let return_yards =
                    8.0 + ret * 24.0 - cover * 14.0 + (rng.gen::<f64>() - 0.5) * 8.0 * profile.noise_scale;
                yards = (gross - return_yards.max(0.0)).round() as i32;
                outcome = TerminalEvent::NormalPlay;
                let return_td_p = ensure_unit_interval(
                    "return_td_probability",
                    0.01 + ((ret - cover).max(0.0)) * 0.18,
                )?;
                if rng.gen::<f64>() < return_td_p {
                    outcome = TerminalEvent::ReturnTouchdown;
                }
            }
            PlayType::FieldGoal | PlayType::ExtraPoint => {
                let kick = score_of("kick_quality")?;
                let block = score_of("block_pressure")?;
                let distance = f64::from(100u8.saturating_sub(scp.situation.yard_line).max(18));
                let make_p = ensure_unit_interval(
                    "kick_make_probability",
                    logistic(3.0 * (kick * 0.85 + (1.0 - block) * 0.3 - distance / 80.0 + 0.25)),
                )?;
                let made = rng.gen::<f64>() < make_p;
                yards = 0;
                outcome = match (scp.intent.play_type, made) {
                    (PlayType::FieldGoal, true) => TerminalEvent::FieldGoalGood,
                    (PlayType::FieldGoal, false) => TerminalEvent::FieldGoalMiss,
                    (_, true) => TerminalEvent::ExtraPointGood,
                    (_, false) => TerminalEvent::ExtraPointMiss,
                };
            }
        }

        for penalty in penalties {
            yards += if penalty.against_team_id == offense {
                -penalty.yards
            } else {
                penalty.yards
            };
        }

        // Two-point tries convert on reaching the end zone, full stop.
        if scp.intent.play_type == PlayType::TwoPoint {
            outcome = if turnover.is_none() && yards >= 2 {
                TerminalEvent::TwoPointGood
            } else {
                TerminalEvent::TwoPointFail
            };
        }

        // Spot arithmetic and down-and-distance labels apply to scrimmage
        // plays only; kicks and tries carry their own event vocabulary.
        let spot = i32::from(scp.situation.yard_line) + yards;
        if matches!(scp.intent.play_type, PlayType::Run | PlayType::Pass) {
            outcome = match turnover {
                Some(TurnoverType::Interception) => TerminalEvent::Interception,
                Some(TurnoverType::Fumble) => TerminalEvent::Fumble,
                None if spot >= 100 => TerminalEvent::Touchdown,
                None if spot <= 0 => TerminalEvent::Safety,
                None if outcome == TerminalEvent::Incompletion => TerminalEvent::Incompletion,
                None if yards >= i32::from(scp.situation.distance) => TerminalEvent::FirstDown,
                None if yards < 0 => TerminalEvent::NegativePlay,
                None => TerminalEvent::NormalPlay,
            };
        }

        Ok(RawTerminal {
            outcome,
            yards,
            new_spot: spot.clamp(1, 99) as u8,
            turnover,
        })
    }

    fn adjudicate(
        &self,
        scp: &SnapContextPackage,
        offense: &str,
        defense: &str,
        raw: &RawTerminal,
        clock_delta: i32,
    ) -> RulesAdjudication {
        let score_event = match raw.outcome {
            TerminalEvent::Touchdown => Some(ScoreEvent::Touchdown),
            TerminalEvent::ReturnTouchdown => Some(ScoreEvent::ReturnTouchdown),
            TerminalEvent::Safety => Some(ScoreEvent::Safety),
            TerminalEvent::FieldGoalGood => Some(ScoreEvent::FieldGoalGood),
            TerminalEvent::FieldGoalMiss => Some(ScoreEvent::FieldGoalMiss),
            TerminalEvent::ExtraPointGood => Some(ScoreEvent::ExtraPointGood),
            TerminalEvent::ExtraPointMiss => Some(ScoreEvent::ExtraPointMiss),
            TerminalEvent::TwoPointGood => Some(ScoreEvent::TwoPointGood),
            TerminalEvent::TwoPointFail => Some(ScoreEvent::TwoPointFail),
            _ => None,
        };

        let possession_flips = raw.turnover.is_some()
            || matches!(
                raw.outcome,
                TerminalEvent::Touchdown
                    | TerminalEvent::ReturnTouchdown
                    | TerminalEvent::Safety
                    | TerminalEvent::FieldGoalGood
                    | TerminalEvent::FieldGoalMiss
                    | TerminalEvent::ExtraPointGood
                    | TerminalEvent::ExtraPointMiss
                    | TerminalEvent::TwoPointGood
                    | TerminalEvent::TwoPointFail
            )
            || matches!(scp.intent.play_type, PlayType::Punt | PlayType::Kickoff);

        let (next_possession, next_down, next_distance, notes) = if possession_flips {
            let note = if raw.turnover.is_some() {
                "possession flips on turnover"
            } else {
                "possession flips after scoring or kicking play"
            };
            (defense.to_string(), 1, 10, vec![note.to_string()])
        } else {
            let remaining = i32::from(scp.situation.distance) - raw.yards;
            if remaining <= 0 {
                (offense.to_string(), 1, 10, vec!["line to gain reached".to_string()])
            } else {
                (
                    offense.to_string(),
                    (scp.situation.down + 1).min(4),
                    remaining.clamp(1, 99) as u8,
                    vec!["normal progression".to_string()],
                )
            }
        };

        RulesAdjudication {
            score_event,
            enforcement_notes: notes,
            next_down,
            next_distance,
            next_possession_team_id: next_possession,
            clock_delta,
        }
    }
}

struct RawTerminal {
    outcome: TerminalEvent,
    yards: i32,
    new_spot: u8,
    turnover: Option<TurnoverType>,
}

/// Fill a contest group from a team's participants: preferred alignment
/// slots first, in template order, then remaining participants in package
/// order. Falling short of the group size is a contest-input hard fail; no
/// synthetic substitute ever enters a contest.
fn select_actor_ids(
    participants: &[&ParticipantRecord],
    preferred_slots: &[String],
    group_size: usize,
    family: &str,
) -> Result<Vec<String>> {
    let mut selected: Vec<String> = Vec::with_capacity(group_size);
    for slot in preferred_slots {
        if selected.len() == group_size {
            break;
        }
        if let Some(p) = participants.iter().find(|p| &p.slot == slot) {
            if !selected.contains(&p.player_id) {
                selected.push(p.player_id.clone());
            }
        }
    }
    for p in participants {
        if selected.len() == group_size {
            break;
        }
        if !selected.contains(&p.player_id) {
            selected.push(p.player_id.clone());
        }
    }
    if selected.len() < group_size {
        return Err(EngineError::ContestInput(format!(
            "unable to field {group_size} actors for family '{family}' contest"
        )));
    }
    Ok(selected)
}

/// Margin-proportional attribution of the terminal outcome across every
/// actor that took part in a contest, weighted by how far their contests
/// landed from even.
fn terminal_attribution(contests: &[ContestOutcome]) -> Result<BTreeMap<String, f64>> {
    let mut margins: BTreeMap<String, f64> = BTreeMap::new();
    for contest in contests {
        let contest_margin = contest.margin().abs();
        for (actor_id, contribution) in &contest.actor_contributions {
            *margins.entry(actor_id.clone()).or_insert(0.0) +=
                contribution.abs() * contest_margin;
        }
    }
    distribute_responsibility(&margins)
}

fn score_delta(
    score_event: Option<ScoreEvent>,
    offense: &str,
    defense: &str,
) -> BTreeMap<String, i32> {
    let mut delta = BTreeMap::new();
    if let Some(event) = score_event {
        let points = event.points();
        if points > 0 {
            let team = if event.scores_for_defense() { defense } else { offense };
            delta.insert(team.to_string(), points);
        }
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{DefaultRetentionAdvisor, WEIGHT_SUM_EPSILON};
    use crate::models::SimMode;
    use crate::resources::ResourceCatalog;
    use crate::testkit;
    use crate::traits::TraitCatalog;

    fn fixture() -> (ResourceCatalog, TraitCatalog) {
        (
            ResourceCatalog::load_embedded().unwrap(),
            TraitCatalog::canonical().unwrap(),
        )
    }

    #[test]
    fn identical_package_resolves_byte_identically() {
        let (catalog, traits) = fixture();
        let (scp, _, _) = testkit::valid_run_snap(&catalog, &traits, 404);
        let resolver = SnapResolver::new(&catalog);
        let a = resolver.resolve(&scp, &DefaultRetentionAdvisor).unwrap();
        let b = resolver.resolve(&scp, &DefaultRetentionAdvisor).unwrap();
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }

    #[test]
    fn distinct_substreams_diverge() {
        let (catalog, traits) = fixture();
        let (scp_a, _, _) = testkit::valid_pass_snap(&catalog, &traits, 1);
        let (scp_b, _, _) = testkit::valid_pass_snap(&catalog, &traits, 2);
        let resolver = SnapResolver::new(&catalog);
        let a = resolver.resolve(&scp_a, &DefaultRetentionAdvisor).unwrap();
        let b = resolver.resolve(&scp_b, &DefaultRetentionAdvisor).unwrap();
        // Same advantage structure, different sampled randomness.
        assert_eq!(a.contests.len(), b.contests.len());
        assert_ne!(
            (a.play_result.yards, a.play_result.clock_delta, a.play_result.outcome),
            (b.play_result.yards, b.play_result.clock_delta, b.play_result.outcome),
        );
    }

    #[test]
    fn mode_is_never_consulted() {
        let (catalog, traits) = fixture();
        let (mut scp, _, _) = testkit::valid_run_snap(&catalog, &traits, 99);
        let resolver = SnapResolver::new(&catalog);
        let mut results = Vec::new();
        for mode in [SimMode::Play, SimMode::Sim, SimMode::Offscreen] {
            scp.mode = mode;
            results.push(resolver.resolve(&scp, &DefaultRetentionAdvisor).unwrap());
        }
        assert_eq!(results[0].play_result, results[1].play_result);
        assert_eq!(results[1].play_result, results[2].play_result);
        assert_eq!(results[0].rep_ledger, results[2].rep_ledger);
    }

    #[test]
    fn phase_trace_is_the_full_sequence() {
        let (catalog, traits) = fixture();
        let (scp, _, _) = testkit::valid_run_snap(&catalog, &traits, 5);
        let resolution = SnapResolver::new(&catalog)
            .resolve(&scp, &DefaultRetentionAdvisor)
            .unwrap();
        assert_eq!(resolution.phase_trace, Phase::SEQUENCE.to_vec());
        for contest in &resolution.contests {
            assert!(contest.score > 0.0 && contest.score < 1.0);
        }
    }

    #[test]
    fn terminal_attribution_sums_to_one() {
        let (catalog, traits) = fixture();
        let (scp, _, _) = testkit::valid_pass_snap(&catalog, &traits, 31);
        let resolution = SnapResolver::new(&catalog)
            .resolve(&scp, &DefaultRetentionAdvisor)
            .unwrap();
        let terminal_sum: f64 = resolution
            .rep_ledger
            .iter()
            .filter(|e| e.phase == Phase::Terminal)
            .map(|e| e.responsibility_weight)
            .sum();
        assert!((terminal_sum - 1.0).abs() <= WEIGHT_SUM_EPSILON);
        // Per-contest attribution also renormalizes.
        for contest in &resolution.contests {
            let sum: f64 = resolution
                .rep_ledger
                .iter()
                .filter(|e| e.evidence_handle == format!("contest:{}", contest.contest_id))
                .map(|e| e.responsibility_weight)
                .sum();
            assert!((sum - 1.0).abs() <= WEIGHT_SUM_EPSILON, "{}", contest.contest_id);
        }
    }

    #[test]
    fn causality_chain_is_acyclic_and_phase_ordered() {
        let (catalog, traits) = fixture();
        let (scp, _, _) = testkit::valid_run_snap(&catalog, &traits, 17);
        let resolution = SnapResolver::new(&catalog)
            .resolve(&scp, &DefaultRetentionAdvisor)
            .unwrap();
        let chain = &resolution.causality;
        assert!(!chain.is_empty());
        assert_eq!(chain.nodes.first().map(|n| n.phase), Some(Phase::PreSnap));
        assert_eq!(chain.nodes.last().map(|n| n.phase), Some(Phase::Aftermath));
        for edge in &chain.edges {
            assert!(edge.cause < edge.effect);
            assert!(
                chain.nodes[edge.cause].phase.index() <= chain.nodes[edge.effect].phase.index()
            );
        }
    }

    #[test]
    fn kick_plays_resolve_to_kick_outcomes() {
        let (catalog, traits) = fixture();
        let resolver = SnapResolver::new(&catalog);
        let (mut scp, _, _) = testkit::valid_snap(&catalog, &traits, "fg_base_call", 3);
        scp.situation.yard_line = 70;
        scp.situation.down = 4;
        let resolution = resolver.resolve(&scp, &DefaultRetentionAdvisor).unwrap();
        assert!(matches!(
            resolution.play_result.outcome,
            TerminalEvent::FieldGoalGood | TerminalEvent::FieldGoalMiss
        ));
        assert!(resolution.play_result.score_event.is_some());
        assert_eq!(resolution.play_result.next_possession_team_id, testkit::AWAY);
    }

    #[test]
    fn missing_required_trait_mid_contest_hard_fails() {
        let (catalog, traits) = fixture();
        let (mut scp, _, _) = testkit::valid_run_snap(&catalog, &traits, 8);
        // Present for the gate's completeness shape but broken for contests.
        scp.trait_vectors.remove("AWAY_DT1");
        let err = SnapResolver::new(&catalog)
            .resolve(&scp, &DefaultRetentionAdvisor)
            .unwrap_err();
        assert_eq!(err.code(), "CONTEST_INPUT_ERROR");
    }

    #[test]
    fn turnover_flips_possession() {
        let (catalog, traits) = fixture();
        let resolver = SnapResolver::new(&catalog);
        // Sweep seeds until a turnover shows up, then check the adjudication.
        for seed in 0..500 {
            let (scp, _, _) = testkit::valid_pass_snap(&catalog, &traits, seed);
            let resolution = resolver.resolve(&scp, &DefaultRetentionAdvisor).unwrap();
            if resolution.play_result.turnover.is_some() {
                assert_eq!(resolution.play_result.next_possession_team_id, testkit::AWAY);
                assert_eq!(resolution.play_result.next_down, 1);
                return;
            }
        }
        panic!("no turnover observed across 500 seeds");
    }
}
