//! Game session orchestration.
//!
//! The session layer owns everything the snap resolver deliberately does not:
//! play calling from coaching policies, clock and quarter bookkeeping, score
//! and possession state, fatigue accrual between snaps, and the forensic
//! emission contract around the pre-sim gate. Every snap goes through the
//! full gate, every hard fail emits an artifact before the error surfaces.

use std::collections::BTreeMap;

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};
use crate::forensic::{emit_failure, ArtifactIdentifiers, ArtifactSink};
use crate::gate::{PreSimGate, TeamSheet, ValidationReport};
use crate::ledger::{DefaultRetentionAdvisor, RetentionHint};
use crate::models::{
    position_for_slot, InGameState, ParameterizedIntent, ParticipantRecord, ScoreEvent, SimMode,
    Situation, SnapContextPackage, TerminalEvent, SCP_SCHEMA_VERSION,
};
use crate::resolver::{SnapResolution, SnapResolver};
use crate::resources::{PlaybookEntry, ResourceCatalog, RulesProfile};
use crate::rng::{SubstreamHandle, SubstreamScope};
use crate::traits::TraitCatalog;

/// Iteration guard; a regulation game runs ~130 snaps, overtime a few more.
const MAX_SNAPS_PER_GAME: u32 = 1_000;

const KICKOFF_SPOT: u8 = 35;
const TRY_SPOT: u8 = 98;

/// One team's inputs to a session: its sheet plus the trait vectors for
/// everyone on its roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamContext {
    pub sheet: TeamSheet,
    pub trait_vectors: BTreeMap<String, BTreeMap<String, f64>>,
}

/// Everything needed to run one game deterministically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameParams {
    pub game_id: String,
    pub rules_profile_id: String,
    pub mode: SimMode,
    pub root_seed: u64,
    pub home: TeamContext,
    pub away: TeamContext,
}

/// Serializable session state; the authoritative between-snap record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSessionState {
    pub game_id: String,
    pub quarter: u8,
    pub clock_seconds: i32,
    pub down: u8,
    pub distance: u8,
    pub yard_line: u8,
    pub possession_team_id: String,
    pub scores: BTreeMap<String, i32>,
    pub play_count: u32,
    pub drive_count: u32,
    pub in_game_states: BTreeMap<String, InGameState>,
    pub overtime: bool,
    pub complete: bool,
}

impl GameSessionState {
    pub fn score_of(&self, team_id: &str) -> i32 {
        self.scores.get(team_id).copied().unwrap_or(0)
    }
}

/// One entry in the action stream: the call that was made and what came of
/// it. The stream plus the root seed fully determines a replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub sequence: u32,
    pub play_id: String,
    pub quarter: u8,
    pub clock_seconds: i32,
    pub offense_team_id: String,
    pub posture: String,
    pub playbook_entry_id: String,
    pub down: u8,
    pub distance: u8,
    pub yard_line: u8,
    pub outcome: TerminalEvent,
    pub yards: i32,
    pub score_event: Option<ScoreEvent>,
    pub clock_delta: i32,
    pub next_possession_team_id: String,
    pub retention: RetentionHint,
}

/// Response for one completed game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResponse {
    pub final_state: GameSessionState,
    pub action_stream: Vec<ActionRecord>,
    /// Retention hint → snap count, for the external retention collaborator.
    pub retention_metadata: BTreeMap<String, u32>,
}

// ============================================================================
// Engine
// ============================================================================

pub struct GameSessionEngine<'a> {
    catalog: &'a ResourceCatalog,
    gate: PreSimGate<'a>,
    resolver: SnapResolver<'a>,
    sink: &'a dyn ArtifactSink,
}

/// What the next snap is, before policy lookup fills in the details.
enum PendingBall {
    Kickoff { kicking_team: String },
    Try { scoring_team: String },
    Scrimmage,
}

impl<'a> GameSessionEngine<'a> {
    pub fn new(
        catalog: &'a ResourceCatalog,
        traits: &'a TraitCatalog,
        sink: &'a dyn ArtifactSink,
    ) -> Self {
        GameSessionEngine {
            catalog,
            gate: PreSimGate::new(catalog, traits),
            resolver: SnapResolver::new(catalog),
            sink,
        }
    }

    /// Run one game to completion. Deterministic in `params` excluding
    /// `mode`, which is carried through but never consulted by resolution.
    pub fn run_game(&self, params: &GameParams) -> Result<GameResponse> {
        let rules = self.catalog.rules_profile(&params.rules_profile_id)?;
        let game_handle =
            SubstreamHandle::root(params.root_seed).derive(&format!("game:{}", params.game_id));
        let mut scope = SubstreamScope::new(&format!("session:{}", params.game_id));

        let mut state = self.initial_state(params, rules);
        // Away kicks the opener; home kicks to start the second half.
        let mut pending = PendingBall::Kickoff {
            kicking_team: params.away.sheet.team_id.clone(),
        };
        let mut actions: Vec<ActionRecord> = Vec::new();
        let mut retention_metadata: BTreeMap<String, u32> = BTreeMap::new();

        tracing::info!(
            game_id = params.game_id.as_str(),
            root_seed = params.root_seed,
            "session start"
        );

        while !state.complete {
            let sequence = state.play_count + 1;
            if sequence > MAX_SNAPS_PER_GAME {
                return Err(EngineError::Consistency(format!(
                    "game '{}' exceeded {MAX_SNAPS_PER_GAME} snaps without terminating",
                    params.game_id
                )));
            }

            let (entry_id, posture, offense_team) =
                self.call_play(params, &state, &pending, &game_handle, &mut scope, sequence)?;
            let entry = self.catalog.playbook_entry(&entry_id)?.clone();
            let play_id = format!("{}_P{sequence:03}", params.game_id);
            let substream = scope.derive(&game_handle, &format!("play_{sequence}"))?;

            let (offense_ctx, defense_ctx) = self.sides(params, &offense_team)?;
            let scp = match self.build_scp(
                &state, &entry, &posture, offense_ctx, defense_ctx, &play_id, params.mode,
                substream,
            ) {
                Ok(scp) => scp,
                Err(err) => return Err(self.fail(params, &play_id, "snap_assembly", err, &state)?),
            };

            let report = self.gate.validate(&scp, &offense_ctx.sheet, &defense_ctx.sheet);
            if !report.passed() {
                let err = report.first_error().unwrap_or_else(|| {
                    EngineError::Consistency("gate hard fail with no recorded issue".into())
                });
                self.emit_gate_failure(params, &play_id, &err, &report, &state)?;
                return Err(err);
            }

            let resolution = match self.resolver.resolve(&scp, &DefaultRetentionAdvisor) {
                Ok(resolution) => resolution,
                Err(err) => {
                    return Err(self.fail(params, &play_id, "snap_resolution", err, &state)?)
                }
            };

            *retention_metadata
                .entry(resolution.retention.as_str().to_string())
                .or_insert(0) += 1;
            actions.push(ActionRecord {
                sequence,
                play_id,
                quarter: state.quarter,
                clock_seconds: state.clock_seconds,
                offense_team_id: offense_team.clone(),
                posture,
                playbook_entry_id: entry.id.clone(),
                down: state.down,
                distance: state.distance,
                yard_line: state.yard_line,
                outcome: resolution.play_result.outcome,
                yards: resolution.play_result.yards,
                score_event: resolution.play_result.score_event,
                clock_delta: resolution.play_result.clock_delta,
                next_possession_team_id: resolution.play_result.next_possession_team_id.clone(),
                retention: resolution.retention,
            });

            pending = self.apply(params, rules, &mut state, &offense_team, &resolution);
        }

        tracing::info!(
            game_id = params.game_id.as_str(),
            plays = state.play_count,
            "session complete"
        );
        Ok(GameResponse {
            final_state: state,
            action_stream: actions,
            retention_metadata,
        })
    }

    fn initial_state(&self, params: &GameParams, rules: &RulesProfile) -> GameSessionState {
        let mut in_game_states = BTreeMap::new();
        for ctx in [&params.home, &params.away] {
            for player_id in ctx.sheet.roster.keys() {
                in_game_states.insert(
                    player_id.clone(),
                    InGameState {
                        fatigue: 0.05,
                        acute_wear: 0.05,
                        confidence_tilt: 0.0,
                        injury_limitation: "none".to_string(),
                        discipline_risk: 0.12,
                    },
                );
            }
        }
        let mut scores = BTreeMap::new();
        scores.insert(params.home.sheet.team_id.clone(), 0);
        scores.insert(params.away.sheet.team_id.clone(), 0);
        GameSessionState {
            game_id: params.game_id.clone(),
            quarter: 1,
            clock_seconds: rules.quarter_seconds,
            down: 1,
            distance: rules.first_down_distance,
            yard_line: KICKOFF_SPOT,
            possession_team_id: params.away.sheet.team_id.clone(),
            scores,
            play_count: 0,
            drive_count: 0,
            in_game_states,
            overtime: false,
            complete: false,
        }
    }

    /// Pick the playbook entry for the next snap. Kickoffs and tries are
    /// forced calls; scrimmage downs go through the offense's coaching
    /// policy, posture first, then a seeded draw from the posture playlist.
    fn call_play(
        &self,
        params: &GameParams,
        state: &GameSessionState,
        pending: &PendingBall,
        game_handle: &SubstreamHandle,
        scope: &mut SubstreamScope,
        sequence: u32,
    ) -> Result<(String, String, String)> {
        match pending {
            PendingBall::Kickoff { kicking_team } => Ok((
                "kickoff_base_call".to_string(),
                "special_teams".to_string(),
                kicking_team.clone(),
            )),
            PendingBall::Try { scoring_team } => {
                let opponent = self.opponent_of(params, scoring_team)?;
                let deficit = state.score_of(scoring_team) - state.score_of(&opponent);
                let entry = if deficit == -2 {
                    "two_point_smash"
                } else {
                    "xp_base_call"
                };
                Ok((entry.to_string(), "special_teams".to_string(), scoring_team.clone()))
            }
            PendingBall::Scrimmage => {
                let offense = state.possession_team_id.clone();
                if state.down >= 4 {
                    let entry = if state.yard_line >= 60 {
                        "fg_base_call"
                    } else {
                        "punt_base_call"
                    };
                    return Ok((entry.to_string(), "special_teams".to_string(), offense));
                }
                let (ctx, _) = self.sides(params, &offense)?;
                let policy = self.catalog.coaching_policy(&ctx.sheet.coaching_policy_id)?;
                let posture = if state.distance <= 2 {
                    "short_yardage"
                } else if state.down >= 3 && state.distance >= 8 {
                    "third_and_long"
                } else {
                    "normal"
                };
                let playlist = policy.playbook_by_posture.get(posture).ok_or_else(|| {
                    EngineError::ReferentialIntegrity {
                        field_path: format!("coaching_policy.{}.playbook_by_posture", policy.id),
                        id: posture.to_string(),
                    }
                })?;
                let mut rng = scope
                    .derive(game_handle, &format!("playcall_{sequence}"))?
                    .rng();
                let entry_id = playlist[rng.gen_range(0..playlist.len())].clone();
                Ok((entry_id, posture.to_string(), offense))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_scp(
        &self,
        state: &GameSessionState,
        entry: &PlaybookEntry,
        posture: &str,
        offense: &TeamContext,
        defense: &TeamContext,
        play_id: &str,
        mode: SimMode,
        substream: SubstreamHandle,
    ) -> Result<SnapContextPackage> {
        let template = self.catalog.assignment_template(&entry.assignment_template_id)?;
        let mut participants = Vec::with_capacity(22);
        let mut trait_vectors = BTreeMap::new();
        let mut in_game_states = BTreeMap::new();

        for (ctx, slots) in [
            (offense, &template.offense_roles),
            (defense, &template.defense_roles),
        ] {
            for slot in slots {
                let player_id = ctx.sheet.depth_chart.get(slot).ok_or_else(|| {
                    EngineError::ContestInput(format!(
                        "team '{}' has no depth chart entry for slot '{slot}'",
                        ctx.sheet.team_id
                    ))
                })?;
                participants.push(ParticipantRecord {
                    player_id: player_id.clone(),
                    team_id: ctx.sheet.team_id.clone(),
                    role: position_for_slot(slot),
                    slot: slot.clone(),
                });
                if let Some(vector) = ctx.trait_vectors.get(player_id) {
                    trait_vectors.insert(player_id.clone(), vector.clone());
                }
                if let Some(igs) = state.in_game_states.get(player_id) {
                    in_game_states.insert(player_id.clone(), igs.clone());
                }
            }
        }

        Ok(SnapContextPackage {
            schema_version: SCP_SCHEMA_VERSION,
            game_id: state.game_id.clone(),
            play_id: play_id.to_string(),
            mode,
            situation: Situation {
                quarter: state.quarter,
                clock_seconds: state.clock_seconds,
                down: state.down,
                distance: state.distance,
                yard_line: state.yard_line,
                possession_team_id: offense.sheet.team_id.clone(),
                score_diff: state.score_of(&offense.sheet.team_id)
                    - state.score_of(&defense.sheet.team_id),
                timeouts_offense: 3,
                timeouts_defense: 3,
            },
            participants,
            in_game_states,
            trait_vectors,
            intent: ParameterizedIntent {
                personnel: entry.personnel_id.clone(),
                formation: entry.formation_id.clone(),
                offensive_concept: entry.offensive_concept_id.clone(),
                defensive_concept: entry.defensive_concept_id.clone(),
                posture: posture.to_string(),
                play_type: entry.play_type,
            },
            substream,
            weather_flags: Vec::new(),
        })
    }

    /// Fold one resolution into session state and decide the next ball.
    fn apply(
        &self,
        params: &GameParams,
        rules: &RulesProfile,
        state: &mut GameSessionState,
        offense_team: &str,
        resolution: &SnapResolution,
    ) -> PendingBall {
        let delta = &resolution.state_delta;
        state.play_count += 1;
        for (team, points) in &delta.score_delta_by_team {
            *state.scores.entry(team.clone()).or_insert(0) += points;
        }
        state.clock_seconds -= delta.clock_delta;

        // Asymptotic fatigue accrual keeps state inside its domain without
        // ever clamping; everyone off the field recovers a little.
        for (player_id, igs) in state.in_game_states.iter_mut() {
            match delta.fatigue_delta.get(player_id) {
                Some(accrual) => igs.fatigue += accrual * (1.0 - igs.fatigue),
                None => igs.fatigue *= 0.97,
            }
        }

        // Injury tagging is hash-derived from the ledger, not drawn from the
        // resolution substreams, so it cannot perturb replayed outcomes.
        for entry in &resolution.rep_ledger {
            let mut hasher = Sha256::new();
            hasher.update(
                format!(
                    "{}:{}:{}",
                    resolution.play_result.play_id, entry.evidence_handle, entry.actor_id
                )
                .as_bytes(),
            );
            let digest = hasher.finalize();
            let roll = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) % 1000;
            if roll < 4 {
                if let Some(igs) = state.in_game_states.get_mut(&entry.actor_id) {
                    igs.injury_limitation = "limited".to_string();
                }
            }
        }

        let next = match resolution.play_result.outcome {
            TerminalEvent::Touchdown | TerminalEvent::ReturnTouchdown => {
                let scoring_team = delta
                    .score_delta_by_team
                    .keys()
                    .next()
                    .cloned()
                    .unwrap_or_else(|| offense_team.to_string());
                PendingBall::Try { scoring_team }
            }
            TerminalEvent::ExtraPointGood
            | TerminalEvent::ExtraPointMiss
            | TerminalEvent::TwoPointGood
            | TerminalEvent::TwoPointFail => PendingBall::Kickoff {
                kicking_team: offense_team.to_string(),
            },
            TerminalEvent::FieldGoalGood => PendingBall::Kickoff {
                kicking_team: offense_team.to_string(),
            },
            TerminalEvent::Safety => PendingBall::Kickoff {
                // Free kick by the team that conceded.
                kicking_team: offense_team.to_string(),
            },
            _ => {
                let next_offense = delta.next_possession_team_id.clone();
                if next_offense != offense_team {
                    // Perspective flips with possession.
                    state.yard_line = 100 - delta.new_spot.clamp(1, 99);
                    state.drive_count += 1;
                } else {
                    state.yard_line = delta.new_spot;
                }
                state.possession_team_id = next_offense;
                state.down = delta.next_down;
                state.distance = delta.next_distance;
                PendingBall::Scrimmage
            }
        };

        // Stage the forced spots for kickoffs and tries.
        match &next {
            PendingBall::Kickoff { kicking_team } => {
                stage_kickoff(state, rules, kicking_team);
            }
            PendingBall::Try { scoring_team } => {
                state.possession_team_id = scoring_team.clone();
                state.down = 1;
                state.distance = 2;
                state.yard_line = TRY_SPOT;
            }
            PendingBall::Scrimmage => {}
        }

        if state.clock_seconds <= 0 {
            if let Some(forced) = self.advance_period(params, rules, state) {
                return forced;
            }
        }
        next
    }

    /// Advance to the next period. Returns a forced kickoff when the break
    /// restarts play (halftime, overtime).
    fn advance_period(
        &self,
        params: &GameParams,
        rules: &RulesProfile,
        state: &mut GameSessionState,
    ) -> Option<PendingBall> {
        state.quarter += 1;
        if state.quarter <= rules.quarters {
            state.clock_seconds = rules.quarter_seconds;
            if state.quarter == rules.quarters / 2 + 1 {
                // The opener's mirror: home kicks off the second half.
                let kicking_team = params.home.sheet.team_id.clone();
                stage_kickoff(state, rules, &kicking_team);
                return Some(PendingBall::Kickoff { kicking_team });
            }
            return None;
        }
        let home = &params.home.sheet.team_id;
        let away = &params.away.sheet.team_id;
        if !state.overtime && state.score_of(home) == state.score_of(away) {
            // One full overtime period; a tie after it stands.
            state.overtime = true;
            state.clock_seconds = rules.overtime_seconds;
            let kicking_team = params.away.sheet.team_id.clone();
            stage_kickoff(state, rules, &kicking_team);
            return Some(PendingBall::Kickoff { kicking_team });
        }
        state.complete = true;
        None
    }

    fn sides<'p>(
        &self,
        params: &'p GameParams,
        offense_team: &str,
    ) -> Result<(&'p TeamContext, &'p TeamContext)> {
        if offense_team == params.home.sheet.team_id {
            Ok((&params.home, &params.away))
        } else if offense_team == params.away.sheet.team_id {
            Ok((&params.away, &params.home))
        } else {
            Err(EngineError::Consistency(format!(
                "possession team '{offense_team}' is not in this game"
            )))
        }
    }

    fn opponent_of(&self, params: &GameParams, team_id: &str) -> Result<String> {
        self.sides(params, team_id)
            .map(|(_, opponent)| opponent.sheet.team_id.clone())
    }

    fn emit_gate_failure(
        &self,
        params: &GameParams,
        play_id: &str,
        err: &EngineError,
        report: &ValidationReport,
        state: &GameSessionState,
    ) -> Result<()> {
        let failing: Vec<String> = report
            .stages
            .iter()
            .filter(|s| !s.passed())
            .map(|s| s.stage.as_str().to_string())
            .collect();
        let violations: Vec<String> = report.violations().map(|v| v.message.clone()).collect();
        emit_failure(
            self.sink,
            "pre_sim_gate",
            err,
            ArtifactIdentifiers {
                game_id: params.game_id.clone(),
                play_id: play_id.to_string(),
                team_id: Some(state.possession_team_id.clone()),
                request_id: None,
            },
            serde_json::json!({
                "quarter": state.quarter,
                "clock_seconds": state.clock_seconds,
                "down": state.down,
                "distance": state.distance,
                "yard_line": state.yard_line,
                "violations": violations,
            }),
            failing,
        )?;
        Ok(())
    }

    /// Emit an artifact for a non-gate hard fail and hand the error back.
    fn fail(
        &self,
        params: &GameParams,
        play_id: &str,
        scope: &str,
        err: EngineError,
        state: &GameSessionState,
    ) -> Result<EngineError> {
        emit_failure(
            self.sink,
            scope,
            &err,
            ArtifactIdentifiers {
                game_id: params.game_id.clone(),
                play_id: play_id.to_string(),
                team_id: Some(state.possession_team_id.clone()),
                request_id: None,
            },
            serde_json::json!({
                "quarter": state.quarter,
                "play_count": state.play_count,
            }),
            vec![scope.to_string()],
        )?;
        Ok(err)
    }
}

fn stage_kickoff(state: &mut GameSessionState, rules: &RulesProfile, kicking_team: &str) {
    state.possession_team_id = kicking_team.to_string();
    state.down = 1;
    state.distance = rules.first_down_distance;
    state.yard_line = KICKOFF_SPOT;
}

/// Resolve a week's slate of games in parallel. Each game derives its own
/// substreams from its own root, so ordering and scheduling cannot perturb
/// any game's outcome.
pub fn run_week_slate(
    catalog: &ResourceCatalog,
    traits: &TraitCatalog,
    sink: &dyn ArtifactSink,
    games: &[GameParams],
) -> Result<Vec<GameResponse>> {
    games
        .par_iter()
        .map(|params| GameSessionEngine::new(catalog, traits, sink).run_game(params))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forensic::MemorySink;
    use crate::resources::ResourceCatalog;
    use crate::testkit;
    use crate::traits::TraitCatalog;

    fn fixture() -> (ResourceCatalog, TraitCatalog) {
        (
            ResourceCatalog::load_embedded().unwrap(),
            TraitCatalog::canonical().unwrap(),
        )
    }

    fn params(catalog: &ResourceCatalog, traits: &TraitCatalog, seed: u64) -> GameParams {
        let (home, away) = testkit::full_team_contexts(catalog, traits);
        GameParams {
            game_id: "G001".to_string(),
            rules_profile_id: "standard".to_string(),
            mode: SimMode::Sim,
            root_seed: seed,
            home,
            away,
        }
    }

    #[test]
    fn full_game_runs_to_completion() {
        let (catalog, traits) = fixture();
        let sink = MemorySink::new();
        let engine = GameSessionEngine::new(&catalog, &traits, &sink);
        let response = engine.run_game(&params(&catalog, &traits, 2026)).unwrap();

        assert!(response.final_state.complete);
        assert!(response.final_state.quarter >= 4);
        assert!(response.final_state.play_count > 40);
        assert_eq!(
            response.final_state.play_count as usize,
            response.action_stream.len()
        );
        assert!(sink.is_empty(), "clean game must emit no artifacts");
        // Kickoffs happen at least at the start of each half.
        let kickoffs = response
            .action_stream
            .iter()
            .filter(|a| a.playbook_entry_id == "kickoff_base_call")
            .count();
        assert!(kickoffs >= 2);
        let counted: u32 = response.retention_metadata.values().sum();
        assert_eq!(counted, response.final_state.play_count);
    }

    #[test]
    fn same_seed_same_game() {
        let (catalog, traits) = fixture();
        let sink = MemorySink::new();
        let engine = GameSessionEngine::new(&catalog, &traits, &sink);
        let a = engine.run_game(&params(&catalog, &traits, 7)).unwrap();
        let b = engine.run_game(&params(&catalog, &traits, 7)).unwrap();
        assert_eq!(a.action_stream, b.action_stream);
        assert_eq!(a.final_state, b.final_state);
    }

    #[test]
    fn mode_does_not_change_the_game() {
        let (catalog, traits) = fixture();
        let sink = MemorySink::new();
        let engine = GameSessionEngine::new(&catalog, &traits, &sink);
        let mut p = params(&catalog, &traits, 11);
        p.mode = SimMode::Play;
        let interactive = engine.run_game(&p).unwrap();
        p.mode = SimMode::Offscreen;
        let background = engine.run_game(&p).unwrap();
        assert_eq!(interactive.action_stream, background.action_stream);
        assert_eq!(interactive.final_state.scores, background.final_state.scores);
    }

    #[test]
    fn fatigue_accrues_without_leaving_domain() {
        let (catalog, traits) = fixture();
        let sink = MemorySink::new();
        let engine = GameSessionEngine::new(&catalog, &traits, &sink);
        let response = engine.run_game(&params(&catalog, &traits, 3)).unwrap();
        for (player_id, igs) in &response.final_state.in_game_states {
            assert!(
                (0.0..=1.0).contains(&igs.fatigue),
                "{player_id} fatigue {}",
                igs.fatigue
            );
        }
        let fatigued = response
            .final_state
            .in_game_states
            .values()
            .filter(|s| s.fatigue > 0.05)
            .count();
        assert!(fatigued > 0);
        for igs in response.final_state.in_game_states.values() {
            assert!(matches!(igs.injury_limitation.as_str(), "none" | "limited"));
        }
    }

    #[test]
    fn every_default_playlist_entry_survives_gate_and_resolution() {
        let (catalog, traits) = fixture();
        let gate = crate::gate::PreSimGate::new(&catalog, &traits);
        let resolver = crate::resolver::SnapResolver::new(&catalog);
        let policy = catalog.coaching_policy("balanced_default").unwrap();
        for playlist in policy.playbook_by_posture.values() {
            for entry_id in playlist {
                let (scp, offense, defense) =
                    testkit::valid_snap(&catalog, &traits, entry_id, 41);
                let report = gate.validate(&scp, &offense, &defense);
                assert!(
                    report.passed(),
                    "'{entry_id}' rejected: {:?}",
                    report.first_error()
                );
                resolver
                    .resolve(&scp, &crate::ledger::DefaultRetentionAdvisor)
                    .unwrap_or_else(|e| panic!("'{entry_id}' failed to resolve: {e}"));
            }
        }
    }

    #[test]
    fn second_and_short_calls_from_the_short_yardage_playlist() {
        let (catalog, traits) = fixture();
        let sink = MemorySink::new();
        let engine = GameSessionEngine::new(&catalog, &traits, &sink);
        let p = params(&catalog, &traits, 9);
        let rules = catalog.rules_profile(&p.rules_profile_id).unwrap();
        let game_handle = SubstreamHandle::root(p.root_seed).derive("game:G001");
        let mut scope = SubstreamScope::new("session:G001");

        let mut state = engine.initial_state(&p, rules);
        state.possession_team_id = p.home.sheet.team_id.clone();
        state.down = 2;
        state.distance = 1;
        state.yard_line = 55;

        let policy = catalog.coaching_policy("balanced_default").unwrap();
        let playlist = &policy.playbook_by_posture["short_yardage"];
        // Every seeded draw must stay inside the short-yardage playlist.
        for sequence in 1..=8 {
            let (entry_id, posture, offense) = engine
                .call_play(&p, &state, &PendingBall::Scrimmage, &game_handle, &mut scope, sequence)
                .unwrap();
            assert_eq!(posture, "short_yardage");
            assert_eq!(offense, p.home.sheet.team_id);
            assert!(playlist.contains(&entry_id), "unexpected call '{entry_id}'");
        }
    }

    #[test]
    fn broken_roster_hard_fails_and_emits() {
        let (catalog, traits) = fixture();
        let sink = MemorySink::new();
        let engine = GameSessionEngine::new(&catalog, &traits, &sink);
        let mut p = params(&catalog, &traits, 5);
        // 21 on the field: the away sheet loses a starter with no backup.
        p.away.sheet.depth_chart.remove("KR");
        let err = engine.run_game(&p).unwrap_err();
        assert_eq!(err.code(), "CONTEST_INPUT_ERROR");
        let artifacts = sink.drain();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].scope, "snap_assembly");
    }

    #[test]
    fn missing_trait_vector_fails_the_gate_with_artifact() {
        let (catalog, traits) = fixture();
        let sink = MemorySink::new();
        let engine = GameSessionEngine::new(&catalog, &traits, &sink);
        let mut p = params(&catalog, &traits, 5);
        let victim = p
            .away
            .sheet
            .depth_chart
            .get("KR")
            .cloned()
            .unwrap();
        p.away.trait_vectors.remove(&victim);
        let err = engine.run_game(&p).unwrap_err();
        assert_eq!(err.code(), "COMPLETENESS_VIOLATION");
        let artifacts = sink.drain();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].scope, "pre_sim_gate");
        assert!(artifacts[0]
            .causal_fragment
            .contains(&"trait_completeness".to_string()));
    }

    #[test]
    fn week_slate_matches_serial_runs() {
        let (catalog, traits) = fixture();
        let sink = MemorySink::new();
        let mut games = Vec::new();
        for (i, seed) in [(1u32, 100u64), (2, 200), (3, 300)] {
            let mut p = params(&catalog, &traits, seed);
            p.game_id = format!("W1_G{i:02}");
            games.push(p);
        }
        let parallel = run_week_slate(&catalog, &traits, &sink, &games).unwrap();
        let engine = GameSessionEngine::new(&catalog, &traits, &sink);
        for (params, from_slate) in games.iter().zip(&parallel) {
            let serial = engine.run_game(params).unwrap();
            assert_eq!(serial.action_stream, from_slate.action_stream);
        }
    }
}
