//! Shared test fixtures: catalog-driven snap packages and team sheets.

use std::collections::BTreeMap;

use crate::gate::{RosterPlayer, TeamSheet};
use crate::models::{
    position_for_slot, InGameState, ParameterizedIntent, ParticipantRecord, SimMode, Situation,
    SnapContextPackage, SCP_SCHEMA_VERSION,
};
use crate::resources::{ResourceCatalog, ResourceType};
use crate::rng::SubstreamHandle;
use crate::session::TeamContext;
use crate::traits::{generate_player_traits, TraitCatalog};

pub const HOME: &str = "HOME";
pub const AWAY: &str = "AWAY";

/// Build a gate-clean snap package for the given playbook entry, with
/// matching team sheets. Deterministic in `(entry_id, root_seed)`.
pub fn valid_snap(
    catalog: &ResourceCatalog,
    traits: &TraitCatalog,
    entry_id: &str,
    root_seed: u64,
) -> (SnapContextPackage, TeamSheet, TeamSheet) {
    let entry = catalog.playbook_entry(entry_id).unwrap().clone();
    let template = catalog
        .assignment_template(&entry.assignment_template_id)
        .unwrap()
        .clone();

    let mut participants = Vec::new();
    let mut trait_vectors = BTreeMap::new();
    let mut in_game_states = BTreeMap::new();
    let mut offense = empty_sheet(HOME);
    let mut defense = empty_sheet(AWAY);

    for (team_id, sheet, slots) in [
        (HOME, &mut offense, &template.offense_roles),
        (AWAY, &mut defense, &template.defense_roles),
    ] {
        for slot in slots {
            let player_id = format!("{team_id}_{slot}");
            let position = position_for_slot(slot);
            participants.push(ParticipantRecord {
                player_id: player_id.clone(),
                team_id: team_id.to_string(),
                role: position.clone(),
                slot: slot.clone(),
            });
            sheet.roster.insert(
                player_id.clone(),
                RosterPlayer {
                    player_id: player_id.clone(),
                    name: player_id.clone(),
                    position: position.clone(),
                },
            );
            sheet.depth_chart.insert(slot.clone(), player_id.clone());
            let vector = generate_player_traits(&player_id, &position, 78.0, 0.3, 0.3).unwrap();
            traits.check_vector(&player_id, &vector).unwrap();
            trait_vectors.insert(player_id.clone(), vector);
            in_game_states.insert(
                player_id,
                InGameState {
                    fatigue: 0.2,
                    acute_wear: 0.1,
                    confidence_tilt: 0.0,
                    injury_limitation: "none".to_string(),
                    discipline_risk: 0.15,
                },
            );
        }
    }

    let scp = SnapContextPackage {
        schema_version: SCP_SCHEMA_VERSION,
        game_id: "G1".to_string(),
        play_id: "P1".to_string(),
        mode: SimMode::Sim,
        situation: Situation {
            quarter: 1,
            clock_seconds: 900,
            down: 1,
            distance: 10,
            yard_line: 25,
            possession_team_id: HOME.to_string(),
            score_diff: 0,
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
            posture: "normal".to_string(),
            play_type: entry.play_type,
        },
        substream: SubstreamHandle::root(root_seed).derive("play_1"),
        weather_flags: Vec::new(),
    };
    (scp, offense, defense)
}

pub fn valid_run_snap(
    catalog: &ResourceCatalog,
    traits: &TraitCatalog,
    root_seed: u64,
) -> (SnapContextPackage, TeamSheet, TeamSheet) {
    valid_snap(catalog, traits, "iz_11_base", root_seed)
}

pub fn valid_pass_snap(
    catalog: &ResourceCatalog,
    traits: &TraitCatalog,
    root_seed: u64,
) -> (SnapContextPackage, TeamSheet, TeamSheet) {
    valid_snap(catalog, traits, "mesh_11_spread", root_seed)
}

/// Two full-game team contexts: every slot any assignment template can ask
/// for is staffed on both sides, so a whole session can run without
/// substitution logic.
pub fn full_team_contexts(
    catalog: &ResourceCatalog,
    traits: &TraitCatalog,
) -> (TeamContext, TeamContext) {
    let mut slots: Vec<String> = Vec::new();
    for template_id in catalog.ids(ResourceType::AssignmentTemplate) {
        let template = catalog.assignment_template(template_id).unwrap();
        for slot in template.offense_roles.iter().chain(&template.defense_roles) {
            if !slots.contains(slot) {
                slots.push(slot.clone());
            }
        }
    }

    let mut contexts = Vec::with_capacity(2);
    for team_id in [HOME, AWAY] {
        let mut sheet = empty_sheet(team_id);
        let mut trait_vectors = BTreeMap::new();
        for slot in &slots {
            let player_id = format!("{team_id}_{slot}");
            let position = position_for_slot(slot);
            sheet.roster.insert(
                player_id.clone(),
                RosterPlayer {
                    player_id: player_id.clone(),
                    name: player_id.clone(),
                    position: position.clone(),
                },
            );
            sheet.depth_chart.insert(slot.clone(), player_id.clone());
            let vector = generate_player_traits(&player_id, &position, 78.0, 0.3, 0.3).unwrap();
            traits.check_vector(&player_id, &vector).unwrap();
            trait_vectors.insert(player_id, vector);
        }
        contexts.push(TeamContext {
            sheet,
            trait_vectors,
        });
    }
    let away = contexts.pop().unwrap();
    let home = contexts.pop().unwrap();
    (home, away)
}

fn empty_sheet(team_id: &str) -> TeamSheet {
    TeamSheet {
        team_id: team_id.to_string(),
        coaching_policy_id: "balanced_default".to_string(),
        roster: BTreeMap::new(),
        depth_chart: BTreeMap::new(),
    }
}
