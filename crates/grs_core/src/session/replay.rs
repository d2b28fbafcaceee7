//! Replay artifacts: a root seed plus the recorded action stream.
//!
//! Replay does not feed recorded outcomes back in; it re-runs the whole
//! session from the seed and demands that the regenerated stream fingerprint
//! match the recorded one. Any divergence means the engine or its resource
//! packs changed underneath the recording, which is a consistency hard fail.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};
use crate::resources::canonical_json;
use crate::session::engine::{ActionRecord, GameParams, GameResponse, GameSessionEngine};

/// Self-contained recording of one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayArtifact {
    pub game_id: String,
    pub rules_profile_id: String,
    pub root_seed: u64,
    pub fingerprint: String,
    pub actions: Vec<ActionRecord>,
}

/// Canonical fingerprint of an action stream: SHA-256 over its canonical
/// JSON form, hex-encoded.
pub fn stream_fingerprint(actions: &[ActionRecord]) -> Result<String> {
    let value = serde_json::to_value(actions).map_err(|e| EngineError::Schema {
        scope: "replay".into(),
        message: e.to_string(),
    })?;
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(&value).as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

impl ReplayArtifact {
    pub fn capture(params: &GameParams, response: &GameResponse) -> Result<Self> {
        Ok(ReplayArtifact {
            game_id: params.game_id.clone(),
            rules_profile_id: params.rules_profile_id.clone(),
            root_seed: params.root_seed,
            fingerprint: stream_fingerprint(&response.action_stream)?,
            actions: response.action_stream.clone(),
        })
    }

    /// Re-run the game and verify bit-level equivalence with the recording.
    pub fn verify(&self, engine: &GameSessionEngine<'_>, params: &GameParams) -> Result<GameResponse> {
        if params.game_id != self.game_id || params.root_seed != self.root_seed {
            return Err(EngineError::Consistency(format!(
                "replay artifact for game '{}' seed {} does not match params",
                self.game_id, self.root_seed
            )));
        }
        let response = engine.run_game(params)?;
        let regenerated = stream_fingerprint(&response.action_stream)?;
        if regenerated != self.fingerprint {
            return Err(EngineError::Consistency(format!(
                "replay divergence for game '{}': recorded {}, regenerated {regenerated}",
                self.game_id, self.fingerprint
            )));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forensic::MemorySink;
    use crate::models::SimMode;
    use crate::resources::ResourceCatalog;
    use crate::testkit;
    use crate::traits::TraitCatalog;

    fn game_params(catalog: &ResourceCatalog, traits: &TraitCatalog, seed: u64) -> GameParams {
        let (home, away) = testkit::full_team_contexts(catalog, traits);
        GameParams {
            game_id: "R001".to_string(),
            rules_profile_id: "standard".to_string(),
            mode: SimMode::Offscreen,
            root_seed: seed,
            home,
            away,
        }
    }

    #[test]
    fn capture_then_verify_round_trips() {
        let catalog = ResourceCatalog::load_embedded().unwrap();
        let traits = TraitCatalog::canonical().unwrap();
        let sink = MemorySink::new();
        let engine = GameSessionEngine::new(&catalog, &traits, &sink);
        let params = game_params(&catalog, &traits, 60422);

        let response = engine.run_game(&params).unwrap();
        let artifact = ReplayArtifact::capture(&params, &response).unwrap();
        let replayed = artifact.verify(&engine, &params).unwrap();
        assert_eq!(replayed.action_stream, response.action_stream);
        assert_eq!(replayed.final_state, response.final_state);
    }

    #[test]
    fn verify_rejects_wrong_seed() {
        let catalog = ResourceCatalog::load_embedded().unwrap();
        let traits = TraitCatalog::canonical().unwrap();
        let sink = MemorySink::new();
        let engine = GameSessionEngine::new(&catalog, &traits, &sink);
        let params = game_params(&catalog, &traits, 1);

        let response = engine.run_game(&params).unwrap();
        let artifact = ReplayArtifact::capture(&params, &response).unwrap();
        let other = game_params(&catalog, &traits, 2);
        let err = artifact.verify(&engine, &other).unwrap_err();
        assert_eq!(err.code(), "CONSISTENCY_VIOLATION");
    }

    #[test]
    fn fingerprint_is_order_sensitive() {
        let catalog = ResourceCatalog::load_embedded().unwrap();
        let traits = TraitCatalog::canonical().unwrap();
        let sink = MemorySink::new();
        let engine = GameSessionEngine::new(&catalog, &traits, &sink);
        let params = game_params(&catalog, &traits, 9);

        let response = engine.run_game(&params).unwrap();
        let mut reversed = response.action_stream.clone();
        reversed.reverse();
        assert_ne!(
            stream_fingerprint(&response.action_stream).unwrap(),
            stream_fingerprint(&reversed).unwrap()
        );
    }

    #[test]
    fn artifact_survives_serialization() {
        let catalog = ResourceCatalog::load_embedded().unwrap();
        let traits = TraitCatalog::canonical().unwrap();
        let sink = MemorySink::new();
        let engine = GameSessionEngine::new(&catalog, &traits, &sink);
        let params = game_params(&catalog, &traits, 77);

        let response = engine.run_game(&params).unwrap();
        let artifact = ReplayArtifact::capture(&params, &response).unwrap();
        let json = serde_json::to_string(&artifact).unwrap();
        let restored: ReplayArtifact = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, artifact);
        restored.verify(&engine, &params).unwrap();
    }
}
