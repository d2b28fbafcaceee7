//! Forensic artifact emission for hard-fail paths.
//!
//! Every component capable of hard-failing receives an explicit
//! [`ArtifactSink`] rather than reaching for global state, so emission is
//! substitutable in tests and ordering stays explicit. Emission failure is
//! itself fatal and surfaces as [`EngineError::ForensicEmission`].

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result};

/// Identifier block attached to every artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactIdentifiers {
    pub game_id: String,
    pub play_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Structured, persistable snapshot explaining a hard fail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForensicArtifact {
    pub artifact_id: String,
    pub timestamp: DateTime<Utc>,
    pub scope: String,
    pub error_code: String,
    pub message: String,
    pub identifiers: ArtifactIdentifiers,
    pub state_snapshot: serde_json::Value,
    pub causal_fragment: Vec<String>,
}

impl ForensicArtifact {
    pub fn new(
        scope: &str,
        error_code: &str,
        message: String,
        identifiers: ArtifactIdentifiers,
        state_snapshot: serde_json::Value,
        causal_fragment: Vec<String>,
    ) -> Self {
        ForensicArtifact {
            artifact_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            scope: scope.to_string(),
            error_code: error_code.to_string(),
            message,
            identifiers,
            state_snapshot,
            causal_fragment,
        }
    }
}

/// Opaque handle returned to callers alongside a terminal failure signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHandle(pub String);

/// Destination for forensic artifacts. Persistence proper belongs to an
/// external storage collaborator; the core only guarantees that emission
/// either succeeds or becomes a fatal error.
pub trait ArtifactSink: Send + Sync {
    fn emit(&self, artifact: ForensicArtifact) -> Result<ArtifactHandle>;
}

/// In-memory sink. Default for tests and for runtimes that drain artifacts
/// into external storage after the fact; mutex-backed so independent sessions
/// can share one sink.
#[derive(Debug, Default)]
pub struct MemorySink {
    artifacts: Mutex<Vec<ForensicArtifact>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<ForensicArtifact> {
        match self.artifacts.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.artifacts.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactSink for MemorySink {
    fn emit(&self, artifact: ForensicArtifact) -> Result<ArtifactHandle> {
        let handle = ArtifactHandle(artifact.artifact_id.clone());
        let mut guard = self
            .artifacts
            .lock()
            .map_err(|_| EngineError::ForensicEmission("artifact sink poisoned".into()))?;
        guard.push(artifact);
        Ok(handle)
    }
}

/// Sink that writes one pretty-printed JSON file per artifact.
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    dir: PathBuf,
}

impl JsonDirSink {
    pub fn new(dir: PathBuf) -> Self {
        JsonDirSink { dir }
    }
}

impl ArtifactSink for JsonDirSink {
    fn emit(&self, artifact: ForensicArtifact) -> Result<ArtifactHandle> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| EngineError::ForensicEmission(e.to_string()))?;
        let path = self.dir.join(format!("forensic_{}.json", artifact.artifact_id));
        let body = serde_json::to_string_pretty(&artifact)
            .map_err(|e| EngineError::ForensicEmission(e.to_string()))?;
        std::fs::write(&path, body).map_err(|e| EngineError::ForensicEmission(e.to_string()))?;
        Ok(ArtifactHandle(artifact.artifact_id))
    }
}

/// Emit an artifact describing `error`, preserving the original error kind.
///
/// Returns the emitted handle; if the sink itself fails, that failure
/// supersedes everything else.
pub fn emit_failure(
    sink: &dyn ArtifactSink,
    scope: &str,
    error: &EngineError,
    identifiers: ArtifactIdentifiers,
    state_snapshot: serde_json::Value,
    causal_fragment: Vec<String>,
) -> Result<ArtifactHandle> {
    let artifact = ForensicArtifact::new(
        scope,
        error.code(),
        error.to_string(),
        identifiers,
        state_snapshot,
        causal_fragment,
    );
    tracing::error!(
        scope = scope,
        error_code = artifact.error_code.as_str(),
        artifact_id = artifact.artifact_id.as_str(),
        "hard fail"
    );
    sink.emit(artifact)
}
