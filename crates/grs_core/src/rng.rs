//! Deterministic RNG substream derivation.
//!
//! Substreams are a pure function from `(root seed, spawn path)` — there is
//! no shared mutable generator state, so concurrent sessions never interfere
//! and a persisted root seed plus action stream replays bit-identically.
//! Each snap, and each phase within a snap, draws from its own substream.

use std::collections::BTreeSet;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};

/// Pure substream seed derivation: SHA-256 over `"{root}:{path}"`, first
/// eight bytes big-endian. Identical pairs yield identical seeds;
/// distinct paths yield statistically independent streams.
pub fn derive_seed(root_seed: u64, path: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(root_seed.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(path.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Handle to one deterministic substream. Cheap to clone, serializable so a
/// snap context package can carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstreamHandle {
    root_seed: u64,
    path: String,
}

impl SubstreamHandle {
    /// Root handle for an injected seed. Per-session roots are normally
    /// spawned off one shared root via [`SubstreamHandle::derive`].
    pub fn root(root_seed: u64) -> Self {
        SubstreamHandle {
            root_seed,
            path: String::new(),
        }
    }

    /// Pure child derivation; never mutates `self`.
    pub fn derive(&self, spawn_id: &str) -> SubstreamHandle {
        let path = if self.path.is_empty() {
            spawn_id.to_string()
        } else {
            format!("{}/{}", self.path, spawn_id)
        };
        SubstreamHandle {
            root_seed: self.root_seed,
            path,
        }
    }

    pub fn seed(&self) -> u64 {
        if self.path.is_empty() {
            self.root_seed
        } else {
            derive_seed(self.root_seed, &self.path)
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Materialize the stream. Every call returns a generator at the same
    /// starting state.
    pub fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed())
    }
}

/// Tracks spawn ids issued within one scope (one snap, one session) and
/// rejects collisions, which would silently correlate draws.
#[derive(Debug)]
pub struct SubstreamScope {
    scope: String,
    issued: BTreeSet<String>,
}

impl SubstreamScope {
    pub fn new(scope: &str) -> Self {
        SubstreamScope {
            scope: scope.to_string(),
            issued: BTreeSet::new(),
        }
    }

    /// Derive a child of `parent`, enforcing spawn-id uniqueness within this
    /// scope. Collision is an [`EngineError::InvalidSpawnPolicy`] hard fail.
    pub fn derive(&mut self, parent: &SubstreamHandle, spawn_id: &str) -> Result<SubstreamHandle> {
        if !self.issued.insert(spawn_id.to_string()) {
            return Err(EngineError::InvalidSpawnPolicy {
                scope: self.scope.clone(),
                spawn_id: spawn_id.to_string(),
            });
        }
        Ok(parent.derive(spawn_id))
    }

    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn identical_pairs_are_bit_identical() {
        let a = SubstreamHandle::root(42).derive("g1:p1").derive("terminal");
        let b = SubstreamHandle::root(42).derive("g1:p1").derive("terminal");
        let xs: Vec<u64> = a.rng().sample_iter(rand::distributions::Standard).take(32).collect();
        let ys: Vec<u64> = b.rng().sample_iter(rand::distributions::Standard).take(32).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn distinct_spawn_ids_diverge() {
        let root = SubstreamHandle::root(42);
        let a: u64 = root.derive("early_leverage").rng().gen();
        let b: u64 = root.derive("engagement").rng().gen();
        assert_ne!(a, b);
    }

    #[test]
    fn sibling_roots_diverge() {
        let a: u64 = SubstreamHandle::root(1).derive("x").rng().gen();
        let b: u64 = SubstreamHandle::root(2).derive("x").rng().gen();
        assert_ne!(a, b);
    }

    #[test]
    fn scope_rejects_spawn_id_collision() {
        let root = SubstreamHandle::root(7);
        let mut scope = SubstreamScope::new("snap:G001_P001");
        scope.derive(&root, "decision").unwrap();
        let err = scope.derive(&root, "decision").unwrap_err();
        assert!(matches!(err, EngineError::InvalidSpawnPolicy { .. }));
    }

    #[test]
    fn derivation_is_pure() {
        let root = SubstreamHandle::root(99);
        let first = root.derive("a");
        let second = root.derive("a");
        assert_eq!(first, second);
        assert_eq!(root.path(), "");
    }
}
