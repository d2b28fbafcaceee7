//! Rep ledger and causality recorder.
//!
//! During resolution every attributable contribution lands in the ledger as
//! an actor/phase/weight record, and every phase outcome that feeds a later
//! one becomes a causal link. The chain is an append-only sequence indexed
//! by phase; edges only ever point from earlier to later indices, so
//! acyclicity is structural rather than a runtime graph check.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, ensure_unit_interval, EngineError, Result};
use crate::models::PlayResult;
use crate::resolver::phase::Phase;

/// Tolerance for attributed responsibility sums.
pub const WEIGHT_SUM_EPSILON: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepLedgerEntry {
    pub actor_id: String,
    pub phase: Phase,
    pub responsibility_weight: f64,
    pub evidence_handle: String,
}

/// Per-snap contribution ledger. Append-only while a snap resolves; the
/// resolver seals it into the snap response.
#[derive(Debug, Clone, Default)]
pub struct RepLedger {
    entries: Vec<RepLedgerEntry>,
}

impl RepLedger {
    pub fn new() -> Self {
        RepLedger::default()
    }

    pub fn record(
        &mut self,
        phase: Phase,
        actor_id: &str,
        responsibility_weight: f64,
        evidence_handle: &str,
    ) -> Result<usize> {
        ensure_unit_interval("responsibility_weight", responsibility_weight)?;
        self.entries.push(RepLedgerEntry {
            actor_id: actor_id.to_string(),
            phase,
            responsibility_weight,
            evidence_handle: evidence_handle.to_string(),
        });
        Ok(self.entries.len() - 1)
    }

    pub fn entries(&self) -> &[RepLedgerEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<RepLedgerEntry> {
        self.entries
    }
}

/// Distribute responsibility for one attributable event proportional to each
/// actor's measured contest margin, renormalized to sum to 1.0. Margins are
/// magnitudes; equal shares when every margin measured zero.
pub fn distribute_responsibility(
    margins: &BTreeMap<String, f64>,
) -> Result<BTreeMap<String, f64>> {
    if margins.is_empty() {
        return Err(EngineError::ContestInput(
            "cannot attribute an event with no contributing actors".into(),
        ));
    }
    let mut magnitudes: BTreeMap<String, f64> = BTreeMap::new();
    for (actor_id, margin) in margins {
        ensure_finite(&format!("contest margin for '{actor_id}'"), *margin)?;
        magnitudes.insert(actor_id.clone(), margin.abs());
    }
    let total: f64 = magnitudes.values().sum();
    let share_of = |magnitude: f64| {
        if total > 0.0 {
            magnitude / total
        } else {
            1.0 / magnitudes.len() as f64
        }
    };
    let mut weights = BTreeMap::new();
    for (actor_id, magnitude) in &magnitudes {
        let weight = ensure_unit_interval("responsibility_weight", share_of(*magnitude))?;
        weights.insert(actor_id.clone(), weight);
    }
    let sum: f64 = weights.values().sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
        return Err(EngineError::Consistency(format!(
            "responsibility weights sum to {sum}, expected 1.0 ± {WEIGHT_SUM_EPSILON}"
        )));
    }
    Ok(weights)
}

// ============================================================================
// Causality
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalityNode {
    pub index: usize,
    pub phase: Phase,
    pub cause: String,
    /// Ledger entry indices this node is evidenced by.
    pub ledger_refs: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalityEdge {
    pub cause: usize,
    pub effect: usize,
}

/// Immutable, phase-ordered, acyclic chain for one snap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalityChain {
    pub nodes: Vec<CausalityNode>,
    pub edges: Vec<CausalityEdge>,
}

impl CausalityChain {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Records causal structure while a snap resolves. Any ordering violation is
/// an internal-invariant bug surfaced as [`EngineError::CausalityOrder`].
#[derive(Debug, Clone, Default)]
pub struct CausalityRecorder {
    nodes: Vec<CausalityNode>,
    edges: Vec<CausalityEdge>,
}

impl CausalityRecorder {
    pub fn new() -> Self {
        CausalityRecorder::default()
    }

    /// Append a node. Nodes must arrive in non-decreasing phase order.
    pub fn push_node(
        &mut self,
        phase: Phase,
        cause: &str,
        ledger_refs: Vec<usize>,
    ) -> Result<usize> {
        if let Some(last) = self.nodes.last() {
            if phase.index() < last.phase.index() {
                return Err(EngineError::CausalityOrder(format!(
                    "node in phase '{}' appended after phase '{}'",
                    phase.as_str(),
                    last.phase.as_str()
                )));
            }
        }
        let index = self.nodes.len();
        self.nodes.push(CausalityNode {
            index,
            phase,
            cause: cause.to_string(),
            ledger_refs,
        });
        Ok(index)
    }

    /// Append an edge. Edges must point forward in index (and therefore
    /// phase) order; anything else would admit a cycle.
    pub fn link(&mut self, cause: usize, effect: usize) -> Result<()> {
        if cause >= self.nodes.len() || effect >= self.nodes.len() {
            return Err(EngineError::CausalityOrder(format!(
                "edge {cause} -> {effect} references an unknown node"
            )));
        }
        if cause >= effect {
            return Err(EngineError::CausalityOrder(format!(
                "edge {cause} -> {effect} does not point forward"
            )));
        }
        self.edges.push(CausalityEdge { cause, effect });
        Ok(())
    }

    pub fn last_index(&self) -> Option<usize> {
        self.nodes.len().checked_sub(1)
    }

    pub fn finish(self) -> CausalityChain {
        CausalityChain {
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}

// ============================================================================
// Retention
// ============================================================================

/// Retention hint tagged onto each snap's output. The external retention
/// collaborator owns actual purge and derivation timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionHint {
    DeepRetain,
    Standard,
    Ephemeral,
}

impl RetentionHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionHint::DeepRetain => "deep_retain",
            RetentionHint::Standard => "standard",
            RetentionHint::Ephemeral => "ephemeral",
        }
    }
}

pub trait RetentionAdvisor: Send + Sync {
    fn advise(&self, result: &PlayResult, ledger: &[RepLedgerEntry]) -> RetentionHint;
}

/// Default advisor: scoring plays, turnovers, and penalized snaps are worth
/// keeping in full; everything else is standard.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRetentionAdvisor;

impl RetentionAdvisor for DefaultRetentionAdvisor {
    fn advise(&self, result: &PlayResult, _ledger: &[RepLedgerEntry]) -> RetentionHint {
        if result.score_event.is_some() || result.turnover.is_some() || !result.penalties.is_empty()
        {
            RetentionHint::DeepRetain
        } else {
            RetentionHint::Standard
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_renormalize_to_one() {
        let mut margins = BTreeMap::new();
        margins.insert("a".to_string(), 0.42);
        margins.insert("b".to_string(), 0.14);
        margins.insert("c".to_string(), -0.07);
        let weights = distribute_responsibility(&margins).unwrap();
        let sum: f64 = weights.values().sum();
        assert!((sum - 1.0).abs() <= WEIGHT_SUM_EPSILON);
        assert!(weights["a"] > weights["b"]);
        assert!(weights["c"] > 0.0);
    }

    #[test]
    fn zero_margins_attribute_equally() {
        let mut margins = BTreeMap::new();
        margins.insert("a".to_string(), 0.0);
        margins.insert("b".to_string(), 0.0);
        let weights = distribute_responsibility(&margins).unwrap();
        assert_eq!(weights["a"], 0.5);
        assert_eq!(weights["b"], 0.5);
    }

    #[test]
    fn empty_attribution_is_contest_input_error() {
        let err = distribute_responsibility(&BTreeMap::new()).unwrap_err();
        assert_eq!(err.code(), "CONTEST_INPUT_ERROR");
    }

    #[test]
    fn non_finite_margin_is_model_domain_error() {
        let mut margins = BTreeMap::new();
        margins.insert("a".to_string(), f64::NAN);
        let err = distribute_responsibility(&margins).unwrap_err();
        assert_eq!(err.code(), "MODEL_DOMAIN_ERROR");
    }

    #[test]
    fn ledger_rejects_out_of_interval_weight() {
        let mut ledger = RepLedger::new();
        let err = ledger
            .record(Phase::Engagement, "a", 1.4, "ev-1")
            .unwrap_err();
        assert_eq!(err.code(), "MODEL_DOMAIN_ERROR");
    }

    #[test]
    fn backward_edge_is_causality_order_error() {
        let mut recorder = CausalityRecorder::new();
        let first = recorder
            .push_node(Phase::EarlyLeverage, "leverage won", vec![0])
            .unwrap();
        let second = recorder
            .push_node(Phase::Engagement, "pressure emerged", vec![1])
            .unwrap();
        recorder.link(first, second).unwrap();
        let err = recorder.link(second, first).unwrap_err();
        assert_eq!(err.code(), "CAUSALITY_ORDER_ERROR");
        let err = recorder.link(first, first).unwrap_err();
        assert_eq!(err.code(), "CAUSALITY_ORDER_ERROR");
    }

    #[test]
    fn backward_phase_node_is_rejected() {
        let mut recorder = CausalityRecorder::new();
        recorder.push_node(Phase::Decision, "throw", vec![]).unwrap();
        let err = recorder
            .push_node(Phase::PreSnap, "alignment", vec![])
            .unwrap_err();
        assert_eq!(err.code(), "CAUSALITY_ORDER_ERROR");
    }

    #[test]
    fn chain_edges_are_phase_ordered() {
        let mut recorder = CausalityRecorder::new();
        for (phase, cause) in [
            (Phase::PreSnap, "alignment set"),
            (Phase::EarlyLeverage, "lane opened"),
            (Phase::Engagement, "second level reached"),
            (Phase::Terminal, "tackle made"),
        ] {
            let idx = recorder.push_node(phase, cause, vec![]).unwrap();
            if idx > 0 {
                recorder.link(idx - 1, idx).unwrap();
            }
        }
        let chain = recorder.finish();
        for edge in &chain.edges {
            assert!(edge.cause < edge.effect);
            assert!(
                chain.nodes[edge.cause].phase.index() <= chain.nodes[edge.effect].phase.index()
            );
        }
    }

    proptest::proptest! {
        #[test]
        fn distribution_always_sums_to_one(
            margins in proptest::collection::btree_map(
                "[a-z]{2,8}",
                0.0f64..10.0,
                1..12,
            )
        ) {
            let weights = distribute_responsibility(&margins).unwrap();
            let sum: f64 = weights.values().sum();
            proptest::prop_assert!((sum - 1.0).abs() <= WEIGHT_SUM_EPSILON);
            for weight in weights.values() {
                proptest::prop_assert!((0.0..=1.0).contains(weight));
            }
        }
    }
}
