//! Linear snap phase machine.
//!
//! PRE_SNAP → EARLY_LEVERAGE → ENGAGEMENT → DECISION → TERMINAL → AFTERMATH.
//! No skipping, no backward transition; AFTERMATH is terminal. Transitions
//! are enforced structurally by index ordering.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    PreSnap,
    EarlyLeverage,
    Engagement,
    Decision,
    Terminal,
    Aftermath,
}

impl Phase {
    pub const SEQUENCE: [Phase; 6] = [
        Phase::PreSnap,
        Phase::EarlyLeverage,
        Phase::Engagement,
        Phase::Decision,
        Phase::Terminal,
        Phase::Aftermath,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::PreSnap => "pre_snap",
            Phase::EarlyLeverage => "early_leverage",
            Phase::Engagement => "engagement",
            Phase::Decision => "decision",
            Phase::Terminal => "terminal",
            Phase::Aftermath => "aftermath",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The only legal successor, or `None` for AFTERMATH.
    pub fn next(&self) -> Option<Phase> {
        Phase::SEQUENCE.get(self.index() + 1).copied()
    }
}

/// Cursor over the phase sequence. Advancing by anything other than the next
/// phase is an internal-invariant bug, reported as a consistency failure.
#[derive(Debug, Clone)]
pub struct PhaseCursor {
    current: Phase,
    visited: Vec<Phase>,
}

impl PhaseCursor {
    pub fn start() -> Self {
        PhaseCursor {
            current: Phase::PreSnap,
            visited: vec![Phase::PreSnap],
        }
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    pub fn visited(&self) -> &[Phase] {
        &self.visited
    }

    pub fn advance(&mut self) -> Result<Phase> {
        let next = self.current.next().ok_or_else(|| {
            EngineError::Consistency("attempted to advance past AFTERMATH".into())
        })?;
        self.current = next;
        self.visited.push(next);
        Ok(next)
    }

    pub fn is_terminal(&self) -> bool {
        self.current == Phase::Aftermath
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_linear_and_complete() {
        let mut cursor = PhaseCursor::start();
        assert_eq!(cursor.current(), Phase::PreSnap);
        let mut seen = vec![Phase::PreSnap];
        while !cursor.is_terminal() {
            seen.push(cursor.advance().unwrap());
        }
        assert_eq!(seen, Phase::SEQUENCE.to_vec());
    }

    #[test]
    fn aftermath_is_terminal() {
        let mut cursor = PhaseCursor::start();
        for _ in 0..5 {
            cursor.advance().unwrap();
        }
        assert!(cursor.is_terminal());
        assert!(matches!(
            cursor.advance(),
            Err(EngineError::Consistency(_))
        ));
    }

    #[test]
    fn phase_order_is_total() {
        assert!(Phase::PreSnap < Phase::EarlyLeverage);
        assert!(Phase::Decision < Phase::Terminal);
        assert_eq!(Phase::Terminal.index(), 4);
    }
}
