//! The phasal snap resolver and its contest machinery.

pub mod contest;
pub mod phase;
pub mod registry;
pub mod snap;

pub use contest::{ContestEvaluator, ContestOutcome, ContestRequest};
pub use phase::{Phase, PhaseCursor};
pub use registry::{ContestFn, ContestRegistry};
pub use snap::{SnapResolution, SnapResolver};
