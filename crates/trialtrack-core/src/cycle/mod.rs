//! Measurement-cycle scheduler.
//!
//! Three services cooperate here:
//! - [`progress::CycleProgressStore`] derives the current cycle position from
//!   persisted round markers;
//! - [`gate::ActionGate`] decides whether the gating action occupies the
//!   first slot of a fresh cycle;
//! - [`resolver::VariableResolver`] selects and classifies the variables due
//!   at the current position.

pub mod gate;
pub mod progress;
pub mod resolver;

pub use gate::{ActionGate, ActionState, GateDecision};
pub use progress::{CycleProgressStore, ProgressRecord, GATING_DATA_KEY};
pub use resolver::{ResolutionResult, VariableResolver};
