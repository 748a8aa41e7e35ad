//! Resolution Executor
//!
//! Translates a resolution proposal into page primitives through the
//! page port. A resolution that does not take effect is a failed
//! `ResolutionOutcome`, not an error; only port faults propagate.

pub mod errors;
pub mod executor;
pub mod model;
pub mod stabilize;

pub use errors::ExecutorError;
pub use executor::{ExecutionTuning, ResolutionExecutor};
pub use model::ResolutionOutcome;
pub use stabilize::{await_stable, StabilizePolicy};
