//! Adaptive Retry Controller
//!
//! Drives repeated analyze → execute → verify → decide cycles for one
//! obstruction session as an explicit state machine, picking a different
//! strategy each retry from the failure history, bounded by a retry
//! budget. Cancellation is observed at state boundaries only.

pub mod controller;
pub mod errors;
pub mod state;

pub use controller::AdaptiveRetryController;
pub use errors::RetryError;
pub use state::{RetryAttempt, RetryPolicy, SessionEndKind, SessionReport, SessionState};
