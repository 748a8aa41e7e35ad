//! Continuation Planner
//!
//! Decides what the outer plan does after a resolution attempt: carry
//! on, carry on with adjustments, retry locally, hand back for a
//! replan, or abort. Confident verifications are decided locally; only
//! the ambiguous middle band escalates to the advisor.

pub mod model;
pub mod planner;

pub use model::{ContinuationDecision, RetryDirective};
pub use planner::ContinuationPlanner;
