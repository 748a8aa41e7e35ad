//! Obstruction Analyzer
//!
//! Produces resolution proposals for classified obstructions: a fast
//! heuristic rule table first, the model-assisted advisor for everything
//! the heuristics are not confident about and for every retry. Learned
//! patterns from the store are injected into the advisor request rather
//! than bypassing it, so the model reconciles history with the live page.

pub mod advisor;
pub mod analyzer;
pub mod errors;
pub mod heuristics;
pub mod model;

pub use advisor::{
    AdjustmentKind, AdvisorRequest, AttemptSummary, ContinuationAdvice, ContinuationRequest,
    ContinuationVerdict, LearnedHint, MockAdvisor, PlanAdjustment, ResolutionAdvisor,
};
pub use analyzer::ObstructionAnalyzer;
pub use errors::AnalyzerError;
pub use model::{ContinuationHint, ObstructionContext, ResolutionProposal};
