//! Obstruction handling and adaptive retry for plan-driven web
//! automation.
//!
//! When an unplanned page change (modal, autocomplete dropdown,
//! validation error, navigation) appears between two planned actions,
//! the engine classifies it, picks a resolution from heuristics, learned
//! patterns, and a model-assisted advisor, executes it through the page
//! port, verifies that it worked, and decides how the remaining plan
//! proceeds, retrying with adapted strategies under a bounded budget
//! and recording the outcome so the next occurrence resolves faster.
//!
//! [`ObstructionHandler::handle_obstruction`] is the single entry point
//! for the outer task loop; everything else is wiring.

pub mod config;
pub mod handler;

pub use config::{ConfigError, EngineConfig};
pub use handler::{HandlerError, ObstructionHandler, ObstructionHandlingResult};

pub use change_classifier::{classify, ChangeClassification, ChangeKind};
pub use continuation_planner::ContinuationDecision;
pub use obstruction_analyzer::{
    ContinuationVerdict, MockAdvisor, ObstructionContext, PlanAdjustment, ResolutionAdvisor,
    ResolutionProposal,
};
pub use pagemend_core_types::{
    ActionKind, ElementSignature, PagePort, PagePrimitive, PageState, PlannedAction, PortError,
    PrimitiveResult, ResolutionStrategy, TargetHint, Urgency,
};
pub use pattern_store::{LearningEvent, PatternStore, StoreInsights};
pub use retry_controller::{RetryPolicy, SessionReport};
