//! Single entry point for the outer task loop.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use continuation_planner::ContinuationPlanner;
use obstruction_analyzer::{
    ObstructionAnalyzer, ObstructionContext, PlanAdjustment, ResolutionAdvisor,
};
use pagemend_core_types::{PagePort, PageState};
use pattern_store::{LearningEvent, PatternStore, StoreError};
use resolution_executor::ResolutionExecutor;
use resolution_verifier::{ResolutionVerifier, VerificationResult};
use retry_controller::{AdaptiveRetryController, RetryError, SessionEndKind, SessionReport};

use crate::config::EngineConfig;

#[derive(Debug, Error)]
pub enum HandlerError {
    /// An internal invariant was violated (missing context fields).
    /// Always fatal, never swallowed.
    #[error("obstruction context invalid: {0}")]
    Structural(String),
    #[error("pattern store unavailable: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Session(#[from] RetryError),
}

/// What the outer loop gets back from one handling call.
#[derive(Clone, Debug, Serialize)]
pub struct ObstructionHandlingResult {
    /// The obstruction was dealt with, either resolved or converted into
    /// a replan decision. `false` means the retry budget ran out.
    pub handled: bool,
    pub should_continue_with_plan: bool,
    #[serde(default)]
    pub adjusted_actions: Vec<PlanAdjustment>,
    /// Analyze/execute/verify cycles actually run.
    pub retry_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationResult>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Façade wiring classifier-to-controller components around a shared
/// pattern store. Constructed once per process; sessions are serialized
/// by the outer loop.
pub struct ObstructionHandler {
    controller: AdaptiveRetryController,
    store: Arc<PatternStore>,
}

impl ObstructionHandler {
    pub fn new(
        port: Arc<dyn PagePort>,
        advisor: Arc<dyn ResolutionAdvisor>,
        config: EngineConfig,
    ) -> Result<Self, HandlerError> {
        let store = Arc::new(
            PatternStore::load_from_path(config.pattern_snapshot_path.clone())?
                .with_limits(config.pattern_cap, config.event_log_cap),
        );
        let analyzer = ObstructionAnalyzer::new(advisor.clone(), store.clone())
            .with_heuristic_cutoff(config.heuristic_confidence_cutoff);
        let executor =
            ResolutionExecutor::new(port.clone()).with_stabilize_policy(config.stabilize_policy());
        let verifier = ResolutionVerifier::new().with_threshold(config.verify_threshold);
        let planner = ContinuationPlanner::new(advisor);
        let controller = AdaptiveRetryController::new(analyzer, executor, verifier, planner, port)
            .with_policy(config.retry_policy());
        Ok(Self { controller, store })
    }

    /// Shared pattern store, for insight queries and test assertions.
    pub fn store(&self) -> &Arc<PatternStore> {
        &self.store
    }

    /// Handle one obstruction occurrence. `baseline` is the snapshot
    /// from before the obstruction appeared; `cancel` aborts the session
    /// at the next state boundary.
    pub async fn handle_obstruction(
        &self,
        ctx: &ObstructionContext,
        baseline: &PageState,
        cancel: &CancellationToken,
    ) -> Result<ObstructionHandlingResult, HandlerError> {
        validate_context(ctx)?;

        if !ctx.change.kind.is_obstruction() {
            info!(kind = ctx.change.kind.label(), "change does not obstruct the plan");
            return Ok(ObstructionHandlingResult {
                handled: true,
                should_continue_with_plan: true,
                adjusted_actions: Vec::new(),
                retry_attempts: 0,
                verification: None,
                description: format!("{} change; no resolution needed", ctx.change.kind),
                error: None,
            });
        }

        let report = self.controller.run_session(ctx, baseline, cancel).await?;

        // A cancelled session is incomplete and teaches nothing. A
        // planner-decided abort ran to a real outcome and still records.
        if report.kind != SessionEndKind::Cancelled {
            self.learn(ctx, &report);
        }

        let handled = report.resolved || report.kind == SessionEndKind::Replan;
        let should_continue_with_plan = report
            .final_decision
            .as_ref()
            .map_or(false, |d| d.proceeds());
        let adjusted_actions = report
            .final_decision
            .as_ref()
            .map(|d| d.adjustments.clone())
            .unwrap_or_default();
        let verification = report
            .attempts
            .last()
            .and_then(|a| a.verification.clone());
        let error = if handled {
            None
        } else {
            Some(report.description.clone())
        };
        Ok(ObstructionHandlingResult {
            handled,
            should_continue_with_plan,
            adjusted_actions,
            retry_attempts: report.attempt_count(),
            verification,
            description: report.description,
            error,
        })
    }

    fn learn(&self, ctx: &ObstructionContext, report: &SessionReport) {
        // Sessions where no proposal ever ran teach nothing.
        let Some(last) = report.attempts.iter().rev().find(|a| a.proposal.is_some()) else {
            return;
        };
        let specific_action = last
            .proposal
            .as_ref()
            .map(|p| p.specific_action.clone())
            .unwrap_or_default();
        self.store.record_outcome(LearningEvent {
            domain: ctx.domain(),
            action: ctx.trigger_label().to_string(),
            kind: ctx.change.kind,
            signature: ctx.signature_fingerprint(),
            signature_hash: ctx.change.primary_hash(),
            strategy: last.strategy,
            specific_action,
            success: report.resolved,
            verification_confidence: last.verification_confidence(),
            attempts: report.attempt_count(),
            resolution_time_ms: report.duration_ms,
            recorded_at: Utc::now(),
            context: Some(ctx.change.description.clone()),
        });
        if let Err(err) = self.store.persist() {
            warn!(error = %err, "failed to persist pattern store snapshot");
        }
    }
}

fn validate_context(ctx: &ObstructionContext) -> Result<(), HandlerError> {
    if ctx.url.trim().is_empty() {
        error!("obstruction context carried no url");
        return Err(HandlerError::Structural("context url is empty".into()));
    }
    if ctx.original_goal.trim().is_empty() {
        error!("obstruction context carried no goal");
        return Err(HandlerError::Structural("original goal is empty".into()));
    }
    Ok(())
}
