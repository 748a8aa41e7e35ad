use std::sync::Arc;

use tracing::{debug, warn};

use change_classifier::ChangeKind;
use obstruction_analyzer::{
    AdjustmentKind, ContinuationRequest, ContinuationVerdict, ObstructionContext, PlanAdjustment,
    ResolutionAdvisor,
};
use pagemend_core_types::ResolutionStrategy;
use resolution_verifier::VerificationResult;

use crate::model::{ContinuationDecision, RetryDirective};

/// Verification confidence above which the planner decides by itself.
const HIGH_CONFIDENCE: f64 = 0.8;
/// Verification confidence below which failure is assumed outright.
const LOW_CONFIDENCE: f64 = 0.3;
/// Element-count drift past this means indices into the old element list
/// can no longer be trusted.
const DRIFT_RETARGET_LIMIT: i64 = 5;

const FALLBACK_RETRIES: u32 = 2;
const FALLBACK_BACKOFF_MS: u64 = 500;

/// Post-verification decision maker.
pub struct ContinuationPlanner {
    advisor: Arc<dyn ResolutionAdvisor>,
}

impl ContinuationPlanner {
    pub fn new(advisor: Arc<dyn ResolutionAdvisor>) -> Self {
        Self { advisor }
    }

    /// `element_drift` is the signed element-count delta between the
    /// pre-obstruction baseline and the current page.
    pub async fn decide(
        &self,
        ctx: &ObstructionContext,
        verification: &VerificationResult,
        element_drift: i64,
    ) -> ContinuationDecision {
        let confidence = verification.confidence;

        // A navigation obstruction that left us on the wrong page makes
        // the remaining plan stale no matter how the other checks scored.
        if ctx.change.kind == ChangeKind::Navigation
            && verification
                .failed_check_names()
                .iter()
                .any(|name| *name == "url_stable")
        {
            return ContinuationDecision::new(
                ContinuationVerdict::Replan,
                1.0 - confidence.min(0.9),
                "page navigated away from the plan's baseline; replan required",
            );
        }

        if verification.verified && confidence > HIGH_CONFIDENCE {
            if element_drift.abs() > DRIFT_RETARGET_LIMIT {
                debug!(element_drift, "resolution verified but page shape moved");
                return ContinuationDecision::new(
                    ContinuationVerdict::Adjust,
                    confidence,
                    "resolution verified; element indices drifted and need re-resolution",
                )
                .with_adjustments(retarget_adjustments(ctx));
            }
            return ContinuationDecision::new(
                ContinuationVerdict::Continue,
                confidence,
                "resolution verified with high confidence",
            );
        }

        if !verification.verified && confidence < LOW_CONFIDENCE {
            if ctx.change.kind == ChangeKind::Navigation {
                return ContinuationDecision::new(
                    ContinuationVerdict::Replan,
                    1.0 - confidence,
                    "resolution failed and the page navigated away; plan is stale",
                );
            }
            return ContinuationDecision::new(
                ContinuationVerdict::Retry,
                1.0 - confidence,
                "resolution clearly failed; retry with alternative strategies",
            )
            .with_retry(RetryDirective {
                max_retries: FALLBACK_RETRIES,
                backoff_ms: FALLBACK_BACKOFF_MS,
                alternatives: vec![ResolutionStrategy::Dismiss, ResolutionStrategy::Wait],
            });
        }

        self.escalate(ctx, verification).await
    }

    /// Ambiguous middle band: ask the advisor, fall back to a cautious
    /// retry if it cannot answer.
    async fn escalate(
        &self,
        ctx: &ObstructionContext,
        verification: &VerificationResult,
    ) -> ContinuationDecision {
        let request = ContinuationRequest {
            goal: ctx.original_goal.clone(),
            change_kind: ctx.change.kind,
            change_description: ctx.change.description.clone(),
            verification_confidence: verification.confidence,
            failed_checks: verification
                .failed_check_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            next_action: ctx.next_action.as_ref().map(|a| a.kind.label().to_string()),
            completed_steps: ctx.completed_step_summaries.clone(),
        };
        match self.advisor.advise_continuation(&request).await {
            Ok(advice) => {
                let mut decision = ContinuationDecision::new(
                    advice.verdict,
                    advice.confidence,
                    advice.reasoning,
                )
                .with_adjustments(advice.adjustments);
                if advice.verdict == ContinuationVerdict::Retry {
                    decision = decision.with_retry(RetryDirective {
                        max_retries: FALLBACK_RETRIES,
                        backoff_ms: FALLBACK_BACKOFF_MS,
                        alternatives: ResolutionStrategy::fallback_candidates().to_vec(),
                    });
                }
                decision
            }
            Err(err) => {
                warn!(error = %err, "continuation advisor unavailable, retrying cautiously");
                ContinuationDecision::new(
                    ContinuationVerdict::Retry,
                    0.5,
                    "advisor unavailable for ambiguous verification; retrying",
                )
                .with_retry(RetryDirective {
                    max_retries: 1,
                    backoff_ms: FALLBACK_BACKOFF_MS,
                    alternatives: vec![ResolutionStrategy::Wait],
                })
            }
        }
    }
}

/// Index-based targets in the upcoming action become semantic retargets;
/// anything else needs no adjustment.
fn retarget_adjustments(ctx: &ObstructionContext) -> Vec<PlanAdjustment> {
    let Some(next) = &ctx.next_action else {
        return Vec::new();
    };
    let Some(target) = next.kind.target() else {
        return Vec::new();
    };
    if !target.is_index_based() {
        return Vec::new();
    }
    let hint = target
        .text
        .clone()
        .or_else(|| target.role.clone())
        .or_else(|| next.intent.clone())
        .unwrap_or_else(|| next.kind.label().to_string());
    vec![PlanAdjustment {
        action_index: 0,
        kind: AdjustmentKind::Retarget { hint },
    }]
}
