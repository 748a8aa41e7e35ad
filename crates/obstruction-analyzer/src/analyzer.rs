use std::sync::Arc;

use tracing::{debug, info};

use pattern_store::PatternStore;

use crate::advisor::{AdvisorRequest, AttemptSummary, LearnedHint, ResolutionAdvisor};
use crate::errors::AnalyzerError;
use crate::heuristics::heuristic_proposal;
use crate::model::{ObstructionContext, ResolutionProposal};

/// Default confidence a heuristic rule must clear to skip the advisor.
pub const DEFAULT_HEURISTIC_CUTOFF: f64 = 0.7;

/// Two-path analyzer: confident heuristics answer the first attempt
/// directly; everything else, and every retry, goes through the advisor
/// with learned patterns injected into the request.
pub struct ObstructionAnalyzer {
    advisor: Arc<dyn ResolutionAdvisor>,
    store: Arc<PatternStore>,
    heuristic_cutoff: f64,
}

impl ObstructionAnalyzer {
    pub fn new(advisor: Arc<dyn ResolutionAdvisor>, store: Arc<PatternStore>) -> Self {
        Self {
            advisor,
            store,
            heuristic_cutoff: DEFAULT_HEURISTIC_CUTOFF,
        }
    }

    pub fn with_heuristic_cutoff(mut self, cutoff: f64) -> Self {
        self.heuristic_cutoff = cutoff.clamp(0.0, 1.0);
        self
    }

    /// Produce a proposal for the obstruction. `prior_attempts` is empty
    /// on the first attempt; its presence forces the advisor path so the
    /// model can reason about what already failed.
    pub async fn analyze(
        &self,
        ctx: &ObstructionContext,
        prior_attempts: &[AttemptSummary],
    ) -> Result<ResolutionProposal, AnalyzerError> {
        if prior_attempts.is_empty() {
            if let Some(proposal) = heuristic_proposal(ctx) {
                if proposal.confidence > self.heuristic_cutoff {
                    debug!(
                        strategy = proposal.strategy.label(),
                        confidence = proposal.confidence,
                        "heuristic rule resolved analysis"
                    );
                    return Ok(proposal);
                }
            }
        }

        let hint = self.learned_hint(ctx);
        if let Some(hint) = &hint {
            info!(
                strategy = hint.strategy.label(),
                success_rate = hint.success_rate,
                "injecting learned pattern into advisor request"
            );
        }
        let request = AdvisorRequest::from_context(ctx)
            .with_prior_attempts(prior_attempts.to_vec())
            .with_learned_hint(hint);
        self.advisor.propose(&request).await
    }

    /// Best learned pattern for this obstruction family, if any.
    fn learned_hint(&self, ctx: &ObstructionContext) -> Option<LearnedHint> {
        let fingerprint = ctx.signature_fingerprint();
        if fingerprint.is_empty() {
            return None;
        }
        let matches = self.store.find_matching(
            &ctx.domain(),
            ctx.trigger_label(),
            ctx.change.kind,
            signature_prefix(&fingerprint),
        );
        matches.into_iter().next().map(|p| LearnedHint {
            strategy: p.successful_resolution,
            specific_action: p.specific_action,
            confidence: p.metrics.confidence,
            success_rate: p.metrics.success_rate,
            times_encountered: p.metrics.times_encountered,
        })
    }
}

/// Fingerprints are `tag:role#id.classes@zN`; the part before the class
/// list is stable across styling churn, so near-duplicates share it.
fn signature_prefix(fingerprint: &str) -> &str {
    fingerprint
        .split_once('.')
        .map(|(head, _)| head)
        .unwrap_or(fingerprint)
}
