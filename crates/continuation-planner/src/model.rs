use serde::{Deserialize, Serialize};

use obstruction_analyzer::{ContinuationVerdict, PlanAdjustment};
use pagemend_core_types::ResolutionStrategy;

/// Instructions for a local retry, attached to a `Retry` verdict.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryDirective {
    pub max_retries: u32,
    pub backoff_ms: u64,
    /// Strategies the retry should prefer, best-first.
    #[serde(default)]
    pub alternatives: Vec<ResolutionStrategy>,
}

/// The planner's answer: one verdict, the evidence strength behind it,
/// and any plan surgery that goes with it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContinuationDecision {
    pub verdict: ContinuationVerdict,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub adjustments: Vec<PlanAdjustment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryDirective>,
}

impl ContinuationDecision {
    pub fn new(
        verdict: ContinuationVerdict,
        confidence: f64,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            verdict,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
            adjustments: Vec::new(),
            retry: None,
        }
    }

    pub fn with_adjustments(mut self, adjustments: Vec<PlanAdjustment>) -> Self {
        self.adjustments = adjustments;
        self
    }

    pub fn with_retry(mut self, retry: RetryDirective) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Whether the outer plan proceeds (possibly adjusted) from here.
    pub fn proceeds(&self) -> bool {
        matches!(
            self.verdict,
            ContinuationVerdict::Continue | ContinuationVerdict::Adjust
        )
    }
}
