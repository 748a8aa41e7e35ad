use serde::{Deserialize, Serialize};
use url::Url;

use change_classifier::ChangeClassification;
use pagemend_core_types::{PlannedAction, ResolutionStrategy, Urgency};

/// Snapshot of everything known about one obstruction occurrence.
///
/// Built once when the obstruction is detected and read-only through the
/// retry loop; retries enrich the advisor request, not this record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObstructionContext {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action: Option<PlannedAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<PlannedAction>,
    pub change: ChangeClassification,
    pub original_goal: String,
    #[serde(default)]
    pub completed_step_summaries: Vec<String>,
}

impl ObstructionContext {
    /// Host of the page, used as the pattern-store sharding key.
    pub fn domain(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Trigger-action label for pattern keys; "none" when the obstruction
    /// appeared without a preceding action.
    pub fn trigger_label(&self) -> &'static str {
        self.last_action
            .as_ref()
            .map(|a| a.kind.label())
            .unwrap_or("none")
    }

    pub fn signature_fingerprint(&self) -> String {
        self.change.primary_fingerprint().unwrap_or_default()
    }
}

/// What the remaining plan should do if this resolution works.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContinuationHint {
    pub should_continue: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_adjustments: Option<Vec<String>>,
}

/// A concrete resolution to attempt, owned by the analyzer and consumed
/// by the executor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolutionProposal {
    pub strategy: ResolutionStrategy,
    pub specific_action: String,
    pub reasoning: String,
    pub urgency: Urgency,
    pub confidence: f64,
    #[serde(default)]
    pub continuation: ContinuationHint,
}

impl ResolutionProposal {
    pub fn new(
        strategy: ResolutionStrategy,
        specific_action: impl Into<String>,
        reasoning: impl Into<String>,
        urgency: Urgency,
        confidence: f64,
    ) -> Self {
        Self {
            strategy,
            specific_action: specific_action.into(),
            reasoning: reasoning.into(),
            urgency,
            confidence: confidence.clamp(0.0, 1.0),
            continuation: ContinuationHint {
                should_continue: true,
                plan_adjustments: None,
            },
        }
    }

    pub fn with_strategy(mut self, strategy: ResolutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}
