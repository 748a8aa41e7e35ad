//! Model-assisted advisor port.
//!
//! The advisor is an external collaborator (typically an LLM behind a
//! prompting layer). Requests carry structured context only; responses
//! must parse into proposal- or adjustment-shaped payloads or the call
//! fails closed with an `AnalyzerError`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use change_classifier::ChangeKind;
use pagemend_core_types::{ResolutionStrategy, Urgency};

use crate::errors::AnalyzerError;
use crate::model::{ObstructionContext, ResolutionProposal};

/// Summary of one prior attempt, carried into retry requests.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub attempt_number: u32,
    pub strategy: ResolutionStrategy,
    pub success: bool,
    pub verification_confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Best learned pattern for this obstruction, injected so the advisor
/// reconciles history with the live page instead of being bypassed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LearnedHint {
    pub strategy: ResolutionStrategy,
    pub specific_action: String,
    pub confidence: f64,
    pub success_rate: f64,
    pub times_encountered: u32,
}

/// Structured context for a resolution proposal request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdvisorRequest {
    pub goal: String,
    pub url: String,
    pub change_kind: ChangeKind,
    pub change_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
    #[serde(default)]
    pub completed_steps: Vec<String>,
    #[serde(default)]
    pub prior_attempts: Vec<AttemptSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learned_hint: Option<LearnedHint>,
}

impl AdvisorRequest {
    pub fn from_context(ctx: &ObstructionContext) -> Self {
        Self {
            goal: ctx.original_goal.clone(),
            url: ctx.url.clone(),
            change_kind: ctx.change.kind,
            change_description: ctx.change.description.clone(),
            last_action: ctx
                .last_action
                .as_ref()
                .map(|a| describe_action(a.kind.label(), a.intent.as_deref())),
            next_action: ctx
                .next_action
                .as_ref()
                .map(|a| describe_action(a.kind.label(), a.intent.as_deref())),
            completed_steps: ctx.completed_step_summaries.clone(),
            prior_attempts: Vec::new(),
            learned_hint: None,
        }
    }

    pub fn with_prior_attempts(mut self, attempts: Vec<AttemptSummary>) -> Self {
        self.prior_attempts = attempts;
        self
    }

    pub fn with_learned_hint(mut self, hint: Option<LearnedHint>) -> Self {
        self.learned_hint = hint;
        self
    }
}

fn describe_action(label: &str, intent: Option<&str>) -> String {
    match intent {
        Some(intent) => format!("{label} ({intent})"),
        None => label.to_string(),
    }
}

/// One adjustment to a remaining planned action, keyed by index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanAdjustment {
    pub action_index: usize,
    pub kind: AdjustmentKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "adjust", rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Re-resolve the target by semantic attributes instead of position.
    Retarget { hint: String },
    Skip,
    Modify { note: String },
}

/// Verdict vocabulary shared with the continuation planner.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuationVerdict {
    Continue,
    Retry,
    Adjust,
    Replan,
    Abort,
}

impl ContinuationVerdict {
    pub fn label(&self) -> &'static str {
        match self {
            ContinuationVerdict::Continue => "continue",
            ContinuationVerdict::Retry => "retry",
            ContinuationVerdict::Adjust => "adjust",
            ContinuationVerdict::Replan => "replan",
            ContinuationVerdict::Abort => "abort",
        }
    }
}

/// Structured context for the ambiguous-band continuation escalation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContinuationRequest {
    pub goal: String,
    pub change_kind: ChangeKind,
    pub change_description: String,
    pub verification_confidence: f64,
    pub failed_checks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
    #[serde(default)]
    pub completed_steps: Vec<String>,
}

/// Advisor answer for a continuation escalation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContinuationAdvice {
    pub verdict: ContinuationVerdict,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub adjustments: Vec<PlanAdjustment>,
}

/// Model-assisted collaborator supplied by the embedder.
#[async_trait]
pub trait ResolutionAdvisor: Send + Sync {
    /// Propose a resolution for the obstruction in the request.
    async fn propose(&self, request: &AdvisorRequest) -> Result<ResolutionProposal, AnalyzerError>;

    /// Advise how the remaining plan should proceed when verification was
    /// inconclusive.
    async fn advise_continuation(
        &self,
        request: &ContinuationRequest,
    ) -> Result<ContinuationAdvice, AnalyzerError>;
}

/// Deterministic advisor used for tests and offline development.
#[derive(Debug, Default, Clone)]
pub struct MockAdvisor;

#[async_trait]
impl ResolutionAdvisor for MockAdvisor {
    async fn propose(&self, request: &AdvisorRequest) -> Result<ResolutionProposal, AnalyzerError> {
        if request.goal.trim().is_empty() {
            return Err(AnalyzerError::no_proposal("request carried no goal"));
        }
        // Prefer what worked before on this exact obstruction family.
        if let Some(hint) = &request.learned_hint {
            if hint.success_rate > 0.5 {
                return Ok(ResolutionProposal::new(
                    hint.strategy,
                    hint.specific_action.clone(),
                    format!(
                        "learned resolution succeeded {}x before on this domain",
                        hint.times_encountered
                    ),
                    Urgency::High,
                    hint.confidence,
                ));
            }
        }
        let tried: Vec<ResolutionStrategy> =
            request.prior_attempts.iter().map(|a| a.strategy).collect();
        let strategy = match request.change_kind {
            ChangeKind::Blocking => ResolutionStrategy::Dismiss,
            ChangeKind::Interactive => ResolutionStrategy::Interact,
            ChangeKind::Navigation | ChangeKind::Minor | ChangeKind::None => {
                ResolutionStrategy::Wait
            }
        };
        let strategy = if tried.contains(&strategy) {
            ResolutionStrategy::fallback_candidates()
                .iter()
                .copied()
                .find(|candidate| !tried.contains(candidate))
                .unwrap_or(strategy)
        } else {
            strategy
        };
        Ok(ResolutionProposal::new(
            strategy,
            format!("{} the {}", strategy.label(), request.change_kind.label()),
            "mock advisor verdict from change kind",
            Urgency::Medium,
            0.75,
        ))
    }

    async fn advise_continuation(
        &self,
        request: &ContinuationRequest,
    ) -> Result<ContinuationAdvice, AnalyzerError> {
        let lingering = request
            .failed_checks
            .iter()
            .any(|check| check == "obstruction_signature_gone");
        let verdict = if request.verification_confidence >= 0.5 && !lingering {
            ContinuationVerdict::Continue
        } else if request.change_kind == ChangeKind::Navigation {
            ContinuationVerdict::Replan
        } else {
            ContinuationVerdict::Retry
        };
        Ok(ContinuationAdvice {
            verdict,
            confidence: request.verification_confidence.clamp(0.0, 1.0),
            reasoning: "mock advisor continuation verdict".to_string(),
            adjustments: Vec::new(),
        })
    }
}
