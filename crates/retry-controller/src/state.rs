use chrono::{DateTime, Utc};
use serde::Serialize;

use continuation_planner::ContinuationDecision;
use obstruction_analyzer::{AttemptSummary, ResolutionProposal};
use pagemend_core_types::{ResolutionStrategy, SessionId};
use resolution_executor::ResolutionOutcome;
use resolution_verifier::VerificationResult;

/// States of one obstruction session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Analyzing,
    Executing,
    Verifying,
    Deciding,
    Retrying,
    Succeeded,
    Failed,
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Analyzing => "analyzing",
            SessionState::Executing => "executing",
            SessionState::Verifying => "verifying",
            SessionState::Deciding => "deciding",
            SessionState::Retrying => "retrying",
            SessionState::Succeeded => "succeeded",
            SessionState::Failed => "failed",
        }
    }
}

/// Retry budget and backoff tunables for a session.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total analyze/execute/verify cycles allowed, first attempt included.
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Proposal confidence lost per repeated attempt.
    pub confidence_decay: f64,
    pub confidence_floor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff_ms: 500,
            max_backoff_ms: 10_000,
            confidence_decay: 0.2,
            confidence_floor: 0.3,
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff before attempt `completed + 1`, capped.
    pub fn backoff_ms(&self, completed_attempts: u32) -> u64 {
        if completed_attempts == 0 {
            return 0;
        }
        let exp = completed_attempts.saturating_sub(1).min(16);
        (self.base_backoff_ms.saturating_mul(1u64 << exp)).min(self.max_backoff_ms)
    }
}

/// Append-only record of one analyze/execute/verify cycle. Owned by the
/// controller for the session and discarded when the session ends.
#[derive(Clone, Debug, Serialize)]
pub struct RetryAttempt {
    pub attempt_number: u32,
    pub strategy: ResolutionStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal: Option<ResolutionProposal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ResolutionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationResult>,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RetryAttempt {
    /// An attempt whose analysis produced no proposal; consumes budget.
    pub fn analysis_failed(attempt_number: u32, error: String) -> Self {
        Self {
            attempt_number,
            strategy: ResolutionStrategy::Wait,
            proposal: None,
            outcome: None,
            verification: None,
            success: false,
            timestamp: Utc::now(),
            error: Some(error),
        }
    }

    pub fn verification_confidence(&self) -> f64 {
        self.verification.as_ref().map_or(0.0, |v| v.confidence)
    }

    pub fn summary(&self) -> AttemptSummary {
        AttemptSummary {
            attempt_number: self.attempt_number,
            strategy: self.strategy,
            success: self.success,
            verification_confidence: self.verification_confidence(),
            error: self.error.clone(),
        }
    }
}

/// How a session ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEndKind {
    /// A resolution attempt verified and the plan proceeds.
    Resolved,
    /// The retry budget ran out without a verified resolution.
    Exhausted,
    /// Obstruction handled by handing control back for a replan.
    Replan,
    /// The planner judged further attempts pointless; a completed
    /// session with a real (failed) outcome.
    Aborted,
    /// The outer loop cancelled mid-session; incomplete, teaches nothing.
    Cancelled,
}

/// Everything the façade needs to report and learn from one session.
#[derive(Clone, Debug, Serialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub kind: SessionEndKind,
    pub resolved: bool,
    pub attempts: Vec<RetryAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_decision: Option<ContinuationDecision>,
    pub description: String,
    pub duration_ms: u64,
}

impl SessionReport {
    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }

    pub fn last_successful_attempt(&self) -> Option<&RetryAttempt> {
        self.attempts.iter().rev().find(|a| a.success)
    }
}
