use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use continuation_planner::{ContinuationDecision, ContinuationPlanner, RetryDirective};
use obstruction_analyzer::{
    AttemptSummary, ContinuationVerdict, ObstructionAnalyzer, ObstructionContext,
};
use pagemend_core_types::{PagePort, PageState, ResolutionStrategy, SessionId};
use resolution_executor::{ExecutionTuning, ResolutionExecutor};
use resolution_verifier::{ResolutionVerifier, VerificationInput};

use crate::errors::RetryError;
use crate::state::{RetryAttempt, RetryPolicy, SessionEndKind, SessionReport, SessionState};

/// Verification confidence above which a failed attempt retries the same
/// strategy with heavier execution instead of switching.
const SAME_STRATEGY_CONFIDENCE: f64 = 0.6;
/// A strategy attempted this many times is switched away from.
const SAME_STRATEGY_LIMIT: usize = 2;

/// What the ladder decided for the next attempt.
#[derive(Clone, Debug, Default)]
struct AttemptPlan {
    strategy_override: Option<ResolutionStrategy>,
    tuning: ExecutionTuning,
    backoff_ms: u64,
    note: Option<&'static str>,
}

/// One obstruction session's orchestrator.
pub struct AdaptiveRetryController {
    analyzer: ObstructionAnalyzer,
    executor: ResolutionExecutor,
    verifier: ResolutionVerifier,
    planner: ContinuationPlanner,
    port: Arc<dyn PagePort>,
    policy: RetryPolicy,
}

impl AdaptiveRetryController {
    pub fn new(
        analyzer: ObstructionAnalyzer,
        executor: ResolutionExecutor,
        verifier: ResolutionVerifier,
        planner: ContinuationPlanner,
        port: Arc<dyn PagePort>,
    ) -> Self {
        Self {
            analyzer,
            executor,
            verifier,
            planner,
            port,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run one full obstruction session. `baseline` is the snapshot from
    /// before the obstruction appeared; cancellation is honored at state
    /// boundaries only.
    pub async fn run_session(
        &self,
        ctx: &ObstructionContext,
        baseline: &PageState,
        cancel: &CancellationToken,
    ) -> Result<SessionReport, RetryError> {
        let session_id = SessionId::new();
        let started = Instant::now();
        let mut attempts: Vec<RetryAttempt> = Vec::new();
        let mut last_decision: Option<ContinuationDecision> = None;
        info!(
            session = %session_id.0,
            kind = ctx.change.kind.label(),
            domain = %ctx.domain(),
            "obstruction session started"
        );

        while attempts.len() < self.policy.max_retries as usize {
            let attempt_number = attempts.len() as u32 + 1;

            if cancel.is_cancelled() {
                return Ok(self.cancelled(session_id, attempts, started, "session cancelled"));
            }
            let plan = if attempt_number == 1 {
                AttemptPlan::default()
            } else {
                plan_next_attempt(
                    &attempts,
                    last_decision.as_ref().and_then(|d| d.retry.as_ref()),
                    &self.policy,
                )
            };
            if plan.backoff_ms > 0 {
                debug!(backoff_ms = plan.backoff_ms, "backing off before retry");
                sleep(Duration::from_millis(plan.backoff_ms)).await;
                if cancel.is_cancelled() {
                    return Ok(self.cancelled(session_id, attempts, started, "session cancelled"));
                }
            }

            // ANALYZING
            self.transition(attempt_number, SessionState::Analyzing);
            let summaries: Vec<AttemptSummary> = attempts.iter().map(|a| a.summary()).collect();
            let mut proposal = match self.analyzer.analyze(ctx, &summaries).await {
                Ok(proposal) => proposal,
                Err(err) => {
                    warn!(attempt = attempt_number, error = %err, "analysis failed");
                    attempts.push(RetryAttempt::analysis_failed(attempt_number, err.to_string()));
                    continue;
                }
            };
            if let Some(strategy) = plan.strategy_override {
                if strategy != proposal.strategy {
                    debug!(
                        from = proposal.strategy.label(),
                        to = strategy.label(),
                        "retry ladder switched strategy"
                    );
                    proposal.strategy = strategy;
                    if let Some(note) = plan.note {
                        proposal.specific_action = note.to_string();
                    }
                }
            }
            if attempt_number > 1 {
                let decayed = proposal.confidence
                    - self.policy.confidence_decay * (attempt_number - 1) as f64;
                proposal.confidence = decayed.max(self.policy.confidence_floor);
            }

            // EXECUTING
            if cancel.is_cancelled() {
                return Ok(self.cancelled(session_id, attempts, started, "session cancelled"));
            }
            self.transition(attempt_number, SessionState::Executing);
            let outcome = self.executor.execute(&proposal, &ctx.change, plan.tuning).await?;

            // VERIFYING
            if cancel.is_cancelled() {
                return Ok(self.cancelled(session_id, attempts, started, "session cancelled"));
            }
            self.transition(attempt_number, SessionState::Verifying);
            let current = self.port.snapshot(false).await?;
            let verification = self.verifier.verify(&VerificationInput {
                baseline,
                current: &current,
                change: &ctx.change,
                strategy: proposal.strategy,
                outcome: &outcome,
            });

            // DECIDING
            if cancel.is_cancelled() {
                return Ok(self.cancelled(session_id, attempts, started, "session cancelled"));
            }
            self.transition(attempt_number, SessionState::Deciding);
            let drift = current.element_count() as i64 - baseline.element_count() as i64;
            let decision = self.planner.decide(ctx, &verification, drift).await;

            let success = outcome.success && verification.verified;
            attempts.push(RetryAttempt {
                attempt_number,
                strategy: proposal.strategy,
                proposal: Some(proposal),
                outcome: Some(outcome),
                verification: Some(verification),
                success,
                timestamp: chrono::Utc::now(),
                error: None,
            });
            let last_description = attempts
                .last()
                .and_then(|a| a.outcome.as_ref().map(|o| o.description.clone()))
                .unwrap_or_default();

            match decision.verdict {
                ContinuationVerdict::Continue | ContinuationVerdict::Adjust => {
                    self.transition(attempt_number, SessionState::Succeeded);
                    let description = last_description;
                    return Ok(SessionReport {
                        session_id,
                        kind: SessionEndKind::Resolved,
                        resolved: true,
                        attempts,
                        final_decision: Some(decision),
                        description,
                        duration_ms: started.elapsed().as_millis() as u64,
                    });
                }
                ContinuationVerdict::Replan => {
                    self.transition(attempt_number, SessionState::Failed);
                    return Ok(SessionReport {
                        session_id,
                        kind: SessionEndKind::Replan,
                        resolved: false,
                        attempts,
                        final_decision: Some(decision),
                        description: "plan is stale; replan required".to_string(),
                        duration_ms: started.elapsed().as_millis() as u64,
                    });
                }
                ContinuationVerdict::Abort => {
                    self.transition(attempt_number, SessionState::Failed);
                    return Ok(SessionReport {
                        session_id,
                        kind: SessionEndKind::Aborted,
                        resolved: false,
                        attempts,
                        final_decision: Some(decision),
                        description: "planner aborted the session".to_string(),
                        duration_ms: started.elapsed().as_millis() as u64,
                    });
                }
                ContinuationVerdict::Retry => {
                    self.transition(attempt_number, SessionState::Retrying);
                    last_decision = Some(decision);
                }
            }
        }

        let description = attempts
            .last()
            .and_then(|a| {
                a.outcome
                    .as_ref()
                    .map(|o| o.description.clone())
                    .or_else(|| a.error.clone())
            })
            .unwrap_or_else(|| "no attempts were made".to_string());
        warn!(attempts = attempts.len(), "retry budget exhausted");
        Ok(SessionReport {
            session_id,
            kind: SessionEndKind::Exhausted,
            resolved: false,
            attempts,
            final_decision: last_decision,
            description: format!("retries exhausted: {description}"),
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn cancelled(
        &self,
        session_id: SessionId,
        attempts: Vec<RetryAttempt>,
        started: Instant,
        description: &str,
    ) -> SessionReport {
        info!(session = %session_id.0, "session cancelled");
        SessionReport {
            session_id,
            kind: SessionEndKind::Cancelled,
            resolved: false,
            attempts,
            final_decision: None,
            description: description.to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn transition(&self, attempt: u32, state: SessionState) {
        debug!(attempt, state = state.label(), "session state");
    }
}

/// The retry ladder. In order: the planner's explicit directive, then
/// same-strategy-with-heavier-execution when the last verification was
/// close, then switching away from an over-tried strategy, then an
/// error-specific strategy when one error dominates, then plain backoff.
fn plan_next_attempt(
    attempts: &[RetryAttempt],
    directive: Option<&RetryDirective>,
    policy: &RetryPolicy,
) -> AttemptPlan {
    let completed = attempts.len() as u32;
    let tried_counts = strategy_counts(attempts);
    let last = attempts.last();

    // (a) Explicit directive from the continuation planner.
    if let Some(directive) = directive {
        if let Some(strategy) = directive
            .alternatives
            .iter()
            .copied()
            .find(|s| tried_counts.get(s).copied().unwrap_or(0) < SAME_STRATEGY_LIMIT)
        {
            return AttemptPlan {
                strategy_override: Some(strategy),
                tuning: ExecutionTuning::default(),
                backoff_ms: directive.backoff_ms,
                note: Some("retry with the planner's alternative strategy"),
            };
        }
    }

    // (b) Near-miss verification: same strategy, heavier execution.
    if let Some(last) = last {
        if last.verification_confidence() > SAME_STRATEGY_CONFIDENCE {
            return AttemptPlan {
                strategy_override: Some(last.strategy),
                tuning: ExecutionTuning {
                    timeout_multiplier: 2.0,
                    exhaust_dismissal_chain: true,
                },
                backoff_ms: policy.base_backoff_ms,
                note: None,
            };
        }
    }

    // (c) Over-tried strategy: switch to the next untried candidate.
    if let Some(last) = last {
        if tried_counts.get(&last.strategy).copied().unwrap_or(0) >= SAME_STRATEGY_LIMIT {
            if let Some(strategy) = ResolutionStrategy::fallback_candidates()
                .iter()
                .copied()
                .find(|s| !tried_counts.contains_key(s))
            {
                return AttemptPlan {
                    strategy_override: Some(strategy),
                    tuning: ExecutionTuning::default(),
                    backoff_ms: policy.base_backoff_ms,
                    note: Some("strategy exhausted; switching to an untried alternative"),
                };
            }
        }
    }

    // (d) Dominant recurring error gets an error-specific strategy.
    if let Some(error) = dominant_error(attempts) {
        if error.contains("not found") || error.contains("no option") {
            return AttemptPlan {
                strategy_override: Some(ResolutionStrategy::Wait),
                tuning: ExecutionTuning::default(),
                backoff_ms: policy.base_backoff_ms,
                note: Some("wait for the page to settle, then re-resolve the target"),
            };
        }
    }

    // (e) Plain exponential backoff on whatever the analyzer proposes.
    AttemptPlan {
        strategy_override: None,
        tuning: ExecutionTuning::default(),
        backoff_ms: policy.backoff_ms(completed),
        note: None,
    }
}

fn strategy_counts(attempts: &[RetryAttempt]) -> HashMap<ResolutionStrategy, usize> {
    let mut counts = HashMap::new();
    for attempt in attempts.iter().filter(|a| a.proposal.is_some()) {
        *counts.entry(attempt.strategy).or_insert(0) += 1;
    }
    counts
}

/// An error string carried by at least half of all attempts so far.
fn dominant_error(attempts: &[RetryAttempt]) -> Option<String> {
    if attempts.is_empty() {
        return None;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for attempt in attempts {
        let error = attempt
            .error
            .as_deref()
            .or_else(|| attempt.outcome.as_ref().and_then(|o| o.error.as_deref()));
        if let Some(error) = error {
            *counts.entry(error).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .find(|(_, n)| *n * 2 >= attempts.len())
        .map(|(e, _)| e.to_string())
}
