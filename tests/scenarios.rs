//! End-to-end obstruction sessions against a scripted page port.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use obstruction_analyzer::{
    AdvisorRequest, AnalyzerError, ContinuationAdvice, ContinuationRequest, ContinuationVerdict,
    LearnedHint, ObstructionAnalyzer, ResolutionAdvisor, ResolutionProposal,
};
use pagemend::{
    classify, ActionKind, ChangeKind, ElementSignature, EngineConfig, LearningEvent, MockAdvisor,
    ObstructionContext, ObstructionHandler, PagePort, PagePrimitive, PageState, PlannedAction,
    PortError, PrimitiveResult, ResolutionStrategy, TargetHint, Urgency,
};
use continuation_planner::ContinuationPlanner;
use pattern_store::PatternStore;
use resolution_executor::ResolutionExecutor;
use resolution_verifier::ResolutionVerifier;
use retry_controller::{AdaptiveRetryController, SessionEndKind};

/// Page port driven by a mutable element list plus scripted reactions.
struct ScriptedPort {
    state: Mutex<PageState>,
    escape_succeeds: bool,
    /// Fingerprints removed when an escape is accepted.
    clear_on_escape: Vec<String>,
    /// Fingerprints removed when any element click is accepted.
    clear_on_click: Vec<String>,
    acts: Mutex<Vec<PagePrimitive>>,
}

impl ScriptedPort {
    fn new(state: PageState) -> Self {
        Self {
            state: Mutex::new(state),
            escape_succeeds: true,
            clear_on_escape: Vec::new(),
            clear_on_click: Vec::new(),
            acts: Mutex::new(Vec::new()),
        }
    }

    fn acts(&self) -> Vec<PagePrimitive> {
        self.acts.lock().clone()
    }

    fn remove(&self, fingerprints: &[String]) {
        self.state
            .lock()
            .elements
            .retain(|sig| !fingerprints.contains(&sig.fingerprint()));
    }
}

#[async_trait]
impl PagePort for ScriptedPort {
    async fn snapshot(&self, _visual: bool) -> Result<PageState, PortError> {
        Ok(self.state.lock().clone())
    }

    async fn act(&self, primitive: &PagePrimitive) -> Result<PrimitiveResult, PortError> {
        self.acts.lock().push(primitive.clone());
        match primitive {
            PagePrimitive::PressEscape => {
                if self.escape_succeeds {
                    self.remove(&self.clear_on_escape);
                    Ok(PrimitiveResult::ok())
                } else {
                    Ok(PrimitiveResult::failed("escape ignored"))
                }
            }
            PagePrimitive::ClickElement { .. } => {
                self.remove(&self.clear_on_click);
                Ok(PrimitiveResult::ok())
            }
            _ => Ok(PrimitiveResult::ok()),
        }
    }
}

fn plain(prefix: &str, n: usize) -> Vec<ElementSignature> {
    (0..n)
        .map(|i| {
            let mut sig = ElementSignature::new("div");
            sig.id = Some(format!("{prefix}{i}"));
            sig
        })
        .collect()
}

fn page(url: &str, elements: Vec<ElementSignature>) -> PageState {
    PageState::new(url, "page").with_elements(elements)
}

fn context(
    before: &PageState,
    after: &PageState,
    last_action: Option<PlannedAction>,
    goal: &str,
) -> ObstructionContext {
    let change = classify(before, after, last_action.as_ref());
    ObstructionContext {
        url: after.url.clone(),
        title: after.title.clone(),
        last_action,
        next_action: None,
        change,
        original_goal: goal.into(),
        completed_step_summaries: Vec::new(),
    }
}

fn handler(port: Arc<ScriptedPort>) -> ObstructionHandler {
    ObstructionHandler::new(port, Arc::new(MockAdvisor), EngineConfig::default()).unwrap()
}

// Scenario: autocomplete dropdown after typing. One INTERACT attempt
// clicks the first option and the plan continues.
#[tokio::test(start_paused = true)]
async fn autocomplete_after_typing_is_selected_and_plan_continues() {
    let input = ElementSignature::new("input");
    let listbox = ElementSignature::new("ul").with_role("listbox");
    let options: Vec<ElementSignature> = (0..3)
        .map(|i| {
            let mut opt = ElementSignature::new("li").with_role("option");
            opt.id = Some(format!("opt{i}"));
            opt
        })
        .collect();

    let before = page("https://flights.test/search", vec![input.clone()]);
    let mut after_elements = vec![input.clone(), listbox.clone()];
    after_elements.extend(options.clone());
    let after = page("https://flights.test/search", after_elements);

    let mut port = ScriptedPort::new(after.clone());
    port.clear_on_click = std::iter::once(&listbox)
        .chain(options.iter())
        .map(|sig| sig.fingerprint())
        .collect();
    let port = Arc::new(port);

    let typing = PlannedAction::new(ActionKind::TypeText {
        target: TargetHint::index(0),
        text: "san fr".into(),
        submit: false,
    });
    let ctx = context(&before, &after, Some(typing), "book a flight");
    assert_eq!(ctx.change.kind, ChangeKind::Interactive);

    let handler = handler(port.clone());
    let result = handler
        .handle_obstruction(&ctx, &before, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.handled);
    assert!(result.should_continue_with_plan);
    assert_eq!(result.retry_attempts, 1);
    let verification = result.verification.expect("verification present");
    assert!(verification.confidence > 0.6);
    assert!(matches!(
        port.acts()[0],
        PagePrimitive::ClickElement { .. }
    ));
    // The session taught the store an INTERACT pattern for this page.
    assert_eq!(handler.store().len(), 1);
}

// Scenario: blocking dialog after a click; escape is ignored, the close
// button works.
#[tokio::test(start_paused = true)]
async fn blocking_dialog_falls_back_to_close_button() {
    let modal = ElementSignature::new("div")
        .with_role("dialog")
        .with_classes(["modal"]);
    let mut close = ElementSignature::new("button").with_classes(["modal-close"]);
    close.aria_label = Some("Close".into());
    let chrome = plain("dlg", 12);

    let before = page("https://shop.test/cart", plain("e", 8));
    let mut after_elements = plain("e", 8);
    after_elements.push(modal.clone());
    after_elements.push(close.clone());
    after_elements.extend(chrome.clone());
    let after = page("https://shop.test/cart", after_elements);

    let mut port = ScriptedPort::new(after.clone());
    port.escape_succeeds = false;
    port.clear_on_click = std::iter::once(&modal)
        .chain(std::iter::once(&close))
        .chain(chrome.iter())
        .map(|sig| sig.fingerprint())
        .collect();
    let port = Arc::new(port);

    let click = PlannedAction::new(ActionKind::Click {
        target: TargetHint::index(3),
    });
    let ctx = context(&before, &after, Some(click), "check out");
    assert_eq!(ctx.change.kind, ChangeKind::Blocking);

    let result = handler(port.clone())
        .handle_obstruction(&ctx, &before, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.handled);
    assert!(result.should_continue_with_plan);
    let acts = port.acts();
    assert!(matches!(acts[0], PagePrimitive::PressEscape));
    assert!(matches!(acts[1], PagePrimitive::ClickElement { .. }));
}

// Scenario: a modal nothing can dismiss. The budget runs out after the
// ladder has tried DISMISS twice and WAIT once.
#[tokio::test(start_paused = true)]
async fn undismissable_modal_exhausts_the_budget() {
    let modal = ElementSignature::new("div")
        .with_role("dialog")
        .with_classes(["modal"]);
    let before = page("https://shop.test/cart", plain("e", 8));
    let mut after_elements = plain("e", 8);
    after_elements.push(modal.clone());
    after_elements.extend(plain("dlg", 12));
    let after = page("https://shop.test/cart", after_elements);

    let mut port = ScriptedPort::new(after.clone());
    port.escape_succeeds = false;
    let port = Arc::new(port);

    let click = PlannedAction::new(ActionKind::Click {
        target: TargetHint::index(3),
    });
    let ctx = context(&before, &after, Some(click), "check out");
    assert_eq!(ctx.change.kind, ChangeKind::Blocking);

    let handler = handler(port.clone());
    let result = handler
        .handle_obstruction(&ctx, &before, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.handled);
    assert!(!result.should_continue_with_plan);
    assert_eq!(result.retry_attempts, 3);
    assert!(result.error.unwrap().contains("retries exhausted"));

    // Same page through the bare controller: the strategy ladder must
    // repeat DISMISS once before switching to WAIT.
    let port = Arc::new({
        let mut p = ScriptedPort::new(after.clone());
        p.escape_succeeds = false;
        p
    });
    let advisor = Arc::new(MockAdvisor);
    let store = Arc::new(PatternStore::new());
    let controller = AdaptiveRetryController::new(
        ObstructionAnalyzer::new(advisor.clone(), store),
        ResolutionExecutor::new(port.clone()),
        ResolutionVerifier::new(),
        ContinuationPlanner::new(advisor),
        port,
    );
    let report = controller
        .run_session(&ctx, &before, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.kind, SessionEndKind::Exhausted);
    let strategies: Vec<ResolutionStrategy> =
        report.attempts.iter().map(|a| a.strategy).collect();
    assert_eq!(
        strategies,
        vec![
            ResolutionStrategy::Dismiss,
            ResolutionStrategy::Dismiss,
            ResolutionStrategy::Wait,
        ]
    );
}

// Scenario: the page navigated away. Classification is NAVIGATION and
// the continuation verdict is a replan, not a local retry.
#[tokio::test(start_paused = true)]
async fn surprise_navigation_ends_in_replan() {
    let before = page("https://shop.test/checkout", plain("e", 10));
    let after = page("https://login.sso.test/challenge", plain("n", 2));

    let port = Arc::new(ScriptedPort::new(after.clone()));
    let ctx = context(&before, &after, None, "check out");
    assert_eq!(ctx.change.kind, ChangeKind::Navigation);

    let result = handler(port)
        .handle_obstruction(&ctx, &before, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.handled);
    assert!(!result.should_continue_with_plan);
    assert!(result.description.contains("replan"));
}

// Scenario: a cancelled session must not learn anything.
#[tokio::test(start_paused = true)]
async fn cancelled_session_writes_no_learning_event() {
    let modal = ElementSignature::new("div").with_role("dialog");
    let before = page("https://shop.test", plain("e", 3));
    let mut after_elements = plain("e", 3);
    after_elements.push(modal);
    let after = page("https://shop.test", after_elements);

    let port = Arc::new(ScriptedPort::new(after.clone()));
    let ctx = context(&before, &after, None, "browse");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let handler = handler(port);
    let result = handler
        .handle_obstruction(&ctx, &before, &cancel)
        .await
        .unwrap();

    assert!(!result.handled);
    assert_eq!(result.retry_attempts, 0);
    assert!(handler.store().is_empty());
}

/// Advisor that records whether a learned hint reached it.
struct CapturingAdvisor {
    seen_hint: Mutex<Option<LearnedHint>>,
}

#[async_trait]
impl ResolutionAdvisor for CapturingAdvisor {
    async fn propose(&self, request: &AdvisorRequest) -> Result<ResolutionProposal, AnalyzerError> {
        *self.seen_hint.lock() = request.learned_hint.clone();
        match &request.learned_hint {
            Some(hint) => Ok(ResolutionProposal::new(
                hint.strategy,
                hint.specific_action.clone(),
                "following the learned pattern",
                Urgency::High,
                hint.confidence,
            )),
            None => Ok(ResolutionProposal::new(
                ResolutionStrategy::Wait,
                "no history; wait",
                "nothing learned yet",
                Urgency::Low,
                0.4,
            )),
        }
    }

    async fn advise_continuation(
        &self,
        request: &ContinuationRequest,
    ) -> Result<ContinuationAdvice, AnalyzerError> {
        Ok(ContinuationAdvice {
            verdict: ContinuationVerdict::Continue,
            confidence: request.verification_confidence,
            reasoning: "test".into(),
            adjustments: Vec::new(),
        })
    }
}

// Scenario: five recorded sessions (four successes) make the learned
// pattern the top match, and it is injected into the very first advisor
// call of the next occurrence.
#[tokio::test(start_paused = true)]
async fn learned_pattern_leads_the_next_occurrence() {
    let popup = ElementSignature::new("div")
        .with_role("listbox")
        .with_classes(["typeahead-panel"]);
    let before = page("https://mail.test/compose", plain("e", 4));
    let mut after_elements = plain("e", 4);
    after_elements.push(popup.clone());
    let after = page("https://mail.test/compose", after_elements);

    let mut port = ScriptedPort::new(after.clone());
    port.clear_on_escape = vec![popup.fingerprint()];
    let port = Arc::new(port);

    let advisor = Arc::new(CapturingAdvisor {
        seen_hint: Mutex::new(None),
    });
    let handler =
        ObstructionHandler::new(port.clone(), advisor.clone(), EngineConfig::default()).unwrap();

    // History: the same obstruction was dismissed successfully 4 of 5
    // times on this domain.
    for success in [true, true, true, false, true] {
        handler.store().record_outcome(LearningEvent {
            domain: "mail.test".into(),
            action: "none".into(),
            kind: ChangeKind::Interactive,
            signature: popup.fingerprint(),
            signature_hash: popup.stable_hash(),
            strategy: ResolutionStrategy::Dismiss,
            specific_action: "press escape to close the suggestion popup".into(),
            success,
            verification_confidence: if success { 0.9 } else { 0.2 },
            attempts: 1,
            resolution_time_ms: 700,
            recorded_at: chrono::Utc::now(),
            context: None,
        });
    }

    let ctx = context(&before, &after, None, "send an email");
    assert_eq!(ctx.change.kind, ChangeKind::Interactive);

    // The store already ranks the learned pattern first.
    let matches =
        handler
            .store()
            .find_matching("mail.test", "none", ChangeKind::Interactive, "div:listbox");
    assert_eq!(matches[0].successful_resolution, ResolutionStrategy::Dismiss);
    assert!(matches[0].metrics.success_rate > 0.5);

    let result = handler
        .handle_obstruction(&ctx, &before, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.handled);
    let hint = advisor.seen_hint.lock().clone().expect("hint injected");
    assert_eq!(hint.strategy, ResolutionStrategy::Dismiss);
    assert_eq!(
        hint.specific_action,
        "press escape to close the suggestion popup"
    );
    // The learned DISMISS ran: escape cleared the popup on the first try.
    assert!(matches!(port.acts()[0], PagePrimitive::PressEscape));
}
