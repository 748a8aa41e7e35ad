use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use change_classifier::signatures::{is_close_control, is_fill_target, is_option};
use change_classifier::ChangeClassification;
use obstruction_analyzer::ResolutionProposal;
use pagemend_core_types::{
    PagePort, PagePrimitive, PageState, ResolutionStrategy, Urgency,
};

use crate::errors::ExecutorError;
use crate::model::ResolutionOutcome;
use crate::stabilize::{await_stable, StabilizePolicy};

/// Pause between dismissal steps before re-checking the obstruction.
const DISMISSAL_SETTLE_MS: u64 = 500;

/// Per-attempt knobs the retry controller can turn when repeating a
/// strategy with adjusted parameters.
#[derive(Clone, Copy, Debug)]
pub struct ExecutionTuning {
    /// Scales every wait and stabilization window.
    pub timeout_multiplier: f64,
    /// Run the full dismissal chain, including the backdrop click that a
    /// first attempt skips as too blunt.
    pub exhaust_dismissal_chain: bool,
}

impl Default for ExecutionTuning {
    fn default() -> Self {
        Self {
            timeout_multiplier: 1.0,
            exhaust_dismissal_chain: false,
        }
    }
}

/// Strategy dispatcher over the page port.
pub struct ResolutionExecutor {
    port: Arc<dyn PagePort>,
    stabilize: StabilizePolicy,
}

impl ResolutionExecutor {
    pub fn new(port: Arc<dyn PagePort>) -> Self {
        Self {
            port,
            stabilize: StabilizePolicy::default(),
        }
    }

    pub fn with_stabilize_policy(mut self, policy: StabilizePolicy) -> Self {
        self.stabilize = policy;
        self
    }

    /// Apply the proposal to the page. `change` carries the signatures of
    /// the obstruction this attempt is trying to clear.
    pub async fn execute(
        &self,
        proposal: &ResolutionProposal,
        change: &ChangeClassification,
        tuning: ExecutionTuning,
    ) -> Result<ResolutionOutcome, ExecutorError> {
        info!(
            strategy = proposal.strategy.label(),
            action = %proposal.specific_action,
            "executing resolution"
        );
        match proposal.strategy {
            ResolutionStrategy::Interact => self.interact(proposal, change, tuning).await,
            ResolutionStrategy::Dismiss => self.dismiss(change, tuning).await,
            ResolutionStrategy::Wait => self.wait_out(proposal.urgency, change, tuning).await,
            ResolutionStrategy::Ignore => Ok(ResolutionOutcome::succeeded(
                "obstruction judged irrelevant; no page interaction",
            )
            .with_stabilized(true)),
        }
    }

    async fn interact(
        &self,
        proposal: &ResolutionProposal,
        change: &ChangeClassification,
        tuning: ExecutionTuning,
    ) -> Result<ResolutionOutcome, ExecutorError> {
        let mut actions = Vec::new();

        // Explicit fill directive: type into the obstruction's input.
        if let Some(text) = proposal.specific_action.strip_prefix("fill:") {
            let snapshot = self.port.snapshot(false).await?;
            let target = change
                .new_signatures
                .iter()
                .find(|sig| is_fill_target(sig))
                .or_else(|| snapshot.elements.iter().find(|sig| is_fill_target(sig)))
                .cloned();
            let Some(signature) = target else {
                return Ok(ResolutionOutcome::failed(
                    "interact resolution found nothing to fill",
                    "no fillable input in the obstruction",
                ));
            };
            let primitive = PagePrimitive::TypeText {
                signature,
                text: text.trim().to_string(),
            };
            actions.push(primitive.describe());
            let result = self.port.act(&primitive).await?;
            if !result.ok {
                return Ok(ResolutionOutcome::failed(
                    "fill was rejected by the page",
                    result.note.unwrap_or_else(|| "type_text failed".into()),
                )
                .with_actions(actions));
            }
            let stabilized = self.settle(tuning).await?;
            return Ok(ResolutionOutcome::succeeded("filled the obstruction's input")
                .with_actions(actions)
                .with_stabilized(stabilized));
        }

        // Default interaction: pick the first visible option.
        let snapshot = self.port.snapshot(false).await?;
        let option = change
            .new_signatures
            .iter()
            .find(|sig| is_option(sig))
            .or_else(|| snapshot.elements.iter().find(|sig| is_option(sig)))
            .cloned();
        let Some(signature) = option else {
            return Ok(ResolutionOutcome::failed(
                "interact resolution found no selectable option",
                "no option-role element visible",
            ));
        };
        let primitive = PagePrimitive::ClickElement {
            signature: signature.clone(),
        };
        actions.push(primitive.describe());
        let result = self.port.act(&primitive).await?;
        if !result.ok {
            return Ok(ResolutionOutcome::failed(
                "option click was rejected by the page",
                result.note.unwrap_or_else(|| "click failed".into()),
            )
            .with_actions(actions));
        }
        let stabilized = self.settle(tuning).await?;
        Ok(
            ResolutionOutcome::succeeded(format!("selected {}", signature.fingerprint()))
                .with_actions(actions)
                .with_stabilized(stabilized),
        )
    }

    /// Escalating dismissal chain: Escape, then a close control, then (in
    /// exhaustive mode) a backdrop click. Stops at the first step after
    /// which the obstruction signature is gone.
    async fn dismiss(
        &self,
        change: &ChangeClassification,
        tuning: ExecutionTuning,
    ) -> Result<ResolutionOutcome, ExecutorError> {
        let fingerprint = change.primary_fingerprint();
        let mut actions = Vec::new();

        let mut steps: Vec<PagePrimitive> = vec![PagePrimitive::PressEscape];
        if let Some(close) = self.find_close_control(change).await? {
            steps.push(PagePrimitive::ClickElement { signature: close });
        }
        if tuning.exhaust_dismissal_chain {
            steps.push(PagePrimitive::ClickAt { x: 8.0, y: 8.0 });
        }

        for primitive in steps {
            actions.push(primitive.describe());
            let result = self.port.act(&primitive).await?;
            if !result.ok {
                debug!(step = %primitive.describe(), "dismissal step rejected, trying next");
                continue;
            }
            sleep(Duration::from_millis(scale_ms(
                DISMISSAL_SETTLE_MS,
                tuning.timeout_multiplier,
            )))
            .await;
            if self.obstruction_gone(fingerprint.as_deref()).await? {
                let stabilized = self.settle(tuning).await?;
                return Ok(ResolutionOutcome::succeeded(format!(
                    "dismissed via {}",
                    primitive.describe()
                ))
                .with_actions(actions)
                .with_stabilized(stabilized));
            }
        }

        warn!("dismissal chain exhausted without clearing the obstruction");
        Ok(ResolutionOutcome::failed(
            "dismissal chain exhausted",
            "obstruction still present after all dismissal steps",
        )
        .with_actions(actions))
    }

    /// Passive strategy: let the page settle. Urgency scales the wait
    /// inversely, a critical obstruction gets the shortest benefit of the
    /// doubt. Success means the page actually went quiet.
    async fn wait_out(
        &self,
        urgency: Urgency,
        change: &ChangeClassification,
        tuning: ExecutionTuning,
    ) -> Result<ResolutionOutcome, ExecutorError> {
        let base_ms = match urgency {
            Urgency::Critical => 1000,
            Urgency::High => 2000,
            Urgency::Medium => 3000,
            Urgency::Low => 5000,
        };
        let wait_ms = scale_ms(base_ms, tuning.timeout_multiplier);
        sleep(Duration::from_millis(wait_ms)).await;
        let stabilized = self.settle(tuning).await?;
        let gone = self
            .obstruction_gone(change.primary_fingerprint().as_deref())
            .await?;
        let description = if gone {
            format!("waited {wait_ms}ms; obstruction cleared on its own")
        } else {
            format!("waited {wait_ms}ms; obstruction still present")
        };
        if stabilized {
            Ok(ResolutionOutcome::succeeded(description).with_stabilized(true))
        } else {
            Ok(ResolutionOutcome::failed(
                description,
                "page kept churning past the stabilization cap",
            ))
        }
    }

    async fn settle(&self, tuning: ExecutionTuning) -> Result<bool, ExecutorError> {
        Ok(await_stable(
            self.port.as_ref(),
            self.stabilize.scaled(tuning.timeout_multiplier),
        )
        .await?)
    }

    async fn obstruction_gone(&self, fingerprint: Option<&str>) -> Result<bool, ExecutorError> {
        let Some(fingerprint) = fingerprint else {
            // Nothing to check against; assume the step took effect.
            return Ok(true);
        };
        let snapshot = self.port.snapshot(false).await?;
        Ok(!snapshot.contains_fingerprint(fingerprint))
    }

    async fn find_close_control(
        &self,
        change: &ChangeClassification,
    ) -> Result<Option<pagemend_core_types::ElementSignature>, ExecutorError> {
        if let Some(close) = change.new_signatures.iter().find(|sig| is_close_control(sig)) {
            return Ok(Some(close.clone()));
        }
        let snapshot: PageState = self.port.snapshot(false).await?;
        Ok(snapshot
            .elements
            .iter()
            .find(|sig| is_close_control(sig))
            .cloned())
    }
}

fn scale_ms(ms: u64, multiplier: f64) -> u64 {
    ((ms as f64) * multiplier).round().max(1.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use change_classifier::ChangeKind;
    use pagemend_core_types::{ElementSignature, PortError, PrimitiveResult, Urgency};

    fn modal() -> ElementSignature {
        ElementSignature::new("div")
            .with_role("dialog")
            .with_classes(["modal"])
    }

    fn option() -> ElementSignature {
        ElementSignature::new("li").with_role("option").with_text("SFO")
    }

    /// Port with a fixed page that drops the modal once a configured
    /// primitive succeeds.
    struct FakePort {
        elements: Mutex<Vec<ElementSignature>>,
        clears_on_escape: bool,
        acts: Mutex<Vec<PagePrimitive>>,
        reject_escape: bool,
    }

    impl FakePort {
        fn new(elements: Vec<ElementSignature>) -> Self {
            Self {
                elements: Mutex::new(elements),
                clears_on_escape: true,
                acts: Mutex::new(Vec::new()),
                reject_escape: false,
            }
        }

        fn acts(&self) -> Vec<PagePrimitive> {
            self.acts.lock().clone()
        }
    }

    #[async_trait]
    impl PagePort for FakePort {
        async fn snapshot(&self, _visual: bool) -> Result<PageState, PortError> {
            Ok(PageState::new("https://shop.test", "Shop")
                .with_elements(self.elements.lock().clone()))
        }

        async fn act(&self, primitive: &PagePrimitive) -> Result<PrimitiveResult, PortError> {
            self.acts.lock().push(primitive.clone());
            match primitive {
                PagePrimitive::PressEscape if self.reject_escape => {
                    Ok(PrimitiveResult::failed("focus not on dialog"))
                }
                PagePrimitive::PressEscape if self.clears_on_escape => {
                    let modal_print = modal().fingerprint();
                    self.elements
                        .lock()
                        .retain(|sig| sig.fingerprint() != modal_print);
                    Ok(PrimitiveResult::ok())
                }
                PagePrimitive::ClickElement { .. } => {
                    let modal_print = modal().fingerprint();
                    self.elements
                        .lock()
                        .retain(|sig| sig.fingerprint() != modal_print);
                    Ok(PrimitiveResult::ok())
                }
                _ => Ok(PrimitiveResult::ok()),
            }
        }
    }

    fn blocking_change() -> ChangeClassification {
        ChangeClassification::new(ChangeKind::Blocking, "modal appeared")
            .with_signatures(vec![modal()])
    }

    fn proposal(strategy: ResolutionStrategy, action: &str) -> ResolutionProposal {
        ResolutionProposal::new(strategy, action, "test", Urgency::High, 0.9)
    }

    #[tokio::test(start_paused = true)]
    async fn escape_clears_the_modal_and_stops_the_chain() {
        let port = Arc::new(FakePort::new(vec![modal()]));
        let executor = ResolutionExecutor::new(port.clone());
        let outcome = executor
            .execute(
                &proposal(ResolutionStrategy::Dismiss, "close the modal"),
                &blocking_change(),
                ExecutionTuning::default(),
            )
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(port.acts().len(), 1);
        assert!(matches!(port.acts()[0], PagePrimitive::PressEscape));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_escape_falls_through_to_close_control() {
        let mut close = ElementSignature::new("button").with_classes(["modal-close"]);
        close.aria_label = Some("Close".into());
        let mut port = FakePort::new(vec![modal(), close]);
        port.reject_escape = true;
        let port = Arc::new(port);
        let executor = ResolutionExecutor::new(port.clone());
        let outcome = executor
            .execute(
                &proposal(ResolutionStrategy::Dismiss, "close the modal"),
                &blocking_change(),
                ExecutionTuning::default(),
            )
            .await
            .unwrap();
        assert!(outcome.success);
        let acts = port.acts();
        assert_eq!(acts.len(), 2);
        assert!(matches!(acts[1], PagePrimitive::ClickElement { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn backdrop_click_only_in_exhaustive_mode() {
        let mut port = FakePort::new(vec![modal()]);
        port.reject_escape = true;
        port.clears_on_escape = false;
        let port = Arc::new(port);
        let executor = ResolutionExecutor::new(port.clone());
        let change = blocking_change();
        let dismiss = proposal(ResolutionStrategy::Dismiss, "close the modal");

        let outcome = executor
            .execute(&dismiss, &change, ExecutionTuning::default())
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(!port
            .acts()
            .iter()
            .any(|a| matches!(a, PagePrimitive::ClickAt { .. })));

        let tuning = ExecutionTuning {
            exhaust_dismissal_chain: true,
            ..ExecutionTuning::default()
        };
        executor.execute(&dismiss, &change, tuning).await.unwrap();
        assert!(port
            .acts()
            .iter()
            .any(|a| matches!(a, PagePrimitive::ClickAt { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn interact_clicks_the_first_option() {
        let port = Arc::new(FakePort::new(vec![option()]));
        let executor = ResolutionExecutor::new(port.clone());
        let change = ChangeClassification::new(ChangeKind::Interactive, "suggestions appeared")
            .with_signatures(vec![option()]);
        let outcome = executor
            .execute(
                &proposal(ResolutionStrategy::Interact, "select the first suggestion"),
                &change,
                ExecutionTuning::default(),
            )
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.actions_performed.len(), 1);
        assert!(matches!(
            port.acts()[0],
            PagePrimitive::ClickElement { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn interact_without_options_fails_softly() {
        let port = Arc::new(FakePort::new(vec![modal()]));
        let executor = ResolutionExecutor::new(port.clone());
        let outcome = executor
            .execute(
                &proposal(ResolutionStrategy::Interact, "select something"),
                &blocking_change(),
                ExecutionTuning::default(),
            )
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
        assert!(port.acts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn fill_directive_types_into_the_obstruction() {
        let mut input = ElementSignature::new("input");
        input.interactive = true;
        let port = Arc::new(FakePort::new(vec![input.clone()]));
        let executor = ResolutionExecutor::new(port.clone());
        let change = ChangeClassification::new(ChangeKind::Blocking, "required field")
            .with_signatures(vec![input]);
        let outcome = executor
            .execute(
                &proposal(ResolutionStrategy::Interact, "fill: user@mail.test"),
                &change,
                ExecutionTuning::default(),
            )
            .await
            .unwrap();
        assert!(outcome.success);
        match &port.acts()[0] {
            PagePrimitive::TypeText { text, .. } => assert_eq!(text, "user@mail.test"),
            other => panic!("unexpected primitive: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn wait_reports_whether_the_obstruction_cleared() {
        let port = Arc::new(FakePort::new(vec![modal()]));
        let executor = ResolutionExecutor::new(port);
        let outcome = executor
            .execute(
                &proposal(ResolutionStrategy::Wait, "wait it out"),
                &blocking_change(),
                ExecutionTuning::default(),
            )
            .await
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.dom_stabilized);
        assert!(outcome.description.contains("still present"));
    }

    /// Port whose element count grows on every snapshot, so the quiet
    /// window is never reached.
    struct RestlessPort {
        snapshots: Mutex<usize>,
    }

    #[async_trait]
    impl PagePort for RestlessPort {
        async fn snapshot(&self, _visual: bool) -> Result<PageState, PortError> {
            let mut taken = self.snapshots.lock();
            *taken += 1;
            let elements = (0..*taken)
                .map(|i| ElementSignature::new(format!("div{i}")))
                .collect();
            Ok(PageState::new("https://shop.test", "Shop").with_elements(elements))
        }

        async fn act(&self, _primitive: &PagePrimitive) -> Result<PrimitiveResult, PortError> {
            Ok(PrimitiveResult::ok())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn wait_fails_when_the_page_never_goes_quiet() {
        let port = Arc::new(RestlessPort {
            snapshots: Mutex::new(0),
        });
        let executor = ResolutionExecutor::new(port);
        let outcome = executor
            .execute(
                &proposal(ResolutionStrategy::Wait, "wait it out"),
                &blocking_change(),
                ExecutionTuning::default(),
            )
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(!outcome.dom_stabilized);
        assert!(outcome.error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn ignore_touches_nothing() {
        let port = Arc::new(FakePort::new(vec![modal()]));
        let executor = ResolutionExecutor::new(port.clone());
        let outcome = executor
            .execute(
                &proposal(ResolutionStrategy::Ignore, "proceed"),
                &blocking_change(),
                ExecutionTuning::default(),
            )
            .await
            .unwrap();
        assert!(outcome.success);
        assert!(port.acts().is_empty());
    }
}
