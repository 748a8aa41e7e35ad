//! Heuristic rule table for common obstruction shapes.
//!
//! Covers the high-frequency cases where the trigger action plus the
//! change kind is enough to pick a strategy without a model round trip.

use change_classifier::ChangeKind;
use pagemend_core_types::{ResolutionStrategy, Urgency};

use crate::model::{ObstructionContext, ResolutionProposal};

/// Propose a resolution from the rule table, or `None` when no rule is
/// confident about this combination.
pub fn heuristic_proposal(ctx: &ObstructionContext) -> Option<ResolutionProposal> {
    let kind = ctx.change.kind;
    let last = ctx.last_action.as_ref().map(|a| &a.kind);
    let text_entry = last.map(|k| k.is_text_entry()).unwrap_or(false);
    let click = last.map(|k| k.is_click()).unwrap_or(false);

    match kind {
        // Typing spawned suggestions; the page wants a selection.
        ChangeKind::Interactive if text_entry => Some(ResolutionProposal::new(
            ResolutionStrategy::Interact,
            "select the first visible suggestion",
            "text entry opened an interactive element that expects a selection",
            Urgency::High,
            0.8,
        )),
        // A click raised a blocking layer: dismiss it and resume.
        ChangeKind::Blocking if click => Some(ResolutionProposal::new(
            ResolutionStrategy::Dismiss,
            "close the blocking overlay",
            "a click raised a blocking layer over the page",
            Urgency::Critical,
            0.9,
        )),
        // Typing tripped a blocking layer (consent wall, login nag).
        ChangeKind::Blocking if text_entry => Some(ResolutionProposal::new(
            ResolutionStrategy::Dismiss,
            "close the blocking overlay",
            "text entry tripped a blocking layer",
            Urgency::Critical,
            0.85,
        )),
        // Cosmetic or absent change: nothing to resolve.
        ChangeKind::Minor | ChangeKind::None => Some(ResolutionProposal::new(
            ResolutionStrategy::Ignore,
            "proceed with the plan",
            "change is cosmetic and does not affect the remaining plan",
            Urgency::Low,
            0.85,
        )),
        // Unexpected navigation needs plan-level judgment, not a local fix.
        ChangeKind::Navigation => Some(
            ResolutionProposal::new(
                ResolutionStrategy::Wait,
                "let the new page settle before replanning",
                "navigation changed the page under the plan",
                Urgency::Medium,
                0.5,
            ),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use change_classifier::ChangeClassification;
    use pagemend_core_types::{ActionKind, PlannedAction, TargetHint};

    fn ctx(kind: ChangeKind, last: Option<ActionKind>) -> ObstructionContext {
        ObstructionContext {
            url: "https://forms.test/apply".into(),
            title: "Apply".into(),
            last_action: last.map(PlannedAction::new),
            next_action: None,
            change: ChangeClassification::new(kind, "test change"),
            original_goal: "submit the form".into(),
            completed_step_summaries: Vec::new(),
        }
    }

    fn type_action() -> ActionKind {
        ActionKind::TypeText {
            target: TargetHint::default(),
            text: "san fr".into(),
            submit: false,
        }
    }

    #[test]
    fn typing_plus_interactive_interacts() {
        let p = heuristic_proposal(&ctx(ChangeKind::Interactive, Some(type_action()))).unwrap();
        assert_eq!(p.strategy, ResolutionStrategy::Interact);
        assert!(p.confidence >= 0.8);
    }

    #[test]
    fn click_plus_blocking_dismisses() {
        let p = heuristic_proposal(&ctx(
            ChangeKind::Blocking,
            Some(ActionKind::Click {
                target: TargetHint::default(),
            }),
        ))
        .unwrap();
        assert_eq!(p.strategy, ResolutionStrategy::Dismiss);
        assert_eq!(p.urgency, Urgency::Critical);
    }

    #[test]
    fn minor_change_is_ignored_confidently() {
        let p = heuristic_proposal(&ctx(ChangeKind::Minor, None)).unwrap();
        assert_eq!(p.strategy, ResolutionStrategy::Ignore);
    }

    #[test]
    fn navigation_rule_stays_below_cutoff() {
        let p = heuristic_proposal(&ctx(ChangeKind::Navigation, None)).unwrap();
        assert!(p.confidence < 0.7);
    }

    #[test]
    fn interactive_without_text_entry_has_no_rule() {
        assert!(heuristic_proposal(&ctx(ChangeKind::Interactive, None)).is_none());
    }
}
