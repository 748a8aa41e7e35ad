use serde::{Deserialize, Serialize};

/// How a planned action refers to its element, independent of DOM indices.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetHint {
    /// Position in the provider's indexed element list, if index-based.
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl TargetHint {
    pub fn index(index: u32) -> Self {
        Self {
            index: Some(index),
            ..Self::default()
        }
    }

    pub fn is_index_based(&self) -> bool {
        self.index.is_some()
    }
}

/// Tagged union of the outer loop's planned actions.
///
/// The engine only needs enough of the action vocabulary to key patterns
/// and drive heuristics; execution of these lives with the outer loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    Navigate { url: String },
    Click { target: TargetHint },
    TypeText {
        target: TargetHint,
        text: String,
        #[serde(default)]
        submit: bool,
    },
    Select { target: TargetHint, option: String },
    Scroll {
        #[serde(default)]
        delta_y: i64,
    },
    Wait { ms: u64 },
    Done,
}

impl ActionKind {
    /// Trigger-action-type label used in pattern-store keys.
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Navigate { .. } => "navigate",
            ActionKind::Click { .. } => "click",
            ActionKind::TypeText { .. } => "type_text",
            ActionKind::Select { .. } => "select",
            ActionKind::Scroll { .. } => "scroll",
            ActionKind::Wait { .. } => "wait",
            ActionKind::Done => "done",
        }
    }

    pub fn is_text_entry(&self) -> bool {
        matches!(self, ActionKind::TypeText { .. })
    }

    pub fn is_click(&self) -> bool {
        matches!(self, ActionKind::Click { .. } | ActionKind::Select { .. })
    }

    pub fn target(&self) -> Option<&TargetHint> {
        match self {
            ActionKind::Click { target }
            | ActionKind::TypeText { target, .. }
            | ActionKind::Select { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// A planned action plus the intent string the planner attached to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
}

impl PlannedAction {
    pub fn new(kind: ActionKind) -> Self {
        Self { kind, intent: None }
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_cover_every_variant() {
        let actions = [
            ActionKind::Navigate { url: "https://example.com".into() },
            ActionKind::Click { target: TargetHint::index(3) },
            ActionKind::TypeText {
                target: TargetHint::index(1),
                text: "hi".into(),
                submit: false,
            },
            ActionKind::Select { target: TargetHint::index(2), option: "a".into() },
            ActionKind::Scroll { delta_y: 100 },
            ActionKind::Wait { ms: 250 },
            ActionKind::Done,
        ];
        let labels: Vec<_> = actions.iter().map(|a| a.label()).collect();
        assert_eq!(
            labels,
            ["navigate", "click", "type_text", "select", "scroll", "wait", "done"]
        );
    }

    #[test]
    fn classification_helpers() {
        let typing = ActionKind::TypeText {
            target: TargetHint::index(0),
            text: "x".into(),
            submit: false,
        };
        assert!(typing.is_text_entry());
        assert!(!typing.is_click());
        assert!(ActionKind::Click { target: TargetHint::default() }.is_click());
    }
}
