use serde::{Deserialize, Serialize};

/// What one resolution attempt actually did to the page.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub success: bool,
    pub description: String,
    /// Human-readable log of every primitive issued, in order.
    #[serde(default)]
    pub actions_performed: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the DOM went quiet within the stabilization window.
    #[serde(default)]
    pub dom_stabilized: bool,
}

impl ResolutionOutcome {
    pub fn succeeded(description: impl Into<String>) -> Self {
        Self {
            success: true,
            description: description.into(),
            actions_performed: Vec::new(),
            error: None,
            dom_stabilized: false,
        }
    }

    pub fn failed(description: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            description: description.into(),
            actions_performed: Vec::new(),
            error: Some(error.into()),
            dom_stabilized: false,
        }
    }

    pub fn with_actions(mut self, actions: Vec<String>) -> Self {
        self.actions_performed = actions;
        self
    }

    pub fn with_stabilized(mut self, stabilized: bool) -> Self {
        self.dom_stabilized = stabilized;
        self
    }
}
