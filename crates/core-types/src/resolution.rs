use serde::{Deserialize, Serialize};
use std::fmt;

/// The four ways the engine can try to clear an obstruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Engage with the obstruction (select an option, fill a field).
    Interact,
    /// Make the obstruction go away without engaging its content.
    Dismiss,
    /// Let the page settle and re-check.
    Wait,
    /// Judged irrelevant to the next action; proceed as-is.
    Ignore,
}

impl ResolutionStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            ResolutionStrategy::Interact => "interact",
            ResolutionStrategy::Dismiss => "dismiss",
            ResolutionStrategy::Wait => "wait",
            ResolutionStrategy::Ignore => "ignore",
        }
    }

    /// Fixed fallback candidate order for retry strategy switching.
    pub fn fallback_candidates() -> &'static [ResolutionStrategy] {
        &[
            ResolutionStrategy::Dismiss,
            ResolutionStrategy::Wait,
            ResolutionStrategy::Ignore,
        ]
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How urgently a proposed resolution should be applied; scales WAIT
/// durations inversely (critical obstructions get the shortest waits).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn label(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
