use serde::{Deserialize, Serialize};
use std::fmt;

use pagemend_core_types::ElementSignature;

/// Typed outcome of one classification pass.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    None,
    Minor,
    Interactive,
    Navigation,
    Blocking,
}

impl ChangeKind {
    /// Ties break toward the more disruptive classification: under-reacting
    /// to an obstruction is costlier than over-reacting.
    pub fn disruption_rank(&self) -> u8 {
        match self {
            ChangeKind::None => 0,
            ChangeKind::Minor => 1,
            ChangeKind::Interactive => 2,
            ChangeKind::Navigation => 3,
            ChangeKind::Blocking => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::None => "none",
            ChangeKind::Minor => "minor",
            ChangeKind::Interactive => "interactive",
            ChangeKind::Navigation => "navigation",
            ChangeKind::Blocking => "blocking",
        }
    }

    pub fn is_obstruction(&self) -> bool {
        !matches!(self, ChangeKind::None | ChangeKind::Minor)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Immutable record produced per detection pass and consumed once by the
/// analyzer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeClassification {
    pub kind: ChangeKind,
    pub description: String,
    #[serde(default)]
    pub new_signatures: Vec<ElementSignature>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl ChangeClassification {
    pub fn new(kind: ChangeKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            new_signatures: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    pub fn with_signatures(mut self, signatures: Vec<ElementSignature>) -> Self {
        self.new_signatures = signatures;
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendations.push(recommendation.into());
        self
    }

    pub fn none() -> Self {
        Self::new(ChangeKind::None, "no page change detected")
            .with_recommendation("continue with the current plan")
    }

    /// Fingerprint of the most prominent new element, used as the pattern
    /// signature for this obstruction occurrence.
    pub fn primary_fingerprint(&self) -> Option<String> {
        self.new_signatures.first().map(|sig| sig.fingerprint())
    }

    pub fn primary_hash(&self) -> u64 {
        self.new_signatures
            .first()
            .map(|sig| sig.stable_hash())
            .unwrap_or(0)
    }
}
