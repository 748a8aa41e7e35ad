use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use change_classifier::ChangeKind;
use pagemend_core_types::ResolutionStrategy;

/// Key scheme for durable patterns: one pattern per
/// (domain, trigger action, obstruction kind, signature hash).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PatternKey {
    pub domain: String,
    pub action: String,
    pub kind: ChangeKind,
    pub signature_hash: u64,
}

impl PatternKey {
    pub fn new(
        domain: impl Into<String>,
        action: impl Into<String>,
        kind: ChangeKind,
        signature_hash: u64,
    ) -> Self {
        Self {
            domain: domain.into(),
            action: action.into(),
            kind,
            signature_hash,
        }
    }

    /// Opaque storage key for the persisted snapshot.
    pub fn storage_key(&self) -> String {
        format!(
            "{}|{}|{}|{:016x}",
            self.domain,
            self.action,
            self.kind.label(),
            self.signature_hash
        )
    }

    /// Same obstruction family, possibly different concrete signature.
    pub fn is_neighbor_of(&self, other: &PatternKey) -> bool {
        self.domain == other.domain
            && self.action == other.action
            && self.kind == other.kind
            && self.signature_hash != other.signature_hash
    }
}

/// Aggregate metrics updated on every recorded outcome.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatternMetrics {
    pub times_encountered: u32,
    pub success_rate: f64,
    pub avg_resolution_time_ms: f64,
    pub last_encountered: DateTime<Utc>,
    pub confidence: f64,
}

/// One learned obstruction→resolution association.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObstructionPattern {
    pub key: PatternKey,
    /// Fingerprint of the obstructing element, kept for prefix matching.
    pub signature: String,
    pub successful_resolution: ResolutionStrategy,
    pub specific_action: String,
    pub metrics: PatternMetrics,
    /// Free-form context captured at creation (goal fragment, page title).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ObstructionPattern {
    /// Recency score in [0,1]; zero once a pattern is 30+ days stale.
    pub fn recency(&self, now: DateTime<Utc>) -> f64 {
        let days = (now - self.metrics.last_encountered).num_seconds() as f64 / 86_400.0;
        (1.0 - days / 30.0).clamp(0.0, 1.0)
    }

    /// Ranking score for `find_matching`.
    pub fn rank_score(&self, now: DateTime<Utc>) -> f64 {
        self.metrics.confidence * self.metrics.success_rate * self.recency(now)
    }
}

/// One full obstruction-handling session's input and outcome, the only
/// write path into the store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LearningEvent {
    pub domain: String,
    pub action: String,
    pub kind: ChangeKind,
    pub signature: String,
    pub signature_hash: u64,
    pub strategy: ResolutionStrategy,
    pub specific_action: String,
    pub success: bool,
    pub verification_confidence: f64,
    pub attempts: u32,
    pub resolution_time_ms: u64,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl LearningEvent {
    pub fn key(&self) -> PatternKey {
        PatternKey::new(
            self.domain.clone(),
            self.action.clone(),
            self.kind,
            self.signature_hash,
        )
    }
}
