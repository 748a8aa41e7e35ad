use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use change_classifier::ChangeKind;

use crate::errors::StoreError;
use crate::model::{LearningEvent, ObstructionPattern, PatternKey, PatternMetrics};

/// EMA learning rate for success-rate updates.
const ALPHA: f64 = 0.3;
/// Neighbor nudges propagate learning across near-duplicate signatures.
const NEIGHBOR_SUCCESS_NUDGE: f64 = 0.05;
const NEIGHBOR_FAILURE_NUDGE: f64 = 0.02;
/// Eviction candidacy thresholds.
const EVICT_CONFIDENCE: f64 = 0.2;
const EVICT_USAGE: u32 = 3;
const EVICT_RECENCY: f64 = 0.1;

const DEFAULT_PATTERN_CAP: usize = 256;
const DEFAULT_EVENT_LOG_CAP: usize = 500;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreSnapshot {
    patterns: Vec<ObstructionPattern>,
}

#[derive(Debug, Default)]
struct StoreInner {
    patterns: HashMap<String, ObstructionPattern>,
    events: Vec<LearningEvent>,
}

/// In-memory pattern store with optional JSON snapshot persistence.
///
/// Constructed once by the embedder and passed by handle to every
/// component that needs it; sessions are serialized, so a single lock
/// covers memory visibility.
#[derive(Debug)]
pub struct PatternStore {
    inner: RwLock<StoreInner>,
    pattern_cap: usize,
    event_log_cap: usize,
    snapshot_path: Option<PathBuf>,
}

/// Aggregates over the rolling learning-event log.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StoreInsights {
    pub total_patterns: usize,
    pub events_recorded: usize,
    pub overall_success_rate: f64,
    pub counts_by_kind: HashMap<String, usize>,
    pub top_domains: Vec<(String, usize)>,
}

impl PatternStore {
    pub fn new() -> Self {
        Self::with_caps(DEFAULT_PATTERN_CAP, DEFAULT_EVENT_LOG_CAP)
    }

    pub fn with_caps(pattern_cap: usize, event_log_cap: usize) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            pattern_cap: pattern_cap.max(1),
            event_log_cap: event_log_cap.max(1),
            snapshot_path: None,
        }
    }

    /// Load from a JSON snapshot if the path exists; start empty otherwise.
    pub fn load_from_path(path: Option<PathBuf>) -> Result<Self, StoreError> {
        let patterns = if let Some(ref path) = path {
            if path.exists() {
                let raw = fs::read_to_string(path)?;
                let snapshot: StoreSnapshot = serde_json::from_str(&raw)?;
                snapshot.patterns
            } else {
                Vec::new()
            }
        } else {
            Vec::new()
        };
        let store = Self {
            inner: RwLock::new(StoreInner {
                patterns: patterns
                    .into_iter()
                    .map(|p| (p.key.storage_key(), p))
                    .collect(),
                events: Vec::new(),
            }),
            pattern_cap: DEFAULT_PATTERN_CAP,
            event_log_cap: DEFAULT_EVENT_LOG_CAP,
            snapshot_path: path,
        };
        Ok(store)
    }

    /// Override the default caps, e.g. from engine configuration.
    pub fn with_limits(mut self, pattern_cap: usize, event_log_cap: usize) -> Self {
        self.pattern_cap = pattern_cap.max(1);
        self.event_log_cap = event_log_cap.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.inner.read().patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Patterns matching the exact (domain, action, kind) whose signature
    /// starts with `signature_prefix`, ranked best-first by
    /// confidence × success rate × recency.
    pub fn find_matching(
        &self,
        domain: &str,
        action: &str,
        kind: ChangeKind,
        signature_prefix: &str,
    ) -> Vec<ObstructionPattern> {
        let now = Utc::now();
        let guard = self.inner.read();
        let mut matches: Vec<ObstructionPattern> = guard
            .patterns
            .values()
            .filter(|p| {
                p.key.domain == domain
                    && p.key.action == action
                    && p.key.kind == kind
                    && p.signature.starts_with(signature_prefix)
            })
            .cloned()
            .collect();
        drop(guard);
        matches.sort_by(|a, b| {
            b.rank_score(now)
                .partial_cmp(&a.rank_score(now))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        debug!(
            domain,
            action,
            kind = kind.label(),
            matches = matches.len(),
            "pattern lookup"
        );
        matches
    }

    /// Record a completed session. The sole mutation entry point: creates
    /// or EMA-updates the keyed pattern, nudges neighbors, appends to the
    /// rolling event log, and evicts low-value patterns past the cap.
    pub fn record_outcome(&self, event: LearningEvent) {
        let key = event.key();
        let storage_key = key.storage_key();
        let now = event.recorded_at;

        let mut guard = self.inner.write();
        match guard.patterns.get_mut(&storage_key) {
            Some(pattern) => {
                let metrics = &mut pattern.metrics;
                metrics.times_encountered += 1;
                let observed = if event.success { 1.0 } else { 0.0 };
                metrics.success_rate = (1.0 - ALPHA) * metrics.success_rate + ALPHA * observed;
                let n = metrics.times_encountered as f64;
                metrics.avg_resolution_time_ms +=
                    (event.resolution_time_ms as f64 - metrics.avg_resolution_time_ms) / n;
                metrics.last_encountered = now;
                let recency = pattern.recency(now);
                let metrics = &mut pattern.metrics;
                metrics.confidence = (metrics.success_rate
                    + (0.02 * metrics.times_encountered as f64).min(0.2)
                    + 0.1 * recency)
                    .clamp(0.0, 1.0);
                if event.success {
                    pattern.successful_resolution = event.strategy;
                    pattern.specific_action = event.specific_action.clone();
                }
            }
            None => {
                let mut confidence = 0.5;
                if event.success {
                    confidence += 0.3;
                }
                if event.verification_confidence > 0.8 {
                    confidence += 0.2;
                }
                confidence -= 0.1 * event.attempts.saturating_sub(1) as f64;
                let pattern = ObstructionPattern {
                    key: key.clone(),
                    signature: event.signature.clone(),
                    successful_resolution: event.strategy,
                    specific_action: event.specific_action.clone(),
                    metrics: PatternMetrics {
                        times_encountered: 1,
                        success_rate: if event.success { 1.0 } else { 0.0 },
                        avg_resolution_time_ms: event.resolution_time_ms as f64,
                        last_encountered: now,
                        confidence: confidence.clamp(0.1, 1.0),
                    },
                    context: event.context.clone(),
                };
                info!(key = %storage_key, "learned new obstruction pattern");
                guard.patterns.insert(storage_key.clone(), pattern);
            }
        }

        // Propagate a small nudge to near-duplicate signatures.
        for pattern in guard
            .patterns
            .values_mut()
            .filter(|p| p.key.is_neighbor_of(&key))
        {
            let rate = &mut pattern.metrics.success_rate;
            *rate = if event.success {
                (*rate + NEIGHBOR_SUCCESS_NUDGE).min(1.0)
            } else {
                (*rate - NEIGHBOR_FAILURE_NUDGE).max(0.0)
            };
        }

        guard.events.push(event);
        let overflow = guard.events.len().saturating_sub(self.event_log_cap);
        if overflow > 0 {
            guard.events.drain(0..overflow);
        }

        self.evict_locked(&mut guard);
    }

    /// Remove at most `len − cap` low-value patterns per pass.
    fn evict_locked(&self, guard: &mut StoreInner) {
        let excess = guard.patterns.len().saturating_sub(self.pattern_cap);
        if excess == 0 {
            return;
        }
        let now = Utc::now();
        let mut candidates: Vec<(String, f64)> = guard
            .patterns
            .iter()
            .filter(|(_, p)| {
                p.metrics.confidence < EVICT_CONFIDENCE
                    && p.metrics.times_encountered < EVICT_USAGE
                    && p.recency(now) < EVICT_RECENCY
            })
            .map(|(k, p)| (k.clone(), p.metrics.confidence))
            .collect();
        candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        for (key, _) in candidates.into_iter().take(excess) {
            guard.patterns.remove(&key);
        }
    }

    pub fn insights(&self) -> StoreInsights {
        let guard = self.inner.read();
        let events = &guard.events;
        let successes = events.iter().filter(|e| e.success).count();
        let mut counts_by_kind: HashMap<String, usize> = HashMap::new();
        let mut domains: HashMap<String, usize> = HashMap::new();
        for event in events {
            *counts_by_kind.entry(event.kind.label().to_string()).or_insert(0) += 1;
            *domains.entry(event.domain.clone()).or_insert(0) += 1;
        }
        let mut top_domains: Vec<(String, usize)> = domains.into_iter().collect();
        top_domains.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_domains.truncate(5);
        StoreInsights {
            total_patterns: guard.patterns.len(),
            events_recorded: events.len(),
            overall_success_rate: if events.is_empty() {
                0.0
            } else {
                successes as f64 / events.len() as f64
            },
            counts_by_kind,
            top_domains,
        }
    }

    /// Write the current patterns as a JSON snapshot, if a path is set.
    pub fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = self.snapshot_path.as_ref() else {
            return Ok(());
        };
        let snapshot = StoreSnapshot {
            patterns: self.inner.read().patterns.values().cloned().collect(),
        };
        let raw = serde_json::to_string_pretty(&snapshot)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, raw)?;
        Ok(())
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new()
    }
}
