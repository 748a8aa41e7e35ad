use tracing::debug;

use change_classifier::ChangeClassification;
use pagemend_core_types::{PageState, ResolutionStrategy};
use resolution_executor::ResolutionOutcome;

use crate::model::{CheckOutcome, VerificationResult};

/// Confidence a verification must reach to count as verified.
pub const DEFAULT_VERIFY_THRESHOLD: f64 = 0.6;

/// Element-count drift beyond this is treated as the page still moving
/// away from its pre-obstruction shape.
const COUNT_DRIFT_TOLERANCE: i64 = 10;

const W_SIGNATURE_GONE: f64 = 0.4;
const W_COUNT_DRIFT: f64 = 0.2;
const W_URL_STABLE: f64 = 0.2;
const W_EXECUTOR_SUCCESS: f64 = 0.1;
const W_DOM_STABILIZED: f64 = 0.1;

/// Evidence bundle for one verification pass.
pub struct VerificationInput<'a> {
    /// Snapshot from before the obstruction appeared.
    pub baseline: &'a PageState,
    /// Fresh snapshot taken after the resolution ran.
    pub current: &'a PageState,
    pub change: &'a ChangeClassification,
    pub strategy: ResolutionStrategy,
    pub outcome: &'a ResolutionOutcome,
}

/// Weighted-evidence verifier.
#[derive(Clone, Copy, Debug)]
pub struct ResolutionVerifier {
    threshold: f64,
}

impl ResolutionVerifier {
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_VERIFY_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn verify(&self, input: &VerificationInput<'_>) -> VerificationResult {
        let mut checks = Vec::new();

        // IGNORE deliberately leaves the obstruction alone, so its
        // continued presence is not evidence of failure. A change with no
        // recorded signature (navigation, count-only deltas) skips the
        // check rather than passing it for free.
        if input.strategy != ResolutionStrategy::Ignore {
            if let Some(fp) = input.change.primary_fingerprint() {
                checks.push(CheckOutcome {
                    name: "obstruction_signature_gone",
                    passed: !input.current.contains_fingerprint(&fp),
                    weight: W_SIGNATURE_GONE,
                    detail: format!("obstruction signature {fp}"),
                });
            }
        }

        let drift =
            input.current.element_count() as i64 - input.baseline.element_count() as i64;
        checks.push(CheckOutcome {
            name: "element_count_near_baseline",
            passed: drift.abs() <= COUNT_DRIFT_TOLERANCE,
            weight: W_COUNT_DRIFT,
            detail: format!("element count drift {drift} from baseline"),
        });

        // Resolution should not have navigated us anywhere, not even to
        // another path on the same domain.
        let same_url = input.current.url == input.baseline.url;
        let same_domain = input.current.domain() == input.baseline.domain();
        checks.push(CheckOutcome {
            name: "url_stable",
            passed: same_url,
            weight: W_URL_STABLE,
            detail: if same_url {
                format!("still at {}", input.current.url)
            } else if same_domain {
                format!(
                    "moved within {}: {} vs baseline {}",
                    input.current.domain(),
                    input.current.url,
                    input.baseline.url
                )
            } else {
                format!("{} vs baseline {}", input.current.url, input.baseline.url)
            },
        });

        checks.push(CheckOutcome {
            name: "executor_reported_success",
            passed: input.outcome.success,
            weight: W_EXECUTOR_SUCCESS,
            detail: input.outcome.description.clone(),
        });

        checks.push(CheckOutcome {
            name: "dom_stabilized",
            passed: input.outcome.dom_stabilized,
            weight: W_DOM_STABILIZED,
            detail: "quiet window reached".into(),
        });

        let total: f64 = checks.iter().map(|c| c.weight).sum();
        let passed: f64 = checks.iter().filter(|c| c.passed).map(|c| c.weight).sum();
        let confidence = if total > 0.0 { passed / total } else { 0.0 };
        let result = VerificationResult {
            verified: confidence >= self.threshold,
            confidence,
            checks,
        };
        debug!(
            strategy = input.strategy.label(),
            confidence = result.confidence,
            verified = result.verified,
            "verification complete"
        );
        result
    }
}

impl Default for ResolutionVerifier {
    fn default() -> Self {
        Self::new()
    }
}
