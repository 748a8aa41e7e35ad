use serde::Serialize;

/// One weighted piece of evidence about the resolution.
#[derive(Clone, Debug, Serialize)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub passed: bool,
    pub weight: f64,
    pub detail: String,
}

/// Aggregated verdict: confidence is the weight of passed checks over
/// the weight of all checks that applied to this strategy.
#[derive(Clone, Debug, Serialize)]
pub struct VerificationResult {
    pub verified: bool,
    pub confidence: f64,
    pub checks: Vec<CheckOutcome>,
}

impl VerificationResult {
    pub fn failed_check_names(&self) -> Vec<&'static str> {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name)
            .collect()
    }

    pub fn summary(&self) -> String {
        let failed = self.failed_check_names();
        if failed.is_empty() {
            format!("all checks passed (confidence {:.2})", self.confidence)
        } else {
            format!(
                "failed checks: {} (confidence {:.2})",
                failed.join(", "),
                self.confidence
            )
        }
    }
}
