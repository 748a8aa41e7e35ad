use thiserror::Error;

/// Analysis failures; fail closed, never a silently wrong guess.
///
/// An `AnalyzerError` on one attempt is retried with an alternative
/// strategy by the retry controller; it is never fatal on first occurrence.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The advisor produced no usable proposal.
    #[error("analysis produced no usable proposal: {0}")]
    NoProposal(String),
    /// The advisor responded with something that does not parse into a
    /// proposal-shaped payload.
    #[error("advisor response malformed: {0}")]
    Malformed(String),
}

impl AnalyzerError {
    pub fn no_proposal(message: impl Into<String>) -> Self {
        Self::NoProposal(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}
