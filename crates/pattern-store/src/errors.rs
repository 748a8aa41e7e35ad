use thiserror::Error;

/// Persistence-layer failures; in-memory operations are infallible.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read pattern snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse pattern snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}
