use thiserror::Error;

use pagemend_core_types::PortError;

/// Only provider faults escape execution; every expected negative result
/// (element missing, dismissal ineffective) is a failed outcome instead.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("page port failure during resolution: {0}")]
    Port(#[from] PortError),
}
