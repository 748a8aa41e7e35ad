use thiserror::Error;

use pagemend_core_types::PortError;
use resolution_executor::ExecutorError;

/// Faults that end a session outright. Failed attempts are not errors;
/// they live in the session's attempt history.
#[derive(Debug, Error)]
pub enum RetryError {
    #[error("page port failure during session: {0}")]
    Port(#[from] PortError),
    #[error(transparent)]
    Execution(#[from] ExecutorError),
}
