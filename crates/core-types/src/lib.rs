//! Shared primitives for the pagemend obstruction engine.
//!
//! Everything here is consumed by at least two engine crates: page-state
//! snapshots, element signatures, the tagged action union, the resolution
//! strategy vocabulary, and the port trait the engine drives the live page
//! through.

pub mod action;
pub mod page;
pub mod ports;
pub mod resolution;

pub use action::{ActionKind, PlannedAction, TargetHint};
pub use page::{ElementSignature, PageState};
pub use ports::{PagePort, PagePrimitive, PortError, PrimitiveResult};
pub use resolution::{ResolutionStrategy, Urgency};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one obstruction-handling session.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity of the outer task that hit the obstruction.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}
