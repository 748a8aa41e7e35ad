use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::page::{ElementSignature, PageState};

/// Faults raised by the page-state provider itself.
///
/// These are the only errors that propagate out of resolution execution;
/// a missing element or a rejected click is an expected negative outcome
/// and comes back as `PrimitiveResult { ok: false, .. }`.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("page provider fault: {0}")]
    Provider(String),
    #[error("page snapshot unavailable: {0}")]
    SnapshotUnavailable(String),
}

impl PortError {
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }
}

/// Low-level primitives the engine may ask the provider to perform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "primitive", rename_all = "snake_case")]
pub enum PagePrimitive {
    /// Cancel/escape signal (native dialog cancel, Escape key).
    PressEscape,
    /// Click an element matched by structural signature.
    ClickElement { signature: ElementSignature },
    /// Click raw viewport coordinates (backdrop clicks).
    ClickAt { x: f64, y: f64 },
    /// Type into an element matched by structural signature.
    TypeText {
        signature: ElementSignature,
        text: String,
    },
}

impl PagePrimitive {
    pub fn describe(&self) -> String {
        match self {
            PagePrimitive::PressEscape => "press escape".to_string(),
            PagePrimitive::ClickElement { signature } => {
                format!("click {}", signature.fingerprint())
            }
            PagePrimitive::ClickAt { x, y } => format!("click at ({x:.0},{y:.0})"),
            PagePrimitive::TypeText { signature, .. } => {
                format!("type into {}", signature.fingerprint())
            }
        }
    }
}

/// Result of one primitive; `ok: false` is a normal outcome, not an error.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PrimitiveResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PrimitiveResult {
    pub fn ok() -> Self {
        Self { ok: true, note: None }
    }

    pub fn failed(note: impl Into<String>) -> Self {
        Self {
            ok: false,
            note: Some(note.into()),
        }
    }
}

/// Seam to the page-state provider supplied by the embedder.
///
/// `snapshot` must be side-effect free and safe to call repeatedly;
/// `act` performs exactly the requested primitive and nothing else.
#[async_trait]
pub trait PagePort: Send + Sync {
    async fn snapshot(&self, include_visual_hint: bool) -> Result<PageState, PortError>;
    async fn act(&self, primitive: &PagePrimitive) -> Result<PrimitiveResult, PortError>;
}
