//! Pattern Store
//!
//! Persistent map of previously seen obstruction signatures to the
//! resolutions that worked, with confidence scoring, recency decay, and
//! eviction. All mutation funnels through `record_outcome`; lookups are
//! ranked best-first and an empty result is a normal outcome.

pub mod errors;
pub mod model;
pub mod store;

pub use errors::StoreError;
pub use model::{LearningEvent, ObstructionPattern, PatternKey, PatternMetrics};
pub use store::{PatternStore, StoreInsights};
