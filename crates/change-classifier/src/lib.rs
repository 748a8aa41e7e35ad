//! Change Classifier
//!
//! Turns a before/after page-state pair plus the action just executed into
//! a typed change classification. Classification is total: any internal
//! fault degrades to a `Minor` result rather than surfacing an error, so
//! the retry machinery upstream never has to handle a classifier failure.

pub mod classifier;
pub mod model;
pub mod signatures;

pub use classifier::classify;
pub use model::{ChangeClassification, ChangeKind};
