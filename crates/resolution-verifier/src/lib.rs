//! Resolution Verifier
//!
//! Independently judges whether a resolution actually worked by
//! comparing fresh page evidence against the obstruction, instead of
//! trusting the executor's own report. Verification is pure over
//! snapshots; the caller supplies the before/after page states.

pub mod model;
pub mod verifier;

pub use model::{CheckOutcome, VerificationResult};
pub use verifier::{ResolutionVerifier, VerificationInput, DEFAULT_VERIFY_THRESHOLD};
