//! Compliance validation layer
//!
//! Read-only diagnostics over an intervention, its stage records and its
//! photo evidence. Nothing here touches storage.

pub mod compliance;

pub use compliance::{ComplianceScorer, ComplianceThresholds, PassOutcome};
