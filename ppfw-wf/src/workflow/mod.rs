//! Stage-advancement workflow
//!
//! - [`authorizer`]: request-boundary gatekeeping (identifier, credential, rate)
//! - [`collector`]: payload shape checks
//! - [`state_machine`]: ordering, override and completion rules
//! - [`service`]: load → plan → collect → merge → compare-and-swap persist

pub mod authorizer;
pub mod collector;
pub mod service;
pub mod state_machine;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{FieldIssue, InterventionStatus};

pub use authorizer::{
    CounterStore, IdentityVerifier, RateLimit, SharedSecretVerifier,
};
pub use collector::AdvanceFlags;
pub use service::AdvanceOutcome;
pub use state_machine::{workflow_state, WorkflowState};

/// Outcome of a rejected workflow operation
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Intervention not found: {0}")]
    NotFound(Uuid),

    #[error("Step {0} is outside the range 1-4")]
    InvalidStep(i64),

    #[error("Step {submitted} submitted while the intervention is at step {current}")]
    OutOfOrder { submitted: u8, current: u8 },

    #[error("Intervention is {0} and accepts no further changes")]
    Finalized(InterventionStatus),

    #[error("Stage submission failed validation ({} issue(s))", .0.len())]
    ValidationFailed(Vec<FieldIssue>),

    #[error("Intervention was modified concurrently (expected version {expected})")]
    Conflict { expected: i64 },

    #[error(transparent)]
    Storage(#[from] ppfw_common::Error),
}
