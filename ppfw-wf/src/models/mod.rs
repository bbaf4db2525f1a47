//! Domain models for the intervention workflow

pub mod audit;
pub mod intervention;
pub mod photo;
pub mod step;
pub mod validation;

pub use audit::AdvanceAuditEntry;
pub use intervention::{Intervention, InterventionStatus, Stage};
pub use photo::{GpsPoint, PhotoAngle, PhotoCategory, PhotoEvidence};
pub use step::{Geolocation, StepRecord, StepStatus};
pub use validation::{
    Dimension, DimensionStatus, IssueSeverity, ValidationIssue, ValidationOptions,
    ValidationResult,
};

/// Field-level problem reported back to the caller in a 422/400 body
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
