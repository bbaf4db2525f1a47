//! Intervention (installation job) model
//!
//! An intervention moves through four fixed stages:
//! INSPECTION → PREPARATION → INSTALLATION → FINALIZATION → completed,
//! and may be cancelled from any stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the four fixed, ordered stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Vehicle condition survey before any work
    Inspection = 1,
    /// Surface cleaning, decontamination, masking
    Preparation = 2,
    /// Film application
    Installation = 3,
    /// Post-install checks and customer handover
    Finalization = 4,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Inspection,
        Stage::Preparation,
        Stage::Installation,
        Stage::Finalization,
    ];

    /// Stage for a 1-based step number, `None` outside [1,4]
    pub fn from_number(step_number: i64) -> Option<Stage> {
        match step_number {
            1 => Some(Stage::Inspection),
            2 => Some(Stage::Preparation),
            3 => Some(Stage::Installation),
            4 => Some(Stage::Finalization),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        self as u8
    }

    /// Following stage, `None` after finalization
    pub fn next(self) -> Option<Stage> {
        Stage::from_number(i64::from(self.number()) + 1)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Inspection => "inspection",
            Stage::Preparation => "preparation",
            Stage::Installation => "installation",
            Stage::Finalization => "finalization",
        }
    }

    pub fn parse(s: &str) -> Option<Stage> {
        Stage::ALL.into_iter().find(|stage| stage.as_str() == s)
    }
}

/// Intervention lifecycle status
///
/// Values outside the recognized vocabulary (written by older clients or
/// other systems sharing the table) are kept verbatim in `Unrecognized` so
/// they round-trip and can be flagged by the compliance scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InterventionStatus {
    Pending,
    InProgress,
    Paused,
    Completed,
    Cancelled,
    Unrecognized(String),
}

impl InterventionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            InterventionStatus::Pending => "pending",
            InterventionStatus::InProgress => "in_progress",
            InterventionStatus::Paused => "paused",
            InterventionStatus::Completed => "completed",
            InterventionStatus::Cancelled => "cancelled",
            InterventionStatus::Unrecognized(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, InterventionStatus::Unrecognized(_))
    }

    /// Completed and cancelled interventions accept no further changes
    pub fn is_finalized(&self) -> bool {
        matches!(
            self,
            InterventionStatus::Completed | InterventionStatus::Cancelled
        )
    }
}

impl From<String> for InterventionStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => InterventionStatus::Pending,
            "in_progress" => InterventionStatus::InProgress,
            "paused" => InterventionStatus::Paused,
            "completed" => InterventionStatus::Completed,
            "cancelled" => InterventionStatus::Cancelled,
            _ => InterventionStatus::Unrecognized(value),
        }
    }
}

impl From<InterventionStatus> for String {
    fn from(value: InterventionStatus) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for InterventionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One complete installation job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub id: Uuid,

    /// Stage currently awaiting submission (1-4)
    pub current_step: u8,

    pub status: InterventionStatus,

    /// Expected 0-100; not enforced, the scorer warns when outside
    pub completion_percentage: f64,

    pub client_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub technician_id: Option<String>,

    /// Monotonic concurrency token, bumped on every write
    pub version: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Intervention {
    /// New pending intervention at the inspection stage
    pub fn new(
        client_id: Option<String>,
        vehicle_id: Option<String>,
        technician_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            current_step: Stage::Inspection.number(),
            status: InterventionStatus::Pending,
            completion_percentage: 0.0,
            client_id,
            vehicle_id,
            technician_id,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.status.is_finalized()
    }
}
