//! Override audit trail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One advance submitted with `force_validation` or `supervisor_override`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceAuditEntry {
    pub id: Uuid,
    pub intervention_id: Uuid,
    /// Verified (or, with auth disabled, claimed) caller subject
    pub caller: String,
    pub from_step: u8,
    pub to_step: u8,
    pub force_validation: bool,
    pub supervisor_override: bool,
    pub out_of_order: bool,
    pub created_at: DateTime<Utc>,
}
