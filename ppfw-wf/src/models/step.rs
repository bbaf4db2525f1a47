//! Stage record model: the evidence collected for one stage of one intervention

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<StepStatus> {
        match s {
            "pending" => Some(StepStatus::Pending),
            "in_progress" => Some(StepStatus::InProgress),
            "completed" => Some(StepStatus::Completed),
            _ => None,
        }
    }
}

/// Geolocation fix captured with a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: Uuid,
    pub intervention_id: Uuid,
    pub step_number: u8,
    /// Stage-type tag; absent on rows written before tagging existed
    pub step_type: Option<Stage>,
    pub status: StepStatus,
    pub collected_data: Map<String, Value>,
    pub measurements: BTreeMap<String, f64>,
    pub observations: Vec<String>,
    pub photo_urls: Vec<String>,
    pub notes: Option<String>,
    pub geolocation: Option<Geolocation>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StepRecord {
    /// Empty in-progress record for `stage`
    pub fn new(intervention_id: Uuid, stage: Stage, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            intervention_id,
            step_number: stage.number(),
            step_type: Some(stage),
            status: StepStatus::InProgress,
            collected_data: Map::new(),
            measurements: BTreeMap::new(),
            observations: Vec::new(),
            photo_urls: Vec::new(),
            notes: None,
            geolocation: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
