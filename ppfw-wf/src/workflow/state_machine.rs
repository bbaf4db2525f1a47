//! Workflow State Machine
//!
//! ```text
//! Inspection(1) → Preparation(2) → Installation(3) → Finalization(4) → Completed
//!        └──────────────┴─────────────────┴──────────────────┴────→ Cancelled
//! ```
//!
//! Pure decision logic only: callers load state, ask for a plan, apply it and
//! persist the result under the intervention's version token.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

use super::collector::{AdvanceFlags, StepPayload};
use super::WorkflowError;
use crate::models::{Intervention, InterventionStatus, Stage, StepRecord, StepStatus};

/// Position of an intervention in the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "stage")]
pub enum WorkflowState {
    AtStage(Stage),
    Completed,
    Cancelled,
}

/// Derive the workflow state from a stored intervention
pub fn workflow_state(intervention: &Intervention) -> WorkflowState {
    match intervention.status {
        InterventionStatus::Completed => WorkflowState::Completed,
        InterventionStatus::Cancelled => WorkflowState::Cancelled,
        _ => WorkflowState::AtStage(
            Stage::from_number(i64::from(intervention.current_step)).unwrap_or(Stage::Inspection),
        ),
    }
}

/// Accepted advance, ready to be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvancePlan {
    pub stage: Stage,
    pub from_step: u8,
    pub flags: AdvanceFlags,
    /// Submitted stage differs from `current_step`
    pub out_of_order: bool,
}

impl AdvancePlan {
    /// Every advance carrying an override flag is audited
    pub fn requires_audit(&self) -> bool {
        self.flags.any()
    }
}

/// Decide whether `step_number` may be submitted now
pub fn plan_advance(
    intervention: &Intervention,
    step_number: i64,
    flags: AdvanceFlags,
) -> Result<AdvancePlan, WorkflowError> {
    let stage = Stage::from_number(step_number).ok_or(WorkflowError::InvalidStep(step_number))?;

    if intervention.is_finalized() {
        return Err(WorkflowError::Finalized(intervention.status.clone()));
    }

    let out_of_order = stage.number() != intervention.current_step;
    if out_of_order && !flags.any() {
        return Err(WorkflowError::OutOfOrder {
            submitted: stage.number(),
            current: intervention.current_step,
        });
    }

    Ok(AdvancePlan {
        stage,
        from_step: intervention.current_step,
        flags,
        out_of_order,
    })
}

/// Merge a submission into the stage record and mark the stage completed
///
/// Object keys present in the payload overwrite existing ones; keys absent
/// from the payload are kept. Observations and photo URLs are appended,
/// skipping entries already recorded.
pub fn merge_step(
    existing: Option<StepRecord>,
    intervention_id: Uuid,
    stage: Stage,
    payload: StepPayload,
    now: DateTime<Utc>,
) -> StepRecord {
    let mut record = existing.unwrap_or_else(|| StepRecord::new(intervention_id, stage, now));

    record.collected_data.extend(payload.collected_data);
    record.measurements.extend(payload.measurements);

    for observation in payload.observations {
        if !record.observations.contains(&observation) {
            record.observations.push(observation);
        }
    }
    for url in payload.photo_urls {
        if !record.photo_urls.contains(&url) {
            record.photo_urls.push(url);
        }
    }

    if payload.notes.is_some() {
        record.notes = payload.notes;
    }
    if payload.geolocation.is_some() {
        record.geolocation = payload.geolocation;
    }

    record.step_type = Some(stage);
    record.status = StepStatus::Completed;
    record.completed_at = Some(now);
    record.updated_at = now;
    record
}

/// Compute the intervention after an accepted advance
///
/// `completed` holds every stage completed once the submission is applied.
/// The pointer moves past the submitted stage. Once stage 4 is submitted the
/// intervention completes if nothing is outstanding. Otherwise an override
/// submission returns the pointer to the lowest outstanding stage, while a
/// plain submission leaves it at stage 4 so it never moves backwards.
pub fn apply_advance(
    intervention: &Intervention,
    plan: &AdvancePlan,
    completed: &BTreeSet<Stage>,
    now: DateTime<Utc>,
) -> Intervention {
    let mut next = intervention.clone();

    match plan.stage.next() {
        Some(following) => {
            next.current_step = following.number();
            next.status = InterventionStatus::InProgress;
        }
        None => {
            let outstanding = Stage::ALL.into_iter().find(|s| !completed.contains(s));
            match outstanding {
                None => {
                    next.current_step = Stage::Finalization.number();
                    next.status = InterventionStatus::Completed;
                }
                Some(stage) if plan.flags.any() => {
                    next.current_step = stage.number();
                    next.status = InterventionStatus::InProgress;
                }
                Some(_) => {
                    next.current_step = Stage::Finalization.number();
                    next.status = InterventionStatus::InProgress;
                }
            }
        }
    }

    next.completion_percentage = completed.len() as f64 * 25.0;
    next.updated_at = now;
    next.version = intervention.version + 1;
    next
}

/// Compute the intervention after cancellation
pub fn apply_cancel(
    intervention: &Intervention,
    now: DateTime<Utc>,
) -> Result<Intervention, WorkflowError> {
    if intervention.is_finalized() {
        return Err(WorkflowError::Finalized(intervention.status.clone()));
    }

    let mut next = intervention.clone();
    next.status = InterventionStatus::Cancelled;
    next.updated_at = now;
    next.version = intervention.version + 1;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Geolocation;
    use serde_json::json;

    fn at_step(step: u8) -> Intervention {
        let mut iv = Intervention::new(Some("c".into()), Some("v".into()), Some("t".into()));
        iv.current_step = step;
        iv
    }

    fn no_flags() -> AdvanceFlags {
        AdvanceFlags::default()
    }

    fn override_flags() -> AdvanceFlags {
        AdvanceFlags {
            force_validation: false,
            supervisor_override: true,
        }
    }

    #[test]
    fn test_out_of_range_steps_rejected() {
        let iv = at_step(1);
        for step in [-1, 0, 5, 99] {
            assert!(matches!(
                plan_advance(&iv, step, override_flags()),
                Err(WorkflowError::InvalidStep(s)) if s == step
            ));
        }
    }

    #[test]
    fn test_in_order_step_accepted() {
        let plan = plan_advance(&at_step(2), 2, no_flags()).unwrap();
        assert_eq!(plan.stage, Stage::Preparation);
        assert!(!plan.out_of_order);
        assert!(!plan.requires_audit());
    }

    #[test]
    fn test_out_of_order_requires_flag() {
        assert!(matches!(
            plan_advance(&at_step(1), 3, no_flags()),
            Err(WorkflowError::OutOfOrder { submitted: 3, current: 1 })
        ));

        let forced = AdvanceFlags {
            force_validation: true,
            supervisor_override: false,
        };
        let plan = plan_advance(&at_step(1), 3, forced).unwrap();
        assert!(plan.out_of_order);
        assert!(plan.requires_audit());
    }

    #[test]
    fn test_in_order_with_flag_still_audited() {
        let plan = plan_advance(&at_step(2), 2, override_flags()).unwrap();
        assert!(!plan.out_of_order);
        assert!(plan.requires_audit());
    }

    #[test]
    fn test_finalized_rejects_even_with_override() {
        let mut iv = at_step(4);
        iv.status = InterventionStatus::Completed;
        assert!(matches!(
            plan_advance(&iv, 4, override_flags()),
            Err(WorkflowError::Finalized(InterventionStatus::Completed))
        ));
    }

    #[test]
    fn test_apply_moves_pointer_and_percentage() {
        let iv = at_step(1);
        let plan = plan_advance(&iv, 1, no_flags()).unwrap();
        let completed = BTreeSet::from([Stage::Inspection]);

        let next = apply_advance(&iv, &plan, &completed, Utc::now());

        assert_eq!(next.current_step, 2);
        assert_eq!(next.status, InterventionStatus::InProgress);
        assert_eq!(next.completion_percentage, 25.0);
        assert_eq!(next.version, iv.version + 1);
    }

    #[test]
    fn test_final_stage_completes_workflow() {
        let iv = at_step(4);
        let plan = plan_advance(&iv, 4, no_flags()).unwrap();
        let completed: BTreeSet<Stage> = Stage::ALL.into_iter().collect();

        let next = apply_advance(&iv, &plan, &completed, Utc::now());

        assert_eq!(next.status, InterventionStatus::Completed);
        assert_eq!(next.current_step, 4);
        assert_eq!(next.completion_percentage, 100.0);
        assert_eq!(workflow_state(&next), WorkflowState::Completed);
    }

    #[test]
    fn test_skipping_to_final_stage_returns_to_outstanding() {
        let iv = at_step(2);
        let plan = plan_advance(&iv, 4, override_flags()).unwrap();
        let completed = BTreeSet::from([Stage::Inspection, Stage::Finalization]);

        let next = apply_advance(&iv, &plan, &completed, Utc::now());

        assert_eq!(next.status, InterventionStatus::InProgress);
        assert_eq!(next.current_step, 2);
        assert_eq!(next.completion_percentage, 50.0);
    }

    #[test]
    fn test_plain_final_submission_keeps_pointer_with_outstanding_stages() {
        let iv = at_step(4);
        let plan = plan_advance(&iv, 4, no_flags()).unwrap();
        let completed = BTreeSet::from([Stage::Installation, Stage::Finalization]);

        let next = apply_advance(&iv, &plan, &completed, Utc::now());

        assert_eq!(next.status, InterventionStatus::InProgress);
        assert_eq!(next.current_step, 4);
        assert_eq!(next.completion_percentage, 50.0);
        assert_eq!(workflow_state(&next), WorkflowState::AtStage(Stage::Finalization));
    }

    #[test]
    fn test_override_can_move_pointer_backwards() {
        let iv = at_step(3);
        let plan = plan_advance(&iv, 1, override_flags()).unwrap();
        let completed = BTreeSet::from([Stage::Inspection, Stage::Preparation]);

        let next = apply_advance(&iv, &plan, &completed, Utc::now());
        assert_eq!(next.current_step, 2);
    }

    #[test]
    fn test_merge_preserves_and_overwrites_keys() {
        let now = Utc::now();
        let iv_id = Uuid::new_v4();
        let mut existing = StepRecord::new(iv_id, Stage::Inspection, now);
        existing.collected_data.insert("paint".into(), json!("good"));
        existing.collected_data.insert("odometer".into(), json!(1200));
        existing.measurements.insert("thickness".into(), 100.0);
        existing.observations.push("chip on hood".into());
        existing.notes = Some("first visit".into());

        let mut payload = StepPayload::default();
        payload.collected_data.insert("odometer".into(), json!(1250));
        payload.measurements.insert("humidity".into(), 40.0);
        payload.observations = vec!["chip on hood".into(), "swirl marks".into()];
        payload.geolocation = Some(Geolocation {
            latitude: 1.0,
            longitude: 2.0,
            accuracy: None,
            timestamp: now,
        });

        let merged = merge_step(Some(existing), iv_id, Stage::Inspection, payload, now);

        assert_eq!(merged.collected_data["paint"], json!("good"));
        assert_eq!(merged.collected_data["odometer"], json!(1250));
        assert_eq!(merged.measurements.len(), 2);
        assert_eq!(merged.observations, vec!["chip on hood", "swirl marks"]);
        assert_eq!(merged.notes.as_deref(), Some("first visit"));
        assert!(merged.geolocation.is_some());
        assert_eq!(merged.status, StepStatus::Completed);
        assert_eq!(merged.completed_at, Some(now));
    }

    #[test]
    fn test_merge_backfills_stage_tag() {
        let now = Utc::now();
        let iv_id = Uuid::new_v4();
        let mut legacy = StepRecord::new(iv_id, Stage::Installation, now);
        legacy.step_type = None;

        let merged = merge_step(Some(legacy), iv_id, Stage::Installation, StepPayload::default(), now);
        assert_eq!(merged.step_type, Some(Stage::Installation));
    }

    #[test]
    fn test_cancel_from_any_stage_but_not_twice() {
        let iv = at_step(3);
        let cancelled = apply_cancel(&iv, Utc::now()).unwrap();
        assert_eq!(workflow_state(&cancelled), WorkflowState::Cancelled);
        assert!(apply_cancel(&cancelled, Utc::now()).is_err());
    }
}
