//! Workflow operations over the intervention store
//!
//! Each operation loads what it needs, asks the state machine for a decision
//! and persists the outcome under the intervention's version token.

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use tracing::{info, warn};
use uuid::Uuid;

use ppfw_common::api::CallerIdentity;

use super::collector::{collect_payload, Envelope};
use super::state_machine::{apply_advance, apply_cancel, merge_step, plan_advance};
use super::WorkflowError;
use crate::db;
use crate::models::{
    AdvanceAuditEntry, Intervention, Stage, StepRecord, StepStatus, ValidationOptions,
    ValidationResult,
};
use crate::validators::ComplianceScorer;

/// Result of an accepted advance
#[derive(Debug, Clone, Serialize)]
pub struct AdvanceOutcome {
    pub intervention: Intervention,
    pub step: StepRecord,
    /// The advance carried an override flag and was written to the audit trail
    pub audited: bool,
}

/// Create a pending intervention at the inspection stage
pub async fn start(
    pool: &SqlitePool,
    client_id: Option<String>,
    vehicle_id: Option<String>,
    technician_id: Option<String>,
) -> Result<Intervention, WorkflowError> {
    let intervention = Intervention::new(client_id, vehicle_id, technician_id);
    db::interventions::insert(pool, &intervention).await?;

    info!(intervention_id = %intervention.id, "Intervention started");
    Ok(intervention)
}

pub async fn load(pool: &SqlitePool, intervention_id: Uuid) -> Result<Intervention, WorkflowError> {
    db::interventions::load(pool, intervention_id)
        .await?
        .ok_or(WorkflowError::NotFound(intervention_id))
}

/// Submit evidence for one stage and move the workflow forward
///
/// `envelope` is the already-parsed control part of `body`. Check order:
/// existence, pinned version, stage plan, payload shape. Nothing is written
/// unless every check passes and the version compare-and-swap succeeds.
pub async fn advance(
    pool: &SqlitePool,
    caller: &CallerIdentity,
    intervention_id: Uuid,
    envelope: &Envelope,
    body: &Map<String, Value>,
) -> Result<AdvanceOutcome, WorkflowError> {
    let intervention = load(pool, intervention_id).await?;

    if let Some(expected) = envelope.expected_version {
        if expected != intervention.version {
            return Err(WorkflowError::Conflict { expected });
        }
    }

    let plan = plan_advance(&intervention, envelope.step_number, envelope.flags)?;

    let now = Utc::now();
    let payload = collect_payload(body, now).map_err(WorkflowError::ValidationFailed)?;

    let steps = db::steps::list_for_intervention(pool, intervention_id).await?;
    let mut completed: BTreeSet<_> = steps
        .iter()
        .filter(|s| s.status == StepStatus::Completed)
        .filter_map(|s| Stage::from_number(i64::from(s.step_number)))
        .collect();
    completed.insert(plan.stage);

    let existing = steps
        .into_iter()
        .find(|s| s.step_number == plan.stage.number());
    let step = merge_step(existing, intervention_id, plan.stage, payload, now);
    let next = apply_advance(&intervention, &plan, &completed, now);

    let audit_entry = plan.requires_audit().then(|| AdvanceAuditEntry {
        id: Uuid::new_v4(),
        intervention_id,
        caller: caller.subject.clone(),
        from_step: plan.from_step,
        to_step: plan.stage.number(),
        force_validation: plan.flags.force_validation,
        supervisor_override: plan.flags.supervisor_override,
        out_of_order: plan.out_of_order,
        created_at: now,
    });

    let max_wait_ms = db::max_lock_wait_ms(pool).await;
    let committed = db::steps::commit_advance(
        pool,
        max_wait_ms,
        &next,
        intervention.version,
        &step,
        audit_entry.as_ref(),
    )
    .await?;

    if !committed {
        warn!(
            intervention_id = %intervention_id,
            version = intervention.version,
            "Advance lost a concurrent update"
        );
        return Err(WorkflowError::Conflict { expected: intervention.version });
    }

    if let Some(entry) = &audit_entry {
        warn!(
            intervention_id = %intervention_id,
            caller = %entry.caller,
            from_step = entry.from_step,
            to_step = entry.to_step,
            force_validation = entry.force_validation,
            supervisor_override = entry.supervisor_override,
            out_of_order = entry.out_of_order,
            "Advance accepted under override"
        );
    }

    info!(
        intervention_id = %intervention_id,
        caller = %caller.subject,
        step = plan.stage.number(),
        current_step = next.current_step,
        status = %next.status,
        completion = next.completion_percentage,
        "Stage submitted"
    );

    Ok(AdvanceOutcome {
        intervention: next,
        step,
        audited: audit_entry.is_some(),
    })
}

/// Cancel a non-finalized intervention
pub async fn cancel(
    pool: &SqlitePool,
    caller: &CallerIdentity,
    intervention_id: Uuid,
    expected_version: Option<i64>,
) -> Result<Intervention, WorkflowError> {
    let intervention = load(pool, intervention_id).await?;
    let expected = expected_version.unwrap_or(intervention.version);
    if expected != intervention.version {
        return Err(WorkflowError::Conflict { expected });
    }

    let next = apply_cancel(&intervention, Utc::now())?;

    let max_wait_ms = db::max_lock_wait_ms(pool).await;
    let swapped = db::retry_on_lock("cancel_intervention", max_wait_ms, || async {
        let mut conn = pool.acquire().await?;
        db::interventions::compare_and_swap(&mut conn, &next, expected).await
    })
    .await?;

    if !swapped {
        return Err(WorkflowError::Conflict { expected });
    }

    info!(intervention_id = %intervention_id, caller = %caller.subject, "Intervention cancelled");
    Ok(next)
}

pub async fn list_steps(
    pool: &SqlitePool,
    intervention_id: Uuid,
) -> Result<Vec<StepRecord>, WorkflowError> {
    load(pool, intervention_id).await?;
    Ok(db::steps::list_for_intervention(pool, intervention_id).await?)
}

pub async fn audit_trail(
    pool: &SqlitePool,
    intervention_id: Uuid,
) -> Result<Vec<AdvanceAuditEntry>, WorkflowError> {
    load(pool, intervention_id).await?;
    Ok(db::audit::list_for_intervention(pool, intervention_id).await?)
}

/// Build a compliance report; read-only
pub async fn evaluate(
    pool: &SqlitePool,
    scorer: &ComplianceScorer,
    intervention_id: Uuid,
    options: &ValidationOptions,
) -> Result<ValidationResult, WorkflowError> {
    let intervention = load(pool, intervention_id).await?;
    let steps = db::steps::list_for_intervention(pool, intervention_id).await?;
    let photos = db::photos::list_for_intervention(pool, intervention_id, None).await?;

    Ok(scorer.evaluate(&intervention, &steps, &photos, options, Utc::now()))
}
