//! Compliance Scorer - four independent passes and a weighted score
//!
//! Passes: data, steps, photos, compliance. Every pass is warning-biased:
//! incomplete field records produce warnings, and only a genuinely
//! impossible record (updated before it was created) is a hard error.
//!
//! Score = 100 - Σ(errors in dimension × dimension weight), clamped to
//! [0,100]. Warnings never change the score or validity.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

use crate::models::{
    Dimension, DimensionStatus, Intervention, PhotoAngle, PhotoEvidence, StepRecord, StepStatus,
    ValidationIssue, ValidationOptions, ValidationResult,
};

/// Tunable limits for the photo and compliance passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplianceThresholds {
    /// Photos scored below this are flagged
    pub min_photo_quality: u8,
    /// Non-finalized interventions older than this are flagged
    pub max_open_days: i64,
}

impl Default for ComplianceThresholds {
    fn default() -> Self {
        Self {
            min_photo_quality: 70,
            max_open_days: 30,
        }
    }
}

/// Issues produced by one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutcome {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl PassOutcome {
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, dimension: Dimension, code: &str, message: impl Into<String>) {
        self.errors
            .push(ValidationIssue::error(dimension, code, message));
    }

    fn warn(&mut self, dimension: Dimension, code: &str, message: impl Into<String>) {
        self.warnings
            .push(ValidationIssue::warning(dimension, code, message));
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ComplianceScorer {
    thresholds: ComplianceThresholds,
}

impl ComplianceScorer {
    pub fn new(thresholds: ComplianceThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> ComplianceThresholds {
        self.thresholds
    }

    /// Run the enabled passes and build the report
    ///
    /// The data pass always runs. A disabled pass counts as healthy.
    pub fn evaluate(
        &self,
        intervention: &Intervention,
        steps: &[StepRecord],
        photos: &[PhotoEvidence],
        options: &ValidationOptions,
        now: DateTime<Utc>,
    ) -> ValidationResult {
        let data = validate_data(intervention);
        let step_pass = options
            .validate_steps
            .then(|| validate_steps(steps))
            .unwrap_or_default();
        let photo_pass = options
            .validate_photos
            .then(|| validate_photos(photos, self.thresholds.min_photo_quality))
            .unwrap_or_default();
        let compliance_pass = options
            .validate_compliance
            .then(|| validate_compliance(intervention, now, self.thresholds.max_open_days))
            .unwrap_or_default();

        let dimensions = DimensionStatus {
            data_validation: data.is_healthy(),
            step_validation: step_pass.is_healthy(),
            photo_validation: photo_pass.is_healthy(),
            compliance_validation: compliance_pass.is_healthy(),
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        for pass in [data, step_pass, photo_pass, compliance_pass] {
            errors.extend(pass.errors);
            warnings.extend(pass.warnings);
        }

        let score = compute_score(&errors);

        tracing::debug!(
            intervention_id = %intervention.id,
            errors = errors.len(),
            warnings = warnings.len(),
            score,
            "Compliance evaluation finished"
        );

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            score,
            dimensions,
        }
    }
}

/// 100 minus weighted error deductions, clamped to [0,100]
pub fn compute_score(errors: &[ValidationIssue]) -> u8 {
    let deduction: u32 = errors.iter().map(|e| e.dimension.error_weight()).sum();
    100u32.saturating_sub(deduction) as u8
}

/// Data pass: timestamp ordering (hard) and identity completeness (advisory)
pub fn validate_data(intervention: &Intervention) -> PassOutcome {
    let mut pass = PassOutcome::default();

    if intervention.updated_at < intervention.created_at {
        pass.error(
            Dimension::Data,
            "UPDATED_BEFORE_CREATED",
            format!(
                "updated_at ({}) precedes created_at ({})",
                intervention.updated_at.to_rfc3339(),
                intervention.created_at.to_rfc3339()
            ),
        );
    }

    let identity_fields = [
        ("client_id", &intervention.client_id, "MISSING_CLIENT"),
        ("technician_id", &intervention.technician_id, "MISSING_TECHNICIAN"),
        ("vehicle_id", &intervention.vehicle_id, "MISSING_VEHICLE"),
    ];
    for (field, value, code) in identity_fields {
        if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
            pass.warn(Dimension::Data, code, format!("{} is not set", field));
        }
    }

    pass
}

/// Steps pass: stage bookkeeping consistency
pub fn validate_steps(steps: &[StepRecord]) -> PassOutcome {
    let mut pass = PassOutcome::default();

    if steps.is_empty() {
        pass.warn(Dimension::Steps, "NO_STEPS", "No stage records submitted yet");
        return pass;
    }

    let in_progress = steps
        .iter()
        .filter(|s| s.status == StepStatus::InProgress)
        .count();
    if in_progress > 1 {
        pass.warn(
            Dimension::Steps,
            "MULTIPLE_IN_PROGRESS",
            format!("{} stages are in progress simultaneously", in_progress),
        );
    }

    for step in steps {
        if step.step_type.is_none() {
            pass.warn(
                Dimension::Steps,
                "MISSING_STEP_TYPE",
                format!("Stage {} has no stage-type tag", step.step_number),
            );
        }
        if step.status == StepStatus::Completed && step.completed_at.is_none() {
            pass.warn(
                Dimension::Steps,
                "MISSING_COMPLETED_AT",
                format!(
                    "Stage {} is completed but has no completion timestamp",
                    step.step_number
                ),
            );
        }
    }

    pass
}

/// Photos pass: GPS presence, quality floor, standard angle coverage
pub fn validate_photos(photos: &[PhotoEvidence], min_quality: u8) -> PassOutcome {
    let mut pass = PassOutcome::default();

    if photos.is_empty() {
        pass.warn(Dimension::Photos, "NO_PHOTOS", "No photo evidence uploaded");
        return pass;
    }

    for photo in photos {
        if photo.gps.is_none() {
            pass.warn(
                Dimension::Photos,
                "MISSING_GPS",
                format!("Photo {} has no GPS coordinates", photo.id),
            );
        }
        if let Some(quality) = photo.quality_score {
            if quality < min_quality {
                pass.warn(
                    Dimension::Photos,
                    "LOW_QUALITY",
                    format!(
                        "Photo {} quality score {} is below {}",
                        photo.id, quality, min_quality
                    ),
                );
            }
        }
    }

    let covered: HashSet<PhotoAngle> = photos.iter().map(|p| p.angle).collect();
    let missing: Vec<&str> = PhotoAngle::STANDARD
        .into_iter()
        .filter(|angle| !covered.contains(angle))
        .map(PhotoAngle::as_str)
        .collect();
    if !missing.is_empty() {
        pass.warn(
            Dimension::Photos,
            "MISSING_ANGLES",
            format!("Standard angles not covered: {}", missing.join(", ")),
        );
    }

    pass
}

/// Compliance pass: age, status vocabulary, completion range
pub fn validate_compliance(
    intervention: &Intervention,
    now: DateTime<Utc>,
    max_open_days: i64,
) -> PassOutcome {
    let mut pass = PassOutcome::default();

    let open_for = now - intervention.created_at;
    if !intervention.is_finalized() && open_for > Duration::days(max_open_days) {
        pass.warn(
            Dimension::Compliance,
            "OPEN_TOO_LONG",
            format!(
                "Intervention has been open for {} days (limit {})",
                open_for.num_days(),
                max_open_days
            ),
        );
    }

    if !intervention.status.is_recognized() {
        pass.warn(
            Dimension::Compliance,
            "UNKNOWN_STATUS",
            format!("Status '{}' is not a recognized value", intervention.status),
        );
    }

    let pct = intervention.completion_percentage;
    if !(0.0..=100.0).contains(&pct) {
        pass.warn(
            Dimension::Compliance,
            "COMPLETION_OUT_OF_RANGE",
            format!("completion_percentage {} is outside 0-100", pct),
        );
    }

    pass
}
