//! Compliance report types
//!
//! A [`ValidationResult`] is computed on demand and never persisted.
//! Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

/// Which validation pass produced an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Data,
    Steps,
    Photos,
    Compliance,
}

impl Dimension {
    /// Score deduction per hard error in this dimension
    pub fn error_weight(self) -> u32 {
        match self {
            Dimension::Data => 20,
            Dimension::Steps => 15,
            Dimension::Photos => 10,
            Dimension::Compliance => 25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub dimension: Dimension,
    pub severity: IssueSeverity,
    /// Stable machine-readable code, e.g. `MISSING_GPS`
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn error(dimension: Dimension, code: &str, message: impl Into<String>) -> Self {
        Self {
            dimension,
            severity: IssueSeverity::Error,
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn warning(dimension: Dimension, code: &str, message: impl Into<String>) -> Self {
        Self {
            dimension,
            severity: IssueSeverity::Warning,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Pass selection for a validation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationOptions {
    pub validate_steps: bool,
    pub validate_photos: bool,
    pub validate_compliance: bool,
    /// Echoed in the report metadata; does not change pass outcomes
    pub strict_mode: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            validate_steps: true,
            validate_photos: true,
            validate_compliance: true,
            strict_mode: false,
        }
    }
}

/// Per-dimension health (true = no hard errors, or pass disabled)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionStatus {
    pub data_validation: bool,
    pub step_validation: bool,
    pub photo_validation: bool,
    pub compliance_validation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// True iff `errors` is empty
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    /// 0-100
    pub score: u8,
    #[serde(flatten)]
    pub dimensions: DimensionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_default_enable_every_pass() {
        let options: ValidationOptions = serde_json::from_str("{}").unwrap();
        assert!(options.validate_steps);
        assert!(options.validate_photos);
        assert!(options.validate_compliance);
        assert!(!options.strict_mode);
    }

    #[test]
    fn test_options_camel_case() {
        let options: ValidationOptions =
            serde_json::from_str(r#"{"validatePhotos": false, "strictMode": true}"#).unwrap();
        assert!(!options.validate_photos);
        assert!(options.strict_mode);
        assert!(options.validate_steps);
    }

    #[test]
    fn test_result_wire_shape() {
        let result = ValidationResult {
            is_valid: true,
            errors: vec![],
            warnings: vec![],
            score: 100,
            dimensions: DimensionStatus {
                data_validation: true,
                step_validation: true,
                photo_validation: true,
                compliance_validation: true,
            },
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isValid"], true);
        assert_eq!(json["score"], 100);
        assert_eq!(json["dataValidation"], true);
        assert_eq!(json["complianceValidation"], true);
    }
}
