//! Photo evidence model
//!
//! Angle and category are closed vocabularies. Parsing is lenient about case
//! and `_` vs `-`; anything else is left to the ingestion layer, which
//! substitutes a default rather than rejecting the upload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Camera angle relative to the vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhotoAngle {
    Front,
    Rear,
    Left,
    Right,
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
    Top,
    Interior,
    Detail,
}

impl PhotoAngle {
    pub const ALL: [PhotoAngle; 11] = [
        PhotoAngle::Front,
        PhotoAngle::Rear,
        PhotoAngle::Left,
        PhotoAngle::Right,
        PhotoAngle::FrontLeft,
        PhotoAngle::FrontRight,
        PhotoAngle::RearLeft,
        PhotoAngle::RearRight,
        PhotoAngle::Top,
        PhotoAngle::Interior,
        PhotoAngle::Detail,
    ];

    /// Angles every intervention is expected to cover
    pub const STANDARD: [PhotoAngle; 4] = [
        PhotoAngle::Front,
        PhotoAngle::Rear,
        PhotoAngle::Left,
        PhotoAngle::Right,
    ];

    pub const DEFAULT: PhotoAngle = PhotoAngle::FrontLeft;

    pub fn as_str(self) -> &'static str {
        match self {
            PhotoAngle::Front => "front",
            PhotoAngle::Rear => "rear",
            PhotoAngle::Left => "left",
            PhotoAngle::Right => "right",
            PhotoAngle::FrontLeft => "front-left",
            PhotoAngle::FrontRight => "front-right",
            PhotoAngle::RearLeft => "rear-left",
            PhotoAngle::RearRight => "rear-right",
            PhotoAngle::Top => "top",
            PhotoAngle::Interior => "interior",
            PhotoAngle::Detail => "detail",
        }
    }

    pub fn parse(s: &str) -> Option<PhotoAngle> {
        let normalized = normalize_token(s);
        PhotoAngle::ALL
            .into_iter()
            .find(|angle| angle.as_str() == normalized)
    }
}

/// What the photo documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhotoCategory {
    BeforeInstallation,
    InstallationProgress,
    AfterInstallation,
    Defect,
    Detail,
}

impl PhotoCategory {
    pub const ALL: [PhotoCategory; 5] = [
        PhotoCategory::BeforeInstallation,
        PhotoCategory::InstallationProgress,
        PhotoCategory::AfterInstallation,
        PhotoCategory::Defect,
        PhotoCategory::Detail,
    ];

    pub const DEFAULT: PhotoCategory = PhotoCategory::InstallationProgress;

    pub fn as_str(self) -> &'static str {
        match self {
            PhotoCategory::BeforeInstallation => "before-installation",
            PhotoCategory::InstallationProgress => "installation-progress",
            PhotoCategory::AfterInstallation => "after-installation",
            PhotoCategory::Defect => "defect",
            PhotoCategory::Detail => "detail",
        }
    }

    pub fn parse(s: &str) -> Option<PhotoCategory> {
        let normalized = normalize_token(s);
        PhotoCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
    }
}

fn normalize_token(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace('_', "-")
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoEvidence {
    pub id: Uuid,
    pub intervention_id: Uuid,
    pub step_number: u8,
    pub angle: PhotoAngle,
    pub category: PhotoCategory,
    pub gps: Option<GpsPoint>,
    /// 0-100, `None` until assessed
    pub quality_score: Option<u8>,
    pub notes: Option<String>,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// Backend-specific location of the stored bytes
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_parse_is_lenient_about_case_and_separator() {
        assert_eq!(PhotoAngle::parse("FRONT_LEFT"), Some(PhotoAngle::FrontLeft));
        assert_eq!(PhotoAngle::parse(" rear-right "), Some(PhotoAngle::RearRight));
        assert_eq!(PhotoAngle::parse("xyz"), None);
        assert_eq!(PhotoAngle::parse(""), None);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(
            PhotoCategory::parse("installation_progress"),
            Some(PhotoCategory::InstallationProgress)
        );
        assert_eq!(PhotoCategory::parse("selfie"), None);
    }

    #[test]
    fn test_serde_names_match_as_str() {
        for angle in PhotoAngle::ALL {
            let json = serde_json::to_string(&angle).unwrap();
            assert_eq!(json, format!("\"{}\"", angle.as_str()));
        }
        for category in PhotoCategory::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(PhotoAngle::DEFAULT.as_str(), "front-left");
        assert_eq!(PhotoCategory::DEFAULT.as_str(), "installation-progress");
    }
}
