//! Core types for Yousei missions
//!
//! This module defines the data structures shared by the catalog, the engine
//! and the bridges: mission definitions, the live mission state and the
//! outcomes reported back to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Smallest threshold used when turning a signal into progress
pub const MIN_THRESHOLD: f32 = 0.01;

/// Threshold applied when a definition omits one
pub const DEFAULT_THRESHOLD: f32 = 0.3;

/// Kind of challenge a mission asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionType {
    /// Point the camera at something green
    ColorGreen,
    /// Point the camera at the sky
    SkyBlue,
    /// Smile at the front camera
    Smile,
}

impl MissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionType::ColorGreen => "color_green",
            MissionType::SkyBlue => "sky_blue",
            MissionType::Smile => "smile",
        }
    }

    /// Whether progress for this type comes from camera color coverage
    pub fn is_color(&self) -> bool {
        matches!(self, MissionType::ColorGreen | MissionType::SkyBlue)
    }
}

/// Immutable mission definition owned by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionDefinition {
    /// Unique mission identifier
    pub id: String,
    /// Challenge kind
    #[serde(rename = "type")]
    pub mission_type: MissionType,
    /// Ratio or score required for full progress, in (0, 1]
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Player-facing description
    #[serde(default)]
    pub description: String,
    /// Reward granted on completion
    #[serde(default)]
    pub reward_id: String,
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

impl MissionDefinition {
    pub fn new(
        id: impl Into<String>,
        mission_type: MissionType,
        threshold: f32,
        description: impl Into<String>,
        reward_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            mission_type,
            threshold,
            description: description.into(),
            reward_id: reward_id.into(),
        }
    }

    /// Convert a raw signal (match ratio or smile score) into progress.
    ///
    /// Reaching the threshold yields 1.0; partial signals get proportional
    /// credit.
    pub fn progress_for(&self, signal: f32) -> f32 {
        signal_to_progress(signal, self.threshold)
    }
}

/// `clamp01(signal / max(MIN_THRESHOLD, threshold))`
pub fn signal_to_progress(signal: f32, threshold: f32) -> f32 {
    (signal / threshold.max(MIN_THRESHOLD)).clamp(0.0, 1.0)
}

/// Mutable state of the live mission episode
#[derive(Debug, Clone, PartialEq)]
pub struct MissionState {
    /// Id of the referenced [`MissionDefinition`]
    pub id: String,
    /// Start of the UTC day following assignment
    pub expires_at: DateTime<Utc>,
    /// Progress toward completion (0-1), never decreases within an episode
    pub progress: f32,
    /// Set once progress reached 1.0
    pub completed: bool,
}

impl MissionState {
    /// Fresh, unstarted state for a mission
    pub fn fresh(id: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            expires_at,
            progress: 0.0,
            completed: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Coarse lifecycle phase of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionPhase {
    /// No mission assigned (not initialized, or the catalog was empty)
    Uninitialized,
    InProgress,
    Completed,
}

/// Result of a single progress report
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressUpdate {
    /// No mission is live
    NoMission,
    /// The live mission was already completed
    AlreadyCompleted,
    /// The value did not exceed stored progress (or was NaN)
    NotAdvanced,
    /// Progress moved forward to the contained value
    Advanced(f32),
    /// Progress reached 1.0 and the mission completed
    Completed,
}

impl ProgressUpdate {
    /// Whether the report changed stored progress
    pub fn is_accepted(&self) -> bool {
        matches!(self, ProgressUpdate::Advanced(_) | ProgressUpdate::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_progress_for_scales_by_threshold() {
        let def = MissionDefinition::new("m", MissionType::ColorGreen, 0.15, "", "");
        assert!((def.progress_for(0.075) - 0.5).abs() < 1e-6);
        assert_eq!(def.progress_for(0.15), 1.0);
        assert_eq!(def.progress_for(0.9), 1.0);
        assert_eq!(def.progress_for(0.0), 0.0);
    }

    #[test]
    fn test_progress_for_guards_tiny_threshold() {
        let def = MissionDefinition::new("m", MissionType::Smile, 0.0, "", "");
        // threshold floors at MIN_THRESHOLD
        assert!((def.progress_for(0.005) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_definition_deserialize_defaults() {
        let def: MissionDefinition =
            serde_json::from_str(r#"{"id": "m_smile", "type": "smile"}"#).unwrap();
        assert_eq!(def.mission_type, MissionType::Smile);
        assert_eq!(def.threshold, DEFAULT_THRESHOLD);
        assert!(def.description.is_empty());
    }

    #[test]
    fn test_state_expiry_boundary() {
        let expires = Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 0).unwrap();
        let state = MissionState::fresh("m", expires);
        assert!(!state.is_expired(expires - chrono::Duration::nanoseconds(1)));
        assert!(state.is_expired(expires));
    }

    #[test]
    fn test_mission_type_flags() {
        assert!(MissionType::ColorGreen.is_color());
        assert!(MissionType::SkyBlue.is_color());
        assert!(!MissionType::Smile.is_color());
        assert_eq!(MissionType::SkyBlue.as_str(), "sky_blue");
    }
}
