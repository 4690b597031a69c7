//! Configuration
//!
//! Everything the host can tune, loadable from one JSON document. Every field
//! has a default so `{}` is a valid configuration using the built-in catalog.

use crate::catalog::MissionCatalog;
use crate::codec::STATE_KEY;
use crate::error::MissionError;
use crate::types::MissionDefinition;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for the color bridge throttle
pub const MAX_CHECK_INTERVAL_MS: u64 = 60_000;

/// Engine-level settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Added to the day number before picking the daily mission
    pub seed_offset: i64,
    /// Persistence key for the live mission record
    pub state_key: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed_offset: 0,
            state_key: STATE_KEY.to_string(),
        }
    }
}

/// Pixel classification thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Integer divisor applied to width and height before sampling
    pub downsample_factor: u32,
    /// Accepted circular hue distance from the target (0-1 wheel)
    pub hue_range: f32,
    /// Minimum HSV saturation (0-1)
    pub min_saturation: f32,
    /// Minimum HSV value (0-1)
    pub min_value: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            downsample_factor: 6,
            hue_range: 0.08,
            min_saturation: 0.35,
            min_value: 0.2,
        }
    }
}

/// Color bridge throttling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorBridgeConfig {
    /// Minimum time between two frame evaluations
    pub check_interval_ms: u64,
}

impl Default for ColorBridgeConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 300,
        }
    }
}

impl ColorBridgeConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

/// Smile bridge smoothing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmileBridgeConfig {
    /// Lerp factor applied to each incoming score (0-1)
    pub smoothing: f32,
}

impl Default for SmileBridgeConfig {
    fn default() -> Self {
        Self { smoothing: 0.2 }
    }
}

/// Complete configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    pub seed_offset: i64,
    pub state_key: Option<String>,
    pub classifier: ClassifierConfig,
    pub color: ColorBridgeConfig,
    pub smile: SmileBridgeConfig,
    /// Mission pool; the built-in catalog when omitted
    pub missions: Option<Vec<MissionDefinition>>,
}

impl MissionConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, MissionError> {
        let config: MissionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MissionError> {
        let c = &self.classifier;
        if c.downsample_factor < 1 {
            return Err(MissionError::InvalidConfig(
                "downsample_factor must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("hue_range", c.hue_range),
            ("min_saturation", c.min_saturation),
            ("min_value", c.min_value),
            ("smoothing", self.smile.smoothing),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MissionError::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.color.check_interval_ms > MAX_CHECK_INTERVAL_MS {
            return Err(MissionError::InvalidConfig(format!(
                "check_interval_ms must be at most {}",
                MAX_CHECK_INTERVAL_MS
            )));
        }
        if matches!(&self.state_key, Some(key) if key.trim().is_empty()) {
            return Err(MissionError::InvalidConfig(
                "state_key must not be empty".to_string(),
            ));
        }

        self.catalog().map(|_| ())
    }

    /// Build the mission catalog
    pub fn catalog(&self) -> Result<MissionCatalog, MissionError> {
        match &self.missions {
            Some(missions) => MissionCatalog::new(missions.clone()),
            None => Ok(MissionCatalog::builtin()),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            seed_offset: self.seed_offset,
            state_key: self
                .state_key
                .clone()
                .unwrap_or_else(|| STATE_KEY.to_string()),
        }
    }
}
