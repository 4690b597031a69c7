//! Smile score bridge
//!
//! Receives per-frame smile probabilities from the native face detector.
//! Scores are noisy frame to frame, so they pass through an exponential
//! smoothing accumulator before being turned into progress.

use crate::config::SmileBridgeConfig;
use crate::engine::EngineHandle;
use crate::types::{signal_to_progress, MissionType, ProgressUpdate};

/// Smooths smile scores and reports them as smile mission progress
pub struct SmileMissionBridge {
    engine: EngineHandle,
    smoothing: f32,
    current_score: f32,
}

impl SmileMissionBridge {
    pub fn new(engine: EngineHandle, config: SmileBridgeConfig) -> Self {
        Self {
            engine,
            smoothing: config.smoothing.clamp(0.0, 1.0),
            current_score: 0.0,
        }
    }

    /// Smoothed score so far
    pub fn current_score(&self) -> f32 {
        self.current_score
    }

    /// Submit a smile score in [0, 1].
    ///
    /// Returns `None` (and leaves the accumulator untouched) unless the live
    /// mission is a smile mission.
    pub fn submit_smile_score(&mut self, score: f32) -> Option<ProgressUpdate> {
        if score.is_nan() {
            return None;
        }

        let threshold = {
            let engine = self.engine.borrow();
            let mission = engine.current()?;
            if mission.mission_type != MissionType::Smile {
                return None;
            }
            mission.threshold
        };

        let score = score.clamp(0.0, 1.0);
        self.current_score += (score - self.current_score) * self.smoothing;

        let progress = signal_to_progress(self.current_score, threshold);
        Some(self.engine.borrow_mut().report_progress(progress))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MissionCatalog;
    use crate::clock::ManualClock;
    use crate::config::EngineConfig;
    use crate::engine::MissionEngine;
    use crate::store::MemoryStore;
    use crate::types::MissionDefinition;
    use chrono::{TimeZone, Utc};

    fn engine_with(mission_type: MissionType, threshold: f32) -> EngineHandle {
        let catalog = MissionCatalog::new(vec![MissionDefinition::new(
            "only",
            mission_type,
            threshold,
            "",
            "",
        )])
        .unwrap();
        let mut engine = MissionEngine::new(
            catalog,
            EngineConfig::default(),
            ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()),
            MemoryStore::new(),
        );
        engine.initialize().unwrap();
        engine.into_handle()
    }

    #[test]
    fn test_scores_are_smoothed() {
        let engine = engine_with(MissionType::Smile, 1.0);
        let mut bridge = SmileMissionBridge::new(engine.clone(), SmileBridgeConfig { smoothing: 0.5 });

        assert_eq!(bridge.submit_smile_score(1.0), Some(ProgressUpdate::Advanced(0.5)));
        assert_eq!(bridge.submit_smile_score(1.0), Some(ProgressUpdate::Advanced(0.75)));
        assert_eq!(bridge.current_score(), 0.75);

        // a drop lowers the smoothed score but never the stored progress
        assert_eq!(bridge.submit_smile_score(0.0), Some(ProgressUpdate::NotAdvanced));
        assert_eq!(bridge.current_score(), 0.375);
        assert_eq!(engine.borrow().state().unwrap().progress, 0.75);
    }

    #[test]
    fn test_threshold_scales_progress() {
        let engine = engine_with(MissionType::Smile, 0.5);
        let mut bridge = SmileMissionBridge::new(engine.clone(), SmileBridgeConfig { smoothing: 1.0 });

        assert_eq!(bridge.submit_smile_score(0.25), Some(ProgressUpdate::Advanced(0.5)));
        assert_eq!(bridge.submit_smile_score(0.9), Some(ProgressUpdate::Completed));
        assert_eq!(bridge.submit_smile_score(1.0), Some(ProgressUpdate::AlreadyCompleted));
    }

    #[test]
    fn test_out_of_range_scores_are_clamped() {
        let engine = engine_with(MissionType::Smile, 1.0);
        let mut bridge = SmileMissionBridge::new(engine, SmileBridgeConfig { smoothing: 1.0 });

        assert_eq!(bridge.submit_smile_score(7.0), Some(ProgressUpdate::Completed));
        assert_eq!(bridge.current_score(), 1.0);
        assert_eq!(bridge.submit_smile_score(f32::NAN), None);
    }

    #[test]
    fn test_ignored_for_color_missions() {
        let engine = engine_with(MissionType::ColorGreen, 0.5);
        let mut bridge = SmileMissionBridge::new(engine.clone(), SmileBridgeConfig::default());

        assert_eq!(bridge.submit_smile_score(1.0), None);
        assert_eq!(bridge.current_score(), 0.0);
        assert_eq!(engine.borrow().state().unwrap().progress, 0.0);
    }
}
