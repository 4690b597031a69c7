//! Camera color bridge

use crate::classifier::{ColorClassifier, ColorTarget, FrameSource};
use crate::config::{ClassifierConfig, ColorBridgeConfig};
use crate::engine::EngineHandle;
use crate::types::{signal_to_progress, ProgressUpdate};
use chrono::{DateTime, Duration, Utc};

/// What happened to one camera frame callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// No live mission
    NoMission,
    /// Live mission is not a color mission
    NotColorMission,
    /// Within the check interval of the previous evaluation
    Throttled,
    /// Source had no frame available
    NoFrame,
    /// Frame classified and reported
    Evaluated {
        ratio: f32,
        progress: f32,
        update: ProgressUpdate,
    },
}

/// Feeds throttled camera frames through the color classifier into the engine
pub struct ColorMissionBridge {
    engine: EngineHandle,
    classifier: ColorClassifier,
    check_interval: Duration,
    last_check: Option<DateTime<Utc>>,
}

impl ColorMissionBridge {
    pub fn new(
        engine: EngineHandle,
        classifier: ClassifierConfig,
        config: ColorBridgeConfig,
    ) -> Self {
        Self {
            engine,
            classifier: ColorClassifier::new(classifier),
            check_interval: Duration::from_std(config.check_interval())
                .unwrap_or_else(|_| Duration::zero()),
            last_check: None,
        }
    }

    pub fn classifier(&self) -> &ColorClassifier {
        &self.classifier
    }

    /// Handle a "frame available" callback from the camera.
    ///
    /// The throttle is measured on the engine clock and armed only once a
    /// frame was actually acquired. A clock that steps back before the last
    /// evaluation re-arms it instead of stalling.
    pub fn on_frame(&mut self, source: &mut dyn FrameSource) -> FrameOutcome {
        let (mission_type, threshold, now) = {
            let engine = self.engine.borrow();
            let Some(mission) = engine.current() else {
                return FrameOutcome::NoMission;
            };
            (mission.mission_type, mission.threshold, engine.now())
        };

        let Some(target) = ColorTarget::for_mission(mission_type) else {
            return FrameOutcome::NotColorMission;
        };

        if let Some(last) = self.last_check {
            if now >= last && now - last < self.check_interval {
                tracing::debug!("Color frame throttled, last evaluated at {}", last);
                return FrameOutcome::Throttled;
            }
        }

        let Some(frame) = source.latest_frame() else {
            return FrameOutcome::NoFrame;
        };

        let ratio = self.classifier.match_ratio(&frame, target);
        self.last_check = Some(now);

        let progress = signal_to_progress(ratio, threshold);
        let update = self.engine.borrow_mut().report_progress(progress);
        tracing::debug!(
            "Color frame {}x{}: ratio {:.3}, progress {:.3}",
            frame.width(),
            frame.height(),
            ratio,
            progress
        );

        FrameOutcome::Evaluated {
            ratio,
            progress,
            update,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MissionCatalog;
    use crate::classifier::RgbaFrame;
    use crate::clock::ManualClock;
    use crate::config::EngineConfig;
    use crate::engine::MissionEngine;
    use crate::store::MemoryStore;
    use crate::types::{MissionDefinition, MissionType};
    use chrono::TimeZone;

    struct EmptySource;

    impl FrameSource for EmptySource {
        fn latest_frame(&mut self) -> Option<RgbaFrame<'_>> {
            None
        }
    }

    fn engine_with(mission_type: MissionType, clock: &ManualClock) -> EngineHandle {
        let catalog = MissionCatalog::new(vec![MissionDefinition::new(
            "only",
            mission_type,
            0.5,
            "",
            "",
        )])
        .unwrap();
        let mut engine = MissionEngine::new(
            catalog,
            EngineConfig::default(),
            clock.clone(),
            MemoryStore::new(),
        );
        engine.initialize().unwrap();
        engine.into_handle()
    }

    fn bridge(engine: &EngineHandle) -> ColorMissionBridge {
        ColorMissionBridge::new(
            engine.clone(),
            ClassifierConfig {
                downsample_factor: 1,
                ..ClassifierConfig::default()
            },
            ColorBridgeConfig::default(),
        )
    }

    /// 2x2 frame with `green` of the four pixels green, the rest black
    fn frame_bytes(green: usize) -> Vec<u8> {
        (0..4)
            .flat_map(|i| {
                if i < green {
                    [0u8, 255, 0, 255]
                } else {
                    [0u8, 0, 0, 255]
                }
            })
            .collect()
    }

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap())
    }

    #[test]
    fn test_frame_reports_scaled_progress() {
        let clock = clock();
        let engine = engine_with(MissionType::ColorGreen, &clock);
        let mut bridge = bridge(&engine);

        let data = frame_bytes(1);
        let mut frame = RgbaFrame::new(&data, 2, 2).unwrap();

        // ratio 0.25 against threshold 0.5
        assert_eq!(
            bridge.on_frame(&mut frame),
            FrameOutcome::Evaluated {
                ratio: 0.25,
                progress: 0.5,
                update: ProgressUpdate::Advanced(0.5),
            }
        );
        assert_eq!(engine.borrow().state().unwrap().progress, 0.5);
    }

    #[test]
    fn test_throttles_between_checks() {
        let clock = clock();
        let engine = engine_with(MissionType::ColorGreen, &clock);
        let mut bridge = bridge(&engine);

        let data = frame_bytes(1);
        let mut frame = RgbaFrame::new(&data, 2, 2).unwrap();
        assert!(matches!(bridge.on_frame(&mut frame), FrameOutcome::Evaluated { .. }));

        clock.advance(Duration::milliseconds(299));
        let full = frame_bytes(4);
        let mut full_frame = RgbaFrame::new(&full, 2, 2).unwrap();
        assert_eq!(bridge.on_frame(&mut full_frame), FrameOutcome::Throttled);
        assert_eq!(engine.borrow().state().unwrap().progress, 0.5);

        clock.advance(Duration::milliseconds(1));
        assert_eq!(
            bridge.on_frame(&mut full_frame),
            FrameOutcome::Evaluated {
                ratio: 1.0,
                progress: 1.0,
                update: ProgressUpdate::Completed,
            }
        );
    }

    #[test]
    fn test_missing_frame_does_not_arm_throttle() {
        let clock = clock();
        let engine = engine_with(MissionType::SkyBlue, &clock);
        let mut bridge = bridge(&engine);

        assert_eq!(bridge.on_frame(&mut EmptySource), FrameOutcome::NoFrame);

        let data = frame_bytes(0);
        let mut frame = RgbaFrame::new(&data, 2, 2).unwrap();
        assert!(matches!(bridge.on_frame(&mut frame), FrameOutcome::Evaluated { .. }));
    }

    #[test]
    fn test_ignores_smile_missions() {
        let clock = clock();
        let engine = engine_with(MissionType::Smile, &clock);
        let mut bridge = bridge(&engine);

        let data = frame_bytes(4);
        let mut frame = RgbaFrame::new(&data, 2, 2).unwrap();
        assert_eq!(bridge.on_frame(&mut frame), FrameOutcome::NotColorMission);
        assert_eq!(engine.borrow().state().unwrap().progress, 0.0);
    }

    #[test]
    fn test_no_mission() {
        let engine = MissionEngine::new(
            MissionCatalog::default(),
            EngineConfig::default(),
            clock(),
            MemoryStore::new(),
        )
        .into_handle();
        let mut bridge = bridge(&engine);

        let data = frame_bytes(4);
        let mut frame = RgbaFrame::new(&data, 2, 2).unwrap();
        assert_eq!(bridge.on_frame(&mut frame), FrameOutcome::NoMission);
    }

    #[test]
    fn test_lower_coverage_keeps_best_progress() {
        let clock = clock();
        let engine = engine_with(MissionType::ColorGreen, &clock);
        let mut bridge = bridge(&engine);

        let good = frame_bytes(1);
        let mut good_frame = RgbaFrame::new(&good, 2, 2).unwrap();
        bridge.on_frame(&mut good_frame);

        clock.advance(Duration::seconds(1));
        let poor = frame_bytes(0);
        let mut poor_frame = RgbaFrame::new(&poor, 2, 2).unwrap();
        assert!(matches!(
            bridge.on_frame(&mut poor_frame),
            FrameOutcome::Evaluated {
                update: ProgressUpdate::NotAdvanced,
                ..
            }
        ));
        assert_eq!(engine.borrow().state().unwrap().progress, 0.5);
    }

    #[test]
    fn test_clock_stepping_back_does_not_stall() {
        let clock = clock();
        let engine = engine_with(MissionType::ColorGreen, &clock);
        let mut bridge = bridge(&engine);

        let none = frame_bytes(0);
        let mut dark = RgbaFrame::new(&none, 2, 2).unwrap();
        assert!(matches!(bridge.on_frame(&mut dark), FrameOutcome::Evaluated { .. }));

        clock.advance(Duration::hours(-2));
        let data = frame_bytes(1);
        let mut frame = RgbaFrame::new(&data, 2, 2).unwrap();
        assert!(matches!(
            bridge.on_frame(&mut frame),
            FrameOutcome::Evaluated {
                update: ProgressUpdate::Advanced(_),
                ..
            }
        ));

        // throttled again relative to the new evaluation
        clock.advance(Duration::milliseconds(100));
        assert_eq!(bridge.on_frame(&mut frame), FrameOutcome::Throttled);
    }
}
