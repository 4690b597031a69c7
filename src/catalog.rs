//! Mission catalog
//!
//! The static pool of mission definitions and the deterministic daily
//! rotation over it.

use crate::clock::days_since_epoch;
use crate::error::MissionError;
use crate::types::{MissionDefinition, MissionType};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Validated, immutable pool of missions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissionCatalog {
    missions: Vec<MissionDefinition>,
}

impl MissionCatalog {
    /// Build a catalog, rejecting duplicate/empty ids and thresholds outside (0, 1]
    pub fn new(missions: Vec<MissionDefinition>) -> Result<Self, MissionError> {
        let mut seen = HashSet::new();
        for mission in &missions {
            if mission.id.trim().is_empty() {
                return Err(MissionError::InvalidCatalog(
                    "mission id must not be empty".to_string(),
                ));
            }
            if !seen.insert(mission.id.as_str()) {
                return Err(MissionError::InvalidCatalog(format!(
                    "duplicate mission id '{}'",
                    mission.id
                )));
            }
            if !(mission.threshold > 0.0 && mission.threshold <= 1.0) {
                return Err(MissionError::InvalidCatalog(format!(
                    "mission '{}' threshold {} outside (0, 1]",
                    mission.id, mission.threshold
                )));
            }
        }

        Ok(Self { missions })
    }

    /// Parse a JSON array of mission definitions
    pub fn from_json(json: &str) -> Result<Self, MissionError> {
        let missions: Vec<MissionDefinition> = serde_json::from_str(json)?;
        Self::new(missions)
    }

    /// The pool shipped with the app
    pub fn builtin() -> Self {
        Self {
            missions: vec![
                MissionDefinition::new(
                    "m_color_green",
                    MissionType::ColorGreen,
                    0.15,
                    "Find something green and show it to the fairy",
                    "reward_leaf",
                ),
                MissionDefinition::new(
                    "m_color_sky",
                    MissionType::SkyBlue,
                    0.15,
                    "Look up and show the fairy the blue sky",
                    "reward_cloud",
                ),
                MissionDefinition::new(
                    "m_smile",
                    MissionType::Smile,
                    0.7,
                    "Give the fairy your biggest smile",
                    "reward_sparkle",
                ),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.missions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MissionDefinition> {
        self.missions.iter()
    }

    pub fn get(&self, index: usize) -> Option<&MissionDefinition> {
        self.missions.get(index)
    }

    pub fn find(&self, id: &str) -> Option<&MissionDefinition> {
        self.missions.iter().find(|m| m.id == id)
    }

    /// Index of the mission for the UTC day containing `now`.
    ///
    /// `|days_since_epoch + seed_offset| mod len`, so every instance picks the
    /// same entry for the whole day. `None` for an empty catalog.
    pub fn daily_index(&self, now: DateTime<Utc>, seed_offset: i64) -> Option<usize> {
        if self.missions.is_empty() {
            return None;
        }
        let day = days_since_epoch(now).wrapping_add(seed_offset);
        Some((day.unsigned_abs() % self.missions.len() as u64) as usize)
    }

    /// Mission for the UTC day containing `now`
    pub fn mission_for_day(&self, now: DateTime<Utc>, seed_offset: i64) -> Option<&MissionDefinition> {
        self.daily_index(now, seed_offset)
            .and_then(|index| self.missions.get(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn def(id: &str, threshold: f32) -> MissionDefinition {
        MissionDefinition::new(id, MissionType::ColorGreen, threshold, "", "")
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let result = MissionCatalog::new(vec![def("a", 0.2), def("a", 0.3)]);
        assert!(matches!(result, Err(MissionError::InvalidCatalog(_))));
    }

    #[test]
    fn test_rejects_bad_thresholds() {
        for threshold in [0.0, -0.1, 1.5, f32::NAN] {
            let result = MissionCatalog::new(vec![def("a", threshold)]);
            assert!(
                matches!(result, Err(MissionError::InvalidCatalog(_))),
                "threshold {} accepted",
                threshold
            );
        }
        assert!(MissionCatalog::new(vec![def("a", 1.0)]).is_ok());
    }

    #[test]
    fn test_from_json() {
        let catalog = MissionCatalog::from_json(
            r#"[
                {"id": "m_color_green", "type": "color_green", "threshold": 0.15, "description": "green", "reward_id": "leaf"},
                {"id": "m_smile", "type": "smile", "threshold": 0.7}
            ]"#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.find("m_smile").unwrap().mission_type, MissionType::Smile);
        assert!(catalog.find("m_color_sky").is_none());
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let builtin = MissionCatalog::builtin();
        let rebuilt = MissionCatalog::new(builtin.iter().cloned().collect()).unwrap();
        assert_eq!(rebuilt, builtin);
    }

    #[test]
    fn test_daily_index_stable_for_whole_day() {
        let catalog = MissionCatalog::builtin();
        let midnight = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let late = midnight + Duration::hours(23) + Duration::minutes(59);

        assert_eq!(catalog.daily_index(midnight, 0), Some(0));
        assert_eq!(catalog.daily_index(late, 0), Some(0));
        assert_eq!(catalog.daily_index(midnight + Duration::days(1), 0), Some(1));
        assert_eq!(catalog.daily_index(midnight + Duration::days(2), 0), Some(2));
        assert_eq!(catalog.daily_index(midnight + Duration::days(3), 0), Some(0));
    }

    #[test]
    fn test_daily_index_seed_offset() {
        let catalog = MissionCatalog::builtin();
        let day = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(catalog.daily_index(day, 1), Some(1));
        assert_eq!(catalog.mission_for_day(day, 2).unwrap().id, "m_smile");
        // |19737 - 19739| = 2
        assert_eq!(catalog.daily_index(day, -19739), Some(2));
    }

    #[test]
    fn test_daily_index_empty_catalog() {
        let catalog = MissionCatalog::default();
        assert_eq!(catalog.daily_index(Utc::now(), 0), None);
        assert!(catalog.mission_for_day(Utc::now(), 0).is_none());
    }
}
