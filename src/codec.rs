//! Persisted mission record
//!
//! The live [`MissionState`] is stored as a small JSON object:
//!
//! ```json
//! {"id":"m_color_green","expiresAtTicks":638409600000000000,"progress":0.5,"completed":false}
//! ```
//!
//! A record is normalized on decode so that full progress and the completed
//! flag always agree.
//!
//! `expiresAtTicks` counts 100 ns ticks since 0001-01-01T00:00:00Z on the
//! proleptic Gregorian calendar, so records written by the host app's own
//! serializer stay readable.

use crate::error::MissionError;
use crate::types::MissionState;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Well-known persistence key for the live mission
pub const STATE_KEY: &str = "FAIRY_MISSION_STATE";

/// Ticks at 1970-01-01T00:00:00Z
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: i64 = 100;

/// Wire form of [`MissionState`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRecord {
    pub id: String,
    pub expires_at_ticks: i64,
    pub progress: f32,
    pub completed: bool,
}

impl PersistedRecord {
    pub fn from_state(state: &MissionState) -> Result<Self, MissionError> {
        Ok(Self {
            id: state.id.clone(),
            expires_at_ticks: to_ticks(state.expires_at)?,
            progress: state.progress,
            completed: state.completed,
        })
    }

    pub fn into_state(self) -> Result<MissionState, MissionError> {
        if self.id.is_empty() {
            return Err(MissionError::MalformedRecord("empty mission id".to_string()));
        }
        if !(0.0..=1.0).contains(&self.progress) {
            return Err(MissionError::MalformedRecord(format!(
                "progress {} outside [0, 1]",
                self.progress
            )));
        }

        let completed = self.completed || self.progress >= 1.0;
        if completed != self.completed || (completed && self.progress < 1.0) {
            tracing::warn!(
                "Mission record {} has progress {} with completed {}, restoring as completed",
                self.id,
                self.progress,
                self.completed
            );
        }

        Ok(MissionState {
            id: self.id,
            expires_at: from_ticks(self.expires_at_ticks)?,
            progress: if completed { 1.0 } else { self.progress },
            completed,
        })
    }
}

/// Serialize a mission state to its persisted JSON form
pub fn encode_state(state: &MissionState) -> Result<String, MissionError> {
    let record = PersistedRecord::from_state(state)?;
    Ok(serde_json::to_string(&record)?)
}

/// Parse a persisted JSON record back into a mission state
pub fn decode_state(json: &str) -> Result<MissionState, MissionError> {
    let record: PersistedRecord = serde_json::from_str(json)
        .map_err(|e| MissionError::MalformedRecord(e.to_string()))?;
    record.into_state()
}

/// Convert a UTC instant to 100 ns ticks since 0001-01-01
pub fn to_ticks(at: DateTime<Utc>) -> Result<i64, MissionError> {
    let sub_ticks = i64::from(at.timestamp_subsec_nanos()) / NANOS_PER_TICK;
    at.timestamp()
        .checked_mul(TICKS_PER_SECOND)
        .and_then(|t| t.checked_add(sub_ticks))
        .and_then(|t| t.checked_add(UNIX_EPOCH_TICKS))
        .ok_or_else(|| MissionError::MalformedRecord(format!("{} is out of tick range", at)))
}

/// Convert 100 ns ticks since 0001-01-01 to a UTC instant
pub fn from_ticks(ticks: i64) -> Result<DateTime<Utc>, MissionError> {
    let since_unix = ticks
        .checked_sub(UNIX_EPOCH_TICKS)
        .ok_or_else(|| MissionError::MalformedRecord(format!("ticks {} underflow", ticks)))?;
    let secs = since_unix.div_euclid(TICKS_PER_SECOND);
    let nanos = (since_unix.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK) as u32;

    Utc.timestamp_opt(secs, nanos)
        .single()
        .ok_or_else(|| MissionError::MalformedRecord(format!("ticks {} out of range", ticks)))
}
