//! Error types for Yousei missions

use thiserror::Error;

/// Errors that can occur while running the mission engine
#[derive(Debug, Error)]
pub enum MissionError {
    #[error("Failed to read persisted state: {0}")]
    PersistenceRead(String),

    #[error("Failed to write persisted state: {0}")]
    PersistenceWrite(String),

    #[error("Mission pool is empty")]
    EmptyCatalog,

    #[error("Malformed mission record: {0}")]
    MalformedRecord(String),

    #[error("Invalid mission catalog: {0}")]
    InvalidCatalog(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid camera frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}
