//! Signal bridges
//!
//! Bridges translate an external signal into progress reports on a shared
//! [`EngineHandle`](crate::engine::EngineHandle): camera frames for color
//! missions and face smile scores for smile missions. Each bridge ignores
//! signals while the live mission is of another type.

mod color;
mod smile;

pub use color::{ColorMissionBridge, FrameOutcome};
pub use smile::SmileMissionBridge;
