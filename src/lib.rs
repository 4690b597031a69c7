//! Yousei Missions - Daily mission engine for the Yousei AR fairy app
//!
//! Each UTC day the player gets one mission drawn deterministically from a
//! catalog. Camera frames and face smile scores are turned into monotonic
//! progress; the live mission state survives restarts through a key-value
//! store.
//!
//! ## Modules
//!
//! - **Engine**: Daily assignment, progress tracking, completion and persistence
//! - **Classifier**: HSV hue-coverage measurement over RGBA frames
//! - **Bridges**: Camera and smile signal adapters feeding the engine

pub mod bridges;
pub mod catalog;
pub mod classifier;
pub mod clock;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod store;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use bridges::{ColorMissionBridge, FrameOutcome, SmileMissionBridge};
pub use catalog::MissionCatalog;
pub use classifier::{ColorClassifier, ColorTarget, FrameSource, RgbaFrame};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MissionConfig;
pub use engine::{EngineHandle, MissionEngine};
pub use error::MissionError;
pub use notify::SubscriptionId;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use types::{
    MissionDefinition, MissionPhase, MissionState, MissionType, ProgressUpdate,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
