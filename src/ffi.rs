//! FFI bindings for Yousei Missions
//!
//! This module provides C-compatible functions for driving a mission engine
//! from the native app shell. All strings are null-terminated; strings
//! returned by this module must be freed with `yousei_free_string`.
//!
//! The engine is single-threaded. A handle must only be used from the thread
//! that created it, and the event callback must not call back into the engine.

use std::cell::RefCell;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::slice;

use serde::Serialize;

use crate::bridges::{ColorMissionBridge, FrameOutcome, SmileMissionBridge};
use crate::classifier::RgbaFrame;
use crate::clock::SystemClock;
use crate::config::MissionConfig;
use crate::engine::{EngineHandle, MissionEngine};
use crate::error::MissionError;
use crate::notify::SubscriptionId;
use crate::store::{JsonFileStore, KeyValueStore, MemoryStore};
use crate::types::{MissionDefinition, ProgressUpdate};

/// No mission is live
pub const YOUSEI_NO_MISSION: i32 = 0;
/// The live mission was already completed
pub const YOUSEI_ALREADY_COMPLETED: i32 = 1;
/// The report did not exceed stored progress
pub const YOUSEI_NOT_ADVANCED: i32 = 2;
/// Progress moved forward
pub const YOUSEI_ADVANCED: i32 = 3;
/// Progress reached 1.0 and the mission completed
pub const YOUSEI_COMPLETED: i32 = 4;
/// The signal does not apply to the live mission type
pub const YOUSEI_IGNORED: i32 = 5;
/// Frame dropped by the color check interval
pub const YOUSEI_THROTTLED: i32 = 6;

/// Receives one JSON event per engine notification
pub type YouseiEventCallback = extern "C" fn(event_json: *const c_char, user_data: *mut c_void);

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn progress_code(update: ProgressUpdate) -> i32 {
    match update {
        ProgressUpdate::NoMission => YOUSEI_NO_MISSION,
        ProgressUpdate::AlreadyCompleted => YOUSEI_ALREADY_COMPLETED,
        ProgressUpdate::NotAdvanced => YOUSEI_NOT_ADVANCED,
        ProgressUpdate::Advanced(_) => YOUSEI_ADVANCED,
        ProgressUpdate::Completed => YOUSEI_COMPLETED,
    }
}

/// Event payload handed to the C callback
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum EngineEvent<'a> {
    MissionChanged { mission: &'a MissionDefinition },
    Progress { progress: f32 },
    Completed { mission: &'a MissionDefinition },
}

fn emit(callback: YouseiEventCallback, user_data: *mut c_void, event: &EngineEvent<'_>) {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Event serialization failed: {}", e);
            return;
        }
    };
    if let Ok(cstr) = CString::new(json) {
        callback(cstr.as_ptr(), user_data);
    }
}

// ============================================================================
// Engine API
// ============================================================================

/// Opaque handle to a mission engine and its signal bridges
pub struct YouseiEngineHandle {
    engine: EngineHandle,
    color: ColorMissionBridge,
    smile: SmileMissionBridge,
    subscriptions: Vec<SubscriptionId>,
}

fn build_engine(
    config_json: Option<String>,
    state_path: Option<String>,
) -> Result<YouseiEngineHandle, MissionError> {
    let config = match config_json {
        Some(json) => MissionConfig::from_json(&json)?,
        None => MissionConfig::default(),
    };

    let store: Box<dyn KeyValueStore> = match state_path {
        Some(path) => Box::new(JsonFileStore::new(path)),
        None => Box::new(MemoryStore::new()),
    };

    let engine = MissionEngine::new(
        config.catalog()?,
        config.engine_config(),
        SystemClock,
        store,
    )
    .into_handle();

    Ok(YouseiEngineHandle {
        color: ColorMissionBridge::new(engine.clone(), config.classifier, config.color),
        smile: SmileMissionBridge::new(engine.clone(), config.smile),
        engine,
        subscriptions: Vec::new(),
    })
}

/// Create a new engine.
///
/// # Safety
/// - `config_json` may be NULL (defaults with the built-in catalog) or a valid
///   null-terminated JSON configuration.
/// - `state_path` may be NULL (state kept in memory only) or a valid
///   null-terminated path to the JSON state file.
/// - Returns a pointer that must be freed with `yousei_engine_free`.
/// - Returns NULL on error; call `yousei_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn yousei_engine_new(
    config_json: *const c_char,
    state_path: *const c_char,
) -> *mut YouseiEngineHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        None
    } else {
        match cstr_to_string(config_json) {
            Some(s) => Some(s),
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        }
    };

    let path = if state_path.is_null() {
        None
    } else {
        match cstr_to_string(state_path) {
            Some(s) => Some(s),
            None => {
                set_last_error("Invalid state path string pointer");
                return ptr::null_mut();
            }
        }
    };

    match build_engine(config, path) {
        Ok(handle) => Box::into_raw(Box::new(handle)),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `yousei_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn yousei_engine_free(engine: *mut YouseiEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Register the event callback, replacing any previous one. Pass NULL to
/// stop receiving events.
///
/// Register before `yousei_engine_initialize` to observe the first
/// assignment or the replayed saved state.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `yousei_engine_new`.
/// - `user_data` is passed back untouched and must stay valid while the
///   callback is registered.
/// - The JSON pointer handed to the callback is only valid during the call.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn yousei_engine_set_event_callback(
    engine: *mut YouseiEngineHandle,
    callback: Option<YouseiEventCallback>,
    user_data: *mut c_void,
) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    let handle = &mut *engine;
    let mut inner = handle.engine.borrow_mut();

    for id in handle.subscriptions.drain(..) {
        inner.unsubscribe(id);
    }

    if let Some(callback) = callback {
        handle.subscriptions = vec![
            inner.on_mission_changed(move |mission| {
                emit(callback, user_data, &EngineEvent::MissionChanged { mission })
            }),
            inner.on_progress(move |progress| {
                emit(
                    callback,
                    user_data,
                    &EngineEvent::Progress {
                        progress: *progress,
                    },
                )
            }),
            inner.on_completed(move |mission| {
                emit(callback, user_data, &EngineEvent::Completed { mission })
            }),
        ];
    }

    0
}

/// Restore the saved mission or assign today's.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `yousei_engine_new`.
/// - Returns 0 on success, -1 on error (e.g. empty mission catalog).
#[no_mangle]
pub unsafe extern "C" fn yousei_engine_initialize(engine: *mut YouseiEngineHandle) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    let handle = &mut *engine;
    let result = handle.engine.borrow_mut().initialize().map(|_| ());

    match result {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Rotate to a new mission if the live one expired.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `yousei_engine_new`.
/// - Returns 1 if a new mission was assigned, 0 if nothing changed, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn yousei_engine_refresh(engine: *mut YouseiEngineHandle) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    let handle = &mut *engine;
    let result = handle.engine.borrow_mut().refresh();

    match result {
        Ok(rotated) => i32::from(rotated),
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Report normalized progress (0-1) for the live mission.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `yousei_engine_new`.
/// - Returns one of the `YOUSEI_*` progress codes, or -1 on error.
#[no_mangle]
pub unsafe extern "C" fn yousei_engine_report_progress(
    engine: *mut YouseiEngineHandle,
    progress: f32,
) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    let handle = &mut *engine;
    let update = handle.engine.borrow_mut().report_progress(progress);
    progress_code(update)
}

/// Submit a face smile score (0-1).
///
/// # Safety
/// - `engine` must be a valid pointer returned by `yousei_engine_new`.
/// - Returns a `YOUSEI_*` progress code, `YOUSEI_IGNORED` when the live
///   mission is not a smile mission, or -1 on error.
#[no_mangle]
pub unsafe extern "C" fn yousei_engine_submit_smile_score(
    engine: *mut YouseiEngineHandle,
    score: f32,
) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    let handle = &mut *engine;
    match handle.smile.submit_smile_score(score) {
        Some(update) => progress_code(update),
        None if handle.engine.borrow().current().is_none() => YOUSEI_NO_MISSION,
        None => YOUSEI_IGNORED,
    }
}

/// Evaluate one RGBA camera frame for the live color mission.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `yousei_engine_new`.
/// - `data` must point to `len` readable bytes laid out as row-major RGBA8.
/// - Returns a `YOUSEI_*` progress code, `YOUSEI_IGNORED` for non-color
///   missions, `YOUSEI_THROTTLED` inside the check interval, or -1 on error.
#[no_mangle]
pub unsafe extern "C" fn yousei_engine_evaluate_frame(
    engine: *mut YouseiEngineHandle,
    data: *const u8,
    len: usize,
    width: u32,
    height: u32,
) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }
    if data.is_null() {
        set_last_error("Null frame data pointer");
        return -1;
    }

    let handle = &mut *engine;
    let bytes = slice::from_raw_parts(data, len);

    let mut frame = match RgbaFrame::new(bytes, width, height) {
        Ok(frame) => frame,
        Err(e) => {
            set_last_error(&e.to_string());
            return -1;
        }
    };

    match handle.color.on_frame(&mut frame) {
        FrameOutcome::Evaluated { update, .. } => progress_code(update),
        FrameOutcome::NoMission => YOUSEI_NO_MISSION,
        FrameOutcome::Throttled => YOUSEI_THROTTLED,
        FrameOutcome::NotColorMission | FrameOutcome::NoFrame => YOUSEI_IGNORED,
    }
}

/// Get the engine state as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `yousei_engine_new`.
/// - Returns a newly allocated string that must be freed with `yousei_free_string`.
/// - Returns NULL on error; call `yousei_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn yousei_engine_state_json(
    engine: *const YouseiEngineHandle,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &*engine;
    let snapshot = handle.engine.borrow().snapshot();

    match serde_json::to_string(&snapshot) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Yousei functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Yousei function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn yousei_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Yousei function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn yousei_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn yousei_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
