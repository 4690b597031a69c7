//! Mission engine
//!
//! The daily mission state machine:
//!
//! ```text
//! Uninitialized -> InProgress -> Completed
//!        ^______________|____________|   (expiry, absent id, reassignment)
//! ```
//!
//! The engine owns the live [`MissionState`], persists it through the injected
//! [`KeyValueStore`] on every change and notifies subscribers synchronously.
//! It is single-threaded: hosts with several signal producers must serialize
//! their calls, and subscribers must not call back into the engine.

use crate::catalog::MissionCatalog;
use crate::clock::{next_utc_midnight, Clock};
use crate::codec;
use crate::config::EngineConfig;
use crate::error::MissionError;
use crate::notify::{Observers, SubscriptionId, SubscriptionIds};
use crate::store::KeyValueStore;
use crate::types::{MissionDefinition, MissionPhase, MissionState, ProgressUpdate};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle given to bridges
pub type EngineHandle = Rc<RefCell<MissionEngine>>;

/// Live mission: the definition it was assigned from plus its state
#[derive(Debug, Clone)]
struct ActiveMission {
    definition: MissionDefinition,
    state: MissionState,
}

/// Serializable view of the engine for hosts and tooling
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub phase: MissionPhase,
    pub mission: Option<MissionDefinition>,
    pub expires_at: Option<DateTime<Utc>>,
    pub progress: f32,
    pub completed: bool,
}

/// Daily mission state machine
pub struct MissionEngine {
    catalog: MissionCatalog,
    config: EngineConfig,
    clock: Box<dyn Clock>,
    store: Box<dyn KeyValueStore>,
    active: Option<ActiveMission>,
    subscription_ids: SubscriptionIds,
    mission_changed: Observers<MissionDefinition>,
    progress: Observers<f32>,
    completed: Observers<MissionDefinition>,
}

impl MissionEngine {
    /// Create an uninitialized engine. Call [`MissionEngine::initialize`]
    /// after registering subscribers.
    pub fn new(
        catalog: MissionCatalog,
        config: EngineConfig,
        clock: impl Clock + 'static,
        store: impl KeyValueStore + 'static,
    ) -> Self {
        Self {
            catalog,
            config,
            clock: Box::new(clock),
            store: Box::new(store),
            active: None,
            subscription_ids: SubscriptionIds::default(),
            mission_changed: Observers::new("mission_changed"),
            progress: Observers::new("progress"),
            completed: Observers::new("completed"),
        }
    }

    /// Wrap the engine in a shared handle for bridges
    pub fn into_handle(self) -> EngineHandle {
        Rc::new(RefCell::new(self))
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    pub fn on_mission_changed(
        &mut self,
        callback: impl FnMut(&MissionDefinition) + 'static,
    ) -> SubscriptionId {
        let id = self.subscription_ids.next_id();
        self.mission_changed.subscribe(id, Box::new(callback));
        id
    }

    pub fn on_progress(&mut self, callback: impl FnMut(&f32) + 'static) -> SubscriptionId {
        let id = self.subscription_ids.next_id();
        self.progress.subscribe(id, Box::new(callback));
        id
    }

    pub fn on_completed(
        &mut self,
        callback: impl FnMut(&MissionDefinition) + 'static,
    ) -> SubscriptionId {
        let id = self.subscription_ids.next_id();
        self.completed.subscribe(id, Box::new(callback));
        id
    }

    /// Remove a subscription from whichever list holds it
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.mission_changed.unsubscribe(id)
            || self.progress.unsubscribe(id)
            || self.completed.unsubscribe(id)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Restore the persisted mission or assign today's.
    ///
    /// A persisted state is adopted only if it decodes, has not expired and
    /// still names a catalog entry. Adoption replays change, progress and
    /// (when completed) completion notifications.
    pub fn initialize(&mut self) -> Result<&MissionDefinition, MissionError> {
        let now = self.clock.now();

        let restored = match self.load_state() {
            Some(state) if state.is_expired(now) => {
                tracing::info!(
                    "Persisted mission {} expired at {}, assigning a new one",
                    state.id,
                    state.expires_at
                );
                None
            }
            Some(state) => match self.catalog.find(&state.id) {
                Some(definition) => Some(ActiveMission {
                    definition: definition.clone(),
                    state,
                }),
                None => {
                    tracing::warn!(
                        "Persisted mission {} is not in the catalog, assigning a new one",
                        state.id
                    );
                    None
                }
            },
            None => None,
        };

        let Some(active) = restored else {
            return self.assign_new_mission();
        };

        tracing::info!(
            "Restored mission {} (progress {:.2}, completed {})",
            active.state.id,
            active.state.progress,
            active.state.completed
        );
        let completed = active.state.completed;
        let progress = active.state.progress;
        self.active = Some(active);

        self.notify_mission_changed();
        self.progress.fire(&progress);
        if completed {
            self.notify_completed();
        }

        self.live_definition()
    }

    /// Assign the mission for the current UTC day and persist it.
    ///
    /// Fails with [`MissionError::EmptyCatalog`] when there is nothing to pick,
    /// leaving the engine without a mission.
    pub fn assign_new_mission(&mut self) -> Result<&MissionDefinition, MissionError> {
        let now = self.clock.now();

        let Some(definition) = self
            .catalog
            .mission_for_day(now, self.config.seed_offset)
            .cloned()
        else {
            tracing::warn!("Mission pool is empty.");
            self.active = None;
            return Err(MissionError::EmptyCatalog);
        };

        let state = MissionState::fresh(definition.id.clone(), next_utc_midnight(now));
        tracing::info!(
            "Assigned mission {} ({}), expires at {}",
            definition.id,
            definition.mission_type.as_str(),
            state.expires_at
        );
        self.active = Some(ActiveMission { definition, state });

        self.persist();
        self.notify_mission_changed();
        self.progress.fire(&0.0);

        self.live_definition()
    }

    /// Rotate to the new day's mission if the live one has expired.
    ///
    /// Returns whether a rotation happened. Does nothing before the engine was
    /// initialized.
    pub fn refresh(&mut self) -> Result<bool, MissionError> {
        let now = self.clock.now();
        let expired_id = match &self.active {
            Some(active) if active.state.is_expired(now) => active.state.id.clone(),
            _ => return Ok(false),
        };

        tracing::info!("Mission {} expired, rotating", expired_id);
        self.assign_new_mission()?;
        Ok(true)
    }

    /// Swap the mission pool.
    ///
    /// The live mission survives if its id is still present (rebinding to the
    /// new definition); otherwise a new mission is assigned.
    pub fn replace_catalog(&mut self, catalog: MissionCatalog) -> Result<(), MissionError> {
        self.catalog = catalog;

        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };

        match self.catalog.find(&active.state.id).cloned() {
            Some(definition) => {
                if definition != active.definition {
                    active.definition = definition;
                    self.notify_mission_changed();
                }
                Ok(())
            }
            None => {
                tracing::info!(
                    "Mission {} removed from the catalog, reassigning",
                    active.state.id
                );
                self.assign_new_mission().map(|_| ())
            }
        }
    }

    // ------------------------------------------------------------------
    // Progress
    // ------------------------------------------------------------------

    /// Report normalized progress for the live mission.
    ///
    /// The value is clamped to [0, 1] and accepted only if strictly greater
    /// than the stored progress. Reaching 1.0 completes the mission once;
    /// afterwards every report is ignored.
    pub fn report_progress(&mut self, normalized: f32) -> ProgressUpdate {
        let Some(active) = self.active.as_mut() else {
            return ProgressUpdate::NoMission;
        };
        if active.state.completed {
            return ProgressUpdate::AlreadyCompleted;
        }
        if normalized.is_nan() {
            return ProgressUpdate::NotAdvanced;
        }

        let clamped = normalized.clamp(0.0, 1.0);
        if clamped <= active.state.progress {
            return ProgressUpdate::NotAdvanced;
        }

        active.state.progress = clamped;
        // progress and completion land in the same write
        let completes = clamped >= 1.0;
        if completes {
            active.state.completed = true;
            tracing::info!(
                "Mission {} completed, reward {}",
                active.definition.id,
                active.definition.reward_id
            );
        } else {
            tracing::debug!("Mission {} progress {:.3}", active.state.id, clamped);
        }

        self.persist();
        self.progress.fire(&clamped);

        if completes {
            self.notify_completed();
            return ProgressUpdate::Completed;
        }

        ProgressUpdate::Advanced(clamped)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Definition of the live mission
    pub fn current(&self) -> Option<&MissionDefinition> {
        self.active.as_ref().map(|a| &a.definition)
    }

    /// State of the live mission
    pub fn state(&self) -> Option<&MissionState> {
        self.active.as_ref().map(|a| &a.state)
    }

    pub fn phase(&self) -> MissionPhase {
        match &self.active {
            None => MissionPhase::Uninitialized,
            Some(active) if active.state.completed => MissionPhase::Completed,
            Some(_) => MissionPhase::InProgress,
        }
    }

    pub fn catalog(&self) -> &MissionCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current time on the injected clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            phase: self.phase(),
            mission: self.current().cloned(),
            expires_at: self.state().map(|s| s.expires_at),
            progress: self.state().map_or(0.0, |s| s.progress),
            completed: self.state().is_some_and(|s| s.completed),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn live_definition(&self) -> Result<&MissionDefinition, MissionError> {
        self.current().ok_or(MissionError::EmptyCatalog)
    }

    fn load_state(&self) -> Option<MissionState> {
        let raw = match self.store.read(&self.config.state_key) {
            Ok(Some(raw)) if !raw.trim().is_empty() => raw,
            Ok(_) => return None,
            Err(e) => {
                tracing::warn!("Mission state load failed: {}", e);
                return None;
            }
        };

        match codec::decode_state(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!("Mission state load failed: {}", e);
                None
            }
        }
    }

    /// Attempt-once save; failures leave the in-memory state authoritative
    fn persist(&mut self) {
        let Some(active) = &self.active else {
            return;
        };

        let result = codec::encode_state(&active.state)
            .and_then(|json| self.store.write(&self.config.state_key, &json));

        if let Err(e) = result {
            tracing::error!("Mission state save failed: {}", e);
        }
    }

    fn notify_mission_changed(&mut self) {
        if let Some(active) = &self.active {
            self.mission_changed.fire(&active.definition);
        }
    }

    fn notify_completed(&mut self) {
        if let Some(active) = &self.active {
            self.completed.fire(&active.definition);
        }
    }
}
