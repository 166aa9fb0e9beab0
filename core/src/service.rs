use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::connectivity::ConnectivityWatcher;
use crate::metrics::HealthTargets;
use crate::models::{ActionType, BiometricProfile, QueuedAction, validate_profile};
use crate::queue::{ActionReplayer, DrainOutcome, OfflineQueue};
use crate::storage::{KeyValueStore, MemoryStore, SqliteStore};

const PROFILE_KEY: &str = "biometric_profile";
const NETWORK_ONLINE_KEY: &str = "network_online";

/// What happened to an action handed to [`NutrackService::submit`].
#[derive(Debug, Clone)]
pub enum Submission {
    Sent,
    Queued(QueuedAction),
}

/// Wires the profile store, the offline queue and connectivity together.
/// Constructed explicitly; nothing in here is global.
pub struct NutrackService {
    store: Arc<dyn KeyValueStore>,
    queue: OfflineQueue,
    connectivity: ConnectivityWatcher,
}

impl NutrackService {
    pub fn open(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let online = load_network_mode(store.as_ref());
        let queue = OfflineQueue::load(Arc::clone(&store));
        Ok(Self {
            store,
            queue,
            connectivity: ConnectivityWatcher::new(online),
        })
    }

    pub fn new(db_path: &str) -> Result<Self> {
        let store = SqliteStore::open(std::path::Path::new(db_path))?;
        Self::open(Arc::new(store))
    }

    pub fn new_in_memory() -> Result<Self> {
        Self::open(Arc::new(MemoryStore::new()))
    }

    // --- Profile ---

    pub fn set_profile(&self, profile: &BiometricProfile) -> Result<BiometricProfile> {
        validate_profile(profile)?;
        let mut stored = profile.clone();
        stored.updated_at = chrono::Utc::now().to_rfc3339();
        self.store
            .set(PROFILE_KEY, &serde_json::to_string(&stored)?)?;
        Ok(stored)
    }

    pub fn get_profile(&self) -> Result<Option<BiometricProfile>> {
        match self.store.get(PROFILE_KEY)? {
            Some(raw) => Ok(Some(
                serde_json::from_str(&raw).context("Stored profile is corrupt")?,
            )),
            None => Ok(None),
        }
    }

    pub fn clear_profile(&self) -> Result<bool> {
        self.store.remove(PROFILE_KEY)
    }

    /// Targets for the stored profile, if one has been set.
    pub fn health_targets(&self) -> Result<Option<HealthTargets>> {
        Ok(self
            .get_profile()?
            .map(|p| HealthTargets::from_input(&p.to_input())))
    }

    // --- Queue ---

    pub fn enqueue(&self, action_type: ActionType, payload: Value) -> QueuedAction {
        self.queue.enqueue(action_type, payload)
    }

    /// Send now when online; queue when offline or when the send fails.
    pub fn submit(
        &self,
        action_type: ActionType,
        payload: Value,
        replayer: &dyn ActionReplayer,
    ) -> Submission {
        if !self.connectivity.is_online() {
            return Submission::Queued(self.queue.enqueue(action_type, payload));
        }
        let action = QueuedAction::new(action_type, payload);
        match replayer.replay(&action) {
            Ok(()) => Submission::Sent,
            Err(e) => {
                tracing::warn!(action_type = %action_type, error = %e, "send failed, queueing for later");
                Submission::Queued(self.queue.enqueue(action_type, action.payload))
            }
        }
    }

    pub fn drain(&self, replayer: &dyn ActionReplayer) -> DrainOutcome {
        self.queue.drain(&self.connectivity, replayer)
    }

    pub fn retry_queue(&self, replayer: &dyn ActionReplayer) -> DrainOutcome {
        self.queue.retry_queue(&self.connectivity, replayer)
    }

    #[must_use]
    pub fn queued_actions(&self) -> Vec<QueuedAction> {
        self.queue.actions()
    }

    pub fn clear_queue(&self) -> usize {
        self.queue.clear()
    }

    // --- Connectivity ---

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Record a connectivity change. Coming back online drains the queue once.
    ///
    /// The mode is persisted best-effort; a failed write is logged and does
    /// not stop the drain.
    pub fn set_connected(
        &self,
        connected: bool,
        replayer: &dyn ActionReplayer,
    ) -> Option<DrainOutcome> {
        let came_online = self.connectivity.handle_change(connected);
        if let Err(e) = self.store.set(NETWORK_ONLINE_KEY, &connected.to_string()) {
            tracing::error!(error = %e, connected, "failed to persist network mode");
        }
        came_online.then(|| self.queue.drain(&self.connectivity, replayer))
    }
}

/// Stored network mode, defaulting to online when missing or unreadable.
fn load_network_mode(store: &dyn KeyValueStore) -> bool {
    match store.get(NETWORK_ONLINE_KEY) {
        Ok(Some(raw)) => raw.parse::<bool>().unwrap_or_else(|_| {
            tracing::warn!(value = %raw, "ignoring invalid stored network mode");
            true
        }),
        Ok(None) => true,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read network mode, assuming online");
            true
        }
    }
}
