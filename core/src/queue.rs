//! Durable queue of user mutations made while offline.
//!
//! Actions are persisted as a JSON array under [`QUEUE_STORAGE_KEY`] after
//! every change. A drain replays a snapshot of the queue once, in insertion
//! order, one action at a time. Failed actions keep their position and are
//! retried on the next drain; after [`MAX_RETRIES`] failures they are dropped
//! with a log line.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, bail};
use serde::Serialize;
use serde_json::Value;

use crate::connectivity::NetworkStatus;
use crate::models::{ActionType, QueuedAction};
use crate::storage::KeyValueStore;

pub const MAX_RETRIES: u32 = 3;
pub const QUEUE_STORAGE_KEY: &str = "offline_queue";

/// One remote call that accepts a stored payload.
pub trait ReplayTarget: Send + Sync {
    fn send(&self, payload: &Value) -> Result<()>;
}

/// Sends a queued action to wherever its type belongs.
pub trait ActionReplayer {
    fn replay(&self, action: &QueuedAction) -> Result<()>;
}

/// Dispatches replays to the target registered for each action type.
#[derive(Default)]
pub struct ReplayRouter {
    targets: HashMap<ActionType, Box<dyn ReplayTarget>>,
}

impl ReplayRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_target(mut self, action_type: ActionType, target: Box<dyn ReplayTarget>) -> Self {
        self.register(action_type, target);
        self
    }

    pub fn register(&mut self, action_type: ActionType, target: Box<dyn ReplayTarget>) {
        self.targets.insert(action_type, target);
    }
}

impl ActionReplayer for ReplayRouter {
    fn replay(&self, action: &QueuedAction) -> Result<()> {
        match self.targets.get(&action.action_type) {
            Some(target) => target.send(&action.payload),
            None => bail!("No replay target registered for {}", action.action_type),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub retained: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DrainOutcome {
    /// Not connected; nothing was attempted.
    Offline,
    /// Another drain pass is still running.
    AlreadyDraining,
    Completed(DrainReport),
}

struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct OfflineQueue {
    store: Arc<dyn KeyValueStore>,
    actions: Mutex<Vec<QueuedAction>>,
    draining: AtomicBool,
}

impl OfflineQueue {
    /// Load the persisted queue. Unreadable or corrupt data resets it to empty.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let actions = match store.get(QUEUE_STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<QueuedAction>>(&raw) {
                Ok(actions) => actions,
                Err(e) => {
                    tracing::warn!(error = %e, "discarding corrupt offline queue");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read offline queue, starting empty");
                Vec::new()
            }
        };
        if !actions.is_empty() {
            tracing::info!(count = actions.len(), "loaded offline queue");
        }
        Self {
            store,
            actions: Mutex::new(actions),
            draining: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<QueuedAction>> {
        self.actions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, actions: &[QueuedAction]) {
        let result = serde_json::to_string(actions)
            .map_err(anyhow::Error::from)
            .and_then(|raw| self.store.set(QUEUE_STORAGE_KEY, &raw));
        if let Err(e) = result {
            tracing::error!(error = %e, "failed to persist offline queue");
        }
    }

    /// Append an action and persist the whole queue. Identical payloads are
    /// not deduplicated.
    pub fn enqueue(&self, action_type: ActionType, payload: Value) -> QueuedAction {
        let action = QueuedAction::new(action_type, payload);
        let mut actions = self.lock();
        actions.push(action.clone());
        self.persist(&actions);
        tracing::info!(id = %action.id, action_type = %action_type, "queued action");
        action
    }

    #[must_use]
    pub fn actions(&self) -> Vec<QueuedAction> {
        self.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Discard every queued action. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut actions = self.lock();
        let removed = actions.len();
        actions.clear();
        self.persist(&actions);
        removed
    }

    /// Replay the current snapshot once, in order.
    ///
    /// The queue lock is released while replays run, so actions enqueued
    /// mid-pass are kept and end up after the survivors.
    pub fn drain(&self, network: &dyn NetworkStatus, replayer: &dyn ActionReplayer) -> DrainOutcome {
        if !network.is_connected() {
            tracing::debug!("offline, skipping drain");
            return DrainOutcome::Offline;
        }
        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            tracing::debug!("drain already in progress");
            return DrainOutcome::AlreadyDraining;
        };

        let snapshot = self.actions();
        let mut report = DrainReport::default();
        if snapshot.is_empty() {
            return DrainOutcome::Completed(report);
        }
        let snapshot_ids: HashSet<String> = snapshot.iter().map(|a| a.id.clone()).collect();

        let mut survivors = Vec::with_capacity(snapshot.len());
        for mut action in snapshot {
            report.attempted += 1;
            match replayer.replay(&action) {
                Ok(()) => {
                    report.succeeded += 1;
                    tracing::debug!(id = %action.id, action_type = %action.action_type, "replayed action");
                }
                Err(e) => {
                    action.retry_count += 1;
                    if action.retry_count >= MAX_RETRIES {
                        report.dropped += 1;
                        tracing::warn!(
                            id = %action.id,
                            action_type = %action.action_type,
                            retries = action.retry_count,
                            error = %e,
                            "dropping action after repeated replay failures"
                        );
                    } else {
                        report.retained += 1;
                        tracing::debug!(
                            id = %action.id,
                            retries = action.retry_count,
                            error = %e,
                            "replay failed, keeping action"
                        );
                        survivors.push(action);
                    }
                }
            }
        }

        let mut actions = self.lock();
        // Anything cleared mid-pass stays gone; anything added mid-pass is kept.
        let current_ids: HashSet<&str> = actions.iter().map(|a| a.id.as_str()).collect();
        survivors.retain(|a| current_ids.contains(a.id.as_str()));
        survivors.extend(
            actions
                .iter()
                .filter(|a| !snapshot_ids.contains(&a.id))
                .cloned(),
        );
        *actions = survivors;
        self.persist(&actions);

        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            retained = report.retained,
            dropped = report.dropped,
            "drained offline queue"
        );
        DrainOutcome::Completed(report)
    }

    /// Manual re-drain. Does nothing while offline.
    pub fn retry_queue(
        &self,
        network: &dyn NetworkStatus,
        replayer: &dyn ActionReplayer,
    ) -> DrainOutcome {
        if !network.is_connected() {
            tracing::warn!("cannot retry offline queue while offline");
            return DrainOutcome::Offline;
        }
        self.drain(network, replayer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectivityWatcher;
    use crate::storage::{MemoryStore, SqliteStore};
    use serde_json::json;

    /// Fails each action id a configured number of times, then succeeds.
    #[derive(Default)]
    struct ScriptedReplayer {
        failures: Mutex<HashMap<String, u32>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedReplayer {
        fn fail(&self, id: &str, times: u32) {
            self.failures.lock().unwrap().insert(id.to_string(), times);
        }

        fn calls_for(&self, id: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| *c == id).count()
        }
    }

    impl ActionReplayer for ScriptedReplayer {
        fn replay(&self, action: &QueuedAction) -> Result<()> {
            self.calls.lock().unwrap().push(action.id.clone());
            let mut failures = self.failures.lock().unwrap();
            match failures.get_mut(&action.id) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    bail!("server unavailable")
                }
                _ => Ok(()),
            }
        }
    }

    fn new_queue() -> OfflineQueue {
        OfflineQueue::load(Arc::new(MemoryStore::new()))
    }

    fn ids(queue: &OfflineQueue) -> Vec<String> {
        queue.actions().into_iter().map(|a| a.id).collect()
    }

    fn completed(outcome: DrainOutcome) -> DrainReport {
        match outcome {
            DrainOutcome::Completed(report) => report,
            other => panic!("expected completed drain, got {other:?}"),
        }
    }

    #[test]
    fn test_enqueue_appends_in_order() {
        let queue = new_queue();
        let a = queue.enqueue(ActionType::WaterLog, json!({ "amount_ml": 250 }));
        let b = queue.enqueue(ActionType::Post, json!({ "content": "hello" }));
        assert_eq!(ids(&queue), vec![a.id, b.id]);
        assert_eq!(queue.len(), 2);
        assert!(queue.actions().iter().all(|a| a.retry_count == 0));
    }

    #[test]
    fn test_duplicate_payloads_are_kept() {
        let queue = new_queue();
        queue.enqueue(ActionType::WaterLog, json!({ "amount_ml": 250 }));
        queue.enqueue(ActionType::WaterLog, json!({ "amount_ml": 250 }));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_drain_offline_is_noop() {
        let queue = new_queue();
        queue.enqueue(ActionType::WaterLog, json!({ "amount_ml": 250 }));
        let network = ConnectivityWatcher::new(false);
        let replayer = ScriptedReplayer::default();

        assert_eq!(queue.drain(&network, &replayer), DrainOutcome::Offline);
        assert_eq!(queue.len(), 1);
        assert!(replayer.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_retry_queue_offline_is_noop() {
        let queue = new_queue();
        queue.enqueue(ActionType::Post, json!({ "content": "hi" }));
        let network = ConnectivityWatcher::new(false);
        let replayer = ScriptedReplayer::default();

        assert_eq!(queue.retry_queue(&network, &replayer), DrainOutcome::Offline);
        assert_eq!(queue.len(), 1);

        network.handle_change(true);
        let report = completed(queue.retry_queue(&network, &replayer));
        assert_eq!(report.succeeded, 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_empty_queue() {
        let queue = new_queue();
        let network = ConnectivityWatcher::new(true);
        let report = completed(queue.drain(&network, &ScriptedReplayer::default()));
        assert_eq!(report, DrainReport::default());
    }

    #[test]
    fn test_item_recovers_on_third_attempt() {
        let queue = new_queue();
        let network = ConnectivityWatcher::new(false);
        let replayer = ScriptedReplayer::default();

        let first = queue.enqueue(ActionType::FoodLog, json!({ "food_id": 1 }));
        let second = queue.enqueue(ActionType::WaterLog, json!({ "amount_ml": 500 }));
        let third = queue.enqueue(ActionType::ExerciseLog, json!({ "name": "Run" }));
        let fourth = queue.enqueue(ActionType::WeightLog, json!({ "weight_kg": 71.2 }));
        replayer.fail(&second.id, 2);

        // Offline: nothing happens
        assert_eq!(queue.drain(&network, &replayer), DrainOutcome::Offline);
        assert_eq!(queue.len(), 4);

        network.handle_change(true);

        let report = completed(queue.drain(&network, &replayer));
        assert_eq!(report.attempted, 4);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.retained, 1);
        assert_eq!(ids(&queue), vec![second.id.clone()]);
        assert_eq!(queue.actions()[0].retry_count, 1);

        completed(queue.drain(&network, &replayer));
        assert_eq!(ids(&queue), vec![second.id.clone()]);
        assert_eq!(queue.actions()[0].retry_count, 2);

        let report = completed(queue.drain(&network, &replayer));
        assert_eq!(report.succeeded, 1);
        assert!(queue.is_empty());

        for id in [&first.id, &third.id, &fourth.id] {
            assert_eq!(replayer.calls_for(id), 1);
        }
        assert_eq!(replayer.calls_for(&second.id), 3);
    }

    #[test]
    fn test_item_dropped_after_max_retries() {
        let queue = new_queue();
        let network = ConnectivityWatcher::new(true);
        let replayer = ScriptedReplayer::default();

        let doomed = queue.enqueue(ActionType::Post, json!({ "content": "never" }));
        replayer.fail(&doomed.id, u32::MAX);

        completed(queue.drain(&network, &replayer));
        completed(queue.drain(&network, &replayer));
        assert_eq!(queue.actions()[0].retry_count, 2);

        let report = completed(queue.drain(&network, &replayer));
        assert_eq!(report.dropped, 1);
        assert!(queue.is_empty());

        // Gone for good
        completed(queue.drain(&network, &replayer));
        assert_eq!(replayer.calls_for(&doomed.id), MAX_RETRIES as usize);
    }

    #[test]
    fn test_failed_items_keep_their_position() {
        let queue = new_queue();
        let network = ConnectivityWatcher::new(true);
        let replayer = ScriptedReplayer::default();

        let a = queue.enqueue(ActionType::WaterLog, json!({ "amount_ml": 100 }));
        let b = queue.enqueue(ActionType::WaterLog, json!({ "amount_ml": 200 }));
        let c = queue.enqueue(ActionType::WaterLog, json!({ "amount_ml": 300 }));
        replayer.fail(&a.id, 1);
        replayer.fail(&c.id, 1);

        completed(queue.drain(&network, &replayer));
        assert_eq!(ids(&queue), vec![a.id, c.id]);
        assert!(!ids(&queue).contains(&b.id));
    }

    #[test]
    fn test_drain_persists_survivors() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let queue = OfflineQueue::load(Arc::clone(&store));
        let network = ConnectivityWatcher::new(true);
        let replayer = ScriptedReplayer::default();

        let kept = queue.enqueue(ActionType::Post, json!({ "content": "retry me" }));
        queue.enqueue(ActionType::Post, json!({ "content": "sent" }));
        replayer.fail(&kept.id, 1);
        completed(queue.drain(&network, &replayer));

        let reloaded = OfflineQueue::load(store);
        let actions = reloaded.actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].id, kept.id);
        assert_eq!(actions[0].retry_count, 1);
    }

    #[test]
    fn test_reload_round_trip_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nutrack.db");

        let before = {
            let store = Arc::new(SqliteStore::open(&path).unwrap());
            let queue = OfflineQueue::load(store);
            queue.enqueue(ActionType::FoodLog, json!({ "food_id": 3, "serving_g": 120.5 }));
            queue.enqueue(ActionType::Post, json!({ "content": "lunch!", "tags": ["salad"] }));
            queue.actions()
        };

        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let after = OfflineQueue::load(store).actions();
        assert_eq!(before, after);
    }

    #[test]
    fn test_corrupt_storage_resets_to_empty() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(QUEUE_STORAGE_KEY, "{not json").unwrap();
        let queue = OfflineQueue::load(Arc::clone(&store));
        assert!(queue.is_empty());

        // Still usable afterwards
        queue.enqueue(ActionType::WaterLog, json!({ "amount_ml": 250 }));
        assert_eq!(OfflineQueue::load(store).len(), 1);
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            bail!("disk unavailable")
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            bail!("disk full")
        }

        fn remove(&self, _key: &str) -> Result<bool> {
            bail!("disk unavailable")
        }
    }

    #[test]
    fn test_storage_errors_are_not_propagated() {
        let queue = OfflineQueue::load(Arc::new(BrokenStore));
        assert!(queue.is_empty());

        queue.enqueue(ActionType::WaterLog, json!({ "amount_ml": 250 }));
        assert_eq!(queue.len(), 1);

        let network = ConnectivityWatcher::new(true);
        let report = completed(queue.drain(&network, &ScriptedReplayer::default()));
        assert_eq!(report.succeeded, 1);
        assert!(queue.is_empty());
    }

    /// Re-enters the queue from inside a replay, like a connectivity flap would.
    struct ReentrantReplayer<'a> {
        queue: &'a OfflineQueue,
        network: &'a ConnectivityWatcher,
        nested: Mutex<Vec<DrainOutcome>>,
        enqueued: Mutex<Option<QueuedAction>>,
    }

    impl ActionReplayer for ReentrantReplayer<'_> {
        fn replay(&self, _action: &QueuedAction) -> Result<()> {
            let outcome = self.queue.drain(self.network, self);
            self.nested.lock().unwrap().push(outcome);
            let mut enqueued = self.enqueued.lock().unwrap();
            if enqueued.is_none() {
                *enqueued = Some(
                    self.queue
                        .enqueue(ActionType::WaterLog, json!({ "amount_ml": 330 })),
                );
            }
            bail!("still flaky")
        }
    }

    #[test]
    fn test_overlapping_drain_is_rejected() {
        let queue = new_queue();
        let network = ConnectivityWatcher::new(true);
        let original = queue.enqueue(ActionType::Post, json!({ "content": "hi" }));

        let replayer = ReentrantReplayer {
            queue: &queue,
            network: &network,
            nested: Mutex::new(Vec::new()),
            enqueued: Mutex::new(None),
        };
        let report = completed(queue.drain(&network, &replayer));
        assert_eq!(report.attempted, 1);
        assert_eq!(report.retained, 1);
        assert!(!queue.is_draining());

        let nested = replayer.nested.lock().unwrap().clone();
        assert_eq!(nested, vec![DrainOutcome::AlreadyDraining]);

        // The action enqueued mid-drain lands after the survivor
        let added = replayer.enqueued.lock().unwrap().clone().unwrap();
        assert_eq!(ids(&queue), vec![original.id, added.id]);
        assert_eq!(queue.actions()[1].retry_count, 0);
    }

    #[test]
    fn test_clear_during_drain_is_respected() {
        struct ClearingReplayer<'a>(&'a OfflineQueue);

        impl ActionReplayer for ClearingReplayer<'_> {
            fn replay(&self, _action: &QueuedAction) -> Result<()> {
                self.0.clear();
                bail!("offline again")
            }
        }

        let queue = new_queue();
        let network = ConnectivityWatcher::new(true);
        queue.enqueue(ActionType::Post, json!({ "content": "hi" }));

        completed(queue.drain(&network, &ClearingReplayer(&queue)));
        assert!(queue.is_empty());
    }

    struct RecordingTarget {
        sent: Arc<Mutex<Vec<Value>>>,
    }

    impl ReplayTarget for RecordingTarget {
        fn send(&self, payload: &Value) -> Result<()> {
            self.sent.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    #[test]
    fn test_router_dispatches_by_type() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let router = ReplayRouter::new().with_target(
            ActionType::WaterLog,
            Box::new(RecordingTarget {
                sent: Arc::clone(&sent),
            }),
        );

        let water = QueuedAction::new(ActionType::WaterLog, json!({ "amount_ml": 250 }));
        router.replay(&water).unwrap();
        assert_eq!(sent.lock().unwrap().as_slice(), &[json!({ "amount_ml": 250 })]);

        let post = QueuedAction::new(ActionType::Post, json!({ "content": "hi" }));
        assert!(router.replay(&post).is_err());
    }

    #[test]
    fn test_drain_outcome_serializes_with_status() {
        let value = serde_json::to_value(DrainOutcome::Completed(DrainReport {
            attempted: 2,
            succeeded: 1,
            retained: 1,
            dropped: 0,
        }))
        .unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["succeeded"], 1);

        let value = serde_json::to_value(DrainOutcome::Offline).unwrap();
        assert_eq!(value["status"], "offline");
    }
}
