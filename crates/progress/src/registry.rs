//! Per-task projection of the progress event stream.
//!
//! [`TaskRegistry`] keeps the latest [`ProgressEvent`] for every task id
//! seen on the progress channel. Terminal entries are evicted after a
//! grace delay so readers still observe the final state. Every mutation
//! is fanned out to [`subscribe`](TaskRegistry::subscribe)rs, and each
//! task id can additionally be [`watch`](TaskRegistry::watch)ed so a
//! waiter wakes exactly when that task changes.
//!
//! The registry is cheap to clone; clones share the same state.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use clipseek_core::progress::ProgressEvent;
use clipseek_core::types::TaskId;
use tokio::sync::{broadcast, watch};

/// Delay between a terminal event and removal of the entry.
pub const DEFAULT_EVICTION_GRACE: Duration = Duration::from_secs(3);

/// Number of raw events kept for [`TaskRegistry::recent_events`].
pub const RECENT_EVENTS_CAPACITY: usize = 100;

/// Number of evicted task ids remembered so late events stay ignored.
const RETIRED_CAPACITY: usize = 1024;

/// Broadcast channel capacity for registry updates.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// A mutation of the registry, broadcast to every subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryUpdate {
    /// An event was accepted as the latest state of its task.
    Recorded(ProgressEvent),
    /// A terminal entry was removed after its grace delay.
    Evicted(TaskId),
    /// All entries were dropped.
    Cleared,
}

/// Shared, clonable task registry.
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    state: Mutex<RegistryState>,
    updates: broadcast::Sender<RegistryUpdate>,
    eviction_grace: Duration,
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<TaskId, ProgressEvent>,
    watchers: HashMap<TaskId, watch::Sender<Option<ProgressEvent>>>,
    retired: HashSet<TaskId>,
    retired_order: VecDeque<TaskId>,
    recent: VecDeque<ProgressEvent>,
}

impl TaskRegistry {
    /// Create a registry that evicts terminal entries after `eviction_grace`.
    pub fn new(eviction_grace: Duration) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(RegistryInner {
                state: Mutex::new(RegistryState::default()),
                updates,
                eviction_grace,
            }),
        }
    }

    /// Grace delay applied to terminal entries.
    pub fn eviction_grace(&self) -> Duration {
        self.inner.eviction_grace
    }

    /// Upsert the entry for `event.task_id`.
    ///
    /// Returns `false` if the event was ignored because the task already
    /// reached a terminal state (still present or already evicted).
    /// A terminal event schedules removal after the grace delay, which
    /// requires a running Tokio runtime.
    pub fn record(&self, event: ProgressEvent) -> bool {
        let task_id = event.task_id.clone();
        let terminal = event.is_terminal();

        {
            let mut state = self.lock();

            state.recent.push_back(event.clone());
            while state.recent.len() > RECENT_EVENTS_CAPACITY {
                state.recent.pop_front();
            }

            let already_final = state.retired.contains(&task_id)
                || state
                    .entries
                    .get(&task_id)
                    .is_some_and(ProgressEvent::is_terminal);
            if already_final {
                tracing::debug!(
                    task_id = %task_id,
                    status = %event.status,
                    "Ignoring event for finished task",
                );
                return false;
            }

            state.entries.insert(task_id.clone(), event.clone());
            if let Some(tx) = state.watchers.get(&task_id) {
                tx.send_replace(Some(event.clone()));
            }
        }

        let _ = self.inner.updates.send(RegistryUpdate::Recorded(event));

        if terminal {
            self.schedule_eviction(task_id);
        }
        true
    }

    /// Insert a synthetic `pending` entry for a task the server has not
    /// reported yet. No-op if the task is already known.
    pub fn register_pending(&self, task_id: &str) -> bool {
        {
            let state = self.lock();
            if state.entries.contains_key(task_id) || state.retired.contains(task_id) {
                return false;
            }
        }
        self.record(ProgressEvent::pending(task_id))
    }

    /// Latest event for `task_id`, if any.
    pub fn get(&self, task_id: &str) -> Option<ProgressEvent> {
        self.lock().entries.get(task_id).cloned()
    }

    /// Snapshot of all live entries, oldest first.
    pub fn active_tasks(&self) -> Vec<ProgressEvent> {
        let mut tasks: Vec<ProgressEvent> = self.lock().entries.values().cloned().collect();
        tasks.sort_by(|a, b| {
            a.timestamp
                .total_cmp(&b.timestamp)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        tasks
    }

    /// The last [`RECENT_EVENTS_CAPACITY`] events received, oldest first.
    pub fn recent_events(&self) -> Vec<ProgressEvent> {
        self.lock().recent.iter().cloned().collect()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribe to every registry mutation.
    ///
    /// Dropping the receiver unsubscribes. Slow receivers observe
    /// `RecvError::Lagged` once the buffer overflows.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryUpdate> {
        self.inner.updates.subscribe()
    }

    /// Watch a single task.
    ///
    /// The receiver holds the latest event for `task_id` (seeded from the
    /// current entry) and is only woken by events for that task.
    pub fn watch(&self, task_id: &str) -> watch::Receiver<Option<ProgressEvent>> {
        let mut state = self.lock();
        if let Some(tx) = state.watchers.get(task_id) {
            return tx.subscribe();
        }
        let current = state.entries.get(task_id).cloned();
        let (tx, rx) = watch::channel(current);
        state.watchers.insert(task_id.to_string(), tx);
        rx
    }

    /// Release the watcher for `task_id`. Outstanding receivers keep
    /// their last value.
    pub fn unwatch(&self, task_id: &str) {
        self.lock().watchers.remove(task_id);
    }

    /// Drop every entry and the recent-event log.
    ///
    /// Watchers are kept; tasks recorded again afterwards are treated as new.
    pub fn clear(&self) {
        {
            let mut state = self.lock();
            state.entries.clear();
            state.recent.clear();
        }
        let _ = self.inner.updates.send(RegistryUpdate::Cleared);
    }

    /// Drop the recent-event log only.
    pub fn clear_recent(&self) {
        self.lock().recent.clear();
    }

    // ---- private helpers ----

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule_eviction(&self, task_id: TaskId) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(task_id = %task_id, "No runtime available, terminal entry kept");
            return;
        };

        let weak: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        let grace = self.inner.eviction_grace;
        runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(inner) = weak.upgrade() {
                TaskRegistry { inner }.evict(&task_id);
            }
        });
    }

    fn evict(&self, task_id: &str) {
        {
            let mut state = self.lock();
            let removed = state.entries.remove(task_id);
            if !removed.as_ref().is_some_and(ProgressEvent::is_terminal) {
                // Cleared (and possibly re-recorded) since the terminal event.
                if let Some(event) = removed {
                    state.entries.insert(task_id.to_string(), event);
                }
                return;
            }
            state.watchers.remove(task_id);

            if state.retired.insert(task_id.to_string()) {
                state.retired_order.push_back(task_id.to_string());
            }
            while state.retired_order.len() > RETIRED_CAPACITY {
                if let Some(oldest) = state.retired_order.pop_front() {
                    state.retired.remove(&oldest);
                }
            }
        }

        tracing::debug!(task_id = %task_id, "Evicted finished task");
        let _ = self
            .inner
            .updates
            .send(RegistryUpdate::Evicted(task_id.to_string()));
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_EVICTION_GRACE)
    }
}
