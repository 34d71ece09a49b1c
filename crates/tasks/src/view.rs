//! Live view of a single task.
//!
//! A [`TaskView`] never caches a snapshot: every [`state`](TaskView::state)
//! call re-reads the registry, so a body that awaits for a while still
//! observes the newest progress. Waiting is driven by the registry's
//! per-task watch channel rather than by polling.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clipseek_core::progress::{ProgressEvent, TaskStatus};
use clipseek_core::types::TaskId;
use clipseek_progress::registry::TaskRegistry;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Snapshot of a task as seen by its owner.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskState {
    pub task_id: TaskId,
    /// Latest server status, `None` until the first event arrives.
    pub status: Option<TaskStatus>,
    /// `true` while no terminal event has been seen and the local
    /// operation has not failed.
    pub is_loading: bool,
    pub progress: Option<f64>,
    pub message: Option<String>,
    /// Set iff the server reported `failed` or the local operation
    /// failed or was cancelled.
    pub error: Option<String>,
    /// Result payload, only present after `completed`.
    pub data: Option<Value>,
}

/// Handle given to a task body for observing its own progress.
#[derive(Clone)]
pub struct TaskView {
    task_id: TaskId,
    registry: TaskRegistry,
    cancel: CancellationToken,
    latest: watch::Receiver<Option<ProgressEvent>>,
    local_error: Arc<Mutex<Option<TaskError>>>,
}

impl TaskView {
    pub(crate) fn new(task_id: TaskId, registry: TaskRegistry, cancel: CancellationToken) -> Self {
        let latest = registry.watch(&task_id);
        Self {
            task_id,
            registry,
            cancel,
            latest,
            local_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// The token that cancels this task. Bodies may pass it on to their
    /// own I/O.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Latest event for this task.
    ///
    /// Falls back to the last watched value once the registry entry has
    /// been evicted.
    pub fn latest_event(&self) -> Option<ProgressEvent> {
        self.registry
            .get(&self.task_id)
            .or_else(|| self.latest.borrow().clone())
    }

    /// Fresh state, recomputed from the registry on every call.
    pub fn state(&self) -> TaskState {
        let mut state = TaskState {
            task_id: self.task_id.clone(),
            is_loading: true,
            ..Default::default()
        };

        if let Some(event) = self.latest_event() {
            state.status = Some(event.status);
            state.is_loading = event.status.is_active();
            state.progress = Some(event.progress);
            state.message = event.message.clone();
            state.error = event.failure_message();
            if event.status == TaskStatus::Completed {
                state.data = event.data;
            }
        }

        if let Some(err) = self.local_error() {
            state.is_loading = false;
            state.error = Some(err.to_string());
            state.data = None;
        }

        state
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading
    }

    pub fn progress(&self) -> Option<f64> {
        self.latest_event().map(|e| e.progress)
    }

    pub fn error(&self) -> Option<String> {
        self.state().error
    }

    pub fn data(&self) -> Option<Value> {
        self.state().data
    }

    /// Receiver that changes whenever this task's entry changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<ProgressEvent>> {
        self.latest.clone()
    }

    /// Wait for the terminal event of this task.
    ///
    /// Resolves with the `completed` event, or with
    /// [`TaskError::Failed`] / [`TaskError::Cancelled`].
    pub async fn finished(&self) -> Result<ProgressEvent, TaskError> {
        if self.cancel.is_cancelled() {
            return Err(TaskError::Cancelled);
        }

        let mut rx = self.latest.clone();
        let terminal = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(TaskError::Cancelled),
            res = rx.wait_for(|e| e.as_ref().is_some_and(ProgressEvent::is_terminal)) => {
                res.ok().and_then(|event| event.clone())
            }
        };

        let Some(event) = terminal else {
            return Err(TaskError::Untracked(self.task_id.clone()));
        };
        match event.failure_message() {
            Some(message) => Err(TaskError::Failed(message)),
            None => Ok(event),
        }
    }

    /// Wait for completion and decode the result payload into `T`.
    ///
    /// A completed event without `data` decodes from `null`.
    pub async fn completion<T: DeserializeOwned>(&self) -> Result<T, TaskError> {
        let event = self.finished().await?;
        let data = event.data.unwrap_or(Value::Null);
        serde_json::from_value(data).map_err(|e| TaskError::Decode(e.to_string()))
    }

    pub(crate) fn local_error(&self) -> Option<TaskError> {
        self.lock_error().clone()
    }

    pub(crate) fn set_local_error(&self, err: TaskError) {
        *self.lock_error() = Some(err);
    }

    fn lock_error(&self) -> MutexGuard<'_, Option<TaskError>> {
        self.local_error.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
