//! Running request/response operations as progress-tracked tasks.
//!
//! [`TaskRunner::run_task`] is the only entry point: it generates a fresh
//! task id, invokes the body with that id and a live [`TaskView`], and
//! folds the result into a [`TaskOutcome`]. Bookkeeping for the task is
//! released a short delay after it settles.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use clipseek_core::progress::DEFAULT_FAILURE_MESSAGE;
use clipseek_core::types::{new_task_id, TaskId};
use clipseek_progress::registry::TaskRegistry;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::view::{TaskState, TaskView};

/// Delay between a task settling and its bookkeeping being released.
pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_secs(1);

/// Result of one [`TaskRunner::run_task`] call.
///
/// `data` is present when the body returned a value; `error` when the
/// body failed, the task was cancelled, or the server reported failure.
#[derive(Debug)]
pub struct TaskOutcome<T> {
    pub task_id: TaskId,
    pub data: Option<T>,
    pub error: Option<TaskError>,
}

impl<T> TaskOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.data.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(TaskError::is_cancelled)
    }

    /// Collapse into a `Result`, preferring the error when both are set.
    pub fn into_result(self) -> Result<T, TaskError> {
        match (self.error, self.data) {
            (Some(err), _) => Err(err),
            (None, Some(data)) => Ok(data),
            (None, None) => Err(TaskError::Failed(DEFAULT_FAILURE_MESSAGE.to_string())),
        }
    }
}

/// Starts tasks and tracks the ones that have not been cleaned up yet.
#[derive(Clone)]
pub struct TaskRunner {
    registry: TaskRegistry,
    cleanup_delay: Duration,
    active: Arc<Mutex<HashMap<TaskId, TaskView>>>,
}

impl TaskRunner {
    pub fn new(registry: TaskRegistry) -> Self {
        Self::with_cleanup_delay(registry, DEFAULT_CLEANUP_DELAY)
    }

    pub fn with_cleanup_delay(registry: TaskRegistry, cleanup_delay: Duration) -> Self {
        Self {
            registry,
            cleanup_delay,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Run `body` as a new task.
    ///
    /// The body receives the generated task id (to include in its
    /// submission) and a [`TaskView`] it can wait on. Cancelling `cancel`
    /// resolves the call with [`TaskError::Cancelled`] right away; events
    /// that arrive afterwards never surface data for this call.
    pub async fn run_task<T, F, Fut>(&self, cancel: &CancellationToken, body: F) -> TaskOutcome<T>
    where
        F: FnOnce(TaskId, TaskView) -> Fut,
        Fut: Future<Output = Result<T, TaskError>>,
    {
        let task_id = new_task_id();
        let view = TaskView::new(task_id.clone(), self.registry.clone(), cancel.clone());
        self.lock().insert(task_id.clone(), view.clone());
        // Released on every exit path, including the caller dropping
        // this future mid-flight.
        let _cleanup = CleanupGuard {
            active: Arc::clone(&self.active),
            registry: self.registry.clone(),
            delay: self.cleanup_delay,
            task_id: task_id.clone(),
        };

        tracing::debug!(task_id = %task_id, "Starting task");

        let result = if cancel.is_cancelled() {
            Err(TaskError::Cancelled)
        } else {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(TaskError::Cancelled),
                result = body(task_id.clone(), view.clone()) => result,
            }
        };

        let outcome = match result {
            Ok(data) => {
                // The body may return without waiting; a failure the
                // server already reported still counts.
                let error = view.error().map(TaskError::Failed);
                TaskOutcome {
                    task_id: task_id.clone(),
                    data: Some(data),
                    error,
                }
            }
            Err(err) => {
                view.set_local_error(err.clone());
                TaskOutcome {
                    task_id: task_id.clone(),
                    data: None,
                    error: Some(err),
                }
            }
        };

        match &outcome.error {
            None => tracing::debug!(task_id = %task_id, "Task completed"),
            Some(err) if err.is_cancelled() => {
                tracing::info!(task_id = %task_id, "Task cancelled")
            }
            Some(err) => tracing::warn!(task_id = %task_id, error = %err, "Task failed"),
        }

        outcome
    }

    /// Current state of a task this runner started, until it is cleaned up.
    pub fn tracked(&self, task_id: &str) -> Option<TaskState> {
        self.lock().get(task_id).map(TaskView::state)
    }

    /// Ids of tasks still held by this runner.
    pub fn active_task_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, TaskView>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases a task's bookkeeping `delay` after being dropped.
struct CleanupGuard {
    active: Arc<Mutex<HashMap<TaskId, TaskView>>>,
    registry: TaskRegistry,
    delay: Duration,
    task_id: TaskId,
}

impl CleanupGuard {
    fn release(
        active: &Mutex<HashMap<TaskId, TaskView>>,
        registry: &TaskRegistry,
        task_id: &str,
    ) {
        active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(task_id);
        registry.unwatch(task_id);
        tracing::trace!(task_id = %task_id, "Task bookkeeping released");
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let active = Arc::clone(&self.active);
        let registry = self.registry.clone();
        let task_id = std::mem::take(&mut self.task_id);

        // Without a runtime (e.g. during shutdown) release right away.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            Self::release(&active, &registry, &task_id);
            return;
        };
        let delay = self.delay;
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            Self::release(&active, &registry, &task_id);
        });
    }
}
