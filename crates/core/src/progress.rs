//! Progress event model pushed by the server over the progress channel.
//!
//! Every long-running operation is correlated by a client-supplied
//! `task_id`. The server emits a stream of [`ProgressEvent`]s for that id
//! and finishes with exactly one terminal event (`completed` or `failed`).

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::TaskId;

/// Fallback error text used when a `failed` event carries no message.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Task failed";

/// Lifecycle status of a task as reported by the server.
///
/// The server-side progress manager also uses `started`, `error` and
/// `cancelled`; those are accepted as aliases so older backends keep
/// working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[serde(alias = "started")]
    Pending,
    InProgress,
    Completed,
    #[serde(alias = "error", alias = "cancelled")]
    Failed,
}

impl TaskStatus {
    /// `true` for `completed` and `failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// `true` while the task is still expected to produce events.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One pushed progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub task_id: TaskId,
    pub status: TaskStatus,
    /// Completion percentage (0-100). Missing or `null` reads as 0.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub progress: f64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub current_step_number: Option<u32>,
    #[serde(default)]
    pub total_steps: Option<u32>,
    /// Emission time in seconds since the Unix epoch.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub timestamp: f64,
    /// Opaque result payload, only meaningful on `completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ProgressEvent {
    /// Create an event with the given status and everything else empty.
    pub fn new(task_id: impl Into<TaskId>, status: TaskStatus) -> Self {
        Self {
            task_id: task_id.into(),
            status,
            progress: 0.0,
            message: None,
            current_step: None,
            current_step_number: None,
            total_steps: None,
            timestamp: now_epoch_secs(),
            data: None,
        }
    }

    /// Synthetic `pending` entry used when a task is registered before
    /// the server has reported anything.
    pub fn pending(task_id: impl Into<TaskId>) -> Self {
        Self::new(task_id, TaskStatus::Pending)
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_step(mut self, step: impl Into<String>, number: u32, total: u32) -> Self {
        self.current_step = Some(step.into());
        self.current_step_number = Some(number);
        self.total_steps = Some(total);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Error text for a `failed` event, `None` for every other status.
    pub fn failure_message(&self) -> Option<String> {
        if self.status != TaskStatus::Failed {
            return None;
        }
        Some(
            self.message
                .as_deref()
                .filter(|m| !m.is_empty())
                .unwrap_or(DEFAULT_FAILURE_MESSAGE)
                .to_string(),
        )
    }
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_default())
}

fn now_epoch_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
