use clipseek_core::types::TaskId;

/// Why a task did not produce data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError {
    /// The server reported `failed` for the task.
    #[error("{0}")]
    Failed(String),

    /// The caller stopped waiting. The server may still be working.
    #[error("Task cancelled by user")]
    Cancelled,

    /// The submission request itself failed; the server never saw the task.
    #[error("Failed to submit task: {0}")]
    Submission(String),

    /// The task completed but its payload had an unexpected shape.
    #[error("Failed to decode task result: {0}")]
    Decode(String),

    /// Progress tracking for the task ended before a terminal event.
    #[error("Task {0} is no longer tracked")]
    Untracked(TaskId),
}

impl TaskError {
    /// `true` for user-initiated stops, which callers usually present
    /// differently from failures.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
