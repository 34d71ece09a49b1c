use clipseek_core::error::CoreError;
use clipseek_tasks::error::TaskError;

/// Errors from the search REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum SearchApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Search API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl From<SearchApiError> for TaskError {
    fn from(err: SearchApiError) -> Self {
        TaskError::Submission(err.to_string())
    }
}

/// Errors surfaced by [`PaginationController`](crate::pagination::PaginationController).
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid search: {0}")]
    Invalid(#[from] CoreError),

    #[error(transparent)]
    Task(#[from] TaskError),

    /// A newer search started while this one was running; its page was
    /// discarded.
    #[error("Search was superseded by a newer one")]
    Superseded,
}

impl SearchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Task(e) if e.is_cancelled())
    }
}
