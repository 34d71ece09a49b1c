//! Fixed-interval reconnection policy for the progress WebSocket.
//!
//! After an unclean disconnect the channel waits [`ReconnectPolicy::interval`]
//! and tries again. Retries are unbounded unless
//! [`ReconnectPolicy::max_attempts`] is set. A manual reconnect resets
//! the attempt counter and skips the wait entirely.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Delay between reconnection attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(3);

/// Tunable parameters for the retry strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before each reconnection attempt.
    pub interval: Duration,
    /// Give up after this many consecutive failed sessions.
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RECONNECT_INTERVAL,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Whether retry number `attempt` (1-based) may be made.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }
}

/// Sleep for the policy interval before retry `attempt`.
///
/// Returns `false` if `cancel` fires first, in which case no retry
/// should be made.
pub async fn wait_for_retry(
    policy: &ReconnectPolicy,
    attempt: u32,
    cancel: &CancellationToken,
) -> bool {
    tracing::info!(
        attempt,
        max_attempts = ?policy.max_attempts,
        delay_ms = policy.interval.as_millis() as u64,
        "Reconnecting to progress endpoint",
    );

    tokio::select! {
        _ = cancel.cancelled() => {
            tracing::info!("Reconnect cancelled");
            false
        }
        _ = tokio::time::sleep(policy.interval) => true,
    }
}
