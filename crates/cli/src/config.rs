use std::time::Duration;

use clipseek_core::search::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use clipseek_progress::channel::DEFAULT_PROGRESS_URL;
use clipseek_progress::reconnect::{ReconnectPolicy, DEFAULT_RECONNECT_INTERVAL};
use clipseek_progress::registry::DEFAULT_EVICTION_GRACE;
use clipseek_search::api::DEFAULT_API_URL;
use clipseek_tasks::runner::DEFAULT_CLEANUP_DELAY;

/// A configuration variable held a value that could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a backend running locally.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the HTTP API.
    pub api_url: String,
    /// WebSocket URL of the progress endpoint.
    pub progress_ws_url: String,
    pub reconnect: ReconnectPolicy,
    /// How long finished tasks stay visible in the registry.
    pub eviction_grace: Duration,
    /// Delay before a settled task's bookkeeping is released.
    pub task_cleanup_delay: Duration,
    pub page_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            progress_ws_url: DEFAULT_PROGRESS_URL.to_string(),
            reconnect: ReconnectPolicy::default(),
            eviction_grace: DEFAULT_EVICTION_GRACE,
            task_cleanup_delay: DEFAULT_CLEANUP_DELAY,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                    | Default                           |
    /// |----------------------------|-----------------------------------|
    /// | `CLIPSEEK_API_URL`         | `http://localhost:8000`           |
    /// | `CLIPSEEK_PROGRESS_WS_URL` | `ws://localhost:8000/ws/progress` |
    /// | `RECONNECT_INTERVAL_MS`    | `3000`                            |
    /// | `RECONNECT_MAX_ATTEMPTS`   | unset (retry forever)             |
    /// | `EVICTION_GRACE_MS`        | `3000`                            |
    /// | `TASK_CLEANUP_MS`          | `1000`                            |
    /// | `PAGE_SIZE`                | `200`                             |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup`, which returns the raw value
    /// of a variable if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_url = lookup("CLIPSEEK_API_URL").unwrap_or(defaults.api_url);
        let progress_ws_url =
            lookup("CLIPSEEK_PROGRESS_WS_URL").unwrap_or(defaults.progress_ws_url);

        let interval = millis(&lookup, "RECONNECT_INTERVAL_MS")?
            .unwrap_or(DEFAULT_RECONNECT_INTERVAL);
        let max_attempts = match lookup("RECONNECT_MAX_ATTEMPTS") {
            Some(value) if !value.trim().is_empty() => {
                Some(value.trim().parse::<u32>().map_err(|_| ConfigError::Invalid {
                    var: "RECONNECT_MAX_ATTEMPTS",
                    value,
                    expected: "a non-negative integer",
                })?)
            }
            _ => None,
        };

        let eviction_grace = millis(&lookup, "EVICTION_GRACE_MS")?.unwrap_or(defaults.eviction_grace);
        let task_cleanup_delay =
            millis(&lookup, "TASK_CLEANUP_MS")?.unwrap_or(defaults.task_cleanup_delay);

        let page_size = match lookup("PAGE_SIZE") {
            Some(value) => {
                let parsed = value.trim().parse::<usize>();
                match parsed {
                    Ok(size) if (1..=MAX_PAGE_SIZE).contains(&size) => size,
                    _ => {
                        return Err(ConfigError::Invalid {
                            var: "PAGE_SIZE",
                            value,
                            expected: "an integer between 1 and 10000",
                        })
                    }
                }
            }
            None => defaults.page_size,
        };

        Ok(Self {
            api_url,
            progress_ws_url,
            reconnect: ReconnectPolicy {
                interval,
                max_attempts,
            },
            eviction_grace,
            task_cleanup_delay,
            page_size,
        })
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<u64>()
        .map(|ms| Some(Duration::from_millis(ms)))
        .map_err(|_| ConfigError::Invalid {
            var,
            value,
            expected: "a duration in milliseconds",
        })
}
