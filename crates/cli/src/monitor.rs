//! Progress reporting for the terminal.
//!
//! Everything the registry records is logged through `tracing`, so the
//! log level (`RUST_LOG`) decides how chatty the binary is.

use clipseek_core::progress::ProgressEvent;
use clipseek_progress::registry::RegistryUpdate;
use clipseek_progress::status::ConnectionStatus;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};

/// One-line human readable summary of an event.
///
/// ```text
/// in_progress  40% [2/5] embedding: Searching images...
/// ```
pub fn describe(event: &ProgressEvent) -> String {
    let mut line = format!("{:<11} {:>3.0}%", event.status.to_string(), event.progress);
    if let (Some(number), Some(total)) = (event.current_step_number, event.total_steps) {
        line.push_str(&format!(" [{number}/{total}]"));
    }
    match (&event.current_step, &event.message) {
        (Some(step), Some(message)) => line.push_str(&format!(" {step}: {message}")),
        (Some(step), None) => line.push_str(&format!(" {step}")),
        (None, Some(message)) => line.push_str(&format!(" {message}")),
        (None, None) => {}
    }
    line
}

/// Log registry updates until the registry is dropped.
pub async fn log_registry_updates(mut updates: broadcast::Receiver<RegistryUpdate>) {
    loop {
        match updates.recv().await {
            Ok(RegistryUpdate::Recorded(event)) => {
                tracing::info!(task_id = %event.task_id, "{}", describe(&event));
            }
            Ok(RegistryUpdate::Evicted(task_id)) => {
                tracing::debug!(task_id = %task_id, "Task evicted");
            }
            Ok(RegistryUpdate::Cleared) => tracing::debug!("Task registry cleared"),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Progress display fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Log connection status transitions until the channel is dropped.
pub async fn log_connection_status(mut status: watch::Receiver<ConnectionStatus>) {
    while status.changed().await.is_ok() {
        let current = *status.borrow_and_update();
        match current {
            ConnectionStatus::Error => tracing::warn!(status = %current, "Progress channel"),
            _ => tracing::info!(status = %current, "Progress channel"),
        }
    }
}
