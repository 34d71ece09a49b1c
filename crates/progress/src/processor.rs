//! WebSocket frame processing loop.
//!
//! Reads raw frames from the progress connection, parses text frames
//! into [`ProgressEvent`](clipseek_core::progress::ProgressEvent)s and
//! records them in the [`TaskRegistry`]. Malformed frames are logged and
//! dropped without touching the connection.

use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::ProgressStream;
use crate::messages::parse_message;
use crate::registry::TaskRegistry;

/// How a session ended. Only clean endings suppress reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The server completed a close handshake.
    Clean,
    /// The local side closed the connection on request.
    Stopped,
    /// The stream ended without a close handshake.
    Dropped,
    /// A receive error occurred.
    Failed,
}

impl SessionEnd {
    /// `true` if the channel should try to reconnect.
    pub fn should_reconnect(self) -> bool {
        matches!(self, Self::Dropped | Self::Failed)
    }
}

/// Process frames from a progress connection until it ends or `cancel`
/// fires.
///
/// `on_first_frame` runs once, when the first frame other than a Close
/// arrives; the session counts as established from then on. On
/// cancellation a Close frame is sent so the server sees a clean
/// shutdown.
pub async fn process_messages(
    ws_stream: &mut ProgressStream,
    registry: &TaskRegistry,
    cancel: &CancellationToken,
    on_first_frame: impl FnOnce(),
) -> SessionEnd {
    let mut on_first_frame = Some(on_first_frame);
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = ws_stream.close(None).await {
                    tracing::debug!(error = %e, "Close handshake failed during disconnect");
                }
                return SessionEnd::Stopped;
            }
            next = ws_stream.next() => next,
        };

        if let Some(Ok(msg)) = &next {
            if !msg.is_close() {
                if let Some(established) = on_first_frame.take() {
                    established();
                }
            }
        }

        match next {
            Some(Ok(Message::Text(text))) => {
                handle_text_message(&text, registry);
            }
            Some(Ok(Message::Binary(_))) => {
                tracing::trace!("Ignoring binary frame on progress channel");
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                // Handled automatically by tungstenite.
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(?frame, "Progress WebSocket closed by server");
                return SessionEnd::Clean;
            }
            Some(Ok(Message::Frame(_))) => {}
            Some(Err(e)) => {
                tracing::error!(error = %e, "Progress WebSocket receive error");
                return SessionEnd::Failed;
            }
            None => {
                tracing::warn!("Progress WebSocket stream ended without close handshake");
                return SessionEnd::Dropped;
            }
        }
    }
}

/// Parse a single text frame and record it.
fn handle_text_message(text: &str, registry: &TaskRegistry) {
    match parse_message(text) {
        Ok(event) => {
            tracing::debug!(
                task_id = %event.task_id,
                status = %event.status,
                progress = event.progress,
                "Progress update",
            );
            registry.record(event);
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                raw_message = %text,
                "Failed to parse progress message",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unclean_endings_reconnect() {
        assert!(!SessionEnd::Clean.should_reconnect());
        assert!(!SessionEnd::Stopped.should_reconnect());
        assert!(SessionEnd::Dropped.should_reconnect());
        assert!(SessionEnd::Failed.should_reconnect());
    }

    #[tokio::test]
    async fn malformed_text_is_dropped() {
        let registry = TaskRegistry::default();
        handle_text_message("not json", &registry);
        handle_text_message(r#"{"task_id":"a","status":"in_progress","progress":5}"#, &registry);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").unwrap().progress, 5.0);
    }
}
