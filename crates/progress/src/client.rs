//! WebSocket client for the progress endpoint.
//!
//! [`ProgressClient`] holds the endpoint configuration. Call
//! [`ProgressClient::connect`] to establish a live [`ProgressConnection`].

use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// The raw WebSocket stream type used for progress connections.
pub type ProgressStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for the progress endpoint.
#[derive(Debug, Clone)]
pub struct ProgressClient {
    ws_url: String,
}

/// A live WebSocket connection to the progress endpoint.
pub struct ProgressConnection {
    /// The raw WebSocket stream for reading frames.
    pub ws_stream: ProgressStream,
}

impl ProgressClient {
    /// Create a client for the given WebSocket URL,
    /// e.g. `ws://localhost:8000/ws/progress`.
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
        }
    }

    /// WebSocket URL of the progress endpoint.
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Connect to the progress endpoint.
    ///
    /// The channel is receive-only; no handshake payload is sent after
    /// the upgrade.
    pub async fn connect(&self) -> Result<ProgressConnection, ProgressClientError> {
        let (ws_stream, _response) = connect_async(self.ws_url.as_str()).await.map_err(|e| {
            ProgressClientError::Connection(format!(
                "Failed to connect to progress endpoint at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(url = %self.ws_url, "Connected to progress endpoint");

        Ok(ProgressConnection { ws_stream })
    }
}

/// Errors that can occur when working with the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum ProgressClientError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}
