//! In-process WebSocket server used to exercise the progress channel.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, WebSocketStream};

pub type ServerSocket = WebSocketStream<TcpStream>;

/// A running fake progress endpoint.
pub struct FakeServer {
    pub url: String,
    pub accepts: Arc<AtomicUsize>,
    accepted_rx: mpsc::UnboundedReceiver<usize>,
}

impl FakeServer {
    /// Start a server that hands every accepted WebSocket to `handler`
    /// together with its 1-based connection number.
    pub async fn start<F, Fut>(handler: F) -> Self
    where
        F: Fn(ServerSocket, usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepts = Arc::new(AtomicUsize::new(0));
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();

        let counter = Arc::clone(&accepts);
        let handler = Arc::new(handler);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let Ok(ws) = accept_async(stream).await else {
                    continue;
                };
                let number = counter.fetch_add(1, Ordering::SeqCst) + 1;
                let _ = accepted_tx.send(number);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move { handler(ws, number).await });
            }
        });

        Self {
            url: format!("ws://{addr}/ws/progress"),
            accepts,
            accepted_rx,
        }
    }

    pub fn accept_count(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }

    /// Wait for the next accepted connection, returning its number.
    pub async fn next_accept(&mut self, within: Duration) -> Option<usize> {
        tokio::time::timeout(within, self.accepted_rx.recv())
            .await
            .ok()
            .flatten()
    }
}

/// Serialize a progress event frame.
pub fn frame(json: serde_json::Value) -> tokio_tungstenite::tungstenite::Message {
    tokio_tungstenite::tungstenite::Message::Text(json.to_string())
}
