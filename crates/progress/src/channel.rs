//! The shared progress channel service.
//!
//! [`ProgressChannel`] owns exactly one logical WebSocket connection to
//! the progress endpoint no matter how many consumers need progress data.
//! Consumers call [`ProgressChannel::subscribe`] and hold the returned
//! [`ChannelSubscription`]: the first subscription connects, dropping the
//! last one disconnects.
//!
//! A background task runs the connect -> process -> reconnect loop.
//! Unclean endings are retried per [`ReconnectPolicy`]; clean closes and
//! local disconnects are not. The current [`ConnectionStatus`] is
//! published on a [`tokio::sync::watch`] channel.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::client::ProgressClient;
use crate::processor::{process_messages, SessionEnd};
use crate::reconnect::{wait_for_retry, ReconnectPolicy};
use crate::registry::TaskRegistry;
use crate::status::ConnectionStatus;

/// Default progress endpoint.
pub const DEFAULT_PROGRESS_URL: &str = "ws://localhost:8000/ws/progress";

/// How long [`ProgressChannel::shutdown`] waits for the connection task.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Channel configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket URL of the progress endpoint.
    pub url: String,
    pub reconnect: ReconnectPolicy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PROGRESS_URL.to_string(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Reference-counted owner of the progress WebSocket.
///
/// Created once at application start via [`ProgressChannel::new`]; the
/// returned `Arc` is injected into every consumer.
pub struct ProgressChannel {
    client: ProgressClient,
    policy: ReconnectPolicy,
    registry: TaskRegistry,
    status_tx: watch::Sender<ConnectionStatus>,
    /// Consecutive failed sessions. Reset once a session receives its
    /// first frame, so a server that accepts and immediately drops the
    /// connection still counts against the cap.
    attempts: AtomicU32,
    /// Incremented for every new session so a stale loop cannot
    /// overwrite the status of its successor.
    generation: AtomicU64,
    state: Mutex<ChannelState>,
}

#[derive(Default)]
struct ChannelState {
    subscribers: usize,
    session: Option<Session>,
}

/// The running connection task.
struct Session {
    cancel: CancellationToken,
    task_handle: tokio::task::JoinHandle<()>,
}

/// RAII handle keeping the channel connected.
///
/// Dropping the last subscription disconnects the channel.
pub struct ChannelSubscription {
    channel: Arc<ProgressChannel>,
}

impl ChannelSubscription {
    pub fn channel(&self) -> &Arc<ProgressChannel> {
        &self.channel
    }
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        self.channel.release();
    }
}

impl ProgressChannel {
    /// Create the channel. No connection is made until the first
    /// [`subscribe`](Self::subscribe) or [`connect`](Self::connect).
    pub fn new(config: ChannelConfig, registry: TaskRegistry) -> Arc<Self> {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        Arc::new(Self {
            client: ProgressClient::new(config.url),
            policy: config.reconnect,
            registry,
            status_tx,
            attempts: AtomicU32::new(0),
            generation: AtomicU64::new(0),
            state: Mutex::new(ChannelState::default()),
        })
    }

    /// The registry events are recorded into.
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    /// Observe connection status changes.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Consecutive failed sessions since the last session that received
    /// a frame, or since the last manual reconnect.
    pub fn reconnect_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Number of live [`ChannelSubscription`]s.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers
    }

    /// Register a consumer. The first subscription connects.
    pub fn subscribe(self: &Arc<Self>) -> ChannelSubscription {
        let mut state = self.lock();
        state.subscribers += 1;
        tracing::debug!(subscribers = state.subscribers, "Progress channel subscribed");
        if state.subscribers == 1 {
            self.connect_locked(&mut state);
        }
        ChannelSubscription {
            channel: Arc::clone(self),
        }
    }

    /// Start the connection task. No-op while one is already running.
    pub fn connect(self: &Arc<Self>) {
        let mut state = self.lock();
        self.connect_locked(&mut state);
    }

    /// Close the connection cleanly and stop reconnecting.
    pub fn disconnect(&self) {
        let session = self.lock().session.take();
        if let Some(session) = session {
            tracing::info!("Disconnecting progress channel");
            session.cancel.cancel();
        }
        // Stale loops are fenced off from status updates from here on.
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.status_tx.send_replace(ConnectionStatus::Disconnected);
    }

    /// Drop the current connection (if any) and connect again
    /// immediately, resetting the retry counter.
    pub fn reconnect(self: &Arc<Self>) {
        tracing::info!("Manual reconnect of progress channel");
        self.attempts.store(0, Ordering::SeqCst);
        let mut state = self.lock();
        if let Some(old) = state.session.take() {
            old.cancel.cancel();
        }
        self.spawn_session(&mut state);
    }

    /// Disconnect and wait for the connection task to finish.
    pub async fn shutdown(&self) {
        let session = self.lock().session.take();
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(session) = session {
            session.cancel.cancel();
            let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, session.task_handle).await;
        }
        self.status_tx.send_replace(ConnectionStatus::Disconnected);
        tracing::info!("Progress channel shut down");
    }

    // ---- private helpers ----

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self) {
        let mut state = self.lock();
        state.subscribers = state.subscribers.saturating_sub(1);
        tracing::debug!(subscribers = state.subscribers, "Progress channel unsubscribed");
        if state.subscribers == 0 {
            drop(state);
            self.disconnect();
        }
    }

    fn connect_locked(self: &Arc<Self>, state: &mut ChannelState) {
        let running = state
            .session
            .as_ref()
            .is_some_and(|s| !s.task_handle.is_finished());
        if running {
            return;
        }
        self.spawn_session(state);
    }

    fn spawn_session(self: &Arc<Self>, state: &mut ChannelState) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let this = Arc::clone(self);
        let cancel_clone = cancel.clone();

        let task_handle = tokio::spawn(async move {
            this.run_connection_loop(generation, &cancel_clone).await;
            tracing::debug!(generation, "Progress connection task exited");
        });

        state.session = Some(Session {
            cancel,
            task_handle,
        });
    }

    fn set_status(&self, generation: u64, status: ConnectionStatus) {
        if self.generation.load(Ordering::SeqCst) == generation {
            self.status_tx.send_replace(status);
        }
    }

    /// Core connection loop: connect -> process frames -> reconnect.
    ///
    /// Runs until cancelled, until a clean close, or until the reconnect
    /// policy gives up.
    async fn run_connection_loop(&self, generation: u64, cancel: &CancellationToken) {
        loop {
            self.set_status(generation, ConnectionStatus::Connecting);

            let end = tokio::select! {
                _ = cancel.cancelled() => SessionEnd::Stopped,
                result = self.client.connect() => match result {
                    Ok(mut conn) => {
                        self.set_status(generation, ConnectionStatus::Connected);
                        process_messages(&mut conn.ws_stream, &self.registry, cancel, || {
                            self.attempts.store(0, Ordering::SeqCst);
                        })
                        .await
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Progress connection failed");
                        SessionEnd::Failed
                    }
                },
            };

            let status = match end {
                SessionEnd::Failed => ConnectionStatus::Error,
                _ => ConnectionStatus::Disconnected,
            };
            self.set_status(generation, status);

            if !end.should_reconnect() {
                if end == SessionEnd::Clean {
                    tracing::info!("Progress channel closed cleanly, not reconnecting");
                }
                return;
            }

            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.policy.allows(attempt) {
                tracing::warn!(
                    attempt,
                    max_attempts = ?self.policy.max_attempts,
                    "Giving up on progress channel reconnection",
                );
                self.set_status(generation, ConnectionStatus::Disconnected);
                return;
            }

            if !wait_for_retry(&self.policy, attempt, cancel).await {
                self.set_status(generation, ConnectionStatus::Disconnected);
                return;
            }
        }
    }
}
