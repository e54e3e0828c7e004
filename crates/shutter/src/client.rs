//! Client facade.
//!
//! Owns the outbound queue and spawns the connection manager and the sender
//! loop. Producers only ever see this type.

use crate::artifact::image_from_path;
use crate::backoff::{ReconnectPolicy, ReconnectState};
use crate::config::RelayConfig;
use crate::connection::{CloseReason, ConnectionManager, ConnectionState};
use crate::error::{RelayError, RelayResult};
use crate::message::Message;
use crate::protocol::ProtocolHandler;
use crate::queue::OutboundQueue;
use crate::sender::SenderLoop;
use crate::transport::{Connector, SessionLink, WsConnector};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

struct Tasks {
    manager: JoinHandle<RelayResult<()>>,
    sender: JoinHandle<()>,
}

/// Reconnecting delivery client.
pub struct ShutterClient {
    config: RelayConfig,
    connector: Arc<dyn Connector>,
    queue: Arc<OutboundQueue>,
    link: SessionLink,
    state_rx: watch::Receiver<ConnectionState>,
    /// Shared with the connection manager, which drives every transition.
    state_tx: Arc<watch::Sender<ConnectionState>>,
    stop_tx: watch::Sender<bool>,
    tasks: Mutex<Option<Tasks>>,
    started: AtomicBool,
    closed: AtomicBool,
}

impl ShutterClient {
    /// Create a client that connects over WebSocket.
    pub fn new(config: RelayConfig) -> RelayResult<Self> {
        let connector = Arc::new(WsConnector::new(config.url.clone(), config.api_key.clone()));
        Self::with_connector(config, connector)
    }

    /// Create a client over a custom transport.
    pub fn with_connector(config: RelayConfig, connector: Arc<dyn Connector>) -> RelayResult<Self> {
        config.validate()?;

        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (stop_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            connector,
            queue: Arc::new(OutboundQueue::new()),
            link: SessionLink::new(),
            state_rx,
            state_tx: Arc::new(state_tx),
            stop_tx,
            tasks: Mutex::new(None),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Spawn the connection manager and the sender loop.
    ///
    /// Must be called from within a tokio runtime. Calling it again, or after
    /// `close()`, does nothing.
    pub fn start(&self) {
        if self.closed.load(Ordering::SeqCst) {
            debug!("Client already closed, not starting");
            return;
        }
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Client already started");
            return;
        }

        info!(url = %self.config.url, "Starting client");

        let handler = ProtocolHandler::new(self.queue.clone(), self.state_rx.clone());
        let manager = ConnectionManager::new(
            self.connector.clone(),
            self.state_tx.clone(),
            ReconnectState::new(ReconnectPolicy::from(&self.config)),
            self.link.clone(),
            handler,
            self.stop_tx.subscribe(),
        );
        let sender = SenderLoop::new(
            &self.config,
            self.queue.clone(),
            self.state_rx.clone(),
            self.link.clone(),
            self.stop_tx.subscribe(),
        );

        *self.tasks.lock() = Some(Tasks {
            manager: tokio::spawn(manager.run()),
            sender: tokio::spawn(sender.run()),
        });
    }

    /// Queue a message for delivery. Never blocks.
    pub fn submit(&self, message: Message) {
        self.queue.enqueue(message);
    }

    /// Read an image file and queue it for delivery.
    pub async fn submit_file(&self, path: impl AsRef<Path>) -> RelayResult<()> {
        let path = path.as_ref();
        let message = image_from_path(path).await?;
        info!(path = %path.display(), "Queued image");
        self.submit(message);
        Ok(())
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_open()
    }

    /// Messages waiting to be sent.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Wait until the client reaches `Closed` and return why.
    pub async fn closed(&self) -> CloseReason {
        let mut state = self.state_rx.clone();
        loop {
            if let ConnectionState::Closed(reason) = *state.borrow_and_update() {
                return reason;
            }
            if state.changed().await.is_err() {
                return CloseReason::Shutdown;
            }
        }
    }

    /// Stop both loops and close the session.
    ///
    /// Waits up to `shutdown_timeout`; past that the tasks are aborted and
    /// `ShutdownTimeout` is returned. Only the first call does anything.
    pub async fn close(&self) -> RelayResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        info!("Closing client");
        self.stop_tx.send_replace(true);

        let tasks = self.tasks.lock().take();
        let Some(Tasks {
            mut manager,
            mut sender,
        }) = tasks
        else {
            self.publish_closed();
            return Ok(());
        };

        let timeout = self.config.shutdown_timeout;
        let joined = tokio::time::timeout(timeout, async {
            let manager_result = (&mut manager).await;
            let sender_result = (&mut sender).await;
            (manager_result, sender_result)
        })
        .await;

        match joined {
            Ok((manager_result, sender_result)) => {
                match manager_result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) if e.is_terminal() => {
                        debug!(error = %e, "Connection manager had already stopped")
                    }
                    Ok(Err(e)) => error!(error = %e, "Connection manager stopped with error"),
                    Err(e) => error!(error = %e, "Connection manager task failed"),
                }
                // A panicked manager leaves no final state behind.
                self.publish_closed();
                if let Err(e) = sender_result {
                    error!(error = %e, "Sender task failed");
                }
                info!(pending = self.queue.len(), "Client closed");
                Ok(())
            }
            Err(_) => {
                manager.abort();
                sender.abort();
                // Wait for cancellation so no late manager write can follow ours.
                let _ = manager.await;
                let _ = sender.await;
                self.publish_closed();
                warn!(timeout_ms = timeout.as_millis() as u64, "Shutdown timed out, tasks aborted");
                Err(RelayError::ShutdownTimeout(timeout))
            }
        }
    }

    /// Move to `Closed(Shutdown)` unless a final state is already set.
    fn publish_closed(&self) {
        self.state_tx.send_if_modified(|state| {
            if state.is_closed() {
                return false;
            }
            *state = ConnectionState::Closed(CloseReason::Shutdown);
            true
        });
    }
}
