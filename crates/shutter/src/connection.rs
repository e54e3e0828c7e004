//! Connection manager: keeps a session open, or keeps trying.
//!
//! The manager is the only writer of [`ConnectionState`] while it runs;
//! everyone else holds a `watch::Receiver`. The client publishes the final
//! `Closed` state itself only after aborting a manager that missed the
//! shutdown deadline.

use crate::backoff::{ReconnectState, Retry};
use crate::error::{RelayError, RelayResult};
use crate::message::Message;
use crate::protocol::ProtocolHandler;
use crate::transport::{Connector, FrameSource, Session, SessionLink};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Why the manager stopped for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// `close()` was requested.
    Shutdown,
    /// `max_reconnect_attempts` consecutive failures.
    RetriesExhausted,
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
    Closed(CloseReason),
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed(_))
    }
}

/// Resolves once the stop flag is set, or once its sender is gone.
pub(crate) async fn stopped(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            return;
        }
    }
}

enum SessionEnd {
    Stopped,
    Lost,
}

/// Owns the session lifecycle and the inbound receive path.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    state: Arc<watch::Sender<ConnectionState>>,
    reconnect: ReconnectState,
    link: SessionLink,
    handler: ProtocolHandler,
    stop: watch::Receiver<bool>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        state: Arc<watch::Sender<ConnectionState>>,
        reconnect: ReconnectState,
        link: SessionLink,
        handler: ProtocolHandler,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            connector,
            state,
            reconnect,
            link,
            handler,
            stop,
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = ?previous, to = ?next, "Connection state changed");
        }
    }

    /// Run until stopped or until reconnect attempts are exhausted.
    ///
    /// Returns `Ok(())` after an orderly stop and `PermanentDisconnect` after
    /// giving up. The final state is `Closed` in both cases.
    pub async fn run(mut self) -> RelayResult<()> {
        loop {
            if *self.stop.borrow() {
                return self.shutdown().await;
            }

            self.set_state(ConnectionState::Connecting);
            let attempt = tokio::select! {
                _ = stopped(&mut self.stop) => None,
                result = self.connector.connect() => Some(result),
            };
            let Some(result) = attempt else {
                return self.shutdown().await;
            };

            match result {
                Ok(Session { sink, mut source }) => {
                    self.reconnect.record_open();
                    self.link.attach(sink).await;
                    self.set_state(ConnectionState::Open);
                    info!("Connection open");

                    let end = self.drive(source.as_mut()).await;
                    if matches!(end, SessionEnd::Stopped) || *self.stop.borrow() {
                        return self.shutdown().await;
                    }

                    self.set_state(ConnectionState::Disconnected);
                    warn!("Connection lost");
                    self.link.detach().await;
                }
                Err(e) => {
                    self.set_state(ConnectionState::Disconnected);
                    warn!(
                        error = %e,
                        attempt = self.reconnect.attempts() + 1,
                        "Connection attempt failed"
                    );
                }
            }

            match self.reconnect.record_failure() {
                Retry::GiveUp => {
                    let attempts = self.reconnect.attempts();
                    error!(attempts, "Reconnect attempts exhausted, giving up");
                    self.set_state(ConnectionState::Closed(CloseReason::RetriesExhausted));
                    return Err(RelayError::PermanentDisconnect { attempts });
                }
                Retry::After(delay) => {
                    info!(
                        attempt = self.reconnect.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "Reconnecting after backoff"
                    );
                    let interrupted = tokio::select! {
                        _ = stopped(&mut self.stop) => true,
                        _ = tokio::time::sleep(delay) => false,
                    };
                    if interrupted {
                        return self.shutdown().await;
                    }
                }
            }
        }
    }

    /// Service inbound frames until the session ends or a stop is requested.
    async fn drive(&mut self, source: &mut dyn FrameSource) -> SessionEnd {
        loop {
            let next = tokio::select! {
                _ = stopped(&mut self.stop) => return SessionEnd::Stopped,
                next = source.next_text() => next,
            };

            match next {
                Some(Ok(text)) => match Message::decode(&text) {
                    Ok(message) => {
                        debug!(kind = message.kind(), "Received message");
                        self.handler.handle(message);
                    }
                    Err(e) => warn!(error = %e, "Discarding malformed frame"),
                },
                Some(Err(e)) => {
                    warn!(error = %e, "Receive failed");
                    return SessionEnd::Lost;
                }
                None => return SessionEnd::Lost,
            }
        }
    }

    async fn shutdown(&mut self) -> RelayResult<()> {
        self.set_state(ConnectionState::Closing);
        if let Some(mut sink) = self.link.detach().await {
            if let Err(e) = sink.close().await {
                debug!(error = %e, "Error closing session");
            }
        }
        self.set_state(ConnectionState::Closed(CloseReason::Shutdown));
        info!("Connection manager stopped");
        Ok(())
    }
}
