//! Sender loop: drains the outbound queue into the open session.

use crate::config::RelayConfig;
use crate::connection::{stopped, ConnectionState};
use crate::queue::OutboundQueue;
use crate::transport::SessionLink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Moves messages from the queue to the transport.
///
/// A message leaves the queue for good only once the transport accepted the
/// write; every other outcome puts it back at the tail. The loop ends on the
/// stop signal or once the connection is closed for good.
pub struct SenderLoop {
    queue: Arc<OutboundQueue>,
    state: watch::Receiver<ConnectionState>,
    link: SessionLink,
    dequeue_timeout: Duration,
    disconnected_pause: Duration,
    stop: watch::Receiver<bool>,
}

impl SenderLoop {
    pub fn new(
        config: &RelayConfig,
        queue: Arc<OutboundQueue>,
        state: watch::Receiver<ConnectionState>,
        link: SessionLink,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            state,
            link,
            dequeue_timeout: config.dequeue_timeout,
            disconnected_pause: config.disconnected_pause,
            stop,
        }
    }

    /// Run until the stop signal is raised.
    pub async fn run(mut self) {
        debug!("Sender loop started");

        loop {
            if self.state.borrow().is_closed() {
                break;
            }

            let next = tokio::select! {
                _ = stopped(&mut self.stop) => break,
                next = self.queue.dequeue(self.dequeue_timeout) => next,
            };
            let Some(message) = next else {
                continue;
            };

            let state = *self.state.borrow();
            if state.is_closed() {
                self.queue.requeue(message);
                break;
            }
            if !state.is_open() {
                self.queue.requeue(message);
                let interrupted = tokio::select! {
                    _ = stopped(&mut self.stop) => true,
                    _ = tokio::time::sleep(self.disconnected_pause) => false,
                };
                if interrupted {
                    break;
                }
                continue;
            }

            let text = match message.encode() {
                Ok(text) => text,
                Err(e) => {
                    error!(kind = message.kind(), error = %e, "Dropping message that failed to encode");
                    continue;
                }
            };

            let sent = tokio::select! {
                _ = stopped(&mut self.stop) => None,
                result = self.link.transmit(text) => Some(result),
            };
            match sent {
                Some(Ok(())) => debug!(kind = message.kind(), "Message sent"),
                Some(Err(e)) if e.is_transport() => {
                    warn!(kind = message.kind(), error = %e, "Send failed, re-queueing");
                    self.queue.requeue(message);
                }
                Some(Err(e)) => {
                    error!(kind = message.kind(), error = %e, "Unexpected send error, re-queueing");
                    self.queue.requeue(message);
                }
                None => {
                    self.queue.requeue(message);
                    break;
                }
            }
        }

        info!(pending = self.queue.len(), "Sender loop stopped");
    }
}
