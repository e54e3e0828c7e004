//! Inbound frame handling.
//!
//! Runs on the connection manager's receive path and never awaits: replies
//! are enqueued and picked up by the sender loop.

use crate::connection::ConnectionState;
use crate::message::{ControlCommand, Message};
use crate::queue::OutboundQueue;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Interprets inbound messages from the remote.
#[derive(Clone)]
pub struct ProtocolHandler {
    queue: Arc<OutboundQueue>,
    state: watch::Receiver<ConnectionState>,
}

impl ProtocolHandler {
    pub fn new(queue: Arc<OutboundQueue>, state: watch::Receiver<ConnectionState>) -> Self {
        Self { queue, state }
    }

    /// Handle one decoded inbound message.
    pub fn handle(&self, message: Message) {
        match message {
            Message::Command { command } => self.handle_command(command),
            Message::Ack { filename } => match filename {
                Some(filename) => info!(filename = %filename, "Delivery acknowledged"),
                None => info!("Delivery acknowledged without filename"),
            },
            Message::Unknown => warn!("Ignoring message of unknown type"),
            Message::Image(_) | Message::Pong { .. } | Message::StatusResponse { .. } => {
                warn!(kind = message.kind(), "Ignoring outbound-only message from remote");
            }
        }
    }

    fn handle_command(&self, command: ControlCommand) {
        match command {
            ControlCommand::Ping => {
                debug!("Received ping");
                self.queue.enqueue(Message::pong());
            }
            ControlCommand::Status => {
                let connected = *self.state.borrow() == ConnectionState::Open;
                let queue_size = self.queue.len();
                debug!(connected, queue_size, "Received status request");
                self.queue
                    .enqueue(Message::status_response(connected, queue_size));
            }
            ControlCommand::Other(name) => {
                warn!(command = %name, "Ignoring unknown command");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ImageFrame;
    use std::time::Duration;

    fn handler(state: ConnectionState) -> (ProtocolHandler, Arc<OutboundQueue>) {
        let queue = Arc::new(OutboundQueue::new());
        let (_tx, rx) = watch::channel(state);
        (ProtocolHandler::new(queue.clone(), rx), queue)
    }

    async fn drain(queue: &OutboundQueue) -> Vec<Message> {
        let mut out = Vec::new();
        while let Some(message) = queue.dequeue(Duration::from_millis(5)).await {
            out.push(message);
        }
        out
    }

    #[tokio::test]
    async fn test_ping_enqueues_one_pong() {
        let (handler, queue) = handler(ConnectionState::Open);
        handler.handle(Message::ping());

        let replies = drain(&queue).await;
        assert_eq!(replies.len(), 1);
        assert!(matches!(replies[0], Message::Pong { timestamp } if timestamp > 0.0));
    }

    #[tokio::test]
    async fn test_status_reports_depth_before_reply() {
        let (handler, queue) = handler(ConnectionState::Open);
        queue.enqueue(Message::ack("a"));
        queue.enqueue(Message::ack("b"));

        handler.handle(Message::status_request());

        assert_eq!(queue.len(), 3);
        let replies = drain(&queue).await;
        match &replies[2] {
            Message::StatusResponse {
                connected,
                queue_size,
                ..
            } => {
                assert!(*connected);
                assert_eq!(*queue_size, 2);
            }
            other => panic!("expected status_response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_reports_disconnected() {
        let (handler, queue) = handler(ConnectionState::Connecting);
        handler.handle(Message::status_request());

        let replies = drain(&queue).await;
        assert!(matches!(
            replies.as_slice(),
            [Message::StatusResponse {
                connected: false,
                queue_size: 0,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn test_ignored_messages_enqueue_nothing() {
        let (handler, queue) = handler(ConnectionState::Open);

        handler.handle(Message::ack("cat.png"));
        handler.handle(Message::Ack { filename: None });
        handler.handle(Message::Command {
            command: ControlCommand::Other("reboot".into()),
        });
        handler.handle(Message::Unknown);
        handler.handle(Message::pong());
        handler.handle(Message::status_response(true, 1));
        handler.handle(Message::Image(ImageFrame {
            filename: "x.png".into(),
            file_path: "/x.png".into(),
            base64_data: String::new(),
            timestamp: 0.0,
        }));

        assert!(queue.is_empty());
    }
}
