//! Shutter: reconnecting image relay over WebSocket.
//!
//! New image files are read, base64-encoded and queued; a sender loop
//! delivers them over a long-lived WebSocket session that a connection
//! manager keeps open with linear, capped backoff. The remote can ping the
//! client, ask for its status and acknowledge deliveries on the same socket.
//!
//! # Architecture
//!
//! ```text
//! watcher -> ShutterClient::submit -> OutboundQueue -> SenderLoop -> socket
//!                                          ^                          |
//!                                          |___ ProtocolHandler <_____|
//!                                               (ConnectionManager)
//! ```
//!
//! # Delivery
//!
//! A message leaves the queue only after the transport accepted the write.
//! Failed writes and messages dequeued while disconnected go back to the
//! tail, so order is best-effort once a retry has happened.

pub mod artifact;
pub mod backoff;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;
pub mod queue;
pub mod sender;
pub mod transport;
pub mod watcher;

#[cfg(test)]
mod tests;

pub use backoff::{ReconnectPolicy, ReconnectState, Retry};
pub use client::ShutterClient;
pub use config::RelayConfig;
pub use connection::{CloseReason, ConnectionState};
pub use error::{RelayError, RelayResult};
pub use message::{ControlCommand, ImageFrame, Message};
pub use queue::OutboundQueue;
pub use transport::{Connector, FrameSink, FrameSource, Session, WsConnector};
pub use watcher::{is_image_path, ImageWatcher};
