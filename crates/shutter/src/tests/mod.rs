//! Integration tests for the Shutter client.
//!
//! - `harness.rs`  - Mock connector, loopback WebSocket server and helpers
//! - `delivery.rs` - Queue draining, retry on write failure, offline buffering
//! - `reconnect.rs` - Backoff, attempt reset and permanent disconnect
//! - `commands.rs` - ping / status / ack handling on the receive path
//! - `shutdown.rs` - close() semantics and forced teardown
//! - `websocket.rs` - The real WebSocket transport against a loopback server
//! - `watcher.rs`  - Directory watcher feeding the client
