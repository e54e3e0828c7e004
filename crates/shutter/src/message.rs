//! Wire messages exchanged with the remote endpoint.
//!
//! Every frame is a JSON object tagged by `type`:
//!
//! ```text
//! image            -> { filename, file_path, base64_data, timestamp }   (outbound)
//! pong             -> { timestamp }                                     (outbound)
//! status_response  -> { connected, queue_size, timestamp }              (outbound)
//! command          -> { command: "ping" | "status" | <other> }          (inbound)
//! ack              -> { filename }                                      (inbound)
//! ```
//!
//! Unknown `type` values decode to [`Message::Unknown`] so the protocol
//! handler can log and drop them.

use crate::error::{RelayError, RelayResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current time as fractional UNIX seconds.
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// A captured image ready for transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFrame {
    /// Final path component.
    pub filename: String,
    /// Full path as seen by the producer.
    pub file_path: String,
    /// File contents, base64 (standard alphabet, padded).
    pub base64_data: String,
    /// Capture time in fractional UNIX seconds.
    pub timestamp: f64,
}

/// Command name carried by an inbound `command` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ControlCommand {
    Ping,
    Status,
    /// A command this client does not understand; kept for logging.
    Other(String),
}

impl From<String> for ControlCommand {
    fn from(name: String) -> Self {
        match name.as_str() {
            "ping" => ControlCommand::Ping,
            "status" => ControlCommand::Status,
            _ => ControlCommand::Other(name),
        }
    }
}

impl From<ControlCommand> for String {
    fn from(command: ControlCommand) -> Self {
        match command {
            ControlCommand::Ping => "ping".to_string(),
            ControlCommand::Status => "status".to_string(),
            ControlCommand::Other(name) => name,
        }
    }
}

/// One frame on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Image(ImageFrame),
    Command {
        command: ControlCommand,
    },
    Ack {
        #[serde(default)]
        filename: Option<String>,
    },
    Pong {
        timestamp: f64,
    },
    StatusResponse {
        connected: bool,
        queue_size: usize,
        timestamp: f64,
    },
    #[serde(other)]
    Unknown,
}

impl Message {
    /// Reply to a ping, stamped now.
    pub fn pong() -> Self {
        Message::Pong {
            timestamp: now_timestamp(),
        }
    }

    /// Reply to a status request, stamped now.
    pub fn status_response(connected: bool, queue_size: usize) -> Self {
        Message::StatusResponse {
            connected,
            queue_size,
            timestamp: now_timestamp(),
        }
    }

    /// A `ping` command, as sent by the remote.
    pub fn ping() -> Self {
        Message::Command {
            command: ControlCommand::Ping,
        }
    }

    /// A `status` command, as sent by the remote.
    pub fn status_request() -> Self {
        Message::Command {
            command: ControlCommand::Status,
        }
    }

    /// An acknowledgement for `filename`, as sent by the remote.
    pub fn ack(filename: impl Into<String>) -> Self {
        Message::Ack {
            filename: Some(filename.into()),
        }
    }

    /// Stable kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Image(_) => "image",
            Message::Command { .. } => "command",
            Message::Ack { .. } => "ack",
            Message::Pong { .. } => "pong",
            Message::StatusResponse { .. } => "status_response",
            Message::Unknown => "unknown",
        }
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> RelayResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a JSON text frame.
    pub fn decode(text: &str) -> RelayResult<Self> {
        serde_json::from_str(text).map_err(|e| RelayError::Protocol(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn to_value(message: &Message) -> Value {
        serde_json::from_str(&message.encode().unwrap()).unwrap()
    }

    #[test]
    fn test_image_wire_fields() {
        let message = Message::Image(ImageFrame {
            filename: "cat.png".into(),
            file_path: "/images/cat.png".into(),
            base64_data: "aGVsbG8=".into(),
            timestamp: 1700000000.25,
        });

        assert_eq!(
            to_value(&message),
            json!({
                "type": "image",
                "filename": "cat.png",
                "file_path": "/images/cat.png",
                "base64_data": "aGVsbG8=",
                "timestamp": 1700000000.25
            })
        );
    }

    #[test]
    fn test_status_response_wire_fields() {
        let value = to_value(&Message::status_response(true, 4));
        assert_eq!(value["type"], "status_response");
        assert_eq!(value["connected"], true);
        assert_eq!(value["queue_size"], 4);
        assert!(value["timestamp"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_pong_wire_fields() {
        let value = to_value(&Message::pong());
        assert_eq!(value["type"], "pong");
        assert!(value["timestamp"].is_f64());
    }

    #[test]
    fn test_decode_commands() {
        assert_eq!(
            Message::decode(r#"{"type":"command","command":"ping"}"#).unwrap(),
            Message::ping()
        );
        assert_eq!(
            Message::decode(r#"{"type":"command","command":"status"}"#).unwrap(),
            Message::status_request()
        );
        assert_eq!(
            Message::decode(r#"{"type":"command","command":"reboot"}"#).unwrap(),
            Message::Command {
                command: ControlCommand::Other("reboot".into())
            }
        );
    }

    #[test]
    fn test_decode_ack_with_and_without_filename() {
        assert_eq!(
            Message::decode(r#"{"type":"ack","filename":"cat.png"}"#).unwrap(),
            Message::ack("cat.png")
        );
        assert_eq!(
            Message::decode(r#"{"type":"ack"}"#).unwrap(),
            Message::Ack { filename: None }
        );
    }

    #[test]
    fn test_decode_unknown_type() {
        let message = Message::decode(r#"{"type":"reconfigure","level":3}"#).unwrap();
        assert_eq!(message, Message::Unknown);
        assert_eq!(message.kind(), "unknown");
    }

    #[test]
    fn test_decode_malformed_is_protocol_error() {
        for text in ["not json", "42", r#"{"command":"ping"}"#, r#"{"type":"command"}"#] {
            let err = Message::decode(text).unwrap_err();
            assert!(matches!(err, RelayError::Protocol(_)), "{text}: {err}");
        }
    }

    #[test]
    fn test_timestamp_has_subsecond_precision() {
        let ts = now_timestamp();
        assert!(ts > 1_600_000_000.0);
    }
}
