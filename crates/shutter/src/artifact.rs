//! Builds `image` messages from files on disk.

use crate::error::{RelayError, RelayResult};
use crate::message::{now_timestamp, ImageFrame, Message};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;

/// Read `path` and wrap its contents in an `image` message stamped now.
pub async fn image_from_path(path: &Path) -> RelayResult<Message> {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| RelayError::InvalidConfig(format!("no file name in {}", path.display())))?;

    let bytes = tokio::fs::read(path).await?;

    Ok(Message::Image(ImageFrame {
        filename,
        file_path: path.display().to_string(),
        base64_data: STANDARD.encode(&bytes),
        timestamp: now_timestamp(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_image_from_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.png");
        std::fs::write(&path, b"hello").unwrap();

        let message = image_from_path(&path).await.unwrap();
        match message {
            Message::Image(frame) => {
                assert_eq!(frame.filename, "frame.png");
                assert_eq!(frame.file_path, path.display().to_string());
                assert_eq!(frame.base64_data, "aGVsbG8=");
                assert!(frame.timestamp > 0.0);
            }
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_file_encodes_to_empty_payload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.jpg");
        std::fs::write(&path, b"").unwrap();

        let Message::Image(frame) = image_from_path(&path).await.unwrap() else {
            panic!("expected image");
        };
        assert_eq!(frame.base64_data, "");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = image_from_path(&dir.path().join("gone.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Io(_)));
    }
}
