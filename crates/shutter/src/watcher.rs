//! Directory watcher that feeds new image files to the client.

use crate::client::ShutterClient;
use crate::error::RelayResult;
use notify::event::CreateKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// File extensions treated as images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"];

/// Whether `path` has an image extension.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Image files created by `event`.
fn created_images(event: &Event) -> Vec<PathBuf> {
    if !matches!(event.kind, EventKind::Create(kind) if kind != CreateKind::Folder) {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter(|path| is_image_path(path) && !path.is_dir())
        .cloned()
        .collect()
}

/// Watches a directory tree and submits new images after a settle delay.
pub struct ImageWatcher {
    dir: PathBuf,
    settle: Duration,
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    /// Kept alive for the lifetime of the watcher.
    _watcher: RecommendedWatcher,
}

impl ImageWatcher {
    /// Start watching `dir` recursively.
    pub fn new(dir: impl Into<PathBuf>, settle: Duration) -> RelayResult<Self> {
        let dir = dir.into();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            let _ = tx.send(result);
        })?;
        watcher.watch(&dir, RecursiveMode::Recursive)?;

        Ok(Self {
            dir,
            settle,
            rx,
            _watcher: watcher,
        })
    }

    /// Directory being watched.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Forward new images to `client` until the watcher is dropped.
    pub async fn run(mut self, client: Arc<ShutterClient>) {
        info!(dir = %self.dir.display(), "Watching for images");

        while let Some(result) = self.rx.recv().await {
            match result {
                Ok(event) => {
                    for path in created_images(&event) {
                        debug!(path = %path.display(), "New image detected");
                        let client = client.clone();
                        let settle = self.settle;
                        tokio::spawn(async move {
                            // Let the writer finish before reading.
                            tokio::time::sleep(settle).await;
                            if let Err(e) = client.submit_file(&path).await {
                                error!(path = %path.display(), error = %e, "Failed to queue image");
                            }
                        });
                    }
                }
                Err(e) => error!(error = %e, "Watch error"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{ModifyKind, RemoveKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event {
            kind,
            paths: vec![PathBuf::from(path)],
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_is_image_path() {
        for path in [
            "a.jpg", "a.JPEG", "dir/b.png", "c.gif", "d.bmp", "e.TIFF", "f.webp",
        ] {
            assert!(is_image_path(Path::new(path)), "{path}");
        }
        for path in ["a.txt", "png", "a.png.tmp", "a.", "noext", "a.tif"] {
            assert!(!is_image_path(Path::new(path)), "{path}");
        }
    }

    #[test]
    fn test_created_images_filters_kind_and_extension() {
        let created = event(EventKind::Create(CreateKind::File), "/images/cat.png");
        assert_eq!(created_images(&created), vec![PathBuf::from("/images/cat.png")]);

        let any = event(EventKind::Create(CreateKind::Any), "/images/cat.jpg");
        assert_eq!(created_images(&any).len(), 1);

        let text = event(EventKind::Create(CreateKind::File), "/images/notes.txt");
        assert!(created_images(&text).is_empty());

        let folder = event(EventKind::Create(CreateKind::Folder), "/images/album.png");
        assert!(created_images(&folder).is_empty());

        let modified = event(EventKind::Modify(ModifyKind::Any), "/images/cat.png");
        assert!(created_images(&modified).is_empty());

        let removed = event(EventKind::Remove(RemoveKind::File), "/images/cat.png");
        assert!(created_images(&removed).is_empty());
    }
}
