//! Best-effort removal of form artifacts.

use std::path::Path;
use tokio::fs;
use tracing::warn;

/// Deletes files and media bundles left behind by superseded or removed
/// records.
///
/// Removal never blocks a metadata mutation from completing: every failure
/// is logged and swallowed.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArtifactJanitor;

impl ArtifactJanitor {
    pub fn new() -> Self {
        Self
    }

    /// Remove a file, or a directory and its contents. A missing path is a
    /// successful no-op. Media bundles are one level deep by convention, so
    /// nested directories are removed as opaque units.
    pub async fn remove_file_or_tree(&self, path: &Path) {
        let meta = match fs::symlink_metadata(path).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to stat artifact");
                return;
            }
        };

        if meta.is_dir() {
            self.remove_dir_contents(path).await;
            if let Err(err) = fs::remove_dir(path).await {
                warn!(path = %path.display(), error = %err, "failed to remove artifact directory");
            }
        } else if let Err(err) = fs::remove_file(path).await {
            warn!(path = %path.display(), error = %err, "failed to remove artifact file");
        }
    }

    async fn remove_dir_contents(&self, dir: &Path) {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "failed to read artifact directory");
                return;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    let is_dir = entry
                        .file_type()
                        .await
                        .map(|kind| kind.is_dir())
                        .unwrap_or(false);
                    let result = if is_dir {
                        fs::remove_dir_all(&path).await
                    } else {
                        fs::remove_file(&path).await
                    };
                    if let Err(err) = result {
                        warn!(path = %path.display(), error = %err, "failed to remove artifact entry");
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "failed to read artifact directory");
                    break;
                }
            }
        }
    }
}
