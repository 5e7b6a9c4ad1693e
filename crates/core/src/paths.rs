//! Path resolution between root-relative storage paths and absolute paths.
//!
//! The catalog persists root-relative paths so the whole data directory can
//! move without rewriting rows. All filesystem work happens on absolute paths.

use std::path::{Path, PathBuf};

/// Capability translating between root-relative storage paths and absolute
/// filesystem paths.
///
/// Definition files and media bundles live under the forms root; derived
/// cache artifacts live under the cache root.
pub trait PathResolver: Send + Sync {
    /// Absolute location of a definition file or media directory path.
    fn absolute_form_path(&self, relative: &str) -> PathBuf;

    /// Root-relative rendering of a definition file or media directory path.
    fn relative_form_path(&self, absolute: &Path) -> String;

    /// Absolute location of a cache artifact path.
    fn absolute_cache_path(&self, relative: &str) -> PathBuf;

    /// Root-relative rendering of a cache artifact path.
    fn relative_cache_path(&self, absolute: &Path) -> String;
}

/// Directory layout rooted at a forms directory and a cache directory.
#[derive(Clone, Debug)]
pub struct StorageLayout {
    forms_root: PathBuf,
    cache_root: PathBuf,
}

impl StorageLayout {
    pub fn new(forms_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            forms_root: forms_root.into(),
            cache_root: cache_root.into(),
        }
    }

    // Already-absolute inputs pass through unchanged.
    fn absolutize(root: &Path, relative: &str) -> PathBuf {
        let path = Path::new(relative);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }

    // Paths outside the root (including already-relative ones) pass through.
    fn relativize(root: &Path, absolute: &Path) -> String {
        absolute
            .strip_prefix(root)
            .unwrap_or(absolute)
            .to_string_lossy()
            .into_owned()
    }
}

impl PathResolver for StorageLayout {
    fn absolute_form_path(&self, relative: &str) -> PathBuf {
        Self::absolutize(&self.forms_root, relative)
    }

    fn relative_form_path(&self, absolute: &Path) -> String {
        Self::relativize(&self.forms_root, absolute)
    }

    fn absolute_cache_path(&self, relative: &str) -> PathBuf {
        Self::absolutize(&self.cache_root, relative)
    }

    fn relative_cache_path(&self, absolute: &Path) -> String {
        Self::relativize(&self.cache_root, absolute)
    }
}

/// Conventional media directory for a definition file: the file path with
/// its extension replaced by a `-media` suffix.
pub fn media_dir_for(form_file_path: &str) -> String {
    let path = Path::new(form_file_path);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| form_file_path.to_string());
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent
            .join(format!("{stem}-media"))
            .to_string_lossy()
            .into_owned(),
        _ => format!("{stem}-media"),
    }
}

/// Conventional cache artifact name for a content hash.
pub fn cache_file_for(content_hash: &str) -> String {
    format!("{content_hash}.cache")
}
