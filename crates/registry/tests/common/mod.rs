// Shared fixtures for registry integration tests.

use satchel_core::hash::Sha256FileHasher;
use satchel_core::paths::StorageLayout;
use satchel_registry::{BroadcastNotifier, FormDraft, FormRegistry, SqliteFormStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestCatalog {
    pub registry: FormRegistry,
    pub notifier: Arc<BroadcastNotifier>,
    pub forms_dir: PathBuf,
    pub cache_dir: PathBuf,
    // Kept alive for the duration of the test.
    _temp: TempDir,
}

pub async fn catalog() -> TestCatalog {
    let temp = tempfile::tempdir().unwrap();
    let forms_dir = temp.path().join("forms");
    let cache_dir = temp.path().join("cache");
    tokio::fs::create_dir_all(&forms_dir).await.unwrap();
    tokio::fs::create_dir_all(&cache_dir).await.unwrap();

    let store = SqliteFormStore::new(temp.path().join("metadata/forms.db"), None)
        .await
        .unwrap();
    let layout = StorageLayout::new(&forms_dir, &cache_dir);
    let notifier = Arc::new(BroadcastNotifier::default());
    let registry = FormRegistry::new(
        Arc::new(store),
        Arc::new(layout),
        Arc::new(Sha256FileHasher),
    )
    .with_notifier(notifier.clone());

    TestCatalog {
        registry,
        notifier,
        forms_dir,
        cache_dir,
        _temp: temp,
    }
}

/// Write a definition file under the forms root and return its absolute path.
pub async fn write_form_file(forms_dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = forms_dir.join(name);
    tokio::fs::write(&path, contents).await.unwrap();
    path
}

/// A minimal valid draft for the given identifier and relative file path.
pub fn draft(form_id: &str, file: &str) -> FormDraft {
    FormDraft {
        form_id: form_id.to_string(),
        form_file_path: file.to_string(),
        ..Default::default()
    }
}
