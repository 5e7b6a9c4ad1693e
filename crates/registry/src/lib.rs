//! Form metadata registry for the Satchel catalog.
//!
//! This crate provides the catalog control plane:
//! - The `forms` table data model and typed filter language
//! - A SQLite-backed record store
//! - The mutation engine coupling records to their on-disk artifacts
//! - A computed latest-version-per-form view
//! - Best-effort artifact cleanup and change notification

pub mod error;
pub mod janitor;
pub mod models;
pub mod notify;
pub mod registry;
pub mod store;

pub use error::{RegistryError, RegistryResult};
pub use janitor::ArtifactJanitor;
pub use models::{
    Compare, FieldValue, FormDraft, FormField, FormFilter, FormPatch, FormRow, Predicate,
    SortOrder,
};
pub use notify::{BroadcastNotifier, ChangeNotifier, ChangeScope};
pub use registry::FormRegistry;
pub use store::{FormStore, SqliteFormStore};

use satchel_core::config::CatalogConfig;
use satchel_core::hash::Sha256FileHasher;
use satchel_core::paths::StorageLayout;
use std::sync::Arc;
use std::time::Duration;

/// Build a ready-to-use registry from configuration.
///
/// Creates the forms and cache directories if missing, opens the SQLite
/// store and wires in the default path layout and SHA-256 hasher. Attach a
/// notifier with [`FormRegistry::with_notifier`] when reactivity is needed.
pub async fn from_config(config: &CatalogConfig) -> RegistryResult<FormRegistry> {
    config.validate().map_err(RegistryError::InvalidInput)?;

    tokio::fs::create_dir_all(&config.forms_dir).await?;
    tokio::fs::create_dir_all(&config.cache_dir).await?;

    let store = SqliteFormStore::new(
        &config.database.path,
        Some(Duration::from_secs(config.database.busy_timeout_secs)),
    )
    .await?;
    let layout = StorageLayout::new(&config.forms_dir, &config.cache_dir);

    Ok(FormRegistry::new(
        Arc::new(store),
        Arc::new(layout),
        Arc::new(Sha256FileHasher),
    ))
}
