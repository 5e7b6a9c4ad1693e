//! The form registry: the mutation engine over the record store.

use crate::error::{RegistryError, RegistryResult};
use crate::janitor::ArtifactJanitor;
use crate::models::{FormDraft, FormField, FormFilter, FormPatch, FormRow, SortOrder};
use crate::notify::{ChangeNotifier, ChangeScope};
use crate::store::FormStore;
use satchel_core::hash::ContentHasher;
use satchel_core::paths::{PathResolver, cache_file_for, media_dir_for};
use std::path::Path;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Orchestrates insert, update, delete and query against the form store,
/// keeping metadata records consistent with the filesystem artifacts they
/// reference.
///
/// Mutations are serialized per instance; reads run concurrently and never
/// take the mutation lock. There is no transaction spanning the store and
/// the filesystem. Consistency is approximated by ordering: cache artifacts
/// are invalidated before a definition path swap, and artifact removal is
/// attempted before row removal (row removal proceeds regardless). Callers
/// must tolerate a record whose file no longer exists.
pub struct FormRegistry {
    store: Arc<dyn FormStore>,
    paths: Arc<dyn PathResolver>,
    hasher: Arc<dyn ContentHasher>,
    janitor: ArtifactJanitor,
    notifier: Option<Arc<dyn ChangeNotifier>>,
    mutation_lock: Mutex<()>,
}

impl FormRegistry {
    pub fn new(
        store: Arc<dyn FormStore>,
        paths: Arc<dyn PathResolver>,
        hasher: Arc<dyn ContentHasher>,
    ) -> Self {
        Self {
            store,
            paths,
            hasher,
            janitor: ArtifactJanitor::new(),
            notifier: None,
            mutation_lock: Mutex::new(()),
        }
    }

    /// Attach a change notifier informed after every successful mutation.
    pub fn with_notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    // ===== Reads =====

    /// Fetch a record by id.
    pub async fn get(&self, id: i64) -> RegistryResult<FormRow> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("form {id}")))
    }

    /// Scan records matching the filter.
    pub async fn scan(
        &self,
        filter: &FormFilter,
        order: Option<&SortOrder>,
    ) -> RegistryResult<Vec<FormRow>> {
        self.store.scan(filter, order).await
    }

    /// The latest-version-per-form view: one live record per distinct
    /// `form_id`, most recent `created_at` first, ties to the highest id.
    pub async fn latest_by_form_id(
        &self,
        filter: &FormFilter,
        order: Option<&SortOrder>,
    ) -> RegistryResult<Vec<FormRow>> {
        self.store.latest_by_form_id(filter, order).await
    }

    // ===== Insert =====

    /// Register a new form and return the assigned id.
    ///
    /// The draft's definition file must exist. The content hash is derived
    /// from its bytes; cache path, media path, display name and creation
    /// time are filled in when absent. Fails with `Conflict` when a live
    /// record already references the same definition file, before any side
    /// effect is performed.
    pub async fn insert(&self, draft: FormDraft) -> RegistryResult<i64> {
        let _guard = self.mutation_lock.lock().await;

        if draft.form_file_path.is_empty() {
            return Err(RegistryError::InvalidInput(
                "form_file_path must be specified".to_string(),
            ));
        }

        // Normalize: the store keeps root-relative paths regardless of what
        // the caller handed in.
        let absolute = self.paths.absolute_form_path(&draft.form_file_path);
        let relative = self.paths.relative_form_path(&absolute);

        if !file_exists(&absolute).await {
            return Err(RegistryError::InvalidInput(format!(
                "form definition file does not exist: {}",
                absolute.display()
            )));
        }

        if draft.content_hash.is_some() {
            warn!(path = %relative, "discarding caller-supplied content hash");
        }
        let content_hash = self.hasher.hash_file(&absolute).await?;

        let display_name = draft
            .display_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| file_name_of(&absolute));
        let cache_file_path = match draft.cache_file_path {
            Some(path) => self.normalize_cache_path(&path),
            None => cache_file_for(&content_hash),
        };
        let media_dir_path = match draft.media_dir_path {
            Some(path) => self.normalize_form_path(&path),
            None => media_dir_for(&relative),
        };
        let created_at = draft.created_at.unwrap_or_else(OffsetDateTime::now_utc);

        // Pre-check the uniqueness invariant so a conflict produces no side
        // effects. The partial unique index is the backstop for races.
        let duplicate = FormFilter::new().eq(FormField::FormFilePath, relative.as_str());
        if !self.store.scan(&duplicate, None).await?.is_empty() {
            return Err(RegistryError::Conflict(format!(
                "a live record already exists for definition file {relative}"
            )));
        }

        let row = FormRow {
            id: 0,
            form_id: draft.form_id,
            version: draft.version,
            display_name,
            description: draft.description,
            language: draft.language,
            submission_uri: draft.submission_uri,
            signing_public_key: draft.signing_public_key,
            geometry_xpath: draft.geometry_xpath,
            auto_send: draft.auto_send,
            auto_delete: draft.auto_delete,
            form_file_path: relative.clone(),
            cache_file_path,
            media_dir_path,
            content_hash,
            created_at,
            deleted_at: None,
        };

        let id = self.store.insert(&row).await?;
        info!(id, path = %relative, "registered form");
        self.notify_all();
        Ok(id)
    }

    // ===== Update =====

    /// Update a single record by id.
    ///
    /// Fails with `NotFound` when the id does not resolve.
    pub async fn update_by_id(&self, id: i64, patch: &FormPatch) -> RegistryResult<()> {
        let _guard = self.mutation_lock.lock().await;

        let existing = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("form {id}")))?;
        self.apply_update(&existing, patch).await?;
        self.notify_all();
        Ok(())
    }

    /// Apply the same patch to every record matching the filter.
    ///
    /// Returns the number of records updated; zero matches is a no-op, not
    /// an error. Change notifications are emitted per updated record, as in
    /// the single-id update.
    pub async fn update_matching(
        &self,
        filter: &FormFilter,
        patch: &FormPatch,
    ) -> RegistryResult<u64> {
        let _guard = self.mutation_lock.lock().await;

        let matches = self.store.scan(filter, None).await?;
        let mut updated = 0u64;
        for row in &matches {
            match self.apply_update(row, patch).await {
                Ok(count) => {
                    updated += count;
                    self.notify_all();
                }
                Err(RegistryError::NotFound(what)) => {
                    // A row vanishing mid-bulk is not fatal.
                    warn!(%what, "skipping update of a record that no longer resolves");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(updated)
    }

    /// Merge-and-recompute update for one loaded record. The same path
    /// serves single-id and bulk updates so derived fields are recomputed
    /// uniformly.
    async fn apply_update(&self, existing: &FormRow, patch: &FormPatch) -> RegistryResult<u64> {
        if patch.content_hash.is_some() {
            warn!(id = existing.id, "discarding caller-supplied content hash");
        }
        let mut merged = patch.apply_to(existing);

        // An explicitly replaced cache path invalidates the old artifact
        // before anything else changes, so a stale cache never describes
        // content it no longer matches.
        if let Some(cache_path) = &patch.cache_file_path {
            self.remove_cache(&existing.cache_file_path).await;
            merged.cache_file_path = self.normalize_cache_path(cache_path);
        }
        if let Some(media_path) = &patch.media_dir_path {
            merged.media_dir_path = self.normalize_form_path(media_path);
        }

        if let Some(new_path) = &patch.form_file_path {
            let new_absolute = self.paths.absolute_form_path(new_path);
            let old_absolute = self.paths.absolute_form_path(&existing.form_file_path);

            if !file_exists(&new_absolute).await {
                return Err(RegistryError::InvalidInput(format!(
                    "form definition file does not exist: {}",
                    new_absolute.display()
                )));
            }

            if new_absolute != old_absolute {
                // The old definition file is superseded.
                self.janitor.remove_file_or_tree(&old_absolute).await;
            }
            // Content is assumed to have changed either way, so the cache
            // artifact goes too.
            self.remove_cache(&existing.cache_file_path).await;

            let content_hash = self.hasher.hash_file(&new_absolute).await?;
            merged.cache_file_path = cache_file_for(&content_hash);
            merged.content_hash = content_hash;
            merged.form_file_path = self.paths.relative_form_path(&new_absolute);
        }

        let count = self.store.update(existing.id, &merged).await?;
        if count == 0 {
            return Err(RegistryError::NotFound(format!("form {}", existing.id)));
        }
        Ok(count)
    }

    // ===== Delete =====

    /// Delete a single record by id, together with its artifacts.
    ///
    /// Fails with `NotFound` when the id does not resolve. Succeeds even
    /// when the referenced files were already removed from disk.
    pub async fn delete_by_id(&self, id: i64) -> RegistryResult<()> {
        let _guard = self.mutation_lock.lock().await;

        let row = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("form {id}")))?;
        if self.delete_row(&row).await? == 0 {
            return Err(RegistryError::NotFound(format!("form {id}")));
        }
        self.notify_all();
        Ok(())
    }

    /// Delete every record matching the filter, together with its artifacts.
    ///
    /// Returns the number of rows removed from the store; file removal is
    /// best-effort and does not affect the count. One batched notification
    /// is emitted per call, after all matched records are processed.
    pub async fn delete_matching(&self, filter: &FormFilter) -> RegistryResult<u64> {
        let _guard = self.mutation_lock.lock().await;

        let matches = self.store.scan(filter, None).await?;
        let mut removed = 0u64;
        for row in &matches {
            removed += self.delete_row(row).await?;
        }
        if removed > 0 {
            self.notify_all();
        }
        Ok(removed)
    }

    async fn delete_row(&self, row: &FormRow) -> RegistryResult<u64> {
        self.janitor
            .remove_file_or_tree(&self.paths.absolute_form_path(&row.media_dir_path))
            .await;
        self.remove_cache(&row.cache_file_path).await;
        self.janitor
            .remove_file_or_tree(&self.paths.absolute_form_path(&row.form_file_path))
            .await;

        let removed = self.store.delete(row.id).await?;
        if removed > 0 {
            info!(id = row.id, path = %row.form_file_path, "deleted form");
        }
        Ok(removed)
    }

    // ===== Helpers =====

    async fn remove_cache(&self, relative: &str) {
        self.janitor
            .remove_file_or_tree(&self.paths.absolute_cache_path(relative))
            .await;
    }

    fn normalize_form_path(&self, path: &str) -> String {
        self.paths
            .relative_form_path(&self.paths.absolute_form_path(path))
    }

    fn normalize_cache_path(&self, path: &str) -> String {
        self.paths
            .relative_cache_path(&self.paths.absolute_cache_path(path))
    }

    fn notify_all(&self) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(ChangeScope::Forms);
            notifier.notify(ChangeScope::LatestByFormId);
        }
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
