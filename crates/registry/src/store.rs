//! Form record store trait and SQLite implementation.

use crate::error::{RegistryError, RegistryResult};
use crate::models::{FieldValue, FormFilter, FormRow, Predicate, SortOrder};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS forms (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    form_id TEXT NOT NULL,
    version TEXT,
    display_name TEXT NOT NULL,
    description TEXT,
    language TEXT,
    submission_uri TEXT,
    signing_public_key TEXT,
    geometry_xpath TEXT,
    auto_send INTEGER,
    auto_delete INTEGER,
    form_file_path TEXT NOT NULL,
    cache_file_path TEXT NOT NULL,
    media_dir_path TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_forms_live_file_path
    ON forms (form_file_path) WHERE deleted_at IS NULL;

CREATE INDEX IF NOT EXISTS idx_forms_form_id ON forms (form_id);
"#;

/// Persistent store for form metadata records.
///
/// The store is the single source of truth. Registry invariants are enforced
/// before calling it, except live-path uniqueness, which the store also
/// guarantees so a race between two inserts yields exactly one success.
#[async_trait]
pub trait FormStore: Send + Sync {
    /// Scan records matching the filter.
    async fn scan(
        &self,
        filter: &FormFilter,
        order: Option<&SortOrder>,
    ) -> RegistryResult<Vec<FormRow>>;

    /// Fetch a record by id. Soft-deleted rows are included.
    async fn get(&self, id: i64) -> RegistryResult<Option<FormRow>>;

    /// Insert a record and return the assigned id. The `id` field of the
    /// given row is ignored. Fails with `Conflict` when another live row
    /// already holds the same definition file path.
    async fn insert(&self, row: &FormRow) -> RegistryResult<i64>;

    /// Overwrite the record with the given id. Returns rows updated (0 or 1).
    async fn update(&self, id: i64, row: &FormRow) -> RegistryResult<u64>;

    /// Remove the record with the given id. Returns rows deleted (0 or 1).
    async fn delete(&self, id: i64) -> RegistryResult<u64>;

    /// One record per distinct `form_id`: the live record with the maximum
    /// `created_at`, ties resolved to the highest id. The filter and sort
    /// apply after the reduction. Computed per query, never materialized.
    async fn latest_by_form_id(
        &self,
        filter: &FormFilter,
        order: Option<&SortOrder>,
    ) -> RegistryResult<Vec<FormRow>>;

    /// Run schema migration.
    async fn migrate(&self) -> RegistryResult<()>;

    /// Check database connectivity.
    async fn health_check(&self) -> RegistryResult<()>;
}

/// SQLite-backed form store.
pub struct SqliteFormStore {
    pool: Pool<Sqlite>,
}

impl SqliteFormStore {
    /// Open (creating if missing) the database at `path` and migrate.
    pub async fn new(
        path: impl AsRef<Path>,
        busy_timeout: Option<Duration>,
    ) -> RegistryResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(busy_timeout.unwrap_or(Duration::from_secs(5)));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection
            // avoids persistent "database is locked" failures.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

type FormQuery<'q> = sqlx::query::QueryAs<'q, Sqlite, FormRow, SqliteArguments<'q>>;

/// Append the filter's conjuncts to a statement that already has a WHERE
/// clause. Column names come from the `FormField` enum, so only the bound
/// operands are caller-controlled.
fn push_predicates(filter: &FormFilter, sql: &mut String) {
    if !filter.include_deleted {
        sql.push_str(" AND deleted_at IS NULL");
    }
    for predicate in &filter.predicates {
        match predicate {
            Predicate::Compare { field, op, value } => {
                sql.push_str(" AND ");
                // Timestamps are stored as RFC 3339 text, which does not
                // order correctly across differing subsecond precision, so
                // both sides are compared as julian days.
                if matches!(value, FieldValue::Timestamp(_)) {
                    sql.push_str("julianday(");
                    sql.push_str(field.column());
                    sql.push_str(") ");
                    sql.push_str(op.sql());
                    sql.push_str(" julianday(?)");
                } else {
                    sql.push_str(field.column());
                    sql.push(' ');
                    sql.push_str(op.sql());
                    sql.push_str(" ?");
                }
            }
            Predicate::IsNull(field) => {
                sql.push_str(" AND ");
                sql.push_str(field.column());
                sql.push_str(" IS NULL");
            }
            Predicate::IsNotNull(field) => {
                sql.push_str(" AND ");
                sql.push_str(field.column());
                sql.push_str(" IS NOT NULL");
            }
        }
    }
}

fn push_order(order: Option<&SortOrder>, sql: &mut String) {
    if let Some(order) = order {
        sql.push_str(" ORDER BY ");
        sql.push_str(order.field.column());
        sql.push_str(if order.descending { " DESC" } else { " ASC" });
    }
}

fn bind_filter<'q>(mut query: FormQuery<'q>, filter: &'q FormFilter) -> FormQuery<'q> {
    for predicate in &filter.predicates {
        if let Predicate::Compare { value, .. } = predicate {
            query = match value {
                FieldValue::Int(v) => query.bind(*v),
                FieldValue::Text(v) => query.bind(v.as_str()),
                FieldValue::Bool(v) => query.bind(*v),
                FieldValue::Timestamp(v) => query.bind(*v),
            };
        }
    }
    query
}

#[async_trait]
impl FormStore for SqliteFormStore {
    async fn scan(
        &self,
        filter: &FormFilter,
        order: Option<&SortOrder>,
    ) -> RegistryResult<Vec<FormRow>> {
        let mut sql = String::from("SELECT * FROM forms WHERE 1=1");
        push_predicates(filter, &mut sql);
        push_order(order, &mut sql);

        let rows = bind_filter(sqlx::query_as::<_, FormRow>(&sql), filter)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get(&self, id: i64) -> RegistryResult<Option<FormRow>> {
        let row = sqlx::query_as::<_, FormRow>("SELECT * FROM forms WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert(&self, row: &FormRow) -> RegistryResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO forms (
                form_id, version, display_name, description, language,
                submission_uri, signing_public_key, geometry_xpath,
                auto_send, auto_delete, form_file_path, cache_file_path,
                media_dir_path, content_hash, created_at, deleted_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.form_id)
        .bind(&row.version)
        .bind(&row.display_name)
        .bind(&row.description)
        .bind(&row.language)
        .bind(&row.submission_uri)
        .bind(&row.signing_public_key)
        .bind(&row.geometry_xpath)
        .bind(row.auto_send)
        .bind(row.auto_delete)
        .bind(&row.form_file_path)
        .bind(&row.cache_file_path)
        .bind(&row.media_dir_path)
        .bind(&row.content_hash)
        .bind(row.created_at)
        .bind(row.deleted_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(RegistryError::Conflict(format!(
                    "a live record already exists for definition file {}",
                    row.form_file_path
                )))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn update(&self, id: i64, row: &FormRow) -> RegistryResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE forms SET
                form_id = ?, version = ?, display_name = ?, description = ?,
                language = ?, submission_uri = ?, signing_public_key = ?,
                geometry_xpath = ?, auto_send = ?, auto_delete = ?,
                form_file_path = ?, cache_file_path = ?, media_dir_path = ?,
                content_hash = ?, created_at = ?, deleted_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&row.form_id)
        .bind(&row.version)
        .bind(&row.display_name)
        .bind(&row.description)
        .bind(&row.language)
        .bind(&row.submission_uri)
        .bind(&row.signing_public_key)
        .bind(&row.geometry_xpath)
        .bind(row.auto_send)
        .bind(row.auto_delete)
        .bind(&row.form_file_path)
        .bind(&row.cache_file_path)
        .bind(&row.media_dir_path)
        .bind(&row.content_hash)
        .bind(row.created_at)
        .bind(row.deleted_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: i64) -> RegistryResult<u64> {
        let result = sqlx::query("DELETE FROM forms WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn latest_by_form_id(
        &self,
        filter: &FormFilter,
        order: Option<&SortOrder>,
    ) -> RegistryResult<Vec<FormRow>> {
        // The correlated subquery picks one live row per form_id. Timestamps
        // are stored as RFC 3339 text, which does not order correctly across
        // differing subsecond precision, so they are compared as julian days.
        let mut sql = String::from(
            r#"
            SELECT * FROM forms AS f
            WHERE f.id = (
                SELECT g.id FROM forms AS g
                WHERE g.form_id = f.form_id AND g.deleted_at IS NULL
                ORDER BY julianday(g.created_at) DESC, g.id DESC
                LIMIT 1
            )
            "#,
        );
        push_predicates(filter, &mut sql);
        push_order(order, &mut sql);

        let rows = bind_filter(sqlx::query_as::<_, FormRow>(&sql), filter)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn migrate(&self) -> RegistryResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> RegistryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
