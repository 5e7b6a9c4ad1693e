//! Data model for the forms metadata table.

use sqlx::FromRow;
use time::OffsetDateTime;

/// A form metadata record as persisted in the `forms` table.
///
/// Path columns are root-relative; the registry converts to absolute paths
/// at every filesystem boundary.
#[derive(Debug, Clone, FromRow)]
pub struct FormRow {
    pub id: i64,
    /// Logical form identifier. Not unique: several versions of the same
    /// form may coexist.
    pub form_id: String,
    pub version: Option<String>,
    pub display_name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub submission_uri: Option<String>,
    pub signing_public_key: Option<String>,
    pub geometry_xpath: Option<String>,
    /// Tri-state auto-send flag: unset, on, off.
    pub auto_send: Option<bool>,
    /// Tri-state auto-delete flag.
    pub auto_delete: Option<bool>,
    /// Definition file path. Unique among rows where `deleted_at` is null.
    pub form_file_path: String,
    /// Derived cache artifact path, `<content_hash>.cache` by convention.
    pub cache_file_path: String,
    /// Media bundle directory, `<definition stem>-media` by convention.
    pub media_dir_path: String,
    /// Always derived from the definition file's bytes, never caller-supplied.
    pub content_hash: String,
    pub created_at: OffsetDateTime,
    /// Soft-deletion mark. Default scans exclude rows where this is set.
    pub deleted_at: Option<OffsetDateTime>,
}

/// Insert payload for a new form record.
///
/// `form_file_path` must reference an existing definition file. A supplied
/// `content_hash` is discarded and recomputed from the file's bytes.
#[derive(Debug, Clone, Default)]
pub struct FormDraft {
    pub form_id: String,
    pub version: Option<String>,
    /// Defaults to the definition file's base name.
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub submission_uri: Option<String>,
    pub signing_public_key: Option<String>,
    pub geometry_xpath: Option<String>,
    pub auto_send: Option<bool>,
    pub auto_delete: Option<bool>,
    pub form_file_path: String,
    /// Defaults to `<content_hash>.cache`.
    pub cache_file_path: Option<String>,
    /// Defaults to the definition path with its extension replaced by `-media`.
    pub media_dir_path: Option<String>,
    /// Ignored: the hash is system-derived.
    pub content_hash: Option<String>,
    /// Defaults to the current time.
    pub created_at: Option<OffsetDateTime>,
}

/// Update payload with patch semantics: `None` keeps the stored value.
///
/// Nullable columns are doubly wrapped so a patch can distinguish keeping
/// the stored value (`None`), setting it (`Some(Some(v))`), and clearing it
/// (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct FormPatch {
    pub form_id: Option<String>,
    pub version: Option<Option<String>>,
    pub display_name: Option<String>,
    pub description: Option<Option<String>>,
    pub language: Option<Option<String>>,
    pub submission_uri: Option<Option<String>>,
    pub signing_public_key: Option<Option<String>>,
    pub geometry_xpath: Option<Option<String>>,
    pub auto_send: Option<Option<bool>>,
    pub auto_delete: Option<Option<bool>>,
    /// Changing the definition path supersedes the old file and triggers
    /// hash and cache-path re-derivation.
    pub form_file_path: Option<String>,
    /// Explicitly replacing the cache path invalidates the old artifact.
    pub cache_file_path: Option<String>,
    pub media_dir_path: Option<String>,
    /// Ignored: the hash is system-derived.
    pub content_hash: Option<String>,
    pub deleted_at: Option<Option<OffsetDateTime>>,
}

impl FormPatch {
    /// Merge this patch over an existing record.
    ///
    /// The content hash is carried over unchanged; the registry re-derives
    /// it when the definition path changes.
    pub fn apply_to(&self, existing: &FormRow) -> FormRow {
        FormRow {
            id: existing.id,
            form_id: self.form_id.clone().unwrap_or_else(|| existing.form_id.clone()),
            version: merge(&self.version, &existing.version),
            display_name: self
                .display_name
                .clone()
                .unwrap_or_else(|| existing.display_name.clone()),
            description: merge(&self.description, &existing.description),
            language: merge(&self.language, &existing.language),
            submission_uri: merge(&self.submission_uri, &existing.submission_uri),
            signing_public_key: merge(&self.signing_public_key, &existing.signing_public_key),
            geometry_xpath: merge(&self.geometry_xpath, &existing.geometry_xpath),
            auto_send: merge(&self.auto_send, &existing.auto_send),
            auto_delete: merge(&self.auto_delete, &existing.auto_delete),
            form_file_path: self
                .form_file_path
                .clone()
                .unwrap_or_else(|| existing.form_file_path.clone()),
            cache_file_path: self
                .cache_file_path
                .clone()
                .unwrap_or_else(|| existing.cache_file_path.clone()),
            media_dir_path: self
                .media_dir_path
                .clone()
                .unwrap_or_else(|| existing.media_dir_path.clone()),
            content_hash: existing.content_hash.clone(),
            created_at: existing.created_at,
            deleted_at: merge(&self.deleted_at, &existing.deleted_at),
        }
    }
}

fn merge<T: Clone>(patch: &Option<Option<T>>, existing: &Option<T>) -> Option<T> {
    match patch {
        Some(value) => value.clone(),
        None => existing.clone(),
    }
}

/// Columns addressable in filters and sort specifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Id,
    FormId,
    Version,
    DisplayName,
    Description,
    Language,
    SubmissionUri,
    SigningPublicKey,
    GeometryXpath,
    AutoSend,
    AutoDelete,
    FormFilePath,
    CacheFilePath,
    MediaDirPath,
    ContentHash,
    CreatedAt,
    DeletedAt,
}

impl FormField {
    /// Column name in the `forms` table.
    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::FormId => "form_id",
            Self::Version => "version",
            Self::DisplayName => "display_name",
            Self::Description => "description",
            Self::Language => "language",
            Self::SubmissionUri => "submission_uri",
            Self::SigningPublicKey => "signing_public_key",
            Self::GeometryXpath => "geometry_xpath",
            Self::AutoSend => "auto_send",
            Self::AutoDelete => "auto_delete",
            Self::FormFilePath => "form_file_path",
            Self::CacheFilePath => "cache_file_path",
            Self::MediaDirPath => "media_dir_path",
            Self::ContentHash => "content_hash",
            Self::CreatedAt => "created_at",
            Self::DeletedAt => "deleted_at",
        }
    }
}

/// A typed filter operand.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Int(i64),
    Text(String),
    Bool(bool),
    Timestamp(OffsetDateTime),
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<OffsetDateTime> for FieldValue {
    fn from(value: OffsetDateTime) -> Self {
        Self::Timestamp(value)
    }
}

/// Comparison operators for filter predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Compare {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// One conjunct of a filter.
#[derive(Debug, Clone)]
pub enum Predicate {
    Compare {
        field: FormField,
        op: Compare,
        value: FieldValue,
    },
    IsNull(FormField),
    IsNotNull(FormField),
}

/// Conjunctive filter over form columns.
///
/// Soft-deleted rows are excluded unless `include_deleted` is set.
#[derive(Debug, Clone, Default)]
pub struct FormFilter {
    pub predicates: Vec<Predicate>,
    pub include_deleted: bool,
}

impl FormFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality predicate.
    pub fn eq(self, field: FormField, value: impl Into<FieldValue>) -> Self {
        self.compare(field, Compare::Eq, value)
    }

    /// Add a comparison predicate.
    pub fn compare(mut self, field: FormField, op: Compare, value: impl Into<FieldValue>) -> Self {
        self.predicates.push(Predicate::Compare {
            field,
            op,
            value: value.into(),
        });
        self
    }

    pub fn is_null(mut self, field: FormField) -> Self {
        self.predicates.push(Predicate::IsNull(field));
        self
    }

    pub fn is_not_null(mut self, field: FormField) -> Self {
        self.predicates.push(Predicate::IsNotNull(field));
        self
    }

    /// Include soft-deleted rows in the result.
    pub fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}

/// Sort specification.
#[derive(Debug, Clone, Copy)]
pub struct SortOrder {
    pub field: FormField,
    pub descending: bool,
}

impl SortOrder {
    pub fn asc(field: FormField) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub fn desc(field: FormField) -> Self {
        Self {
            field,
            descending: true,
        }
    }
}
