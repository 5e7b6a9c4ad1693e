//! Core domain types and shared logic for the Satchel form catalog.
//!
//! This crate defines the primitives used across the workspace:
//! - Content hashing for form definition files
//! - Path resolution between storage-relative and absolute paths
//! - Catalog configuration

pub mod config;
pub mod error;
pub mod hash;
pub mod paths;

pub use config::{CatalogConfig, DatabaseConfig};
pub use error::{Error, Result};
pub use hash::{ContentHash, ContentHasher, Sha256FileHasher};
pub use paths::{PathResolver, StorageLayout, cache_file_for, media_dir_for};
