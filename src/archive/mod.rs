//! Archive module for packaging scraped products
//!
//! This module handles:
//! - The append-only zip writer shared by all download tasks
//! - Product name sanitizing for archive paths
//! - Collision-free naming of product directories and gallery files

mod sanitize;
mod writer;

pub use sanitize::{
    product_directory, sanitize_name, NameAllocator, FALLBACK_DIRECTORY, MAX_DIRECTORY_BYTES,
};
pub use writer::{ArchiveSummary, ArchiveWriter};

use thiserror::Error;

/// Errors that can occur while writing the archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to create archive {path}: {source}")]
    Create {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write entry {path}: {cause}")]
    Write { path: String, cause: String },

    #[error("Entry already exists in archive: {0}")]
    DuplicateEntry(String),

    #[error("Archive has already been finalized")]
    Finalized,

    #[error("Failed to finalize archive {path}: {cause}")]
    Finalize { path: String, cause: String },

    #[error("Archive writer lock poisoned by a panicking producer")]
    Poisoned,

    #[error("Failed to serialize {path}: {source}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// One named file inside the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Archive-relative path, `/`-separated
    pub path: String,

    /// Raw file content
    pub content: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Archive path of a product's metadata file
pub fn metadata_path(directory: &str) -> String {
    format!("{}/data.json", directory)
}

/// Archive path of one gallery image
pub fn gallery_path(directory: &str, file_name: &str) -> String {
    format!("{}/gallery/{}", directory, file_name)
}
