//! Product Archiver: scrape product pages into a single zip archive
//!
//! This crate fetches product pages from one e-commerce site, extracts
//! structured product data, downloads each product's gallery images and packs
//! everything into one compressed archive. Both the page stage and the image
//! stage run through bounded worker pools so a single bad URL never aborts
//! the batch.

pub mod archive;
pub mod config;
pub mod crawler;
pub mod output;
pub mod product;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for pipeline-level operations
///
/// Per-URL and per-image failures never surface here; they are recorded as
/// outcomes. Only failures that put the archive itself at risk do.
#[derive(Debug, Error)]
pub enum ArchiverError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Archive error: {0}")]
    Archive(#[from] archive::ArchiveError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Extractor setup failed: {0}")]
    Extractor(#[from] ExtractionError),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::PipelineState,
        to: state::PipelineState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// A single failed HTTP GET, for a product page or a gallery image
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {cause}")]
    Connect { url: String, cause: String },

    #[error("Request failed for {url}: {cause}")]
    Request { url: String, cause: String },
}

impl FetchError {
    /// The URL the failed request was sent to
    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. }
            | Self::Timeout { url }
            | Self::Connect { url, .. }
            | Self::Request { url, .. } => url,
        }
    }
}

/// A fetched page that does not have the structure the extractor expects
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("Missing {field} on {url}")]
    MissingField { url: String, field: &'static str },

    #[error("Malformed page {url}: {cause}")]
    Malformed { url: String, cause: String },

    #[error("Invalid selector '{selector}': {cause}")]
    Selector { selector: String, cause: String },
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ArchiverError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use archive::{ArchiveEntry, ArchiveWriter};
pub use config::Config;
pub use product::ProductRecord;
pub use state::PipelineState;
