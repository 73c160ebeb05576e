use serde::Deserialize;

/// Main configuration structure for Product Archiver
///
/// Every section is optional; a missing section takes its defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Worker pool sizing
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Maximum number of product pages fetched at once
    #[serde(rename = "page-concurrency", default = "default_concurrency")]
    pub page_concurrency: u32,

    /// Maximum number of gallery images fetched at once, per product
    #[serde(rename = "image-concurrency", default = "default_concurrency")]
    pub image_concurrency: u32,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            page_concurrency: default_concurrency(),
            image_concurrency: default_concurrency(),
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// User agent sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Total request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// The site being scraped
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Origin that relative gallery paths are resolved against
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the zip archive; overwritten on every run
    #[serde(rename = "archive-path", default = "default_archive_path")]
    pub archive_path: String,

    /// Deflate level, 0 (store-fast) to 9 (smallest)
    #[serde(rename = "compression-level", default = "default_compression_level")]
    pub compression_level: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            archive_path: default_archive_path(),
            compression_level: default_compression_level(),
        }
    }
}

fn default_concurrency() -> u32 {
    5
}

fn default_user_agent() -> String {
    format!("product-archiver/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_base_url() -> String {
    "https://2cent.ru".to_string()
}

fn default_archive_path() -> String {
    "products.zip".to_string()
}

fn default_compression_level() -> u32 {
    9
}
