//! Configuration module for Product Archiver
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key is optional, so running without a config file uses the defaults.
//!
//! # Example
//!
//! ```no_run
//! use product_archiver::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("archiver.toml")).unwrap();
//! println!("Pages fetched at once: {}", config.scraper.page_concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, HttpConfig, OutputConfig, ScraperConfig, SiteConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
