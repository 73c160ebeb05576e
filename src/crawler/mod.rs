//! Crawler module for product scraping and gallery downloads
//!
//! This module contains the core pipeline logic, including:
//! - HTTP fetching with typed error classification
//! - Product page extraction
//! - The bounded worker pool both stages fan out through
//! - Overall pipeline coordination

mod coordinator;
mod fetcher;
mod parser;
mod pool;
mod stages;

pub use coordinator::{run_pipeline, Pipeline};
pub use fetcher::{build_http_client, FetchedBody, Fetcher, HttpFetcher};
pub use parser::{Extractor, SiteExtractor};
pub use pool::{BoundedWorkerPool, Outcome, TaskFailure};
pub use stages::{
    partition_outcomes, GalleryDownloadStage, GalleryReport, ProductScrapeStage, ScrapeError,
    ScrapeFailure, ScrapeOutcome,
};
