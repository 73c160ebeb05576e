//! Pipeline coordinator - drives one archiving run end to end
//!
//! This module contains the run loop that ties the stages together:
//! - Creating the archive before any work starts
//! - Scraping every product URL through the page pool
//! - Downloading each product's gallery through its own image pool
//! - Finalizing the archive and building the run report
//!
//! The run walks `Idle -> Scraping -> Downloading -> Finalizing -> Done`.
//! Per-URL and per-image failures never leave this module as errors; only
//! archive creation and finalization do.

use crate::archive::{product_directory, ArchiveWriter, NameAllocator};
use crate::config::Config;
use crate::crawler::fetcher::{Fetcher, HttpFetcher};
use crate::crawler::parser::{Extractor, SiteExtractor};
use crate::crawler::stages::{partition_outcomes, GalleryDownloadStage, ProductScrapeStage};
use crate::output::{ProductSummary, ProgressEvent, ProgressSink, RunReport, TracingProgress};
use crate::state::PipelineState;
use crate::ArchiverError;
use chrono::Utc;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Main pipeline structure; one instance drives exactly one run
pub struct Pipeline {
    page_concurrency: usize,
    image_concurrency: usize,
    archive_path: PathBuf,
    compression_level: u32,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    progress: Arc<dyn ProgressSink>,
    state: PipelineState,
}

impl Pipeline {
    /// Creates a pipeline around the given fetcher and extractor
    ///
    /// Concurrency limits and the archive location come from `config`.
    /// Progress goes to `TracingProgress` until replaced with
    /// [`Pipeline::with_progress`].
    pub fn new(config: &Config, fetcher: Arc<dyn Fetcher>, extractor: Arc<dyn Extractor>) -> Self {
        Self {
            page_concurrency: config.scraper.page_concurrency as usize,
            image_concurrency: config.scraper.image_concurrency as usize,
            archive_path: PathBuf::from(&config.output.archive_path),
            compression_level: config.output.compression_level,
            fetcher,
            extractor,
            progress: Arc::new(TracingProgress),
            state: PipelineState::Idle,
        }
    }

    /// Creates a pipeline with the HTTP fetcher and site extractor
    ///
    /// # Returns
    ///
    /// * `Ok(Pipeline)` - Ready to run
    /// * `Err(ArchiverError)` - The HTTP client or the extractor could not be built
    pub fn from_config(config: &Config) -> Result<Self, ArchiverError> {
        let fetcher = HttpFetcher::new(&config.http)?;
        let base_url = Url::parse(&config.site.base_url)?;
        let extractor = SiteExtractor::new(base_url)?;

        Ok(Self::new(config, Arc::new(fetcher), Arc::new(extractor)))
    }

    /// Replaces the progress sink
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Current phase of the run
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Moves to the next phase, rejecting anything but a single forward step
    fn transition(&mut self, to: PipelineState) -> Result<(), ArchiverError> {
        if !self.state.can_transition_to(to) {
            return Err(ArchiverError::InvalidTransition {
                from: self.state,
                to,
            });
        }

        self.progress.notify(ProgressEvent::StateChanged {
            from: self.state,
            to,
        });
        self.state = to;
        Ok(())
    }

    /// Runs the whole pipeline over `urls`
    ///
    /// Every URL yields either a product in the archive or an entry in
    /// `RunReport::failures`. Products are archived under sanitized,
    /// collision-free directory names.
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - The archive was finalized
    /// * `Err(ArchiverError)` - The archive could not be created or finalized,
    ///   or this pipeline has already run
    pub async fn run(&mut self, urls: &[String]) -> Result<RunReport, ArchiverError> {
        if self.state != PipelineState::Idle {
            return Err(ArchiverError::InvalidTransition {
                from: self.state,
                to: PipelineState::Scraping,
            });
        }

        let started_at = Utc::now();
        self.progress.notify(ProgressEvent::PipelineStarted {
            url_count: urls.len(),
        });
        self.progress.notify(ProgressEvent::ArchiveStarted {
            path: self.archive_path.clone(),
        });

        let archive = Arc::new(ArchiveWriter::create(
            &self.archive_path,
            self.compression_level,
        )?);

        // Scrape
        self.transition(PipelineState::Scraping)?;
        let scrape = ProductScrapeStage::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.extractor),
            Arc::clone(&self.progress),
            self.page_concurrency,
        );
        let outcomes = scrape.run(urls).await;
        let (records, failures) = partition_outcomes(outcomes);

        tracing::debug!(
            "Scraped {} products, {} failures",
            records.len(),
            failures.len()
        );

        // Download galleries; products run side by side, images per product are capped
        self.transition(PipelineState::Downloading)?;
        let gallery = GalleryDownloadStage::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&archive),
            Arc::clone(&self.progress),
            self.image_concurrency,
        );

        let mut directories = NameAllocator::new();
        let assigned: Vec<String> = records
            .iter()
            .map(|record| directories.allocate(&product_directory(&record.product_name)))
            .collect();

        let reports = join_all(
            records
                .iter()
                .zip(&assigned)
                .map(|(record, directory)| gallery.run(record, directory)),
        )
        .await;

        let products: Vec<ProductSummary> = records
            .iter()
            .zip(assigned)
            .zip(reports)
            .map(|((record, directory), report)| ProductSummary {
                url: record.url.clone(),
                name: record.product_name.clone(),
                directory,
                images_written: report.images_written,
                images_failed: report.images_failed,
                entries_failed: report.entries_failed,
                metadata_written: report.metadata_written,
            })
            .collect();

        // Finalize
        self.transition(PipelineState::Finalizing)?;
        let summary = archive.finalize()?;
        self.progress.notify(ProgressEvent::ArchiveCompleted {
            path: summary.path.clone(),
            entries: summary.entries,
            bytes: summary.bytes,
        });

        self.transition(PipelineState::Done)?;

        Ok(RunReport::new(
            started_at,
            Utc::now(),
            urls.len(),
            failures,
            products,
            summary,
        ))
    }
}

/// Builds a pipeline from `config` and runs it over `urls`
///
/// This is the main entry point for the binary.
pub async fn run_pipeline(config: &Config, urls: &[String]) -> Result<RunReport, ArchiverError> {
    let mut pipeline = Pipeline::from_config(config)?;
    pipeline.run(urls).await
}
