//! The two fan-out stages of the pipeline
//!
//! - `ProductScrapeStage`: fetch + extract every product URL
//! - `GalleryDownloadStage`: fetch one product's images into the archive,
//!   then write its `data.json`
//!
//! Both stages run their work through a `BoundedWorkerPool` and turn every
//! per-item error into data; neither ever fails as a whole.

use crate::archive::{
    gallery_path, metadata_path, ArchiveEntry, ArchiveError, ArchiveWriter, NameAllocator,
};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::Extractor;
use crate::crawler::pool::{BoundedWorkerPool, TaskFailure};
use crate::output::{ProgressEvent, ProgressSink};
use crate::product::ProductRecord;
use crate::url::image_basename;
use crate::{ExtractionError, FetchError};
use std::sync::Arc;
use thiserror::Error;

/// Why one product URL produced no record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The scrape task panicked or was cancelled
    #[error("scrape task aborted: {0}")]
    Aborted(String),
}

/// Result of scraping one URL
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeOutcome {
    Success(ProductRecord),
    Failure { url: String, reason: ScrapeError },
}

impl ScrapeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The URL this outcome belongs to
    pub fn url(&self) -> &str {
        match self {
            Self::Success(record) => &record.url,
            Self::Failure { url, .. } => url,
        }
    }
}

/// A URL that produced no record, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeFailure {
    pub url: String,
    pub reason: ScrapeError,
}

/// Splits outcomes into successful records and failures, keeping input order
pub fn partition_outcomes(
    outcomes: Vec<ScrapeOutcome>,
) -> (Vec<ProductRecord>, Vec<ScrapeFailure>) {
    let mut records = Vec::new();
    let mut failures = Vec::new();

    for outcome in outcomes {
        match outcome {
            ScrapeOutcome::Success(record) => records.push(record),
            ScrapeOutcome::Failure { url, reason } => failures.push(ScrapeFailure { url, reason }),
        }
    }

    (records, failures)
}

/// Fetches and extracts product pages
pub struct ProductScrapeStage {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    progress: Arc<dyn ProgressSink>,
    pool: BoundedWorkerPool,
}

impl ProductScrapeStage {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        progress: Arc<dyn ProgressSink>,
        concurrency: usize,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            progress,
            pool: BoundedWorkerPool::new(concurrency),
        }
    }

    /// Scrapes every URL; returns exactly one outcome per URL, in input order
    ///
    /// Duplicate URLs are scraped independently. Extraction is skipped for
    /// URLs whose fetch failed.
    pub async fn run(&self, urls: &[String]) -> Vec<ScrapeOutcome> {
        let tasks = urls.iter().map(|url| {
            let fetcher = Arc::clone(&self.fetcher);
            let extractor = Arc::clone(&self.extractor);
            let progress = Arc::clone(&self.progress);
            let url = url.clone();

            async move {
                progress.notify(ProgressEvent::ScrapeStarted { url: url.clone() });

                let result = scrape_one(fetcher.as_ref(), extractor.as_ref(), &url).await;
                if let Err(reason) = &result {
                    progress.notify(ProgressEvent::ScrapeFailed {
                        url: url.clone(),
                        reason: reason.to_string(),
                    });
                }
                result
            }
        });

        let outcomes = self.pool.run(tasks).await;

        urls.iter()
            .zip(outcomes)
            .map(|(url, outcome)| match outcome {
                Ok(record) => ScrapeOutcome::Success(record),
                Err(TaskFailure::Failed(reason)) => ScrapeOutcome::Failure {
                    url: url.clone(),
                    reason,
                },
                Err(failure) => {
                    let reason = ScrapeError::Aborted(failure.to_string());
                    self.progress.notify(ProgressEvent::ScrapeFailed {
                        url: url.clone(),
                        reason: reason.to_string(),
                    });
                    ScrapeOutcome::Failure {
                        url: url.clone(),
                        reason,
                    }
                }
            })
            .collect()
    }
}

async fn scrape_one(
    fetcher: &dyn Fetcher,
    extractor: &dyn Extractor,
    url: &str,
) -> Result<ProductRecord, ScrapeError> {
    let body = fetcher.fetch(url).await?;
    let record = extractor.extract(url, &body.bytes)?;
    Ok(record)
}

/// What happened to one product's archive entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GalleryReport {
    /// Images fetched and written
    pub images_written: usize,

    /// Images that could not be fetched
    pub images_failed: usize,

    /// Entries (images or metadata) that were fetched but could not be written
    pub entries_failed: usize,

    /// Whether `data.json` made it into the archive
    pub metadata_written: bool,
}

#[derive(Debug, Error)]
enum ImageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// Downloads one product's gallery into the shared archive
pub struct GalleryDownloadStage {
    fetcher: Arc<dyn Fetcher>,
    archive: Arc<ArchiveWriter>,
    progress: Arc<dyn ProgressSink>,
    pool: BoundedWorkerPool,
}

impl GalleryDownloadStage {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        archive: Arc<ArchiveWriter>,
        progress: Arc<dyn ProgressSink>,
        concurrency: usize,
    ) -> Self {
        Self {
            fetcher,
            archive,
            progress,
            pool: BoundedWorkerPool::new(concurrency),
        }
    }

    /// Writes `record`'s images and metadata under `directory`
    ///
    /// Images go to `<directory>/gallery/<basename>`; a failed image is left
    /// out and does not affect the others. `<directory>/data.json` is
    /// written after every image task has finished, whatever their outcome.
    pub async fn run(&self, record: &ProductRecord, directory: &str) -> GalleryReport {
        let mut report = GalleryReport::default();
        let mut names = NameAllocator::new();

        let targets: Vec<(String, String)> = record
            .gallery
            .iter()
            .map(|url| {
                let file_name = names.allocate(&image_basename(url));
                (url.clone(), gallery_path(directory, &file_name))
            })
            .collect();

        let tasks = targets.iter().map(|(url, path)| {
            let fetcher = Arc::clone(&self.fetcher);
            let archive = Arc::clone(&self.archive);
            let url = url.clone();
            let path = path.clone();

            async move {
                let body = fetcher.fetch(&url).await?;
                archive.append(ArchiveEntry::new(path, body.bytes))?;
                Ok::<(), ImageError>(())
            }
        });

        let outcomes = self.pool.run(tasks).await;

        for ((url, path), outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.images_written += 1,
                Err(TaskFailure::Failed(ImageError::Archive(e))) => {
                    report.entries_failed += 1;
                    self.progress.notify(ProgressEvent::EntryFailed {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(failure) => {
                    report.images_failed += 1;
                    self.progress.notify(ProgressEvent::ImageFailed {
                        product: record.product_name.clone(),
                        url: url.clone(),
                        reason: failure.to_string(),
                    });
                }
            }
        }

        let path = metadata_path(directory);
        match self.write_metadata(record, &path) {
            Ok(()) => report.metadata_written = true,
            Err(e) => {
                report.entries_failed += 1;
                self.progress.notify(ProgressEvent::EntryFailed {
                    path,
                    reason: e.to_string(),
                });
            }
        }

        tracing::debug!(
            "Archived {}: {} images written, {} failed",
            record.product_name,
            report.images_written,
            report.images_failed
        );

        report
    }

    fn write_metadata(&self, record: &ProductRecord, path: &str) -> Result<(), ArchiveError> {
        let json = record
            .to_pretty_json()
            .map_err(|source| ArchiveError::Serialize {
                path: path.to_string(),
                source,
            })?;
        self.archive.append(ArchiveEntry::new(path, json))
    }
}
