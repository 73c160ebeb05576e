//! Progress notifications for a pipeline run
//!
//! The pipeline never logs directly; it reports to the `ProgressSink` it was
//! given. `TracingProgress` turns events into `tracing` lines and is the
//! default. `RecordingProgress` keeps them in memory.

use crate::state::PipelineState;
use std::path::PathBuf;
use std::sync::Mutex;

/// Something observable that happened during a run
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// The run started with this many product URLs
    PipelineStarted { url_count: usize },

    /// The archive file is about to be created
    ArchiveStarted { path: PathBuf },

    /// The pipeline moved to a new phase
    StateChanged {
        from: PipelineState,
        to: PipelineState,
    },

    /// A product page is about to be fetched
    ScrapeStarted { url: String },

    /// A product page could not be fetched or extracted
    ScrapeFailed { url: String, reason: String },

    /// A gallery image could not be fetched; it is left out of the archive
    ImageFailed {
        product: String,
        url: String,
        reason: String,
    },

    /// An archive entry could not be written
    EntryFailed { path: String, reason: String },

    /// The archive was finalized
    ArchiveCompleted {
        path: PathBuf,
        entries: usize,
        bytes: u64,
    },
}

/// Receives progress events; shared by every task of one run
pub trait ProgressSink: Send + Sync {
    fn notify(&self, event: ProgressEvent);
}

/// Writes every event as a `tracing` line
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn notify(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::PipelineStarted { url_count } => {
                tracing::info!("Product scraping started: {} URLs", url_count);
            }
            ProgressEvent::ArchiveStarted { path } => {
                tracing::info!("Creating archive {}", path.display());
            }
            ProgressEvent::StateChanged { from, to } => {
                tracing::debug!("Pipeline state {} -> {}", from, to);
            }
            ProgressEvent::ScrapeStarted { url } => {
                tracing::info!("Starting to scrape product: {}", url);
            }
            ProgressEvent::ScrapeFailed { url, reason } => {
                tracing::error!("Error scraping {}: {}", url, reason);
            }
            ProgressEvent::ImageFailed {
                product,
                url,
                reason,
            } => {
                tracing::warn!("Image error for {} ({}): {}", product, url, reason);
            }
            ProgressEvent::EntryFailed { path, reason } => {
                tracing::error!("Failed to write archive entry {}: {}", path, reason);
            }
            ProgressEvent::ArchiveCompleted {
                path,
                entries,
                bytes,
            } => {
                tracing::info!(
                    "Archive created: {} ({} entries, {} total bytes)",
                    path.display(),
                    entries,
                    bytes
                );
            }
        }
    }
}

/// Keeps every event in memory, in arrival order
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ProgressSink for RecordingProgress {
    fn notify(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
