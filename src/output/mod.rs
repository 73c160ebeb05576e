//! Output module for run diagnostics and reports
//!
//! This module handles:
//! - Progress events emitted while a run is in flight
//! - The summary report produced once the archive is finalized

mod progress;
mod report;

pub use progress::{ProgressEvent, ProgressSink, RecordingProgress, TracingProgress};
pub use report::{print_report, write_report, ProductSummary, RunReport};
