//! Summary of a finished pipeline run
//!
//! Built by the coordinator once the archive is finalized and printed by the
//! binary.

use crate::archive::ArchiveSummary;
use crate::crawler::ScrapeFailure;
use chrono::{DateTime, Utc};
use std::io::{self, Write};

/// Per-product outcome of the download stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSummary {
    /// Page the product was scraped from
    pub url: String,

    /// Product name as extracted
    pub name: String,

    /// Directory the product was archived under
    pub directory: String,

    pub images_written: usize,
    pub images_failed: usize,
    pub entries_failed: usize,
    pub metadata_written: bool,
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Number of URLs the run was given
    pub url_count: usize,

    /// URLs that produced no product, in input order
    pub failures: Vec<ScrapeFailure>,

    /// Archived products, in input order
    pub products: Vec<ProductSummary>,

    /// The finalized archive
    pub archive: ArchiveSummary,
}

impl RunReport {
    pub fn new(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        url_count: usize,
        failures: Vec<ScrapeFailure>,
        products: Vec<ProductSummary>,
        archive: ArchiveSummary,
    ) -> Self {
        Self {
            started_at,
            finished_at,
            url_count,
            failures,
            products,
            archive,
        }
    }

    /// Number of URLs that produced a product
    pub fn successes(&self) -> usize {
        self.products.len()
    }

    pub fn images_written(&self) -> usize {
        self.products.iter().map(|p| p.images_written).sum()
    }

    pub fn images_failed(&self) -> usize {
        self.products.iter().map(|p| p.images_failed).sum()
    }

    /// Entries that were ready but could not be written
    pub fn entries_failed(&self) -> usize {
        self.products.iter().map(|p| p.entries_failed).sum()
    }

    /// Wall-clock duration in seconds
    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}

/// Prints the report to stdout in a formatted manner
pub fn print_report(report: &RunReport) {
    let stdout = io::stdout();
    if let Err(e) = write_report(&mut stdout.lock(), report) {
        tracing::error!("Failed to print run report: {}", e);
    }
}

/// Writes the formatted report to `out`
pub fn write_report(out: &mut impl Write, report: &RunReport) -> io::Result<()> {
    writeln!(out, "=== Archive Summary ===\n")?;

    writeln!(out, "Overview:")?;
    writeln!(out, "  Started: {}", report.started_at.to_rfc3339())?;
    writeln!(out, "  Finished: {}", report.finished_at.to_rfc3339())?;
    writeln!(out, "  Duration: {}s", report.duration_seconds())?;
    writeln!(out, "  Product URLs: {}", report.url_count)?;
    writeln!(out, "  Archived: {}", report.successes())?;
    writeln!(out, "  Failed: {}", report.failures.len())?;
    writeln!(out)?;

    writeln!(out, "Archive:")?;
    writeln!(out, "  Path: {}", report.archive.path.display())?;
    writeln!(out, "  Entries: {}", report.archive.entries)?;
    writeln!(out, "  Size: {} bytes", report.archive.bytes)?;
    writeln!(out)?;

    writeln!(out, "Images:")?;
    writeln!(out, "  Written: {}", report.images_written())?;
    writeln!(out, "  Failed: {}", report.images_failed())?;
    if report.entries_failed() > 0 {
        writeln!(out, "  Entries not written: {}", report.entries_failed())?;
    }
    writeln!(out)?;

    if !report.failures.is_empty() {
        writeln!(out, "Failed URLs ({}):", report.failures.len())?;
        for failure in &report.failures {
            writeln!(out, "  - {}: {}", failure.url, failure.reason)?;
        }
        writeln!(out)?;
    }

    let success_rate = if report.url_count > 0 {
        (report.successes() as f64 / report.url_count as f64) * 100.0
    } else {
        0.0
    };

    writeln!(
        out,
        "Success Rate: {:.1}% ({} / {} products archived)",
        success_rate,
        report.successes(),
        report.url_count
    )?;

    Ok(())
}
