//! Pipeline state definitions for tracking run progress
//!
//! A run moves strictly forward through these states, one step at a time.

use std::fmt;

/// Represents the current phase of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PipelineState {
    /// Archive created, nothing scraped yet
    Idle,

    /// Product pages are being fetched and extracted
    Scraping,

    /// Gallery images and metadata are being written to the archive
    Downloading,

    /// The archive is being closed
    Finalizing,

    /// Terminal; the report is available
    Done,
}

impl PipelineState {
    /// The state that follows this one, None for `Done`
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Scraping),
            Self::Scraping => Some(Self::Downloading),
            Self::Downloading => Some(Self::Finalizing),
            Self::Finalizing => Some(Self::Done),
            Self::Done => None,
        }
    }

    /// Returns true if moving from this state to `to` is legal
    ///
    /// Only the single forward step is legal: no skipping, no retreat.
    pub fn can_transition_to(&self, to: Self) -> bool {
        self.next() == Some(to)
    }

    /// Short lowercase name, used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scraping => "scraping",
            Self::Downloading => "downloading",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
