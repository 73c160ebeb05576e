//! State module for tracking pipeline progress
//!
//! # Components
//!
//! - `PipelineState`: the phase a run is in (idle, scraping, downloading, finalizing, done)

mod pipeline_state;

// Re-export main types
pub use pipeline_state::PipelineState;
