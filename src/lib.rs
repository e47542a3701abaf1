// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]

//! dmap: differentially methylated region detection
//!
//! This library scans two sorted per-site methylation coverage files (a test
//! and a control sample) in fixed-size windows, tests each window for a
//! methylation difference, and joins significant windows into regions.
//!
//! # Features
//!
//! - **Streaming I/O**: Both inputs are read in a single pass; memory is
//!   bounded by one window of sites
//! - **Exact statistics**: Two-sided Fisher exact test in log space
//! - **Region joining**: Adjacent or nearby windows with the same direction
//!   of change are merged
//!
//! # Example
//!
//! ```rust,no_run
//! use dmap_tools::{commands::DmrCommand, config::DmrConfig};
//!
//! let config = DmrConfig::new().with_window_size(100).with_max_pvalue(0.01);
//! let stats = DmrCommand::new(config)
//!     .run("test.cov", "control.cov", std::io::stdout().lock())
//!     .unwrap();
//! eprintln!("{}", stats);
//! ```

pub mod commands;
pub mod config;
pub mod coverage;
pub mod region;
pub mod significance;
pub mod streaming;

// Re-export commonly used types
pub use coverage::{CoverageReader, CoverageRecord, DmapError, Result, Site, WindowBatch};
pub use region::{Direction, Region, Window};
pub use significance::{fisher_exact_two_sided, test_window, RejectReason, Verdict};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::commands::{DmrCommand, DmrStats, MatMergeCommand, RegionJoiner};
    pub use crate::config::{DmrConfig, JoinPolicy, SignificanceThresholds};
    pub use crate::coverage::{CoverageReader, DmapError, Site};
    pub use crate::region::{Region, Window};
    pub use crate::streaming::{RegionSink, RegionWriter};
}
