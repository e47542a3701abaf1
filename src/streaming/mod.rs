//! Shared streaming utilities.
//!
//! - Zero-allocation parsing of tab-delimited coverage lines
//! - Buffered region output with itoa/ryu formatting
//!
//! Memory stays bounded by one window's batch of sites regardless of file size.

pub mod buffers;
pub mod output;
pub mod parsing;

pub use output::{RegionSink, RegionWriter, REGION_HEADER};
pub use parsing::{parse_u64_fast, should_skip_line, split_fields, trim_line_end};
