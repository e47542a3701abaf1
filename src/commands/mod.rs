//! Command implementations for dmap.

pub mod dmr;
pub mod join;
pub mod mat_merge;

pub use dmr::{DmrCommand, DmrStats};
pub use join::RegionJoiner;
pub use mat_merge::{MatIndex, MatMergeCommand, MatMergeStats};
