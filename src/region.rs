//! Window and region types.
//!
//! All coordinates are 0-based and half-open.

use std::fmt;

/// A fixed-width scan window on one chromosome.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Window {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
}

impl Window {
    /// The first window of a chromosome: `[0, size)`.
    #[inline]
    pub fn first(chrom: impl Into<String>, size: u64) -> Self {
        Self {
            chrom: chrom.into(),
            start: 0,
            end: size,
        }
    }

    /// Slide the window one width to the right.
    #[inline]
    pub fn advance(&mut self) {
        let size = self.len();
        self.start += size;
        self.end += size;
    }

    /// Window width.
    #[inline]
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Returns true if the window has zero width.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}

/// Direction of a methylation change between test and control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Test is more methylated than control.
    Hyper,
    /// Test is less methylated than control.
    Hypo,
    Unchanged,
}

impl Direction {
    /// Direction of a methylation difference (sign of `diff`).
    #[inline]
    pub fn of(diff: f64) -> Self {
        if diff > 0.0 {
            Direction::Hyper
        } else if diff < 0.0 {
            Direction::Hypo
        } else {
            Direction::Unchanged
        }
    }
}

/// A differentially methylated region.
///
/// Used both for candidate windows emitted by the detector and for the
/// merged regions the joiner writes out.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    /// Test ratio minus control ratio.
    pub diff: f64,
    pub pvalue: f64,
}

impl Region {
    #[inline]
    pub fn new(chrom: impl Into<String>, start: u64, end: u64, diff: f64, pvalue: f64) -> Self {
        Self {
            chrom: chrom.into(),
            start,
            end,
            diff,
            pvalue,
        }
    }

    /// Candidate region covering a whole window.
    #[inline]
    pub fn from_window(window: &Window, diff: f64, pvalue: f64) -> Self {
        Self::new(window.chrom.clone(), window.start, window.end, diff, pvalue)
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        Direction::of(self.diff)
    }

    /// Region length in bases.
    #[inline]
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.chrom, self.start, self.end, self.diff, self.pvalue
        )
    }
}
