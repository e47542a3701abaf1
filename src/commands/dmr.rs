//! Windowed DMR detection over two sorted coverage streams.
//!
//! # Algorithm
//!
//! Both inputs are walked in lockstep, one fixed-width window at a time:
//! 1. Drain the sites of the current window from the test and control readers
//! 2. If either reader has moved to another chromosome, force the other reader
//!    to that chromosome and restart at window `[0, size)` there
//! 3. If both windows hold sites, run the significance test and hand accepted
//!    windows to the [`RegionJoiner`]
//! 4. Slide the window and repeat until both readers are exhausted
//!
//! # Memory Complexity
//!
//! O(w) where w = number of sites in one window; nothing else is buffered
//! apart from the joiner's pending run.
//!
//! # Requirements
//!
//! Both input files MUST be sorted by chromosome, then by position, with the
//! same chromosome order, and must start on the same chromosome.

use crate::commands::join::RegionJoiner;
use crate::config::DmrConfig;
use crate::coverage::{CoverageReader, DmapError, Result, WindowBatch};
use crate::region::{Region, Window};
use crate::significance::{test_window, RejectReason, Verdict};
use crate::streaming::output::{RegionSink, RegionWriter};
use log::{debug, info, warn};
use std::fmt;
use std::io::{BufRead, Write};
use std::path::Path;

/// DMR detection command.
#[derive(Debug, Clone, Default)]
pub struct DmrCommand {
    pub config: DmrConfig,
}

impl DmrCommand {
    pub fn new(config: DmrConfig) -> Self {
        Self { config }
    }

    /// Detect DMRs between two sorted coverage files and write them to `output`.
    pub fn run<P: AsRef<Path>, Q: AsRef<Path>, W: Write>(
        &self,
        test_path: P,
        control_path: Q,
        output: W,
    ) -> Result<DmrStats> {
        self.config.validate()?;
        let test = CoverageReader::from_path(test_path)?;
        let control = CoverageReader::from_path(control_path)?;

        let mut writer = RegionWriter::new(output);
        writer.write_header()?;
        let stats = self.scan(test, control, &mut writer)?;
        writer.flush()?;
        Ok(stats)
    }

    /// Core scan: walk both readers window by window and feed accepted
    /// windows through a joiner into `sink`.
    pub fn scan<A: BufRead, B: BufRead, S: RegionSink>(
        &self,
        mut test: CoverageReader<A>,
        mut control: CoverageReader<B>,
        sink: S,
    ) -> Result<DmrStats> {
        self.config.validate()?;
        let size = self.config.window_size;
        let thresholds = self.config.thresholds;
        let mut joiner = RegionJoiner::new(self.config.join_policy(), sink);
        let mut stats = DmrStats::default();

        let test_chrom = test.current_chrom()?.map(str::to_owned);
        let control_chrom = control.current_chrom()?.map(str::to_owned);
        let mut window = match (test_chrom, control_chrom) {
            (Some(t), Some(c)) if t != c => {
                return Err(DmapError::UnalignedInputs {
                    test: t,
                    control: c,
                });
            }
            (Some(chrom), Some(_)) => Window::first(chrom, size),
            (Some(chrom), None) => {
                warn!("Control input is empty; no window will be tested");
                Window::first(chrom, size)
            }
            (None, Some(chrom)) => {
                warn!("Test input is empty; no window will be tested");
                Window::first(chrom, size)
            }
            (None, None) => {
                info!("Both inputs are empty");
                joiner.finish()?;
                return Ok(stats);
            }
        };
        let mut chrom_stats = ChromStats::default();

        loop {
            let test_batch = test.collect_until(&window.chrom, window.end)?;
            let control_batch = control.collect_until(&window.chrom, window.end)?;

            match (test_batch, control_batch) {
                (WindowBatch::Exhausted, WindowBatch::Exhausted) => break,
                (WindowBatch::ChromosomeMismatch(next), _) => {
                    debug!("Test moved to {}; aligning control", next);
                    control.skip_to_chromosome(&next)?;
                    stats.finish_chromosome(&window.chrom, &mut chrom_stats);
                    window = Window::first(next, size);
                    continue;
                }
                (_, WindowBatch::ChromosomeMismatch(next)) => {
                    debug!("Control moved to {}; aligning test", next);
                    test.skip_to_chromosome(&next)?;
                    stats.finish_chromosome(&window.chrom, &mut chrom_stats);
                    window = Window::first(next, size);
                    continue;
                }
                (WindowBatch::Records(test_sites), WindowBatch::Records(control_sites))
                    if !test_sites.is_empty() && !control_sites.is_empty() =>
                {
                    chrom_stats.tested += 1;
                    match test_window(&test_sites, &control_sites, &thresholds) {
                        Verdict::Accept { diff, pvalue } => {
                            debug!("{} accepted: diff={} p={}", window, diff, pvalue);
                            chrom_stats.candidates += 1;
                            joiner.push(Region::from_window(&window, diff, pvalue))?;
                        }
                        Verdict::Reject(reason) => stats.reject(reason),
                    }
                }
                // Sparse window: one side has no sites here.
                _ => {}
            }

            chrom_stats.windows += 1;
            window.advance();
        }

        stats.finish_chromosome(&window.chrom, &mut chrom_stats);
        joiner.finish()?;
        stats.regions = joiner.regions();
        Ok(stats)
    }
}

/// Counters for the chromosome currently being scanned.
#[derive(Debug, Default, Clone)]
struct ChromStats {
    windows: usize,
    tested: usize,
    candidates: usize,
}

/// Statistics from a DMR run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DmrStats {
    /// Chromosomes scanned
    pub chromosomes: usize,
    /// Windows visited
    pub windows: usize,
    /// Windows with sites in both inputs
    pub windows_tested: usize,
    /// Windows that passed every gate
    pub candidates: usize,
    /// Regions written after joining
    pub regions: usize,
    pub rejected_sites: usize,
    pub rejected_degenerate: usize,
    pub rejected_diff: usize,
    pub rejected_pvalue: usize,
}

impl DmrStats {
    fn reject(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::TooFewSites => self.rejected_sites += 1,
            RejectReason::DegenerateRatio => self.rejected_degenerate += 1,
            RejectReason::BelowMinDiff => self.rejected_diff += 1,
            RejectReason::AbovePValue => self.rejected_pvalue += 1,
        }
    }

    fn finish_chromosome(&mut self, chrom: &str, chrom_stats: &mut ChromStats) {
        info!(
            "{}: {} windows, {} tested, {} candidates",
            chrom, chrom_stats.windows, chrom_stats.tested, chrom_stats.candidates
        );
        self.chromosomes += 1;
        self.windows += chrom_stats.windows;
        self.windows_tested += chrom_stats.tested;
        self.candidates += chrom_stats.candidates;
        *chrom_stats = ChromStats::default();
    }

    /// Total windows rejected by any gate.
    pub fn rejected(&self) -> usize {
        self.rejected_sites + self.rejected_degenerate + self.rejected_diff + self.rejected_pvalue
    }
}

impl fmt::Display for DmrStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Chromosomes: {}, Windows: {}, Tested: {}, Candidates: {}, Regions: {}, \
             Rejected: {} (sites: {}, degenerate: {}, diff: {}, p-value: {})",
            self.chromosomes,
            self.windows,
            self.windows_tested,
            self.candidates,
            self.regions,
            self.rejected(),
            self.rejected_sites,
            self.rejected_degenerate,
            self.rejected_diff,
            self.rejected_pvalue
        )
    }
}
