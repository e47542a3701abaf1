//! Joining of consecutive significant windows into regions.
//!
//! # Algorithm
//!
//! Candidates arrive in coordinate order:
//! 1. Keep a pending run of candidates on the current chromosome
//! 2. Extend the run while the next candidate starts within the join distance
//!    of the run's end (and, unless cross-direction joining is enabled, changes
//!    methylation in the same direction)
//! 3. Otherwise flush the run as one region and start a new run
//!
//! A run of one candidate is written unchanged. Longer runs span from the
//! first start to the last end, with the mean difference and the largest
//! p-value of the run.
//!
//! Nothing is flushed on drop: call [`RegionJoiner::finish`] after the last
//! candidate.

use crate::config::JoinPolicy;
use crate::coverage::Result;
use crate::region::Region;
use crate::streaming::output::RegionSink;

/// Stateful merger of candidate regions.
pub struct RegionJoiner<S: RegionSink> {
    policy: JoinPolicy,
    current_chrom: Option<String>,
    pending: Vec<Region>,
    sink: S,
    candidates: usize,
    regions: usize,
}

impl<S: RegionSink> RegionJoiner<S> {
    pub fn new(policy: JoinPolicy, sink: S) -> Self {
        Self {
            policy,
            current_chrom: None,
            pending: Vec::new(),
            sink,
            candidates: 0,
            regions: 0,
        }
    }

    /// Accept the next candidate.
    pub fn push(&mut self, candidate: Region) -> Result<()> {
        self.candidates += 1;

        if self.current_chrom.as_deref() != Some(candidate.chrom.as_str()) {
            self.flush()?;
            self.current_chrom = Some(candidate.chrom.clone());
            self.pending.push(candidate);
            return Ok(());
        }

        let joinable = match self.pending.last() {
            None => true,
            Some(last) => self.can_join(last, &candidate),
        };
        if !joinable {
            self.flush()?;
        }
        self.pending.push(candidate);
        Ok(())
    }

    #[inline]
    fn can_join(&self, last: &Region, next: &Region) -> bool {
        let close = next.start.saturating_sub(last.end) <= self.policy.max_distance;
        let same_direction = self.policy.cross_direction || last.direction() == next.direction();
        close && same_direction
    }

    /// Write the pending run as one region and clear it.
    pub fn flush(&mut self) -> Result<()> {
        let region = match self.pending.len() {
            0 => return Ok(()),
            1 => self.pending[0].clone(),
            n => {
                let first = &self.pending[0];
                let last = &self.pending[n - 1];
                let diff_sum: f64 = if self.policy.cross_direction {
                    self.pending.iter().map(|r| r.diff.abs()).sum()
                } else {
                    self.pending.iter().map(|r| r.diff).sum()
                };
                let pvalue = self
                    .pending
                    .iter()
                    .map(|r| r.pvalue)
                    .fold(f64::NEG_INFINITY, f64::max);
                Region::new(
                    first.chrom.clone(),
                    first.start,
                    last.end,
                    diff_sum / n as f64,
                    pvalue,
                )
            }
        };
        self.sink.emit(&region)?;
        self.regions += 1;
        self.pending.clear();
        Ok(())
    }

    /// Flush whatever is pending. Must be called after the last candidate.
    pub fn finish(&mut self) -> Result<()> {
        self.flush()
    }

    /// Candidates received so far.
    pub fn candidates(&self) -> usize {
        self.candidates
    }

    /// Regions emitted so far.
    pub fn regions(&self) -> usize {
        self.regions
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Give back the sink. Pending candidates are discarded, not flushed.
    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_distance: u64, cross_direction: bool) -> JoinPolicy {
        JoinPolicy {
            max_distance,
            cross_direction,
        }
    }

    fn join(policy: JoinPolicy, candidates: &[Region]) -> Vec<Region> {
        let mut joiner = RegionJoiner::new(policy, Vec::new());
        for c in candidates {
            joiner.push(c.clone()).unwrap();
        }
        joiner.finish().unwrap();
        joiner.into_sink()
    }

    #[test]
    fn test_single_candidate_is_identity() {
        let c = Region::new("chr1", 100, 200, 0.37, 0.004);
        assert_eq!(join(policy(0, false), &[c.clone()]), vec![c]);
    }

    #[test]
    fn test_adjacent_same_direction_merge() {
        let out = join(
            policy(0, false),
            &[
                Region::new("chr1", 0, 100, 0.3, 0.01),
                Region::new("chr1", 100, 200, 0.5, 0.001),
            ],
        );
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].start, out[0].end), (0, 200));
        assert!((out[0].diff - 0.4).abs() < 1e-12);
        assert_eq!(out[0].pvalue, 0.01);
    }

    #[test]
    fn test_gap_beyond_distance_splits() {
        let a = Region::new("chr1", 0, 100, 0.3, 0.01);
        let b = Region::new("chr1", 200, 300, 0.3, 0.01);
        assert_eq!(join(policy(0, false), &[a.clone(), b.clone()]).len(), 2);
        assert_eq!(join(policy(99, false), &[a.clone(), b.clone()]).len(), 2);
        // Distance exactly at the limit joins.
        let out = join(policy(100, false), &[a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].start, out[0].end), (0, 300));
    }

    #[test]
    fn test_opposite_direction_does_not_merge() {
        let a = Region::new("chr1", 0, 100, 0.3, 0.01);
        let b = Region::new("chr1", 100, 200, -0.3, 0.02);
        let out = join(policy(0, false), &[a.clone(), b.clone()]);
        assert_eq!(out, vec![a, b]);
    }

    #[test]
    fn test_cross_direction_uses_absolute_mean() {
        let out = join(
            policy(0, true),
            &[
                Region::new("chr1", 0, 100, 0.3, 0.01),
                Region::new("chr1", 100, 200, -0.5, 0.02),
            ],
        );
        assert_eq!(out.len(), 1);
        assert!((out[0].diff - 0.4).abs() < 1e-12);
        assert_eq!(out[0].pvalue, 0.02);
    }

    #[test]
    fn test_chromosome_change_flushes() {
        let out = join(
            policy(1_000, false),
            &[
                Region::new("chr1", 0, 100, 0.3, 0.01),
                Region::new("chr1", 100, 200, 0.3, 0.01),
                Region::new("chr2", 0, 100, 0.3, 0.01),
            ],
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].chrom, "chr1");
        assert_eq!(out[0].end, 200);
        assert_eq!(out[1], Region::new("chr2", 0, 100, 0.3, 0.01));
    }

    #[test]
    fn test_run_of_three_then_break() {
        let out = join(
            policy(0, false),
            &[
                Region::new("chr1", 0, 100, -0.2, 0.001),
                Region::new("chr1", 100, 200, -0.4, 0.003),
                Region::new("chr1", 200, 300, -0.6, 0.002),
                Region::new("chr1", 500, 600, -0.6, 0.002),
            ],
        );
        assert_eq!(out.len(), 2);
        assert_eq!((out[0].start, out[0].end), (0, 300));
        assert!((out[0].diff + 0.4).abs() < 1e-12);
        assert_eq!(out[0].pvalue, 0.003);
        assert_eq!((out[1].start, out[1].end), (500, 600));
    }

    #[test]
    fn test_no_flush_without_finish() {
        let mut joiner = RegionJoiner::new(policy(0, false), Vec::new());
        joiner.push(Region::new("chr1", 0, 100, 0.3, 0.01)).unwrap();
        assert_eq!(joiner.regions(), 0);
        assert!(joiner.sink_mut().is_empty());
        joiner.finish().unwrap();
        assert_eq!(joiner.regions(), 1);
        assert_eq!(joiner.candidates(), 1);
        // A second finish has nothing left to write.
        joiner.finish().unwrap();
        assert_eq!(joiner.into_sink().len(), 1);
    }
}
