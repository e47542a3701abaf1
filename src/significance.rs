//! Per-window significance test.
//!
//! A window is accepted when it passes four gates in order:
//!
//! 1. enough well-covered sites in each group,
//! 2. a defined methylation ratio in each group,
//! 3. an absolute ratio difference of at least `min_meth_diff`,
//! 4. a two-sided Fisher exact p-value of at most `max_pvalue`.

use crate::config::SignificanceThresholds;
use crate::coverage::Site;
use statrs::function::factorial::ln_factorial;
use std::fmt;

/// Relative tolerance when comparing table probabilities, so that tables
/// equal to the observed one up to rounding are counted.
const FISHER_RELATIVE_TOLERANCE: f64 = 1e-7;

/// Why a window was not reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Too few sites with coverage at or above the minimum.
    TooFewSites,
    /// A group has no reads at all, so its ratio is undefined.
    DegenerateRatio,
    /// The methylation difference is below the threshold.
    BelowMinDiff,
    /// The p-value is above the threshold.
    AbovePValue,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::TooFewSites => "too few sites",
            RejectReason::DegenerateRatio => "degenerate ratio",
            RejectReason::BelowMinDiff => "difference below threshold",
            RejectReason::AbovePValue => "p-value above threshold",
        };
        f.write_str(s)
    }
}

/// Outcome of testing one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Accept { diff: f64, pvalue: f64 },
    Reject(RejectReason),
}

impl Verdict {
    #[inline]
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept { .. })
    }
}

/// Summed methylated/unmethylated reads for one group of sites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupCounts {
    pub methylated: u64,
    pub unmethylated: u64,
}

impl GroupCounts {
    pub fn from_sites(sites: &[Site]) -> Self {
        sites.iter().fold(Self::default(), |acc, site| Self {
            methylated: acc.methylated + site.methylated,
            unmethylated: acc.unmethylated + site.unmethylated(),
        })
    }

    #[inline]
    pub fn total(&self) -> u64 {
        self.methylated + self.unmethylated
    }

    /// Methylated fraction, or `None` when the group has no reads.
    #[inline]
    pub fn ratio(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.methylated as f64 / total as f64),
        }
    }
}

/// Number of sites with coverage at or above `min_coverage`.
#[inline]
fn well_covered(sites: &[Site], min_coverage: u64) -> usize {
    sites.iter().filter(|s| s.coverage >= min_coverage).count()
}

/// Test one window's test and control sites against the thresholds.
pub fn test_window(test: &[Site], control: &[Site], thresholds: &SignificanceThresholds) -> Verdict {
    if well_covered(test, thresholds.min_coverage) < thresholds.min_sites_test
        || well_covered(control, thresholds.min_coverage) < thresholds.min_sites_control
    {
        return Verdict::Reject(RejectReason::TooFewSites);
    }

    // Ratios use every site in the window, not only the well-covered ones.
    let test_counts = GroupCounts::from_sites(test);
    let control_counts = GroupCounts::from_sites(control);
    let (ratio_test, ratio_control) = match (test_counts.ratio(), control_counts.ratio()) {
        (Some(t), Some(c)) => (t, c),
        _ => return Verdict::Reject(RejectReason::DegenerateRatio),
    };

    let diff = ratio_test - ratio_control;
    if diff.abs() < thresholds.min_meth_diff {
        return Verdict::Reject(RejectReason::BelowMinDiff);
    }

    let pvalue = fisher_exact_two_sided(
        test_counts.methylated,
        test_counts.unmethylated,
        control_counts.methylated,
        control_counts.unmethylated,
    );
    if pvalue <= thresholds.max_pvalue {
        Verdict::Accept { diff, pvalue }
    } else {
        Verdict::Reject(RejectReason::AbovePValue)
    }
}

/// Two-sided Fisher exact test on the 2x2 table `[[a, b], [c, d]]`.
///
/// Sums the hypergeometric probability of every table with the observed
/// margins whose probability does not exceed the observed table's.
pub fn fisher_exact_two_sided(a: u64, b: u64, c: u64, d: u64) -> f64 {
    let row1 = a + b;
    let row2 = c + d;
    let col1 = a + c;
    let n = row1 + row2;
    if n == 0 {
        return 1.0;
    }

    let log_denominator = ln_factorial(n) - ln_factorial(col1) - ln_factorial(n - col1);
    let log_prob = |x: u64| -> f64 {
        ln_factorial(row1) - ln_factorial(x) - ln_factorial(row1 - x) + ln_factorial(row2)
            - ln_factorial(col1 - x)
            - ln_factorial(row2 + x - col1)
            - log_denominator
    };

    let observed = log_prob(a);
    let cutoff = observed + FISHER_RELATIVE_TOLERANCE.ln_1p();
    let lo = col1.saturating_sub(row2);
    let hi = row1.min(col1);

    let pvalue: f64 = (lo..=hi)
        .map(log_prob)
        .filter(|&lp| lp <= cutoff)
        .map(f64::exp)
        .sum();
    pvalue.min(1.0)
}
