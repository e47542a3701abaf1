//! Run configuration for DMR detection.
//!
//! A [`DmrConfig`] is built once from command-line options, validated, and
//! then handed by value to the detector and the joiner. Nothing in the crate
//! mutates it afterwards.

use crate::coverage::{DmapError, Result};

/// Default window width in bases.
pub const DEFAULT_WINDOW_SIZE: u64 = 100;
/// Default minimum number of well-covered sites in the test group.
pub const DEFAULT_MIN_SITES_TEST: usize = 0;
/// Default minimum number of well-covered sites in the control group.
pub const DEFAULT_MIN_SITES_CONTROL: usize = 4;
/// Default minimum per-site coverage for a site to count as well covered.
pub const DEFAULT_MIN_COVERAGE: u64 = 4;
/// Default minimum absolute methylation-rate difference.
pub const DEFAULT_MIN_METH_DIFF: f64 = 0.2;
/// Default p-value threshold.
pub const DEFAULT_MAX_PVALUE: f64 = 0.01;
/// Default join gap, in windows.
pub const DEFAULT_GAP: u64 = 0;

/// Per-window acceptance thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignificanceThresholds {
    pub min_sites_test: usize,
    pub min_sites_control: usize,
    /// Sites with coverage at or above this value count toward the site gates.
    pub min_coverage: u64,
    pub min_meth_diff: f64,
    /// Windows are accepted when the p-value is at or below this value.
    pub max_pvalue: f64,
}

impl Default for SignificanceThresholds {
    fn default() -> Self {
        Self {
            min_sites_test: DEFAULT_MIN_SITES_TEST,
            min_sites_control: DEFAULT_MIN_SITES_CONTROL,
            min_coverage: DEFAULT_MIN_COVERAGE,
            min_meth_diff: DEFAULT_MIN_METH_DIFF,
            max_pvalue: DEFAULT_MAX_PVALUE,
        }
    }
}

/// How the joiner merges consecutive significant windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinPolicy {
    /// Largest gap in bases between a region's end and the next candidate's start.
    pub max_distance: u64,
    /// Allow hyper- and hypo-methylated windows to share a region.
    pub cross_direction: bool,
}

impl Default for JoinPolicy {
    fn default() -> Self {
        Self {
            max_distance: 0,
            cross_direction: false,
        }
    }
}

/// Complete configuration of a DMR run.
#[derive(Debug, Clone, PartialEq)]
pub struct DmrConfig {
    pub window_size: u64,
    /// Join gap measured in windows; the joiner works in bases.
    pub gap: u64,
    pub cross_direction: bool,
    pub thresholds: SignificanceThresholds,
}

impl Default for DmrConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DmrConfig {
    pub fn new() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            gap: DEFAULT_GAP,
            cross_direction: false,
            thresholds: SignificanceThresholds::default(),
        }
    }

    pub fn with_window_size(mut self, size: u64) -> Self {
        self.window_size = size;
        self
    }

    pub fn with_gap(mut self, gap: u64) -> Self {
        self.gap = gap;
        self
    }

    pub fn with_cross_direction(mut self, enabled: bool) -> Self {
        self.cross_direction = enabled;
        self
    }

    pub fn with_min_sites(mut self, test: usize, control: usize) -> Self {
        self.thresholds.min_sites_test = test;
        self.thresholds.min_sites_control = control;
        self
    }

    pub fn with_min_coverage(mut self, coverage: u64) -> Self {
        self.thresholds.min_coverage = coverage;
        self
    }

    pub fn with_min_meth_diff(mut self, diff: f64) -> Self {
        self.thresholds.min_meth_diff = diff;
        self
    }

    pub fn with_max_pvalue(mut self, pvalue: f64) -> Self {
        self.thresholds.max_pvalue = pvalue;
        self
    }

    /// Join policy derived from the gap and direction settings.
    pub fn join_policy(&self) -> JoinPolicy {
        JoinPolicy {
            max_distance: self.gap.saturating_mul(self.window_size),
            cross_direction: self.cross_direction,
        }
    }

    /// Reject settings that cannot produce a meaningful scan.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(DmapError::InvalidConfig(
                "window size must be greater than 0".to_string(),
            ));
        }
        let diff = self.thresholds.min_meth_diff;
        if !(0.0..=1.0).contains(&diff) {
            return Err(DmapError::InvalidConfig(format!(
                "minimum methylation difference must be between 0 and 1, got {}",
                diff
            )));
        }
        let pvalue = self.thresholds.max_pvalue;
        if !(0.0..=1.0).contains(&pvalue) {
            return Err(DmapError::InvalidConfig(format!(
                "p-value threshold must be between 0 and 1, got {}",
                pvalue
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DmrConfig::new();
        assert_eq!(config.window_size, 100);
        assert_eq!(config.thresholds.min_sites_test, 0);
        assert_eq!(config.thresholds.min_sites_control, 4);
        assert_eq!(config.thresholds.min_coverage, 4);
        assert_eq!(config.thresholds.min_meth_diff, 0.2);
        assert_eq!(config.thresholds.max_pvalue, 0.01);
        assert_eq!(config.join_policy(), JoinPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_join_policy_scales_gap_by_window() {
        let config = DmrConfig::new()
            .with_window_size(50)
            .with_gap(3)
            .with_cross_direction(true);
        let policy = config.join_policy();
        assert_eq!(policy.max_distance, 150);
        assert!(policy.cross_direction);
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let config = DmrConfig::new().with_window_size(0);
        assert!(matches!(config.validate(), Err(DmapError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_thresholds() {
        assert!(DmrConfig::new().with_max_pvalue(1.5).validate().is_err());
        assert!(DmrConfig::new().with_max_pvalue(f64::NAN).validate().is_err());
        assert!(DmrConfig::new().with_min_meth_diff(-0.1).validate().is_err());
        assert!(DmrConfig::new().with_min_meth_diff(1.0).validate().is_ok());
    }
}
