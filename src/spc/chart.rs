//! Core chart types shared by the limit engine and the signal detector.
//!
//! Defines the per-point control limits, the violation taxonomy, and the
//! per-point [`Signal`] annotation that the presentation layer highlights.
//!
//! # References
//!
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.
//! - ASTM E2587 — Standard Practice for Use of Control Charts

/// Control limits for one point of the chart.
///
/// On a u'-chart every subgroup has its own limits because the Poisson
/// sigma depends on the subgroup's sample size.
///
/// # Invariants
///
/// - `0 <= lcl <= cl <= ucl`
/// - `sigma >= 0`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControlLimits {
    /// Upper control limit (UCL = CL + k sigma).
    pub ucl: f64,
    /// Center line (u-bar).
    pub cl: f64,
    /// Lower control limit (LCL = max(0, CL - k sigma)).
    pub lcl: f64,
    /// Standard deviation of the rate at this point, after the dispersion
    /// adjustment. Zone rules measure distances in multiples of it.
    pub sigma: f64,
}

impl ControlLimits {
    /// Whether `value` lies inside `[lcl, ucl]`. Points exactly on a limit
    /// are in control.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lcl && value <= self.ucl
    }

    /// Distance of `value` from the center line in sigmas.
    ///
    /// With a zero sigma (no defects in the baseline) a point on the center
    /// is at 0 and any other point is infinitely far away.
    pub fn standardize(&self, value: f64) -> f64 {
        let deviation = value - self.cl;
        if self.sigma > 0.0 {
            deviation / self.sigma
        } else if deviation > 0.0 {
            f64::INFINITY
        } else if deviation < 0.0 {
            f64::NEG_INFINITY
        } else {
            0.0
        }
    }
}

/// Types of out-of-control patterns.
///
/// Each variant corresponds to one run rule; see [`super::Rule`].
///
/// # Reference
///
/// Nelson, L.S. (1984). "The Shewhart Control Chart — Tests for Special Causes",
/// *Journal of Quality Technology* 16(4), pp. 237-239.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ViolationType {
    /// Point strictly outside its control limits (Nelson Rule 1).
    BeyondLimits,

    /// Run of consecutive points on the same side of the center line
    /// (Nelson Rule 2).
    RunOneSide,

    /// Run of consecutive points steadily increasing or decreasing
    /// (Nelson Rule 3).
    Trend,

    /// Run of consecutive points alternating up and down (Nelson Rule 4).
    Alternating,

    /// 2 out of 3 points beyond 2 sigma on the same side (Nelson Rule 5).
    TwoOfThreeBeyond2Sigma,

    /// 4 out of 5 points beyond 1 sigma on the same side (Nelson Rule 6).
    FourOfFiveBeyond1Sigma,

    /// Run of points within 1 sigma of the center line (Nelson Rule 7).
    ///
    /// Stratification: less variation than the limits allow.
    StratificationWithin1Sigma,

    /// Run of points beyond 1 sigma on either side (Nelson Rule 8).
    ///
    /// Mixture: points avoid the center zone.
    MixtureBeyond1Sigma,
}

/// Out-of-control annotation for one point.
///
/// Every point gets a signal; an empty `violations` list means the point is
/// in control.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Signal {
    /// The zero-based index of the point.
    pub index: usize,
    /// Rules that fired at this point, in rule-set order.
    pub violations: Vec<ViolationType>,
}

impl Signal {
    /// A signal with no violations.
    pub fn in_control(index: usize) -> Self {
        Self {
            index,
            violations: Vec::new(),
        }
    }

    /// Whether no rule fired at this point.
    pub fn is_in_control(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A violation detected on the chart.
///
/// Associates a specific point index with the type of violation observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Violation {
    /// The index of the point where the violation was detected.
    pub point_index: usize,
    /// The type of violation.
    pub violation_type: ViolationType,
}
