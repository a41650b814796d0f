//! Statistical Process Control (SPC) for nonconformity rates.
//!
//! Implements the u'-chart (Laney u-prime chart) as a one-way pipeline:
//!
//! 1. [`compute_statistics`] — per-subgroup rates and the weighted center line
//! 2. [`compute_limits`] — per-subgroup limits with the sigma-z over-dispersion
//!    adjustment
//! 3. [`detect_signals`] — run rules over the ordered points
//!
//! [`UPrimeChart`] runs all three and returns a [`ChartAnalysis`].
//!
//! # Run Rules
//!
//! - [`RuleSet::standard`] — beyond limits, 9 on one side, 6 trending
//! - [`RuleSet::western_electric`] — 4 classic run rules
//! - [`RuleSet::nelson`] — 8 rules (superset of Western Electric)
//!
//! # References
//!
//! - Laney, D.B. (2002). "Improved Control Charts for Attributes",
//!   *Quality Engineering* 14(4), pp. 531-537.
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.
//! - Nelson, L.S. (1984). "The Shewhart Control Chart — Tests for Special Causes",
//!   *Journal of Quality Technology* 16(4), pp. 237-239.

mod chart;
mod limits;
mod observation;
mod rules;
mod statistics;
mod uprime;

pub use chart::{ControlLimits, Signal, Violation, ViolationType};
pub use limits::{
    compute_limits, estimate_dispersion, point_limits, resolve_dispersion,
    standardized_deviations, DispersionEstimate, DispersionSource, LimitConfig, LimitMethod,
    SigmaZEstimator,
};
pub use observation::{observations_from_pairs, Observation};
pub use rules::{detect_signals, Rule, RuleSet};
pub use statistics::{compute_statistics, PointStatistic, ProcessCenter, Statistics, MIN_OBSERVATIONS};
pub use uprime::{ChartAnalysis, ChartConfig, ChartPoint, UPrimeChart};
