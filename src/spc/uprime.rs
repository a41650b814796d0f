//! The u'-chart: statistics, limits, and signals in one pass.
//!
//! [`UPrimeChart`] holds the chart configuration and runs the pipeline
//!
//! ```text
//! observations → rates + u-bar → sigma-z + limits → signals
//! ```
//!
//! returning a [`ChartAnalysis`], the ordered result set a presentation layer
//! renders (center line, limit band, points, highlighted signals).
//!
//! # Reference
//!
//! Laney, D.B. (2002). "Improved Control Charts for Attributes",
//! *Quality Engineering* 14(4), pp. 531-537.

use std::ops::Range;

use tracing::{debug, trace};

use super::chart::{ControlLimits, Signal, Violation};
use super::limits::{compute_limits, DispersionEstimate, LimitConfig, LimitMethod, SigmaZEstimator};
use super::observation::{observations_from_pairs, Observation};
use super::rules::{detect_signals, RuleSet};
use super::statistics::{compute_statistics, PointStatistic, ProcessCenter, MIN_OBSERVATIONS};
use crate::error::{Result, UPrimeError};

/// Full configuration of a u'-chart.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChartConfig {
    /// Limit engine parameters.
    pub limits: LimitConfig,
    /// Observations the center line is computed from; all when `None`.
    pub baseline: Option<Range<usize>>,
    /// Run rules applied to the points.
    pub rules: RuleSet,
}

/// A single point of the result set.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChartPoint {
    /// Rate statistic of the subgroup.
    pub statistic: PointStatistic,
    /// Control limits of the subgroup.
    pub limits: ControlLimits,
    /// Out-of-control annotation.
    pub signal: Signal,
}

impl ChartPoint {
    /// The zero-based index of this point.
    pub fn index(&self) -> usize {
        self.statistic.index
    }

    /// Whether no rule fired at this point.
    pub fn is_in_control(&self) -> bool {
        self.signal.is_in_control()
    }
}

/// Result of analyzing one sequence of observations.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChartAnalysis {
    center: ProcessCenter,
    dispersion: DispersionEstimate,
    points: Vec<ChartPoint>,
}

impl ChartAnalysis {
    /// Center line and the totals behind it.
    pub fn center(&self) -> &ProcessCenter {
        &self.center
    }

    /// The sigma-z used for the limits.
    pub fn dispersion(&self) -> &DispersionEstimate {
        &self.dispersion
    }

    /// All chart points in input order.
    pub fn points(&self) -> &[ChartPoint] {
        &self.points
    }

    /// Check if the process is in statistical control.
    pub fn is_in_control(&self) -> bool {
        self.points.iter().all(ChartPoint::is_in_control)
    }

    /// Every violation on the chart, ordered by point.
    pub fn violations(&self) -> Vec<Violation> {
        self.points
            .iter()
            .flat_map(|p| {
                p.signal.violations.iter().map(move |&v| Violation {
                    point_index: p.index(),
                    violation_type: v,
                })
            })
            .collect()
    }

    /// Indices of the points with at least one violation.
    pub fn out_of_control_indices(&self) -> Vec<usize> {
        self.points
            .iter()
            .filter(|p| !p.is_in_control())
            .map(ChartPoint::index)
            .collect()
    }
}

/// Laney u'-chart for defect rates over varying areas of opportunity.
///
/// Defaults: Laney limits at 3 sigma, sigma-z from the average moving range,
/// no moving-range screening, center from all observations, and the
/// [`RuleSet::standard`] rules.
///
/// # Examples
///
/// ```
/// use uprime::spc::{Observation, UPrimeChart};
///
/// let observations: Vec<Observation> = [(2, 50.0), (1, 50.0), (0, 50.0), (1, 50.0)]
///     .into_iter()
///     .map(|(d, n)| Observation::new(d, n).unwrap())
///     .collect();
///
/// let analysis = UPrimeChart::new().analyze(&observations).unwrap();
/// assert!((analysis.center().u_bar - 0.02).abs() < 1e-12);
/// assert!(analysis.is_in_control());
///
/// let first = &analysis.points()[0];
/// assert_eq!(first.limits.lcl, 0.0);
/// assert!((first.limits.ucl - 0.08).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Default)]
pub struct UPrimeChart {
    config: ChartConfig,
}

impl UPrimeChart {
    /// Create a new u'-chart with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a chart from a full configuration.
    pub fn with_config(config: ChartConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    /// Classical or Laney limits.
    pub fn with_method(mut self, method: LimitMethod) -> Self {
        self.config.limits.method = method;
        self
    }

    /// Width of the limits in sigmas.
    pub fn with_sigma_multiplier(mut self, k: f64) -> Self {
        self.config.limits.sigma_multiplier = k;
        self
    }

    /// Estimator for sigma-z.
    pub fn with_estimator(mut self, estimator: SigmaZEstimator) -> Self {
        self.config.limits.estimator = estimator;
        self
    }

    /// Screen large moving ranges before estimating sigma-z.
    pub fn with_moving_range_screening(mut self, screen: bool) -> Self {
        self.config.limits.screen_moving_ranges = screen;
        self
    }

    /// Compute the center line from a subset of the observations.
    pub fn with_baseline(mut self, baseline: Range<usize>) -> Self {
        self.config.baseline = Some(baseline);
        self
    }

    /// Run rules applied to the points.
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.config.rules = rules;
        self
    }

    /// Runs the full pipeline on an ordered sequence of observations.
    ///
    /// # Errors
    ///
    /// - [`UPrimeError::InsufficientData`] for fewer than two observations.
    /// - [`UPrimeError::InvalidObservation`] for a non-positive sample size.
    /// - [`UPrimeError::InvalidBaseline`] for a baseline outside the data.
    /// - [`UPrimeError::InvalidConfig`] for an out-of-range parameter.
    pub fn analyze(&self, observations: &[Observation]) -> Result<ChartAnalysis> {
        self.config.limits.validate()?;
        self.config.rules.validate()?;

        let stats = compute_statistics(observations, self.config.baseline.clone())?;
        let (limits, dispersion) = compute_limits(&stats.points, &stats.center, &self.config.limits)?;
        let signals = detect_signals(&stats.points, &limits, &self.config.rules)?;

        let points: Vec<ChartPoint> = stats
            .points
            .into_iter()
            .zip(limits)
            .zip(signals)
            .map(|((statistic, limits), signal)| ChartPoint {
                statistic,
                limits,
                signal,
            })
            .collect();

        let analysis = ChartAnalysis {
            center: stats.center,
            dispersion,
            points,
        };

        debug!(
            points = analysis.points.len(),
            u_bar = analysis.center.u_bar,
            sigma_z = analysis.dispersion.sigma_z,
            source = ?analysis.dispersion.source,
            out_of_control = analysis.out_of_control_indices().len(),
            "u'-chart analyzed"
        );

        Ok(analysis)
    }

    /// Validates raw `(defects, sample_size)` pairs and analyzes them.
    ///
    /// # Examples
    ///
    /// ```
    /// use uprime::spc::UPrimeChart;
    ///
    /// let chart = UPrimeChart::new();
    /// assert!(chart.analyze_pairs(&[(3, 10.0), (4, 12.5)]).is_ok());
    /// assert!(chart.analyze_pairs(&[(3, 10.0), (4, 0.0)]).is_err());
    /// ```
    pub fn analyze_pairs(&self, pairs: &[(u64, f64)]) -> Result<ChartAnalysis> {
        let observations = observations_from_pairs(pairs)?;
        self.analyze(&observations)
    }

    /// Splits the sequence at `breakpoints` and analyzes each phase with its
    /// own center line and limits.
    ///
    /// A breakpoint `b` starts a new phase at observation `b`. Breakpoints
    /// must be strictly increasing and every phase must hold at least two
    /// observations. Point indices in each analysis are relative to the
    /// phase. A configured baseline applies to the first phase only.
    ///
    /// # Errors
    ///
    /// [`UPrimeError::InvalidConfig`] for malformed breakpoints, plus any
    /// error of [`UPrimeChart::analyze`].
    pub fn analyze_phases(
        &self,
        observations: &[Observation],
        breakpoints: &[usize],
    ) -> Result<Vec<ChartAnalysis>> {
        let ranges = phase_ranges(observations.len(), breakpoints)?;
        let later_phases = Self::with_config(ChartConfig {
            baseline: None,
            ..self.config.clone()
        });

        ranges
            .into_iter()
            .enumerate()
            .map(|(phase, range)| {
                trace!(phase, start = range.start, end = range.end, "analyzing phase");
                let chart = if phase == 0 { self } else { &later_phases };
                chart.analyze(&observations[range])
            })
            .collect()
    }
}

/// Index ranges of the phases delimited by `breakpoints`.
fn phase_ranges(len: usize, breakpoints: &[usize]) -> Result<Vec<Range<usize>>> {
    let mut ranges = Vec::with_capacity(breakpoints.len() + 1);
    let mut start = 0;
    for &b in breakpoints.iter().chain(std::iter::once(&len)) {
        if b <= start || b > len {
            return Err(UPrimeError::InvalidConfig {
                reason: format!(
                    "breakpoint {b} must be strictly increasing and inside 1..{len}"
                ),
            });
        }
        if b - start < MIN_OBSERVATIONS {
            return Err(UPrimeError::InvalidConfig {
                reason: format!(
                    "phase {start}..{b} holds fewer than {MIN_OBSERVATIONS} observations"
                ),
            });
        }
        ranges.push(start..b);
        start = b;
    }
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spc::chart::ViolationType;
    use crate::spc::limits::DispersionSource;

    fn obs(pairs: &[(u64, f64)]) -> Vec<Observation> {
        observations_from_pairs(pairs).expect("valid observations")
    }

    /// Weekly defect counts over a varying number of inspected units.
    fn overdispersed() -> Vec<(u64, f64)> {
        vec![
            (1210, 10_000.0),
            (950, 11_000.0),
            (1180, 9_000.0),
            (870, 10_500.0),
            (1250, 10_200.0),
            (990, 9_800.0),
            (1100, 10_100.0),
            (1020, 9_600.0),
            (1150, 10_400.0),
            (980, 9_900.0),
        ]
    }

    #[test]
    fn test_textbook_example() {
        let analysis = UPrimeChart::new()
            .analyze(&obs(&[(2, 50.0), (1, 50.0), (0, 50.0), (1, 50.0)]))
            .expect("analysis");
        assert!((analysis.center().u_bar - 0.02).abs() < 1e-12);
        assert_eq!(analysis.dispersion().source, DispersionSource::UniformSampleSize);
        for p in analysis.points() {
            assert_eq!(p.limits.lcl, 0.0);
            assert!((p.limits.ucl - 0.08).abs() < 1e-12);
            assert!(p.is_in_control());
        }
        assert!(analysis.is_in_control());
        assert!(analysis.violations().is_empty());
    }

    #[test]
    fn test_classical_flags_overdispersed_laney_does_not() {
        let data = obs(&overdispersed());
        let classical = UPrimeChart::new()
            .with_method(LimitMethod::Classical)
            .with_rules(RuleSet::beyond_limits_only())
            .analyze(&data)
            .expect("classical");
        let laney = UPrimeChart::new()
            .with_rules(RuleSet::beyond_limits_only())
            .analyze(&data)
            .expect("laney");

        assert!(classical.out_of_control_indices().len() >= 5);
        assert!(laney.dispersion().sigma_z > 1.0);
        assert!(laney.is_in_control(), "{:?}", laney.out_of_control_indices());
    }

    #[test]
    fn test_outlier_detected_with_laney_limits() {
        let mut pairs = overdispersed();
        pairs.extend([(1050, 10_000.0), (1080, 10_300.0), (4000, 10_000.0)]);
        let analysis = UPrimeChart::new()
            .with_rules(RuleSet::beyond_limits_only())
            .analyze_pairs(&pairs)
            .expect("analysis");
        assert_eq!(analysis.out_of_control_indices(), vec![12]);
        assert_eq!(
            analysis.violations(),
            vec![Violation {
                point_index: 12,
                violation_type: ViolationType::BeyondLimits
            }]
        );
    }

    #[test]
    fn test_baseline_center() {
        let chart = UPrimeChart::new().with_baseline(0..3);
        let analysis = chart
            .analyze(&obs(&[(10, 100.0), (12, 120.0), (9, 90.0), (40, 100.0)]))
            .expect("analysis");
        assert!((analysis.center().u_bar - 0.1).abs() < 1e-12);
        assert_eq!(analysis.center().baseline, 0..3);
        assert_eq!(analysis.points().len(), 4);
    }

    #[test]
    fn test_errors_propagate() {
        let chart = UPrimeChart::new();
        assert!(matches!(
            chart.analyze(&obs(&[(1, 10.0)])),
            Err(UPrimeError::InsufficientData { .. })
        ));
        assert!(matches!(
            chart.analyze_pairs(&[(1, 10.0), (1, -2.0)]),
            Err(UPrimeError::InvalidObservation { index: Some(1), .. })
        ));
        assert!(matches!(
            chart
                .clone()
                .with_sigma_multiplier(0.0)
                .analyze(&obs(&[(1, 10.0), (2, 10.0)])),
            Err(UPrimeError::InvalidConfig { .. })
        ));
        assert!(matches!(
            chart
                .with_baseline(3..5)
                .analyze(&obs(&[(1, 10.0), (2, 10.0)])),
            Err(UPrimeError::InvalidBaseline { .. })
        ));
    }

    #[test]
    fn test_deterministic() {
        let data = obs(&overdispersed());
        let chart = UPrimeChart::new().with_rules(RuleSet::nelson());
        let a = chart.analyze(&data).expect("first");
        let b = chart.analyze(&data).expect("second");
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_defects_falls_back() {
        let analysis = UPrimeChart::new()
            .analyze(&obs(&[(0, 10.0), (0, 20.0), (0, 15.0)]))
            .expect("analysis");
        assert_eq!(analysis.dispersion().source, DispersionSource::Fallback);
        assert!(analysis.is_in_control());
    }

    #[test]
    fn test_phases() {
        let mut pairs: Vec<(u64, f64)> = (0..6).map(|i| (10 + i % 2, 100.0)).collect();
        pairs.extend((0..6).map(|i| (50 + i % 2, 100.0)));
        let data = obs(&pairs);

        let phases = UPrimeChart::new()
            .analyze_phases(&data, &[6])
            .expect("phases");
        assert_eq!(phases.len(), 2);
        assert!((phases[0].center().u_bar - 0.105).abs() < 1e-12);
        assert!((phases[1].center().u_bar - 0.505).abs() < 1e-12);
        assert!(phases.iter().all(ChartAnalysis::is_in_control));

        // One phase over the shift: the second half sits outside the limits.
        let single = UPrimeChart::new().analyze(&data).expect("single");
        assert!(!single.is_in_control());
    }

    #[test]
    fn test_phase_baseline_applies_to_first_phase_only() {
        let data = obs(&[
            (10, 100.0),
            (10, 100.0),
            (30, 100.0),
            (30, 100.0),
            (20, 100.0),
            (22, 100.0),
            (24, 100.0),
        ]);
        let phases = UPrimeChart::new()
            .with_baseline(0..2)
            .analyze_phases(&data, &[4])
            .expect("phases");

        assert_eq!(phases[0].center().baseline, 0..2);
        assert!((phases[0].center().u_bar - 0.1).abs() < 1e-12);

        // The second phase centers on all of its own points.
        assert_eq!(phases[1].center().baseline, 0..3);
        assert!((phases[1].center().u_bar - 0.22).abs() < 1e-12);
        assert_eq!(phases[1].center().total_defects, 66);
    }

    #[test]
    fn test_rejects_unrepresentable_input() {
        let chart = UPrimeChart::new();
        assert!(matches!(
            chart.analyze_pairs(&[(u64::MAX, 10.0), (2, 12.0)]),
            Err(UPrimeError::InvalidObservation { index: Some(1), .. })
        ));
        assert!(matches!(
            chart.analyze_pairs(&[(5, 1e-320), (2, 12.0), (3, 5.0)]),
            Err(UPrimeError::InvalidObservation { index: Some(0), .. })
        ));
    }

    #[test]
    fn test_phase_breakpoints_validated() {
        assert_eq!(phase_ranges(6, &[]).expect("ranges"), vec![0..6]);
        assert_eq!(phase_ranges(6, &[2, 4]).expect("ranges"), vec![0..2, 2..4, 4..6]);
        assert!(phase_ranges(6, &[0]).is_err());
        assert!(phase_ranges(6, &[4, 3]).is_err());
        assert!(phase_ranges(6, &[5]).is_err());
        assert!(phase_ranges(6, &[7]).is_err());
        assert!(phase_ranges(6, &[6]).is_err());
    }
}


#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;

    #[test]
    fn test_analysis_json_roundtrip() {
        let analysis = UPrimeChart::new()
            .analyze_pairs(&[(3, 10.0), (5, 12.0), (2, 8.0)])
            .expect("analysis");
        let json = serde_json::to_string(&analysis).expect("serialize");
        let back: ChartAnalysis = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(analysis, back);
    }

    #[test]
    fn test_observation_deserialization_validates() {
        let ok: Observation =
            serde_json::from_str(r#"{"defects":3,"sample_size":10.0}"#).expect("valid");
        assert_eq!(ok.defects(), 3);
        let bad = serde_json::from_str::<Observation>(r#"{"defects":3,"sample_size":0.0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "limits": {
                "method": "Classical",
                "sigma_multiplier": 2.5,
                "estimator": "MedianMovingRange",
                "screen_moving_ranges": true
            },
            "baseline": {"start": 0, "end": 4},
            "rules": {"rules": ["BeyondLimits", {"RunOneSide": {"length": 8}}]}
        }"#;
        let config: ChartConfig = serde_json::from_str(json).expect("config");
        assert_eq!(config.limits.method, LimitMethod::Classical);
        assert_eq!(config.baseline, Some(0..4));
        assert_eq!(config.rules.rules().len(), 2);
        let chart = UPrimeChart::with_config(config);
        assert!((chart.config().limits.sigma_multiplier - 2.5).abs() < f64::EPSILON);
    }
}
