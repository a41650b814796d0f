//! Limit engine: per-subgroup control limits with the Laney over-dispersion
//! adjustment.
//!
//! # Algorithm
//!
//! Classical u-chart limits assume the defect counts are Poisson, so the
//! within-subgroup standard deviation of the rate is
//!
//! ```text
//! sigma_i = sqrt(u_bar / n_i)
//! ```
//!
//! With large subgroups real processes show more variation than this
//! (over-dispersion) and the classical chart flags almost every point.
//! Laney's u'-chart standardizes the rates,
//!
//! ```text
//! z_i  = (u_i - u_bar) / sigma_i
//! MR_i = |z_i - z_{i-1}|
//! sigma_z = MR_bar / d2          (d2 = 1.128 for n = 2)
//! ```
//!
//! and scales every Poisson sigma by the between-subgroup factor:
//!
//! ```text
//! UCL_i = u_bar + k * sigma_i * sigma_z
//! LCL_i = max(0, u_bar - k * sigma_i * sigma_z)
//! ```
//!
//! `sigma_z = 1` reproduces the classical u-chart. When every subgroup has the
//! same sample size the engine uses exactly that, so a uniform-size chart is
//! a classical chart.
//!
//! # References
//!
//! - Laney, D.B. (2002). "Improved Control Charts for Attributes",
//!   *Quality Engineering* 14(4), pp. 531-537.
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.,
//!   Chapter 7, Section 7.4.

use tracing::warn;

use super::chart::ControlLimits;
use super::statistics::{PointStatistic, ProcessCenter};
use crate::error::{Result, UPrimeError};

/// d2 for moving ranges of span 2: sigma-hat = MR-bar / d2.
const D2_MR: f64 = 1.128;

/// Median-of-moving-range bias constant for span 2: sigma-hat = MR-median / 0.954.
const D2_MEDIAN_MR: f64 = 0.954;

/// Upper limit factor for an MR chart of span 2, used to screen moving ranges.
const D4_MR: f64 = 3.267;

/// How control limits are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LimitMethod {
    /// Classical Poisson u-chart limits (sigma-z fixed at 1).
    Classical,
    /// Laney u'-chart limits adjusted for over-dispersion.
    #[default]
    Laney,
}

/// Estimator for sigma-z from the moving ranges of the standardized rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SigmaZEstimator {
    /// `MR_bar / 1.128`.
    #[default]
    AverageMovingRange,
    /// `median(MR) / 0.954`; less sensitive to a few large jumps.
    MedianMovingRange,
}

/// Where the sigma-z used for the limits came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DispersionSource {
    /// Classical limits were requested.
    Classical,
    /// All sample sizes are equal; the u'-chart reduces to the u-chart.
    UniformSampleSize,
    /// Estimated from the moving ranges of the z-scores.
    MovingRange,
    /// The estimate was degenerate; classical limits are used instead.
    Fallback,
}

/// Global over-dispersion scaling constant shared by every point.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DispersionEstimate {
    /// Multiplier applied to every Poisson sigma.
    pub sigma_z: f64,
    /// How `sigma_z` was obtained.
    pub source: DispersionSource,
}

impl DispersionEstimate {
    fn unadjusted(source: DispersionSource) -> Self {
        Self {
            sigma_z: 1.0,
            source,
        }
    }

    /// Whether the limits differ from the classical u-chart.
    pub fn is_adjusted(&self) -> bool {
        self.source == DispersionSource::MovingRange
    }
}

/// Parameters of the limit engine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LimitConfig {
    /// Classical or Laney limits.
    pub method: LimitMethod,
    /// Width of the limits in sigmas (k).
    pub sigma_multiplier: f64,
    /// Estimator for sigma-z.
    pub estimator: SigmaZEstimator,
    /// Drop moving ranges above `3.267 * MR_bar` before estimating sigma-z.
    pub screen_moving_ranges: bool,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            method: LimitMethod::Laney,
            sigma_multiplier: 3.0,
            estimator: SigmaZEstimator::AverageMovingRange,
            screen_moving_ranges: false,
        }
    }
}

impl LimitConfig {
    /// Checks parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.sigma_multiplier.is_finite() || self.sigma_multiplier <= 0.0 {
            return Err(UPrimeError::InvalidConfig {
                reason: format!(
                    "sigma multiplier must be positive and finite, got {}",
                    self.sigma_multiplier
                ),
            });
        }
        Ok(())
    }
}

/// Poisson standard deviation of the rate for a subgroup of size `n`.
fn poisson_sigma(u_bar: f64, sample_size: f64) -> f64 {
    (u_bar / sample_size).sqrt()
}

/// Standardized deviations z_i = (u_i - u_bar) / sqrt(u_bar / n_i).
///
/// # Errors
///
/// [`UPrimeError::DegenerateDispersion`] when `u_bar` is zero or not finite:
/// every Poisson sigma is then zero and no z-score exists.
pub fn standardized_deviations(
    points: &[PointStatistic],
    center: &ProcessCenter,
) -> Result<Vec<f64>> {
    let u_bar = center.u_bar;
    if !u_bar.is_finite() || u_bar <= 0.0 {
        return Err(UPrimeError::DegenerateDispersion {
            reason: format!("center line {u_bar} has no Poisson spread"),
        });
    }
    Ok(points
        .iter()
        .map(|p| (p.rate - u_bar) / poisson_sigma(u_bar, p.sample_size))
        .collect())
}

/// Estimates sigma-z from the moving ranges of the standardized rates.
///
/// Moving ranges span consecutive points in input order, across the whole
/// sequence; the z-scores are taken against `center`, which may come from a
/// baseline subset.
///
/// # Errors
///
/// [`UPrimeError::DegenerateDispersion`] when the center is zero, when all
/// moving ranges are zero, or when the estimate is not finite.
pub fn estimate_dispersion(
    points: &[PointStatistic],
    center: &ProcessCenter,
    estimator: SigmaZEstimator,
    screen_moving_ranges: bool,
) -> Result<f64> {
    let z = standardized_deviations(points, center)?;
    let mut moving_ranges: Vec<f64> = z.windows(2).map(|w| (w[1] - w[0]).abs()).collect();

    if moving_ranges.is_empty() {
        return Err(UPrimeError::DegenerateDispersion {
            reason: "no moving ranges".into(),
        });
    }

    if screen_moving_ranges {
        if let Some(mr_bar) = u_numflow::stats::mean(&moving_ranges) {
            let cutoff = D4_MR * mr_bar;
            let kept: Vec<f64> = moving_ranges
                .iter()
                .copied()
                .filter(|&mr| mr <= cutoff)
                .collect();
            if !kept.is_empty() {
                moving_ranges = kept;
            }
        }
    }

    let sigma_z = match estimator {
        SigmaZEstimator::AverageMovingRange => {
            u_numflow::stats::mean(&moving_ranges).map(|mr_bar| mr_bar / D2_MR)
        }
        SigmaZEstimator::MedianMovingRange => {
            u_numflow::stats::median(&moving_ranges).map(|mr_med| mr_med / D2_MEDIAN_MR)
        }
    };

    match sigma_z {
        Some(s) if s.is_finite() && s > 0.0 => Ok(s),
        Some(s) => Err(UPrimeError::DegenerateDispersion {
            reason: format!("sigma-z estimate {s} cannot scale the limits"),
        }),
        None => Err(UPrimeError::DegenerateDispersion {
            reason: "moving ranges are not finite".into(),
        }),
    }
}

/// Decides the sigma-z for a dataset, falling back to classical limits when
/// the estimate is degenerate.
pub fn resolve_dispersion(
    points: &[PointStatistic],
    center: &ProcessCenter,
    config: &LimitConfig,
) -> DispersionEstimate {
    if config.method == LimitMethod::Classical {
        return DispersionEstimate::unadjusted(DispersionSource::Classical);
    }

    let uniform = points
        .first()
        .map(|first| points.iter().all(|p| p.sample_size == first.sample_size))
        .unwrap_or(true);
    if uniform {
        return DispersionEstimate::unadjusted(DispersionSource::UniformSampleSize);
    }

    match estimate_dispersion(
        points,
        center,
        config.estimator,
        config.screen_moving_ranges,
    ) {
        Ok(sigma_z) => DispersionEstimate {
            sigma_z,
            source: DispersionSource::MovingRange,
        },
        Err(err) => {
            warn!(%err, "falling back to classical u-chart limits");
            DispersionEstimate::unadjusted(DispersionSource::Fallback)
        }
    }
}

/// Limits for one subgroup given the shared center and sigma-z.
pub fn point_limits(
    sample_size: f64,
    u_bar: f64,
    sigma_z: f64,
    sigma_multiplier: f64,
) -> ControlLimits {
    let sigma = poisson_sigma(u_bar, sample_size) * sigma_z;
    ControlLimits {
        ucl: u_bar + sigma_multiplier * sigma,
        cl: u_bar,
        lcl: (u_bar - sigma_multiplier * sigma).max(0.0),
        sigma,
    }
}

/// Computes control limits for every point.
///
/// Never fails on a degenerate dispersion estimate; see
/// [`DispersionSource::Fallback`].
///
/// # Errors
///
/// [`UPrimeError::InvalidConfig`] if the sigma multiplier is out of range.
///
/// # Examples
///
/// ```
/// use uprime::spc::{compute_limits, compute_statistics, LimitConfig, Observation};
///
/// let obs: Vec<Observation> = [(2, 50.0), (1, 50.0), (0, 50.0), (1, 50.0)]
///     .into_iter()
///     .map(|(d, n)| Observation::new(d, n).unwrap())
///     .collect();
/// let stats = compute_statistics(&obs, None).unwrap();
/// let (limits, dispersion) =
///     compute_limits(&stats.points, &stats.center, &LimitConfig::default()).unwrap();
/// assert_eq!(dispersion.sigma_z, 1.0);
/// assert_eq!(limits[0].lcl, 0.0);
/// assert!((limits[0].ucl - 0.08).abs() < 1e-12);
/// ```
pub fn compute_limits(
    points: &[PointStatistic],
    center: &ProcessCenter,
    config: &LimitConfig,
) -> Result<(Vec<ControlLimits>, DispersionEstimate)> {
    config.validate()?;
    let dispersion = resolve_dispersion(points, center, config);
    let limits = points
        .iter()
        .map(|p| {
            point_limits(
                p.sample_size,
                center.u_bar,
                dispersion.sigma_z,
                config.sigma_multiplier,
            )
        })
        .collect();
    Ok((limits, dispersion))
}
