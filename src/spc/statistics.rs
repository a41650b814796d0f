//! Statistic calculator: per-subgroup rates and the process center line.
//!
//! # Formulas
//!
//! - u_i = d_i / n_i
//! - u-bar = sum(d_i) / sum(n_i)
//!
//! The center line is the sample-size-weighted mean rate, not the arithmetic
//! mean of the u_i, so small subgroups do not bias it.
//!
//! # Reference
//!
//! Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.,
//! Chapter 7, Section 7.4.

use std::ops::Range;

use super::observation::{validate_observation, Observation};
use crate::error::{Result, UPrimeError};

/// Minimum number of observations for a chart.
pub const MIN_OBSERVATIONS: usize = 2;

/// Rate statistic for one subgroup.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointStatistic {
    /// Zero-based position in the input sequence.
    pub index: usize,
    /// Defect count of the subgroup.
    pub defects: u64,
    /// Area of opportunity of the subgroup.
    pub sample_size: f64,
    /// Nonconformity rate `defects / sample_size`.
    pub rate: f64,
}

/// Process center line (u-bar) and the totals it was computed from.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessCenter {
    /// Weighted mean nonconformity rate.
    pub u_bar: f64,
    /// Sum of defects over the observations used for the center.
    pub total_defects: u64,
    /// Sum of sample sizes over the observations used for the center.
    pub total_sample_size: f64,
    /// Index range the center was computed from.
    pub baseline: Range<usize>,
}

/// Output of the statistic calculator.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    /// One entry per observation, in input order.
    pub points: Vec<PointStatistic>,
    /// Center line.
    pub center: ProcessCenter,
}

/// Computes per-point rates and the weighted center line.
///
/// When `baseline` is given, only observations inside that range
/// contribute to the center; every observation still gets a point.
///
/// # Errors
///
/// - [`UPrimeError::InsufficientData`] for fewer than two observations.
/// - [`UPrimeError::InvalidObservation`] if a sample size is not positive,
///   a rate is not finite, or the baseline defect total overflows `u64`.
/// - [`UPrimeError::InvalidBaseline`] if the baseline selects fewer than two
///   observations or lies outside the data.
///
/// # Examples
///
/// ```
/// use uprime::spc::{compute_statistics, Observation};
///
/// let obs: Vec<Observation> = [(2, 50.0), (1, 50.0), (0, 50.0), (1, 50.0)]
///     .into_iter()
///     .map(|(d, n)| Observation::new(d, n).unwrap())
///     .collect();
/// let stats = compute_statistics(&obs, None).unwrap();
/// assert!((stats.center.u_bar - 0.02).abs() < 1e-12);
/// assert_eq!(stats.points.len(), 4);
/// ```
pub fn compute_statistics(
    observations: &[Observation],
    baseline: Option<Range<usize>>,
) -> Result<Statistics> {
    if observations.len() < MIN_OBSERVATIONS {
        return Err(UPrimeError::InsufficientData {
            required: MIN_OBSERVATIONS,
            found: observations.len(),
        });
    }

    // The limit engine divides by n_i.
    for (i, obs) in observations.iter().enumerate() {
        validate_observation(obs.defects(), obs.sample_size(), Some(i))?;
    }

    let baseline = match baseline {
        Some(range) => {
            if range.start >= range.end
                || range.end > observations.len()
                || range.len() < MIN_OBSERVATIONS
            {
                return Err(UPrimeError::InvalidBaseline {
                    start: range.start,
                    end: range.end,
                    len: observations.len(),
                });
            }
            range
        }
        None => 0..observations.len(),
    };

    let base = &observations[baseline.clone()];
    let total_defects = base
        .iter()
        .zip(baseline.clone())
        .try_fold(0u64, |acc, (obs, i)| {
            acc.checked_add(obs.defects())
                .ok_or_else(|| UPrimeError::InvalidObservation {
                    index: Some(i),
                    reason: "defect total overflows".into(),
                })
        })?;
    let total_sample_size: f64 = base.iter().map(Observation::sample_size).sum();
    let u_bar = total_defects as f64 / total_sample_size;

    let points = observations
        .iter()
        .enumerate()
        .map(|(i, obs)| PointStatistic {
            index: i,
            defects: obs.defects(),
            sample_size: obs.sample_size(),
            rate: obs.rate(),
        })
        .collect();

    Ok(Statistics {
        points,
        center: ProcessCenter {
            u_bar,
            total_defects,
            total_sample_size,
            baseline,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(pairs: &[(u64, f64)]) -> Vec<Observation> {
        pairs
            .iter()
            .map(|&(d, n)| Observation::new(d, n).expect("valid observation"))
            .collect()
    }

    #[test]
    fn test_center_is_weighted_mean() {
        // Arithmetic mean of rates = (0.1 + 0.5) / 2 = 0.3
        // Weighted mean = 15 / 110 ≈ 0.136
        let data = obs(&[(10, 100.0), (5, 10.0)]);
        let stats = compute_statistics(&data, None).expect("stats");
        let expected = 15.0 / 110.0;
        assert!((stats.center.u_bar - expected).abs() < 1e-12);
        assert_eq!(stats.center.total_defects, 15);
        assert!((stats.center.total_sample_size - 110.0).abs() < 1e-12);
    }

    #[test]
    fn test_rates_in_input_order() {
        let data = obs(&[(3, 10.0), (5, 10.0), (4, 8.0)]);
        let stats = compute_statistics(&data, None).expect("stats");
        let rates: Vec<f64> = stats.points.iter().map(|p| p.rate).collect();
        assert_eq!(rates, vec![0.3, 0.5, 0.5]);
        for (i, p) in stats.points.iter().enumerate() {
            assert_eq!(p.index, i);
        }
    }

    #[test]
    fn test_insufficient_data() {
        let err = compute_statistics(&obs(&[(1, 10.0)]), None).unwrap_err();
        assert_eq!(
            err,
            UPrimeError::InsufficientData {
                required: 2,
                found: 1
            }
        );
        assert!(compute_statistics(&[], None).is_err());
    }

    #[test]
    fn test_baseline_restricts_center() {
        let data = obs(&[(2, 10.0), (2, 10.0), (9, 10.0), (9, 10.0)]);
        let stats = compute_statistics(&data, Some(0..2)).expect("stats");
        assert!((stats.center.u_bar - 0.2).abs() < 1e-12);
        assert_eq!(stats.center.baseline, 0..2);
        // All points still reported
        assert_eq!(stats.points.len(), 4);
    }

    #[test]
    fn test_invalid_baseline() {
        let data = obs(&[(2, 10.0), (2, 10.0), (9, 10.0)]);
        assert!(matches!(
            compute_statistics(&data, Some(1..1)),
            Err(UPrimeError::InvalidBaseline { .. })
        ));
        assert!(matches!(
            compute_statistics(&data, Some(1..5)),
            Err(UPrimeError::InvalidBaseline { .. })
        ));
        assert!(matches!(
            compute_statistics(&data, Some(2..3)),
            Err(UPrimeError::InvalidBaseline { .. })
        ));
    }

    #[test]
    fn test_defect_total_overflow_is_an_error() {
        let data = obs(&[(u64::MAX, 10.0), (2, 12.0)]);
        assert_eq!(
            compute_statistics(&data, None).unwrap_err(),
            UPrimeError::InvalidObservation {
                index: Some(1),
                reason: "defect total overflows".into(),
            }
        );
        // Outside the baseline the large count never enters the total.
        let data = obs(&[(1, 10.0), (2, 12.0), (u64::MAX, 10.0)]);
        let stats = compute_statistics(&data, Some(0..2)).expect("stats");
        assert_eq!(stats.center.total_defects, 3);
    }

    #[test]
    fn test_zero_defects_center() {
        let data = obs(&[(0, 10.0), (0, 20.0)]);
        let stats = compute_statistics(&data, None).expect("stats");
        assert_eq!(stats.center.u_bar, 0.0);
    }
}
