//! Input records for the u'-chart.

use crate::error::{Result, UPrimeError};

/// One subgroup: a defect count over an area of opportunity.
///
/// The sample size can be fractional (square meters, hours, thousands of
/// sessions). Construction validates the record, so every `Observation`
/// held by the chart satisfies `sample_size > 0` and is finite.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "RawObservation")
)]
pub struct Observation {
    defects: u64,
    sample_size: f64,
}

impl Observation {
    /// Creates an observation from a defect count and a sample size.
    ///
    /// # Errors
    ///
    /// [`UPrimeError::InvalidObservation`] if `sample_size` is not finite or
    /// not strictly positive, or if the resulting rate is not finite.
    ///
    /// # Examples
    ///
    /// ```
    /// use uprime::spc::Observation;
    ///
    /// let obs = Observation::new(3, 120.0).unwrap();
    /// assert_eq!(obs.defects(), 3);
    /// assert!(Observation::new(3, 0.0).is_err());
    /// ```
    pub fn new(defects: u64, sample_size: f64) -> Result<Self> {
        validate_observation(defects, sample_size, None)?;
        Ok(Self {
            defects,
            sample_size,
        })
    }

    /// Creates an observation from a signed defect count.
    ///
    /// Ingestion layers reading tabular data often carry counts as signed
    /// integers; a negative count is rejected here.
    pub fn from_signed(defects: i64, sample_size: f64) -> Result<Self> {
        let defects = u64::try_from(defects).map_err(|_| UPrimeError::InvalidObservation {
            index: None,
            reason: format!("negative defect count {defects}"),
        })?;
        Self::new(defects, sample_size)
    }

    /// Number of nonconformities counted in this subgroup.
    pub fn defects(&self) -> u64 {
        self.defects
    }

    /// Area of opportunity for this subgroup.
    pub fn sample_size(&self) -> f64 {
        self.sample_size
    }

    /// Nonconformity rate `defects / sample_size`.
    pub fn rate(&self) -> f64 {
        self.defects as f64 / self.sample_size
    }
}

impl TryFrom<(u64, f64)> for Observation {
    type Error = UPrimeError;

    fn try_from((defects, sample_size): (u64, f64)) -> Result<Self> {
        Self::new(defects, sample_size)
    }
}

impl TryFrom<(i64, f64)> for Observation {
    type Error = UPrimeError;

    fn try_from((defects, sample_size): (i64, f64)) -> Result<Self> {
        Self::from_signed(defects, sample_size)
    }
}

/// Unvalidated wire form; deserialization goes through [`Observation::new`].
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawObservation {
    defects: u64,
    sample_size: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<RawObservation> for Observation {
    type Error = UPrimeError;

    fn try_from(raw: RawObservation) -> Result<Self> {
        Self::new(raw.defects, raw.sample_size)
    }
}

/// Converts raw `(defects, sample_size)` pairs, reporting the first bad index.
pub fn observations_from_pairs(pairs: &[(u64, f64)]) -> Result<Vec<Observation>> {
    pairs
        .iter()
        .enumerate()
        .map(|(i, &(defects, sample_size))| {
            validate_observation(defects, sample_size, Some(i))?;
            Ok(Observation {
                defects,
                sample_size,
            })
        })
        .collect()
}

/// Checks one record. A positive but tiny (subnormal) sample size passes the
/// sign check yet overflows `1 / n` or the rate, so both must stay finite.
pub(crate) fn validate_observation(
    defects: u64,
    sample_size: f64,
    index: Option<usize>,
) -> Result<()> {
    if !sample_size.is_finite() || sample_size <= 0.0 {
        return Err(UPrimeError::InvalidObservation {
            index,
            reason: format!("sample size must be positive and finite, got {sample_size}"),
        });
    }
    if !sample_size.recip().is_finite() || !(defects as f64 / sample_size).is_finite() {
        return Err(UPrimeError::InvalidObservation {
            index,
            reason: format!("rate {defects} / {sample_size} is not finite"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_valid() {
        let obs = Observation::new(4, 2.5).expect("valid observation");
        assert_eq!(obs.defects(), 4);
        assert!((obs.sample_size() - 2.5).abs() < f64::EPSILON);
        assert!((obs.rate() - 1.6).abs() < 1e-12);
    }

    #[test]
    fn test_new_rejects_bad_sample_size() {
        for n in [0.0, -1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = Observation::new(1, n).unwrap_err();
            assert!(
                matches!(err, UPrimeError::InvalidObservation { index: None, .. }),
                "n={n} should be rejected"
            );
        }
    }

    #[test]
    fn test_from_signed_rejects_negative_count() {
        let err = Observation::from_signed(-2, 10.0).unwrap_err();
        assert!(matches!(err, UPrimeError::InvalidObservation { .. }));
        assert!(err.to_string().contains("negative defect count -2"));
    }

    #[test]
    fn test_try_from_pairs() {
        let obs = Observation::try_from((5_u64, 50.0)).expect("valid");
        assert_eq!(obs.defects(), 5);
        let obs = Observation::try_from((5_i64, 50.0)).expect("valid");
        assert_eq!(obs.defects(), 5);
        assert!(Observation::try_from((-5_i64, 50.0)).is_err());
    }

    #[test]
    fn test_observations_from_pairs_reports_index() {
        let err = observations_from_pairs(&[(1, 10.0), (2, 10.0), (3, 0.0)]).unwrap_err();
        assert_eq!(
            err,
            UPrimeError::InvalidObservation {
                index: Some(2),
                reason: "sample size must be positive and finite, got 0".into(),
            }
        );
    }

    #[test]
    fn test_rejects_subnormal_sample_size() {
        let err = Observation::new(5, 1e-320).unwrap_err();
        assert!(matches!(err, UPrimeError::InvalidObservation { index: None, .. }));
        assert!(err.to_string().contains("is not finite"));
        assert!(Observation::new(0, 1e-320).is_err());

        let err = observations_from_pairs(&[(2, 12.0), (5, 1e-320)]).unwrap_err();
        assert!(matches!(
            err,
            UPrimeError::InvalidObservation { index: Some(1), .. }
        ));
    }

    #[test]
    fn test_rejects_overflowing_rate() {
        // 1e-300 has a finite reciprocal, but u64::MAX / 1e-300 does not fit.
        assert!(Observation::new(1, 1e-300).is_ok());
        assert!(Observation::new(u64::MAX, 1e-300).is_err());
    }

    #[test]
    fn test_zero_defects_is_valid() {
        let obs = Observation::new(0, 1.0).expect("zero defects is allowed");
        assert_eq!(obs.rate(), 0.0);
    }
}
