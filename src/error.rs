//! Error types for u'-chart calculation.
//!
//! All calculation failures surface immediately to the caller. The only
//! error that is recovered internally is [`UPrimeError::DegenerateDispersion`]:
//! the limit engine falls back to classical u-chart limits when it sees one.

use thiserror::Error;

/// Errors raised while building or analyzing a u'-chart.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UPrimeError {
    /// Fewer observations than the calculation needs.
    #[error("insufficient data: at least {required} observations required, found {found}")]
    InsufficientData {
        /// Minimum number of observations.
        required: usize,
        /// Number of observations supplied.
        found: usize,
    },

    /// An observation violates the data model (non-positive or non-finite
    /// sample size, negative defect count).
    #[error("invalid observation{}: {reason}", fmt_index(.index))]
    InvalidObservation {
        /// Position of the offending observation, when known.
        index: Option<usize>,
        /// What is wrong with it.
        reason: String,
    },

    /// The over-dispersion estimate cannot be scaled safely (zero center
    /// line, zero or non-finite sigma-z).
    #[error("degenerate dispersion: {reason}")]
    DegenerateDispersion {
        /// Which edge case was hit.
        reason: String,
    },

    /// The baseline range does not select at least two observations.
    #[error("invalid baseline {start}..{end} for {len} observations")]
    InvalidBaseline {
        /// Range start.
        start: usize,
        /// Range end (exclusive).
        end: usize,
        /// Number of observations.
        len: usize,
    },

    /// A chart parameter is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Which parameter and why.
        reason: String,
    },
}

fn fmt_index(index: &Option<usize>) -> String {
    match index {
        Some(i) => format!(" at index {i}"),
        None => String::new(),
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, UPrimeError>;
