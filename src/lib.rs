//! # uprime
//!
//! Automatic control chart calculation for the u'-chart.
//!
//! A u'-chart monitors nonconformities per unit when the area of opportunity
//! varies between subgroups and the counts are over-dispersed relative to a
//! Poisson model. This crate computes the rates, the weighted center line,
//! per-subgroup adjusted control limits, and run-rule signals. It draws
//! nothing: the result set is plain data for a presentation layer.
//!
//! ## Modules
//!
//! - [`spc`] — u'-chart pipeline (statistics, Laney limits, run rules)
//! - [`error`] — Error types
//!
//! ## Quick Start
//!
//! ```
//! use uprime::spc::{RuleSet, UPrimeChart};
//!
//! let weekly = [(1210, 10_000.0), (950, 11_000.0), (1180, 9_000.0), (870, 10_500.0)];
//! let analysis = UPrimeChart::new()
//!     .with_rules(RuleSet::nelson())
//!     .analyze_pairs(&weekly)
//!     .unwrap();
//!
//! assert!(analysis.dispersion().sigma_z > 1.0);
//! for point in analysis.points() {
//!     let (rate, limits) = (point.statistic.rate, &point.limits);
//!     println!("{:.4} in [{:.4}, {:.4}]", rate, limits.lcl, limits.ucl);
//! }
//! assert!(analysis.is_in_control());
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` — `Serialize`/`Deserialize` for configuration and results
//!
//! ## Design Philosophy
//!
//! - **Domain-agnostic**: operates on raw counts and sizes
//! - **Numerical stability**: Leverages `u-numflow` for stable statistics
//! - **Research-backed**: All algorithms reference academic literature

pub mod error;
pub mod spc;

pub use error::{Result, UPrimeError};
