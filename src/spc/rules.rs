//! Signal detector: run rules over the ordered chart points.
//!
//! Every rule is an independent predicate evaluated over a sliding window of
//! the sequence in input order. Rules are selected through the [`Rule`] enum
//! and combined in a [`RuleSet`]; presets cover the Western Electric and
//! Nelson tests.
//!
//! On a u'-chart the limits differ per point, so zone rules work on the
//! standardized position `(u_i - CL) / sigma_i` of each point rather than on
//! a single set of zone lines.
//!
//! # References
//!
//! - Nelson, L.S. (1984). "The Shewhart Control Chart — Tests for Special Causes",
//!   *Journal of Quality Technology* 16(4), pp. 237-239.
//! - Western Electric (1956). *Statistical Quality Control Handbook*.
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.

use super::chart::{ControlLimits, Signal, ViolationType};
use super::statistics::PointStatistic;
use crate::error::{Result, UPrimeError};

/// A single run rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Rule {
    /// Point strictly outside `[LCL, UCL]`.
    BeyondLimits,
    /// `length` consecutive points strictly on one side of the center line.
    RunOneSide {
        /// Number of points in the run.
        length: usize,
    },
    /// `length` consecutive points strictly increasing or strictly decreasing.
    Trend {
        /// Number of points in the trend.
        length: usize,
    },
    /// `length` consecutive points alternating up and down.
    Alternating {
        /// Number of points in the run.
        length: usize,
    },
    /// 2 of 3 consecutive points beyond 2 sigma on the same side.
    TwoOfThreeBeyond2Sigma,
    /// 4 of 5 consecutive points beyond 1 sigma on the same side.
    FourOfFiveBeyond1Sigma,
    /// `length` consecutive points within 1 sigma of the center line.
    StratificationWithin1Sigma {
        /// Number of points in the run.
        length: usize,
    },
    /// `length` consecutive points beyond 1 sigma on either side.
    MixtureBeyond1Sigma {
        /// Number of points in the run.
        length: usize,
    },
}

impl Rule {
    /// Violation reported when this rule fires.
    pub fn violation_type(&self) -> ViolationType {
        match self {
            Rule::BeyondLimits => ViolationType::BeyondLimits,
            Rule::RunOneSide { .. } => ViolationType::RunOneSide,
            Rule::Trend { .. } => ViolationType::Trend,
            Rule::Alternating { .. } => ViolationType::Alternating,
            Rule::TwoOfThreeBeyond2Sigma => ViolationType::TwoOfThreeBeyond2Sigma,
            Rule::FourOfFiveBeyond1Sigma => ViolationType::FourOfFiveBeyond1Sigma,
            Rule::StratificationWithin1Sigma { .. } => ViolationType::StratificationWithin1Sigma,
            Rule::MixtureBeyond1Sigma { .. } => ViolationType::MixtureBeyond1Sigma,
        }
    }

    fn validate(&self) -> Result<()> {
        let length = match *self {
            Rule::RunOneSide { length }
            | Rule::StratificationWithin1Sigma { length }
            | Rule::MixtureBeyond1Sigma { length } => length,
            Rule::Trend { length } | Rule::Alternating { length } => {
                // A run of n points has n - 1 moves; alternation needs two.
                if length < 3 {
                    return Err(invalid_length(self, length, 3));
                }
                length
            }
            _ => return Ok(()),
        };
        if length < 2 {
            return Err(invalid_length(self, length, 2));
        }
        Ok(())
    }

    /// Indices of the points at which this rule fires.
    ///
    /// A pattern is reported at the last point of the window that completes
    /// it; a longer run keeps firing at each further point.
    fn check(&self, points: &[PointStatistic], limits: &[ControlLimits]) -> Vec<usize> {
        match *self {
            Rule::BeyondLimits => check_beyond_limits(points, limits),
            Rule::RunOneSide { length } => check_run_one_side(points, limits, length),
            Rule::Trend { length } => check_trend(points, length),
            Rule::Alternating { length } => check_alternating(points, length),
            Rule::TwoOfThreeBeyond2Sigma => check_k_of_m_beyond(points, limits, 2, 3, 2.0),
            Rule::FourOfFiveBeyond1Sigma => check_k_of_m_beyond(points, limits, 4, 5, 1.0),
            Rule::StratificationWithin1Sigma { length } => {
                check_zone_run(points, limits, length, |z| z.abs() <= 1.0)
            }
            Rule::MixtureBeyond1Sigma { length } => {
                check_zone_run(points, limits, length, |z| z.abs() > 1.0)
            }
        }
    }
}

fn invalid_length(rule: &Rule, length: usize, min: usize) -> UPrimeError {
    UPrimeError::InvalidConfig {
        reason: format!("{rule:?}: run length {length} is below the minimum of {min}"),
    }
}

/// An ordered collection of rules applied together.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// A rule set with the given rules, evaluated in order.
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Only the limit test.
    pub fn beyond_limits_only() -> Self {
        Self::new(vec![Rule::BeyondLimits])
    }

    /// Limit test plus a 9-point run on one side and a 6-point trend.
    pub fn standard() -> Self {
        Self::new(vec![
            Rule::BeyondLimits,
            Rule::RunOneSide { length: 9 },
            Rule::Trend { length: 6 },
        ])
    }

    /// The 4 Western Electric rules (Nelson Rules 1, 2, 5 and 6).
    pub fn western_electric() -> Self {
        Self::new(vec![
            Rule::BeyondLimits,
            Rule::RunOneSide { length: 9 },
            Rule::TwoOfThreeBeyond2Sigma,
            Rule::FourOfFiveBeyond1Sigma,
        ])
    }

    /// All 8 Nelson rules.
    pub fn nelson() -> Self {
        Self::new(vec![
            Rule::BeyondLimits,
            Rule::RunOneSide { length: 9 },
            Rule::Trend { length: 6 },
            Rule::Alternating { length: 14 },
            Rule::TwoOfThreeBeyond2Sigma,
            Rule::FourOfFiveBeyond1Sigma,
            Rule::StratificationWithin1Sigma { length: 15 },
            Rule::MixtureBeyond1Sigma { length: 8 },
        ])
    }

    /// Appends a rule.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// The rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rejects run lengths too short to form a pattern.
    pub fn validate(&self) -> Result<()> {
        self.rules.iter().try_for_each(Rule::validate)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

/// Annotates every point with the rules that fire at it.
///
/// Returns one [`Signal`] per point, in input order.
///
/// # Errors
///
/// [`UPrimeError::InvalidConfig`] if the rule set fails validation or if
/// `points` and `limits` differ in length.
///
/// # Examples
///
/// ```
/// use uprime::spc::{detect_signals, ControlLimits, PointStatistic, RuleSet};
///
/// let limits = ControlLimits { ucl: 0.08, cl: 0.02, lcl: 0.0, sigma: 0.02 };
/// let points: Vec<PointStatistic> = [0.04, 0.08, 0.10]
///     .iter()
///     .enumerate()
///     .map(|(i, &rate)| PointStatistic { index: i, defects: 0, sample_size: 50.0, rate })
///     .collect();
/// let signals = detect_signals(&points, &vec![limits; 3], &RuleSet::standard()).unwrap();
/// assert!(signals[0].is_in_control());
/// assert!(signals[1].is_in_control()); // exactly on the UCL
/// assert!(!signals[2].is_in_control());
/// ```
pub fn detect_signals(
    points: &[PointStatistic],
    limits: &[ControlLimits],
    rules: &RuleSet,
) -> Result<Vec<Signal>> {
    rules.validate()?;
    if points.len() != limits.len() {
        return Err(UPrimeError::InvalidConfig {
            reason: format!("{} points but {} control limits", points.len(), limits.len()),
        });
    }

    let mut signals: Vec<Signal> = points.iter().map(|p| Signal::in_control(p.index)).collect();

    for rule in &rules.rules {
        let violation = rule.violation_type();
        for pos in rule.check(points, limits) {
            let signal = &mut signals[pos];
            if !signal.violations.contains(&violation) {
                signal.violations.push(violation);
            }
        }
    }
    Ok(signals)
}

// ---------------------------------------------------------------------------
// Rule predicates
// ---------------------------------------------------------------------------

/// +1 above, -1 below, 0 on the reference.
fn sign(value: f64, reference: f64) -> i8 {
    if value > reference {
        1
    } else if value < reference {
        -1
    } else {
        0
    }
}

/// Nelson Rule 1. Ties with a limit are in control.
fn check_beyond_limits(points: &[PointStatistic], limits: &[ControlLimits]) -> Vec<usize> {
    let mut violations = Vec::new();
    for (i, (p, l)) in points.iter().zip(limits).enumerate() {
        if !l.contains(p.rate) {
            violations.push(i);
        }
    }
    violations
}

/// Nelson Rule 2. A point exactly on the center line breaks the run.
fn check_run_one_side(
    points: &[PointStatistic],
    limits: &[ControlLimits],
    length: usize,
) -> Vec<usize> {
    let mut violations = Vec::new();
    let mut run_length = 0_usize;
    let mut prev_side = 0_i8;

    for (i, (p, l)) in points.iter().zip(limits).enumerate() {
        let side = sign(p.rate, l.cl);
        run_length = match side {
            0 => 0,
            s if s == prev_side => run_length + 1,
            _ => 1,
        };
        prev_side = side;
        if run_length >= length {
            violations.push(i);
        }
    }
    violations
}

/// Nelson Rule 3. Equal consecutive values break the trend.
fn check_trend(points: &[PointStatistic], length: usize) -> Vec<usize> {
    let mut violations = Vec::new();
    let mut run_length = 0_usize;
    let mut prev_dir = 0_i8;

    // Window i is the move from point i to point i + 1.
    for (i, w) in points.windows(2).enumerate() {
        let dir = sign(w[1].rate, w[0].rate);
        run_length = match dir {
            0 => 0,
            d if d == prev_dir => run_length + 1,
            _ => 1,
        };
        prev_dir = dir;
        if run_length + 1 >= length {
            violations.push(i + 1);
        }
    }
    violations
}

/// Nelson Rule 4.
fn check_alternating(points: &[PointStatistic], length: usize) -> Vec<usize> {
    let mut violations = Vec::new();
    let mut alt_length = 0_usize;
    let mut prev_dir = 0_i8;

    for (i, w) in points.windows(2).enumerate() {
        let dir = sign(w[1].rate, w[0].rate);
        alt_length = if dir == 0 {
            0
        } else if prev_dir != 0 && dir == -prev_dir {
            alt_length + 1
        } else {
            1
        };
        prev_dir = dir;
        if alt_length + 1 >= length {
            violations.push(i + 1);
        }
    }
    violations
}

/// Nelson Rules 5 and 6: at least `k` of `m` consecutive points beyond
/// `zone` sigma on the same side.
fn check_k_of_m_beyond(
    points: &[PointStatistic],
    limits: &[ControlLimits],
    k: usize,
    m: usize,
    zone: f64,
) -> Vec<usize> {
    let mut violations = Vec::new();
    for (start, (pw, lw)) in points.windows(m).zip(limits.windows(m)).enumerate() {
        let mut above = 0_usize;
        let mut below = 0_usize;
        for (p, l) in pw.iter().zip(lw) {
            let z = l.standardize(p.rate);
            if z > zone {
                above += 1;
            } else if z < -zone {
                below += 1;
            }
        }
        if above >= k || below >= k {
            violations.push(start + m - 1);
        }
    }
    violations
}

/// Nelson Rules 7 and 8: a run of points whose standardized position
/// satisfies `in_zone`.
fn check_zone_run(
    points: &[PointStatistic],
    limits: &[ControlLimits],
    length: usize,
    in_zone: impl Fn(f64) -> bool,
) -> Vec<usize> {
    let mut violations = Vec::new();
    let mut run_length = 0_usize;
    for (i, (p, l)) in points.iter().zip(limits).enumerate() {
        if in_zone(l.standardize(p.rate)) {
            run_length += 1;
        } else {
            run_length = 0;
        }
        if run_length >= length {
            violations.push(i);
        }
    }
    violations
}
