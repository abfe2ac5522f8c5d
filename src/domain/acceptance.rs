//! Acceptance gate: the figures a submission is judged on.
//!
//! Nothing here aborts a run. The report states each check and the overall
//! verdict; callers decide what to do with a failing strategy.

use crate::domain::exposure::{Violation, ViolationCounts};
use crate::domain::performance::StatisticSeries;
use chrono::NaiveDate;
use std::collections::HashMap;

pub const DEFAULT_MIN_SHARPE: f64 = 1.0;
pub const DEFAULT_MAX_CORRELATION: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptanceThresholds {
    pub min_sharpe: f64,
    pub max_correlation: f64,
}

impl Default for AcceptanceThresholds {
    fn default() -> Self {
        Self {
            min_sharpe: DEFAULT_MIN_SHARPE,
            max_correlation: DEFAULT_MAX_CORRELATION,
        }
    }
}

/// Daily relative returns of another, already accepted strategy, keyed by
/// date. Days without a value are simply absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceReturns {
    pub name: String,
    pub returns: Vec<(NaiveDate, f64)>,
}

impl ReferenceReturns {
    /// Pairs of (strategy, reference) returns on the dates both define, over
    /// the strategy's trailing rolling window.
    pub fn aligned_with(&self, statistics: &StatisticSeries) -> (Vec<f64>, Vec<f64>) {
        let by_date: HashMap<NaiveDate, f64> = self.returns.iter().copied().collect();
        let window = statistics.params.window.min(statistics.len());
        statistics.rows[statistics.len() - window..]
            .iter()
            .filter_map(|row| by_date.get(&row.date).map(|&r| (row.relative_return, r)))
            .unzip()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationCheck {
    pub name: String,
    pub correlation: Option<f64>,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AcceptanceReport {
    pub sharpe_ratio: Option<f64>,
    pub sharpe_passed: bool,
    pub correlations: Vec<CorrelationCheck>,
    pub leverage_passed: bool,
    pub exposure_passed: bool,
    pub violations: ViolationCounts,
}

impl AcceptanceReport {
    pub fn passed(&self) -> bool {
        self.sharpe_passed
            && self.leverage_passed
            && self.exposure_passed
            && self.correlations.iter().all(|c| c.passed)
    }
}

/// Pearson correlation of two paired series. Unequal lengths are paired from
/// their trailing ends.
pub fn correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let a = &a[a.len() - n..];
    let b = &b[b.len() - n..];

    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a > 0.0 && var_b > 0.0 {
        Some(cov / (var_a.sqrt() * var_b.sqrt()))
    } else {
        None
    }
}

/// Judge a run. Correlations use the dates of the trailing rolling window that
/// a reference also covers.
///
/// An undefined Sharpe ratio fails; an undefined correlation (constant
/// series, too little overlap) passes.
pub fn evaluate(
    statistics: &StatisticSeries,
    violations: &[Violation],
    references: &[ReferenceReturns],
    thresholds: &AcceptanceThresholds,
) -> AcceptanceReport {
    let sharpe_ratio = statistics.latest_sharpe();
    let sharpe_passed = sharpe_ratio.is_some_and(|s| s > thresholds.min_sharpe);

    let correlations = references
        .iter()
        .map(|reference| {
            let (strategy, other) = reference.aligned_with(statistics);
            let correlation = correlation(&strategy, &other);
            CorrelationCheck {
                name: reference.name.clone(),
                correlation,
                passed: correlation.is_none_or(|c| c < thresholds.max_correlation),
            }
        })
        .collect();

    let counts = ViolationCounts::tally(violations);

    AcceptanceReport {
        sharpe_ratio,
        sharpe_passed,
        correlations,
        leverage_passed: counts.over_leveraged == 0,
        exposure_passed: counts.total() == 0,
        violations: counts,
    }
}
