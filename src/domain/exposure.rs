//! Structural checks on a weight matrix before it is evaluated.
//!
//! Violations are collected and returned; deciding whether they block a
//! submission is up to the caller.

use crate::domain::error::DataIntegrityError;
use crate::domain::market_frame::MarketFrame;
use crate::domain::weights::WeightMatrix;
use chrono::NaiveDate;
use std::fmt;
use tracing::warn;

pub const DEFAULT_LEVERAGE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    IlliquidExposure { asset: String, weight: f64 },
    OverLeveraged { gross: f64 },
    UndefinedWeight { asset: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub date: NaiveDate,
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::IlliquidExposure { asset, weight } => {
                write!(f, "{}: weight {} on illiquid {}", self.date, weight, asset)
            }
            ViolationKind::OverLeveraged { gross } => {
                write!(f, "{}: gross exposure {:.6} exceeds 1", self.date, gross)
            }
            ViolationKind::UndefinedWeight { asset } => {
                write!(f, "{}: undefined weight for {}", self.date, asset)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViolationCounts {
    pub illiquid_exposure: usize,
    pub over_leveraged: usize,
    pub undefined_weight: usize,
}

impl ViolationCounts {
    pub fn tally(violations: &[Violation]) -> Self {
        let mut counts = Self::default();
        for v in violations {
            match v.kind {
                ViolationKind::IlliquidExposure { .. } => counts.illiquid_exposure += 1,
                ViolationKind::OverLeveraged { .. } => counts.over_leveraged += 1,
                ViolationKind::UndefinedWeight { .. } => counts.undefined_weight += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.illiquid_exposure + self.over_leveraged + self.undefined_weight
    }
}

/// Check every day of `weights` against `market`.
///
/// Illiquid exposure (weight on an asset that is illiquid or has no close) is
/// only reported on trading days; on a closed market the held row cannot be
/// traded.
pub fn check(
    weights: &WeightMatrix,
    market: &MarketFrame,
    epsilon: f64,
) -> Result<Vec<Violation>, DataIntegrityError> {
    weights.ensure_aligned(market)?;
    let mut violations = Vec::new();

    for t in 0..weights.day_count() {
        let date = weights.dates()[t];
        let trading = market.is_trading_day(t);

        for (a, asset) in weights.assets().iter().enumerate() {
            match weights.get(t, a) {
                None => violations.push(Violation {
                    date,
                    kind: ViolationKind::UndefinedWeight {
                        asset: asset.clone(),
                    },
                }),
                Some(w) if w.is_nan() => violations.push(Violation {
                    date,
                    kind: ViolationKind::UndefinedWeight {
                        asset: asset.clone(),
                    },
                }),
                Some(w) if trading && w != 0.0 && !market.is_tradeable(t, a) => {
                    violations.push(Violation {
                        date,
                        kind: ViolationKind::IlliquidExposure {
                            asset: asset.clone(),
                            weight: w,
                        },
                    })
                }
                Some(_) => {}
            }
        }

        let gross = weights.gross_exposure(t);
        if gross > 1.0 + epsilon {
            violations.push(Violation {
                date,
                kind: ViolationKind::OverLeveraged { gross },
            });
        }
    }

    if !violations.is_empty() {
        let counts = ViolationCounts::tally(&violations);
        warn!(
            illiquid = counts.illiquid_exposure,
            over_leveraged = counts.over_leveraged,
            undefined = counts.undefined_weight,
            "exposure check found violations"
        );
    }

    Ok(violations)
}
