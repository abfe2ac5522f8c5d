//! Allocation weights and their normalization.
//!
//! A [`WeightMatrix`] holds one optional weight per (day, asset). The
//! normalizer masks candidates by liquidity and selector, scales each day to be
//! fully invested or flat, and carries the last valid row over bad days (market
//! closed, or before the first defined signal).

use crate::domain::error::DataIntegrityError;
use crate::domain::market_frame::MarketFrame;
use crate::domain::signal::TrendSignal;
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct WeightMatrix {
    dates: Vec<NaiveDate>,
    assets: Vec<String>,
    cells: Vec<Option<f64>>,
}

impl WeightMatrix {
    pub fn new(
        dates: Vec<NaiveDate>,
        assets: Vec<String>,
        cells: Vec<Option<f64>>,
    ) -> Result<Self, DataIntegrityError> {
        let expected = dates.len() * assets.len();
        if cells.len() != expected {
            return Err(DataIntegrityError::ShapeMismatch {
                expected,
                actual: cells.len(),
            });
        }
        Ok(Self {
            dates,
            assets,
            cells,
        })
    }

    /// Fully defined matrix from dense rows.
    pub fn from_rows(
        dates: Vec<NaiveDate>,
        assets: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, DataIntegrityError> {
        let width = assets.len();
        let mut cells = Vec::with_capacity(dates.len() * width);
        for row in &rows {
            if row.len() != width {
                return Err(DataIntegrityError::ShapeMismatch {
                    expected: width,
                    actual: row.len(),
                });
            }
            cells.extend(row.iter().map(|&w| Some(w)));
        }
        Self::new(dates, assets, cells)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn day_count(&self) -> usize {
        self.dates.len()
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn get(&self, day: usize, asset: usize) -> Option<f64> {
        self.cells[day * self.assets.len() + asset]
    }

    /// Weight with undefined cells read as flat.
    pub fn weight(&self, day: usize, asset: usize) -> f64 {
        self.get(day, asset).filter(|w| !w.is_nan()).unwrap_or(0.0)
    }

    pub fn row(&self, day: usize) -> &[Option<f64>] {
        let width = self.assets.len();
        &self.cells[day * width..(day + 1) * width]
    }

    /// Σ|weight| for one day, undefined cells excluded.
    pub fn gross_exposure(&self, day: usize) -> f64 {
        (0..self.assets.len())
            .map(|a| self.weight(day, a).abs())
            .sum()
    }

    /// Same days and assets, in the same order, as the market frame.
    pub fn ensure_aligned(&self, market: &MarketFrame) -> Result<(), DataIntegrityError> {
        if self.dates != market.dates() {
            return Err(DataIntegrityError::Misaligned {
                reason: format!(
                    "{} weight days vs {} market days",
                    self.dates.len(),
                    market.day_count()
                ),
            });
        }
        if self.assets != market.assets() {
            return Err(DataIntegrityError::Misaligned {
                reason: format!(
                    "weight assets [{}] vs market assets [{}]",
                    self.assets.join(","),
                    market.assets().join(",")
                ),
            });
        }
        Ok(())
    }

    /// The same matrix with columns arranged in the market's asset order.
    /// Dates must match exactly; the asset set must match up to order.
    pub fn aligned_to(&self, market: &MarketFrame) -> Result<Self, DataIntegrityError> {
        let width = self.assets.len();
        let positions: Option<Vec<usize>> = market
            .assets()
            .iter()
            .map(|asset| self.assets.iter().position(|a| a == asset))
            .collect();
        let positions = match positions {
            Some(p) if p.len() == width => p,
            _ => {
                return Err(DataIntegrityError::Misaligned {
                    reason: format!(
                        "weight assets [{}] vs market assets [{}]",
                        self.assets.join(","),
                        market.assets().join(",")
                    ),
                });
            }
        };

        let cells = (0..self.day_count())
            .flat_map(|t| positions.iter().map(move |&src| (t, src)))
            .map(|(t, src)| self.cells[t * width + src])
            .collect();
        let reordered = Self::new(self.dates.clone(), market.assets().to_vec(), cells)?;
        reordered.ensure_aligned(market)?;
        Ok(reordered)
    }
}

/// Per-(day, asset) allocation signal. `None` means not yet defined.
pub trait Selector {
    fn select(&self, day: usize, asset: usize) -> Option<bool>;
}

/// The breadth trend selects every asset on up-trend days.
impl Selector for TrendSignal {
    fn select(&self, day: usize, _asset: usize) -> Option<bool> {
        self.change.get(day).copied().flatten().map(|c| c > 0.0)
    }
}

/// Always invested in every liquid asset.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuyAndHold;

impl Selector for BuyAndHold {
    fn select(&self, _day: usize, _asset: usize) -> Option<bool> {
        Some(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocationMode {
    #[default]
    Trend,
    BuyAndHold,
}

impl FromStr for AllocationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trend" => Ok(AllocationMode::Trend),
            "buy_and_hold" | "buy-and-hold" => Ok(AllocationMode::BuyAndHold),
            other => Err(format!(
                "unknown allocation mode '{other}' (expected trend or buy_and_hold)"
            )),
        }
    }
}

impl fmt::Display for AllocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationMode::Trend => write!(f, "trend"),
            AllocationMode::BuyAndHold => write!(f, "buy_and_hold"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalization {
    pub weights: WeightMatrix,
    /// Days whose row was carried forward.
    pub corrected_days: Vec<usize>,
}

impl Normalization {
    pub fn corrected_count(&self) -> usize {
        self.corrected_days.len()
    }
}

/// Equal-weight the selected assets of each day that are liquid and priced.
pub fn normalize(selector: &dyn Selector, market: &MarketFrame) -> Normalization {
    let width = market.asset_count();
    let first_signal = (0..market.day_count())
        .find(|&t| (0..width).any(|a| selector.select(t, a).is_some()));

    let rows = (0..market.day_count()).map(|t| {
        let before_signal = first_signal.is_none_or(|first| t < first);
        if before_signal || !market.is_trading_day(t) {
            return None;
        }
        let candidates: Vec<f64> = (0..width)
            .map(|a| {
                let selected = selector.select(t, a).unwrap_or(false);
                if selected && market.is_tradeable(t, a) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        Some(scale_to_full(candidates))
    });

    carry_forward(market, rows)
}

/// Normalize an externally produced weight matrix: undefined, illiquid and
/// unpriced cells become flat, rows above unit leverage are scaled down, and bad days
/// (market closed, no weights defined yet, or a fully undefined row) carry the
/// previous valid row, masked by liquidity when the market is open. Columns
/// are matched to the market's assets by name.
pub fn clean(raw: &WeightMatrix, market: &MarketFrame) -> Result<Normalization, DataIntegrityError> {
    let raw = &raw.aligned_to(market)?;
    let width = market.asset_count();
    let defined = |t: usize| raw.row(t).iter().any(|w| w.is_some_and(|w| !w.is_nan()));

    let rows = (0..market.day_count()).map(|t| {
        if !market.is_trading_day(t) || !defined(t) {
            return None;
        }
        let masked: Vec<f64> = (0..width)
            .map(|a| {
                if market.is_tradeable(t, a) {
                    raw.weight(t, a)
                } else {
                    0.0
                }
            })
            .collect();
        Some(clip_leverage(masked))
    });

    let mut normalization = carry_forward(market, rows);

    // A row carried onto a trading day still has to respect that day's tradeable assets.
    for &t in &normalization.corrected_days {
        if !market.is_trading_day(t) {
            continue;
        }
        for a in 0..width {
            if !market.is_tradeable(t, a) {
                normalization.weights.cells[t * width + a] = Some(0.0);
            }
        }
    }

    Ok(normalization)
}

fn scale_to_full(mut row: Vec<f64>) -> Vec<f64> {
    let total: f64 = row.iter().sum();
    if total > 0.0 {
        for w in row.iter_mut() {
            *w /= total;
        }
    }
    row
}

fn clip_leverage(mut row: Vec<f64>) -> Vec<f64> {
    let gross: f64 = row.iter().map(|w| w.abs()).sum();
    if gross > 1.0 {
        for w in row.iter_mut() {
            *w /= gross;
        }
    }
    row
}

/// `None` rows are bad days and take the last valid row (zeros before any).
fn carry_forward(
    market: &MarketFrame,
    rows: impl Iterator<Item = Option<Vec<f64>>>,
) -> Normalization {
    let width = market.asset_count();
    let mut cells = Vec::with_capacity(market.day_count() * width);
    let mut corrected_days = Vec::new();
    let mut last_valid: Option<Vec<f64>> = None;

    for (t, row) in rows.enumerate() {
        match row {
            Some(row) => {
                cells.extend(row.iter().map(|&w| Some(w)));
                last_valid = Some(row);
            }
            None => {
                corrected_days.push(t);
                match &last_valid {
                    Some(prev) => cells.extend(prev.iter().map(|&w| Some(w))),
                    None => cells.extend(std::iter::repeat_n(Some(0.0), width)),
                }
            }
        }
    }

    debug!(
        days = market.day_count(),
        corrected = corrected_days.len(),
        "normalized allocation weights"
    );

    Normalization {
        weights: WeightMatrix {
            dates: market.dates().to_vec(),
            assets: market.assets().to_vec(),
            cells,
        },
        corrected_days,
    }
}
