//! MarketFrame: the (time, field, asset) cube and its unified timeline.

use crate::domain::error::DataIntegrityError;
use crate::domain::observation::{Observation, absent};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Close,
    IsLiquid,
}

impl Field {
    pub const ALL: [Field; 2] = [Field::Close, Field::IsLiquid];
    pub const COUNT: usize = Self::ALL.len();

    fn offset(self) -> usize {
        match self {
            Field::Close => 0,
            Field::IsLiquid => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Close => "close",
            Field::IsLiquid => "is_liquid",
        }
    }
}

/// Read-only daily market data for a fixed set of assets.
///
/// Cells are stored row-major by (day, field, asset). A `None` cell is missing
/// data; NaN inputs are stored as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketFrame {
    dates: Vec<NaiveDate>,
    assets: Vec<String>,
    values: Vec<Option<f64>>,
    asset_index: HashMap<String, usize>,
}

impl MarketFrame {
    /// Build a frame from a flat (day, field, asset) buffer, validating every
    /// integrity rule up front.
    pub fn new(
        dates: Vec<NaiveDate>,
        assets: Vec<String>,
        values: Vec<Option<f64>>,
    ) -> Result<Self, DataIntegrityError> {
        let expected = dates.len() * Field::COUNT * assets.len();
        if values.len() != expected {
            return Err(DataIntegrityError::ShapeMismatch {
                expected,
                actual: values.len(),
            });
        }

        for pair in dates.windows(2) {
            if pair[1] <= pair[0] {
                return Err(DataIntegrityError::NonMonotonicDays {
                    context: "market frame".to_string(),
                    previous: pair[0],
                    current: pair[1],
                });
            }
        }

        let mut asset_index = HashMap::with_capacity(assets.len());
        for (i, asset) in assets.iter().enumerate() {
            if asset_index.insert(asset.clone(), i).is_some() {
                return Err(DataIntegrityError::DuplicateAsset(asset.clone()));
            }
        }

        let mut frame = Self {
            dates,
            assets,
            values,
            asset_index,
        };
        frame.scrub()?;
        Ok(frame)
    }

    /// Assemble a frame from per-asset observations.
    ///
    /// The timeline is the sorted union of all observed days. Each asset's
    /// observations must already be in strictly increasing day order. Asset
    /// order follows first appearance.
    pub fn from_observations(observations: &[Observation]) -> Result<Self, DataIntegrityError> {
        let mut assets: Vec<String> = Vec::new();
        let mut last_seen: HashMap<&str, NaiveDate> = HashMap::new();

        for obs in observations {
            match last_seen.get(obs.asset.as_str()) {
                None => assets.push(obs.asset.clone()),
                Some(&previous) if obs.date == previous => {
                    return Err(DataIntegrityError::DuplicateEntry {
                        asset: obs.asset.clone(),
                        date: obs.date,
                    });
                }
                Some(&previous) if obs.date < previous => {
                    return Err(DataIntegrityError::NonMonotonicDays {
                        context: obs.asset.clone(),
                        previous,
                        current: obs.date,
                    });
                }
                Some(_) => {}
            }
            last_seen.insert(obs.asset.as_str(), obs.date);
        }

        let dates: Vec<NaiveDate> = observations
            .iter()
            .map(|obs| obs.date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let date_index: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, &d)| (d, i)).collect();
        let asset_index: HashMap<&str, usize> = assets
            .iter()
            .enumerate()
            .map(|(i, a)| (a.as_str(), i))
            .collect();

        let width = assets.len();
        let mut values = vec![None; dates.len() * Field::COUNT * width];
        for obs in observations {
            let t = date_index[&obs.date];
            let a = asset_index[obs.asset.as_str()];
            values[cell(width, t, Field::Close, a)] = obs.close;
            values[cell(width, t, Field::IsLiquid, a)] = obs.is_liquid;
        }

        Self::new(dates, assets, values)
    }

    fn scrub(&mut self) -> Result<(), DataIntegrityError> {
        let width = self.assets.len();
        for t in 0..self.dates.len() {
            for a in 0..width {
                let close_cell = cell(width, t, Field::Close, a);
                match self.values[close_cell] {
                    v if absent(v) => self.values[close_cell] = None,
                    Some(value) if value <= 0.0 => {
                        return Err(DataIntegrityError::NonPositivePrice {
                            asset: self.assets[a].clone(),
                            date: self.dates[t],
                            value,
                        });
                    }
                    _ => {}
                }

                let liquid_cell = cell(width, t, Field::IsLiquid, a);
                match self.values[liquid_cell] {
                    v if absent(v) => self.values[liquid_cell] = None,
                    Some(value) if value != 0.0 && value != 1.0 => {
                        return Err(DataIntegrityError::InvalidLiquidity {
                            asset: self.assets[a].clone(),
                            date: self.dates[t],
                            value,
                        });
                    }
                    _ => {}
                }
            }
        }
        Ok(())
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

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.assets.is_empty()
    }

    pub fn asset_position(&self, asset: &str) -> Option<usize> {
        self.asset_index.get(asset).copied()
    }

    pub fn value(&self, day: usize, field: Field, asset: usize) -> Option<f64> {
        self.values[cell(self.assets.len(), day, field, asset)]
    }

    pub fn close(&self, day: usize, asset: usize) -> Option<f64> {
        self.value(day, Field::Close, asset)
    }

    /// Missing liquidity counts as not liquid.
    pub fn is_liquid(&self, day: usize, asset: usize) -> bool {
        self.value(day, Field::IsLiquid, asset) == Some(1.0)
    }

    /// Explicitly flagged illiquid (`is_liquid = 0`), as opposed to missing.
    pub fn is_flagged_illiquid(&self, day: usize, asset: usize) -> bool {
        self.value(day, Field::IsLiquid, asset) == Some(0.0)
    }

    /// Liquid with a close on the day; only these cells may carry weight.
    pub fn is_tradeable(&self, day: usize, asset: usize) -> bool {
        self.is_liquid(day, asset) && self.close(day, asset).is_some()
    }

    /// A trading day has at least one liquid asset.
    pub fn is_trading_day(&self, day: usize) -> bool {
        (0..self.assets.len()).any(|a| self.is_liquid(day, a))
    }

    /// Simple return of one asset from `day - 1` to `day`, when both closes exist.
    pub fn asset_return(&self, day: usize, asset: usize) -> Option<f64> {
        if day == 0 {
            return None;
        }
        let prev = self.close(day - 1, asset)?;
        let curr = self.close(day, asset)?;
        Some(curr / prev - 1.0)
    }
}

fn cell(width: usize, day: usize, field: Field, asset: usize) -> usize {
    (day * Field::COUNT + field.offset()) * width + asset
}
