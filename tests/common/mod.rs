#![allow(dead_code)]

use breadthtrader::domain::error::BreadthtraderError;
use breadthtrader::domain::market_frame::MarketFrame;
pub use breadthtrader::domain::observation::Observation;
use breadthtrader::domain::performance::StatisticSeries;
use breadthtrader::domain::weights::WeightMatrix;
use breadthtrader::ports::data_port::DataPort;
use breadthtrader::ports::output_port::OutputPort;
use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Observation>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_observations(mut self, asset: &str, observations: Vec<Observation>) -> Self {
        self.data.insert(asset.to_string(), observations);
        self
    }

    pub fn with_error(mut self, asset: &str, reason: &str) -> Self {
        self.errors.insert(asset.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_observations(
        &self,
        asset: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Observation>, BreadthtraderError> {
        if let Some(reason) = self.errors.get(asset) {
            return Err(BreadthtraderError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(asset)
            .map(|rows| {
                rows.iter()
                    .filter(|o| {
                        start_date.is_none_or(|s| o.date >= s)
                            && end_date.is_none_or(|e| o.date <= e)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_assets(&self) -> Result<Vec<String>, BreadthtraderError> {
        let mut assets: Vec<String> = self.data.keys().cloned().collect();
        assets.sort();
        Ok(assets)
    }

    fn get_data_range(
        &self,
        asset: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, BreadthtraderError> {
        if let Some(reason) = self.errors.get(asset) {
            return Err(BreadthtraderError::DataSource {
                reason: reason.clone(),
            });
        }
        match self.data.get(asset) {
            Some(rows) if !rows.is_empty() => {
                let min = rows.iter().map(|o| o.date).min().unwrap();
                let max = rows.iter().map(|o| o.date).max().unwrap();
                Ok(Some((min, max, rows.len())))
            }
            _ => Ok(None),
        }
    }
}

/// Keeps whatever the pipeline writes so tests can inspect it.
#[derive(Default)]
pub struct MockOutputPort {
    pub weights: RefCell<Option<WeightMatrix>>,
    pub statistics: RefCell<Option<StatisticSeries>>,
}

impl OutputPort for MockOutputPort {
    fn write_weights(&self, weights: &WeightMatrix) -> Result<(), BreadthtraderError> {
        *self.weights.borrow_mut() = Some(weights.clone());
        Ok(())
    }

    fn write_statistics(&self, statistics: &StatisticSeries) -> Result<(), BreadthtraderError> {
        *self.statistics.borrow_mut() = Some(statistics.clone());
        Ok(())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn day(t: usize) -> NaiveDate {
    date(2021, 1, 4) + chrono::Duration::days(t as i64)
}

/// Consecutive daily observations starting at [`day`]`(0)`.
pub fn series(asset: &str, closes: &[f64], liquid: &[f64]) -> Vec<Observation> {
    closes
        .iter()
        .zip(liquid)
        .enumerate()
        .map(|(t, (&c, &l))| Observation::new(asset, day(t), Some(c), Some(l)))
        .collect()
}

pub fn always_liquid(asset: &str, closes: &[f64]) -> Vec<Observation> {
    series(asset, closes, &vec![1.0; closes.len()])
}

/// Deterministic price path with a drift and a small saw-tooth.
pub fn generate_closes(count: usize, start_price: f64, drift: f64) -> Vec<f64> {
    (0..count)
        .map(|t| start_price * (1.0 + drift).powi(t as i32) * (1.0 + 0.01 * ((t % 5) as f64 - 2.0)))
        .collect()
}

pub fn market(observations: Vec<Vec<Observation>>) -> MarketFrame {
    let flat: Vec<Observation> = observations.into_iter().flatten().collect();
    MarketFrame::from_observations(&flat).unwrap()
}
