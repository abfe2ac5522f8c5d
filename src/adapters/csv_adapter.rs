//! CSV file market data adapter.
//!
//! One `<ASSET>.csv` per asset under a base directory, with the header
//! `date,close,is_liquid`. Empty fields are missing values. Rows are returned
//! in file order.

use crate::domain::error::BreadthtraderError;
use crate::domain::observation::Observation;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct ObservationRow {
    date: NaiveDate,
    close: Option<f64>,
    is_liquid: Option<f64>,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, asset: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", asset))
    }

    fn read_all(&self, asset: &str) -> Result<Vec<Observation>, BreadthtraderError> {
        let path = self.csv_path(asset);
        let content = fs::read_to_string(&path).map_err(|e| BreadthtraderError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut observations = Vec::new();

        for (line, result) in rdr.deserialize::<ObservationRow>().enumerate() {
            let row = result.map_err(|e| BreadthtraderError::DataSource {
                reason: format!("{} row {}: {}", path.display(), line + 1, e),
            })?;
            observations.push(Observation::new(asset, row.date, row.close, row.is_liquid));
        }

        Ok(observations)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_observations(
        &self,
        asset: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Observation>, BreadthtraderError> {
        let mut observations = self.read_all(asset)?;
        observations.retain(|o| {
            start_date.is_none_or(|start| o.date >= start)
                && end_date.is_none_or(|end| o.date <= end)
        });
        Ok(observations)
    }

    fn list_assets(&self) -> Result<Vec<String>, BreadthtraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| BreadthtraderError::DataSource {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut assets = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| BreadthtraderError::DataSource {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(asset) = name_str.strip_suffix(".csv") {
                if !asset.is_empty() {
                    assets.push(asset.to_string());
                }
            }
        }

        assets.sort();
        Ok(assets)
    }

    fn get_data_range(
        &self,
        asset: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, BreadthtraderError> {
        if !self.csv_path(asset).exists() {
            return Ok(None);
        }
        let observations = self.read_all(asset)?;
        let min = observations.iter().map(|o| o.date).min();
        let max = observations.iter().map(|o| o.date).max();
        Ok(min.zip(max).map(|(min, max)| (min, max, observations.len())))
    }
}
