//! CSV output adapter: `weights.csv` and `statistics.csv` in one directory,
//! plus readers for weight and reference-return files.

use crate::domain::acceptance::ReferenceReturns;
use crate::domain::error::BreadthtraderError;
use crate::domain::performance::StatisticSeries;
use crate::domain::weights::WeightMatrix;
use crate::ports::output_port::OutputPort;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const WEIGHTS_FILE: &str = "weights.csv";
pub const STATISTICS_FILE: &str = "statistics.csv";

pub struct CsvOutputAdapter {
    dir: PathBuf,
}

impl CsvOutputAdapter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn weights_path(&self) -> PathBuf {
        self.dir.join(WEIGHTS_FILE)
    }

    pub fn statistics_path(&self) -> PathBuf {
        self.dir.join(STATISTICS_FILE)
    }

    fn writer(&self, path: &Path) -> Result<csv::Writer<fs::File>, BreadthtraderError> {
        fs::create_dir_all(&self.dir).map_err(|e| output_error(&self.dir, e))?;
        csv::Writer::from_path(path).map_err(|e| output_error(path, e))
    }
}

fn output_error(path: &Path, e: impl std::fmt::Display) -> BreadthtraderError {
    BreadthtraderError::Output {
        reason: format!("{}: {}", path.display(), e),
    }
}

fn source_error(path: &Path, e: impl std::fmt::Display) -> BreadthtraderError {
    BreadthtraderError::DataSource {
        reason: format!("{}: {}", path.display(), e),
    }
}

impl OutputPort for CsvOutputAdapter {
    fn write_weights(&self, weights: &WeightMatrix) -> Result<(), BreadthtraderError> {
        let path = self.weights_path();
        let mut wtr = self.writer(&path)?;

        let mut header = vec!["date".to_string()];
        header.extend(weights.assets().iter().cloned());
        wtr.write_record(&header)
            .map_err(|e| output_error(&path, e))?;

        for (t, date) in weights.dates().iter().enumerate() {
            let mut record = vec![date.to_string()];
            record.extend(
                (0..weights.asset_count())
                    .map(|a| weights.get(t, a).map(|w| w.to_string()).unwrap_or_default()),
            );
            wtr.write_record(&record)
                .map_err(|e| output_error(&path, e))?;
        }

        wtr.flush().map_err(|e| output_error(&path, e))?;
        info!(path = %path.display(), days = weights.day_count(), "weights written");
        Ok(())
    }

    fn write_statistics(&self, statistics: &StatisticSeries) -> Result<(), BreadthtraderError> {
        let path = self.statistics_path();
        let mut wtr = self.writer(&path)?;

        for row in &statistics.rows {
            wtr.serialize(row).map_err(|e| output_error(&path, e))?;
        }

        wtr.flush().map_err(|e| output_error(&path, e))?;
        info!(path = %path.display(), days = statistics.len(), "statistics written");
        Ok(())
    }
}

/// Read a weight matrix in the layout written by [`CsvOutputAdapter`].
/// Empty cells stay undefined.
pub fn read_weights(path: &Path) -> Result<WeightMatrix, BreadthtraderError> {
    let mut rdr = csv::Reader::from_path(path).map_err(|e| source_error(path, e))?;
    let headers = rdr.headers().map_err(|e| source_error(path, e))?.clone();
    let assets: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut dates = Vec::new();
    let mut cells = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| source_error(path, e))?;
        let date_str = record
            .get(0)
            .ok_or_else(|| source_error(path, format!("row {}: missing date", line + 1)))?;
        let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
            source_error(path, format!("row {}: invalid date {}: {}", line + 1, date_str, e))
        })?;
        dates.push(date);

        for a in 0..assets.len() {
            let cell = record.get(a + 1).map(str::trim).unwrap_or_default();
            if cell.is_empty() {
                cells.push(None);
            } else {
                let w = cell.parse::<f64>().map_err(|e| {
                    source_error(path, format!("row {}: invalid weight {}: {}", line + 1, cell, e))
                })?;
                cells.push(Some(w));
            }
        }
    }

    Ok(WeightMatrix::new(dates, assets, cells)?)
}

/// Read daily returns of other strategies: a `date` column followed by one
/// column per strategy. Empty cells leave that date out for the strategy.
pub fn read_reference_returns(path: &Path) -> Result<Vec<ReferenceReturns>, BreadthtraderError> {
    let mut rdr = csv::Reader::from_path(path).map_err(|e| source_error(path, e))?;
    let headers = rdr.headers().map_err(|e| source_error(path, e))?.clone();

    let mut references: Vec<ReferenceReturns> = headers
        .iter()
        .skip(1)
        .map(|name| ReferenceReturns {
            name: name.to_string(),
            returns: Vec::new(),
        })
        .collect();

    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| source_error(path, e))?;
        let date_str = record.get(0).map(str::trim).unwrap_or_default();
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
            source_error(path, format!("row {}: invalid date {}: {}", line + 1, date_str, e))
        })?;
        for (i, reference) in references.iter_mut().enumerate() {
            let cell = record.get(i + 1).map(str::trim).unwrap_or_default();
            if cell.is_empty() {
                continue;
            }
            let r = cell.parse::<f64>().map_err(|e| {
                source_error(path, format!("row {}: invalid return {}: {}", line + 1, cell, e))
            })?;
            reference.returns.push((date, r));
        }
    }

    Ok(references)
}
