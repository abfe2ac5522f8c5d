//! Asset universe: parses the configured asset list and checks each asset
//! against the data source before a run.

use crate::domain::error::BreadthtraderError;
use crate::domain::observation::Observation;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in asset list")]
    EmptyToken,

    #[error("duplicate asset: {0}")]
    DuplicateAsset(String),
}

impl From<UniverseError> for BreadthtraderError {
    fn from(err: UniverseError) -> Self {
        BreadthtraderError::ConfigInvalid {
            section: "data".to_string(),
            key: "assets".to_string(),
            reason: err.to_string(),
        }
    }
}

pub fn parse_assets(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut assets = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let asset = trimmed.to_uppercase();
        if !seen.insert(asset.clone()) {
            return Err(UniverseError::DuplicateAsset(asset));
        }
        assets.push(asset);
    }

    Ok(assets)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    Unreadable { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedAsset {
    pub asset: String,
    pub reason: SkipReason,
}

/// Assets that survived validation, with their observations already fetched.
#[derive(Debug, Clone)]
pub struct Universe {
    pub assets: Vec<String>,
    pub observations: Vec<Observation>,
    pub skipped: Vec<SkippedAsset>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.assets.len()
    }
}

pub fn validate_universe(
    data_port: &dyn DataPort,
    assets: Vec<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<Universe, BreadthtraderError> {
    let requested = assets.len();
    let mut valid = Vec::new();
    let mut observations = Vec::new();
    let mut skipped = Vec::new();

    for asset in assets {
        let rows = match data_port.fetch_observations(&asset, start_date, end_date) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(%asset, error = %e, "skipping asset");
                skipped.push(SkippedAsset {
                    asset,
                    reason: SkipReason::Unreadable {
                        reason: e.to_string(),
                    },
                });
                continue;
            }
        };

        if rows.is_empty() {
            warn!(%asset, "skipping asset, no data in range");
            skipped.push(SkippedAsset {
                asset,
                reason: SkipReason::NoData,
            });
            continue;
        }

        info!(%asset, rows = rows.len(), "asset loaded");
        observations.extend(rows);
        valid.push(asset);
    }

    if valid.is_empty() {
        return Err(BreadthtraderError::NoData {
            asset: "all".to_string(),
        });
    }

    if !skipped.is_empty() {
        info!(
            kept = valid.len(),
            requested, "universe reduced by skipped assets"
        );
    }

    Ok(Universe {
        assets: valid,
        observations,
        skipped,
    })
}
