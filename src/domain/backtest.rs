//! Backtest pipeline: signal → weights → exposure check → statistics.
//!
//! BacktestConfig holds every tunable of a run.

use crate::domain::error::DataIntegrityError;
use crate::domain::exposure::{self, DEFAULT_LEVERAGE_EPSILON, Violation};
use crate::domain::market_frame::MarketFrame;
use crate::domain::performance::{self, PerformanceParams, StatisticSeries};
use crate::domain::signal::{self, TrendParams, TrendSignal};
use crate::domain::weights::{self, AllocationMode, BuyAndHold, Normalization, WeightMatrix};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub trend: TrendParams,
    pub mode: AllocationMode,
    pub performance: PerformanceParams,
    pub leverage_epsilon: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            trend: TrendParams::default(),
            mode: AllocationMode::default(),
            performance: PerformanceParams::default(),
            leverage_epsilon: DEFAULT_LEVERAGE_EPSILON,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    /// Only built in trend mode.
    pub signal: Option<TrendSignal>,
    pub normalization: Normalization,
    pub violations: Vec<Violation>,
    pub statistics: StatisticSeries,
}

impl BacktestResult {
    pub fn weights(&self) -> &WeightMatrix {
        &self.normalization.weights
    }
}

pub fn run_backtest(
    market: &MarketFrame,
    config: &BacktestConfig,
) -> Result<BacktestResult, DataIntegrityError> {
    info!(
        days = market.day_count(),
        assets = market.asset_count(),
        mode = %config.mode,
        "running backtest"
    );

    let (signal, normalization) = match config.mode {
        AllocationMode::Trend => {
            let trend = signal::build_trend(market, &config.trend);
            if trend.is_undefined() {
                info!("trend signal undefined, allocation stays flat");
            }
            let normalization = weights::normalize(&trend, market);
            (Some(trend), normalization)
        }
        AllocationMode::BuyAndHold => (None, weights::normalize(&BuyAndHold, market)),
    };

    finish(market, signal, normalization, config)
}

/// Evaluate weights produced elsewhere. They are cleaned first, so the
/// reported violations refer to the cleaned matrix.
pub fn evaluate_weights(
    market: &MarketFrame,
    raw: &WeightMatrix,
    config: &BacktestConfig,
) -> Result<BacktestResult, DataIntegrityError> {
    info!(
        days = market.day_count(),
        assets = market.asset_count(),
        "evaluating external weights"
    );
    let normalization = weights::clean(raw, market)?;
    finish(market, None, normalization, config)
}

fn finish(
    market: &MarketFrame,
    signal: Option<TrendSignal>,
    normalization: Normalization,
    config: &BacktestConfig,
) -> Result<BacktestResult, DataIntegrityError> {
    if normalization.corrected_count() > 0 {
        info!(
            corrected = normalization.corrected_count(),
            "carried weights forward over bad days"
        );
    }

    let violations = exposure::check(&normalization.weights, market, config.leverage_epsilon)?;
    let statistics = performance::compute(market, &normalization.weights, &config.performance)?;

    Ok(BacktestResult {
        signal,
        normalization,
        violations,
        statistics,
    })
}
