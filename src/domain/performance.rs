//! Equity simulation and risk statistics.
//!
//! Returns on day t are earned by the weights held at the close of day t-1.
//! Rolling fields cover the `window` returns ending on day t and are defined
//! from day `window` on; day 0 carries no return of its own.
//!
//! Sharpe convention: `mean_return` and `volatility` are daily figures (mean
//! and sample standard deviation of daily relative returns). The Sharpe ratio
//! is their quotient annualized by `√periods_per_year`.

use crate::domain::error::DataIntegrityError;
use crate::domain::market_frame::MarketFrame;
use crate::domain::weights::WeightMatrix;
use chrono::NaiveDate;
use serde::Serialize;

pub const TRADING_DAYS_PER_YEAR: usize = 252;
pub const DEFAULT_WINDOW: usize = 3 * TRADING_DAYS_PER_YEAR;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceParams {
    pub window: usize,
    pub periods_per_year: f64,
}

impl Default for PerformanceParams {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            periods_per_year: TRADING_DAYS_PER_YEAR as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStatistics {
    pub date: NaiveDate,
    pub relative_return: f64,
    pub equity: f64,
    pub underwater: f64,
    pub bias: Option<f64>,
    pub turnover: f64,
    pub mean_return: Option<f64>,
    pub volatility: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub avg_turnover: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatisticSeries {
    pub params: PerformanceParams,
    pub rows: Vec<DailyStatistics>,
    /// Most negative underwater value.
    pub max_drawdown: f64,
    /// Assets that held a non-zero weight on at least one day.
    pub instruments: usize,
}

impl StatisticSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn relative_returns(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.relative_return).collect()
    }

    /// Rolling Sharpe ratio on the last day.
    pub fn latest_sharpe(&self) -> Option<f64> {
        self.rows.last().and_then(|r| r.sharpe_ratio)
    }

    pub fn summary(&self) -> PerformanceSummary {
        PerformanceSummary::from_series(self)
    }
}

/// Whole-run figures derived from a [`StatisticSeries`].
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSummary {
    pub days: usize,
    pub final_equity: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: Option<f64>,
    pub max_drawdown: f64,
    pub instruments: usize,
    pub mean_turnover: f64,
    pub latest_rolling_sharpe: Option<f64>,
}

impl PerformanceSummary {
    pub fn from_series(series: &StatisticSeries) -> Self {
        let days = series.len();
        let final_equity = series.rows.last().map(|r| r.equity).unwrap_or(1.0);
        let total_return = final_equity - 1.0;

        let years = days.saturating_sub(1) as f64 / series.params.periods_per_year;
        let annualized_return = if years > 0.0 && total_return.is_finite() {
            final_equity.powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let returns = series.relative_returns();
        let sharpe_ratio = returns
            .get(1..)
            .and_then(|r| sharpe(r, series.params.periods_per_year));

        let mean_turnover = if days > 0 {
            series.rows.iter().map(|r| r.turnover).sum::<f64>() / days as f64
        } else {
            0.0
        };

        Self {
            days,
            final_equity,
            total_return,
            annualized_return,
            sharpe_ratio,
            max_drawdown: series.max_drawdown,
            instruments: series.instruments,
            mean_turnover,
            latest_rolling_sharpe: series.latest_sharpe(),
        }
    }
}

/// Running equity and its peak, threaded through the forward scan.
#[derive(Debug, Clone, Copy, PartialEq)]
struct EquityState {
    equity: f64,
    peak: f64,
}

impl EquityState {
    const START: EquityState = EquityState {
        equity: 1.0,
        peak: 1.0,
    };

    fn step(self, relative_return: f64) -> Self {
        let equity = self.equity * (1.0 + relative_return);
        Self {
            equity,
            peak: self.peak.max(equity),
        }
    }

    fn underwater(&self) -> f64 {
        self.equity / self.peak - 1.0
    }
}

pub fn compute(
    market: &MarketFrame,
    weights: &WeightMatrix,
    params: &PerformanceParams,
) -> Result<StatisticSeries, DataIntegrityError> {
    weights.ensure_aligned(market)?;

    let returns = relative_returns(market, weights);
    let turnover = daily_turnover(weights);

    let mut rows = Vec::with_capacity(returns.len());
    let mut state = EquityState::START;
    let mut max_drawdown = 0.0_f64;

    for (t, &relative_return) in returns.iter().enumerate() {
        if t > 0 {
            state = state.step(relative_return);
        }
        let underwater = state.underwater();
        max_drawdown = max_drawdown.min(underwater);

        let rolling = rolling_window(&returns, &turnover, t, params);

        rows.push(DailyStatistics {
            date: market.dates()[t],
            relative_return,
            equity: state.equity,
            underwater,
            bias: bias(weights, t),
            turnover: turnover[t],
            mean_return: rolling.map(|r| r.mean_return),
            volatility: rolling.map(|r| r.volatility),
            sharpe_ratio: rolling.and_then(|r| r.sharpe_ratio),
            avg_turnover: rolling.map(|r| r.avg_turnover),
        });
    }

    Ok(StatisticSeries {
        params: *params,
        rows,
        max_drawdown,
        instruments: instruments(weights),
    })
}

/// Day t's return uses day t-1's weights; missing closes contribute nothing.
pub fn relative_returns(market: &MarketFrame, weights: &WeightMatrix) -> Vec<f64> {
    (0..market.day_count())
        .map(|t| {
            if t == 0 {
                return 0.0;
            }
            (0..market.asset_count())
                .map(|a| weights.weight(t - 1, a) * market.asset_return(t, a).unwrap_or(0.0))
                .sum()
        })
        .collect()
}

/// Σ|w[t] - w[t-1]| with an all-flat book before the first day.
pub fn daily_turnover(weights: &WeightMatrix) -> Vec<f64> {
    (0..weights.day_count())
        .map(|t| {
            (0..weights.asset_count())
                .map(|a| {
                    let prev = if t == 0 { 0.0 } else { weights.weight(t - 1, a) };
                    (weights.weight(t, a) - prev).abs()
                })
                .sum()
        })
        .collect()
}

fn bias(weights: &WeightMatrix, day: usize) -> Option<f64> {
    let mut long = 0.0;
    let mut short = 0.0;
    for a in 0..weights.asset_count() {
        let w = weights.weight(day, a);
        long += w.max(0.0);
        short += (-w).max(0.0);
    }
    let gross = long + short;
    if gross > 0.0 {
        Some((long - short) / gross)
    } else {
        None
    }
}

fn instruments(weights: &WeightMatrix) -> usize {
    (0..weights.asset_count())
        .filter(|&a| (0..weights.day_count()).any(|t| weights.weight(t, a) != 0.0))
        .count()
}

#[derive(Debug, Clone, Copy)]
struct RollingPoint {
    mean_return: f64,
    volatility: f64,
    sharpe_ratio: Option<f64>,
    avg_turnover: f64,
}

fn rolling_window(
    returns: &[f64],
    turnover: &[f64],
    day: usize,
    params: &PerformanceParams,
) -> Option<RollingPoint> {
    let window = params.window;
    if window < 2 || day < window {
        return None;
    }
    let span = day + 1 - window..day + 1;
    let window_returns = &returns[span.clone()];

    let mean_return = mean(window_returns);
    let volatility = sample_std(window_returns, mean_return);
    let sharpe_ratio = if volatility > 0.0 {
        Some(mean_return / volatility * params.periods_per_year.sqrt())
    } else {
        None
    };

    Some(RollingPoint {
        mean_return,
        volatility,
        sharpe_ratio,
        avg_turnover: mean(&turnover[span]),
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64], mean: f64) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}

/// Annualized Sharpe ratio of a daily return sample.
pub fn sharpe(returns: &[f64], periods_per_year: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let m = mean(returns);
    let s = sample_std(returns, m);
    if s > 0.0 {
        Some(m / s * periods_per_year.sqrt())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::observation::Observation;

    fn d(t: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + chrono::Duration::days(t as i64)
    }

    fn single_asset(closes: &[f64]) -> MarketFrame {
        let observations: Vec<Observation> = closes
            .iter()
            .enumerate()
            .map(|(t, &c)| Observation::new("BHP", d(t), Some(c), Some(1.0)))
            .collect();
        MarketFrame::from_observations(&observations).unwrap()
    }

    fn constant_weight(market: &MarketFrame, w: f64) -> WeightMatrix {
        WeightMatrix::from_rows(
            market.dates().to_vec(),
            market.assets().to_vec(),
            vec![vec![w; market.asset_count()]; market.day_count()],
        )
        .unwrap()
    }

    fn params(window: usize) -> PerformanceParams {
        PerformanceParams {
            window,
            periods_per_year: 252.0,
        }
    }

    #[test]
    fn price_doubling_doubles_equity() {
        let market = single_asset(&[10.0, 20.0]);
        let weights = constant_weight(&market, 1.0);
        let stats = compute(&market, &weights, &params(2)).unwrap();

        assert_eq!(stats.rows[0].relative_return, 0.0);
        assert_eq!(stats.rows[0].equity, 1.0);
        assert!((stats.rows[1].relative_return - 1.0).abs() < 1e-12);
        assert!((stats.rows[1].equity - 2.0).abs() < 1e-12);
    }

    #[test]
    fn returns_use_previous_day_weights() {
        let market = single_asset(&[10.0, 11.0, 12.1]);
        let weights = WeightMatrix::from_rows(
            market.dates().to_vec(),
            market.assets().to_vec(),
            vec![vec![0.0], vec![1.0], vec![0.0]],
        )
        .unwrap();
        let returns = relative_returns(&market, &weights);
        assert_eq!(returns[1], 0.0);
        assert!((returns[2] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn underwater_and_max_drawdown() {
        let market = single_asset(&[100.0, 110.0, 88.0, 99.0, 121.0]);
        let weights = constant_weight(&market, 1.0);
        let stats = compute(&market, &weights, &params(2)).unwrap();

        let underwater: Vec<f64> = stats.rows.iter().map(|r| r.underwater).collect();
        assert_eq!(underwater[0], 0.0);
        assert!(underwater[1].abs() < 1e-12);
        assert!((underwater[2] - (88.0 / 110.0 - 1.0)).abs() < 1e-12);
        assert!((underwater[3] - (99.0 / 110.0 - 1.0)).abs() < 1e-12);
        assert!(underwater[4].abs() < 1e-12);

        let min = underwater.iter().copied().fold(f64::INFINITY, f64::min);
        assert_eq!(stats.max_drawdown, min);
    }

    #[test]
    fn bias_is_long_short_imbalance() {
        let market = single_asset(&[10.0, 10.0, 10.0]);
        let weights = WeightMatrix::from_rows(
            market.dates().to_vec(),
            market.assets().to_vec(),
            vec![vec![0.5], vec![-0.25], vec![0.0]],
        )
        .unwrap();
        let stats = compute(&market, &weights, &params(2)).unwrap();
        assert_eq!(stats.rows[0].bias, Some(1.0));
        assert_eq!(stats.rows[1].bias, Some(-1.0));
        assert_eq!(stats.rows[2].bias, None);
    }

    #[test]
    fn turnover_counts_initial_allocation() {
        let market = single_asset(&[10.0, 10.0, 10.0]);
        let weights = WeightMatrix::from_rows(
            market.dates().to_vec(),
            market.assets().to_vec(),
            vec![vec![1.0], vec![0.25], vec![0.25]],
        )
        .unwrap();
        assert_eq!(daily_turnover(&weights), vec![1.0, 0.75, 0.0]);
    }

    #[test]
    fn rolling_fields_undefined_until_window_fills() {
        let market = single_asset(&[10.0, 11.0, 10.5, 12.0, 11.0]);
        let weights = constant_weight(&market, 1.0);
        let stats = compute(&market, &weights, &params(3)).unwrap();

        for row in &stats.rows[..3] {
            assert_eq!(row.mean_return, None);
            assert_eq!(row.volatility, None);
            assert_eq!(row.sharpe_ratio, None);
            assert_eq!(row.avg_turnover, None);
        }
        let returns = stats.relative_returns();
        let window = &returns[1..4];
        let m = window.iter().sum::<f64>() / 3.0;
        let var = window.iter().map(|r| (r - m).powi(2)).sum::<f64>() / 2.0;
        let row = &stats.rows[3];
        assert!((row.mean_return.unwrap() - m).abs() < 1e-12);
        assert!((row.volatility.unwrap() - var.sqrt()).abs() < 1e-12);
        assert!(
            (row.sharpe_ratio.unwrap() - m / var.sqrt() * 252.0_f64.sqrt()).abs() < 1e-9
        );
        assert_eq!(row.avg_turnover, Some(0.0));
    }

    #[test]
    fn zero_volatility_has_no_sharpe() {
        let market = single_asset(&[10.0; 6]);
        let weights = constant_weight(&market, 1.0);
        let stats = compute(&market, &weights, &params(3)).unwrap();
        assert_eq!(stats.rows[5].volatility, Some(0.0));
        assert_eq!(stats.rows[5].sharpe_ratio, None);
        assert_eq!(stats.latest_sharpe(), None);
    }

    #[test]
    fn instruments_counts_ever_held_assets() {
        let observations: Vec<Observation> = ["A", "B", "C"]
            .iter()
            .flat_map(|asset| {
                (0..2).map(move |t| Observation::new(asset, d(t), Some(5.0), Some(1.0)))
            })
            .collect();
        let market = MarketFrame::from_observations(&observations).unwrap();
        let weights = WeightMatrix::from_rows(
            market.dates().to_vec(),
            market.assets().to_vec(),
            vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.0, -0.5]],
        )
        .unwrap();
        let stats = compute(&market, &weights, &params(2)).unwrap();
        assert_eq!(stats.instruments, 2);
    }

    #[test]
    fn summary_reports_totals() {
        let market = single_asset(&[100.0, 110.0, 121.0]);
        let weights = constant_weight(&market, 1.0);
        let summary = compute(&market, &weights, &params(2)).unwrap().summary();

        assert_eq!(summary.days, 3);
        assert!((summary.final_equity - 1.21).abs() < 1e-12);
        assert!((summary.total_return - 0.21).abs() < 1e-12);
        assert!(summary.annualized_return > summary.total_return);
        assert!((summary.mean_turnover - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn sharpe_needs_two_points() {
        assert_eq!(sharpe(&[0.01], 252.0), None);
        assert!(sharpe(&[0.01, 0.03], 252.0).unwrap() > 0.0);
    }

    #[test]
    fn misaligned_weights_fail() {
        let market = single_asset(&[10.0, 11.0]);
        let weights =
            WeightMatrix::from_rows(vec![d(0)], market.assets().to_vec(), vec![vec![1.0]]).unwrap();
        assert!(compute(&market, &weights, &params(2)).is_err());
    }
}
