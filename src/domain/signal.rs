//! Market-breadth trend signal.
//!
//! The advance/decline line counts, day by day, how many assets closed higher
//! minus how many closed lower, as a running sum. It is smoothed with an EMA
//! (k = 2/(span+1), seeded with the first defined value) and differenced over
//! `lag` days; a positive difference is an up-trend.

use crate::domain::market_frame::MarketFrame;
use chrono::NaiveDate;

pub const DEFAULT_EMA_SPAN: usize = 110;
pub const DEFAULT_LAG: usize = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendParams {
    pub ema_span: usize,
    pub lag: usize,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            ema_span: DEFAULT_EMA_SPAN,
            lag: DEFAULT_LAG,
        }
    }
}

/// Per-day breadth series. `None` marks days without a defined value.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendSignal {
    pub params: TrendParams,
    pub dates: Vec<NaiveDate>,
    pub advance_decline: Vec<Option<f64>>,
    pub smoothed: Vec<Option<f64>>,
    pub change: Vec<Option<f64>>,
}

impl TrendSignal {
    fn undefined(dates: &[NaiveDate], params: TrendParams) -> Self {
        Self {
            params,
            dates: dates.to_vec(),
            advance_decline: vec![None; dates.len()],
            smoothed: vec![None; dates.len()],
            change: vec![None; dates.len()],
        }
    }

    /// Undefined days are never an up-trend.
    pub fn positive_trend(&self, day: usize) -> bool {
        self.change.get(day).copied().flatten().is_some_and(|c| c > 0.0)
    }

    pub fn trend_flags(&self) -> Vec<bool> {
        (0..self.change.len()).map(|t| self.positive_trend(t)).collect()
    }

    /// First day on which the momentum signal is defined.
    pub fn first_defined(&self) -> Option<usize> {
        self.change.iter().position(Option::is_some)
    }

    pub fn is_undefined(&self) -> bool {
        self.first_defined().is_none()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

pub fn build_trend(market: &MarketFrame, params: &TrendParams) -> TrendSignal {
    let valid_days = (0..market.day_count())
        .filter(|&t| (0..market.asset_count()).any(|a| market.close(t, a).is_some()))
        .count();

    if params.ema_span == 0 || params.lag == 0 || valid_days < params.lag + 1 {
        return TrendSignal::undefined(market.dates(), *params);
    }

    let advance_decline = advance_decline_line(market);
    let smoothed = exponential_average(&advance_decline, params.ema_span);
    let change = lagged_change(&smoothed, params.lag);

    TrendSignal {
        params: *params,
        dates: market.dates().to_vec(),
        advance_decline,
        smoothed,
        change,
    }
}

/// Net advancing assets per day, accumulated from 0 on the first day that has
/// any close. An asset counts only when both its closes are present.
pub fn advance_decline_line(market: &MarketFrame) -> Vec<Option<f64>> {
    let mut line = Vec::with_capacity(market.day_count());
    let mut running: Option<f64> = None;

    for t in 0..market.day_count() {
        running = match running {
            None if (0..market.asset_count()).any(|a| market.close(t, a).is_some()) => Some(0.0),
            None => None,
            Some(level) => Some(level + net_advancers(market, t)),
        };
        line.push(running);
    }

    line
}

fn net_advancers(market: &MarketFrame, day: usize) -> f64 {
    let mut net = 0i64;
    for a in 0..market.asset_count() {
        if let (Some(prev), Some(curr)) = (market.close(day - 1, a), market.close(day, a)) {
            if curr > prev {
                net += 1;
            } else if curr < prev {
                net -= 1;
            }
        }
    }
    net as f64
}

/// EMA seeded with the first defined input; undefined inputs leave the state
/// untouched and produce an undefined output.
pub fn exponential_average(series: &[Option<f64>], span: usize) -> Vec<Option<f64>> {
    let k = 2.0 / (span as f64 + 1.0);
    let mut state: Option<f64> = None;

    series
        .iter()
        .map(|value| {
            let value = (*value)?;
            let next = match state {
                None => value,
                Some(prev) => value * k + prev * (1.0 - k),
            };
            state = Some(next);
            Some(next)
        })
        .collect()
}

pub fn lagged_change(series: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    (0..series.len())
        .map(|t| {
            if t < lag {
                return None;
            }
            Some(series[t]? - series[t - lag]?)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::observation::Observation;

    fn frame(closes: &[&[Option<f64>]]) -> MarketFrame {
        let mut observations = Vec::new();
        let assets = ["A", "B", "C", "D"];
        let width = closes.first().map(|row| row.len()).unwrap_or(0);
        for (a, asset) in assets.iter().enumerate().take(width) {
            for (t, row) in closes.iter().enumerate() {
                observations.push(Observation::new(
                    asset,
                    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(t as i64),
                    row[a],
                    Some(1.0),
                ));
            }
        }
        MarketFrame::from_observations(&observations).unwrap()
    }

    #[test]
    fn adl_starts_at_zero_and_counts_net_advancers() {
        let market = frame(&[
            &[Some(10.0), Some(10.0), Some(10.0)],
            &[Some(11.0), Some(12.0), Some(9.0)],
            &[Some(11.0), Some(11.0), Some(8.0)],
        ]);
        let line = advance_decline_line(&market);
        assert_eq!(line, vec![Some(0.0), Some(1.0), Some(-1.0)]);
    }

    #[test]
    fn adl_ignores_missing_closes() {
        let market = frame(&[
            &[None, None],
            &[Some(10.0), None],
            &[Some(11.0), Some(5.0)],
            &[None, Some(6.0)],
        ]);
        let line = advance_decline_line(&market);
        assert_eq!(line, vec![None, Some(0.0), Some(1.0), Some(2.0)]);
    }

    #[test]
    fn ema_seed_is_first_value() {
        let ema = exponential_average(&[None, Some(4.0), Some(8.0)], 3);
        assert_eq!(ema[0], None);
        assert_eq!(ema[1], Some(4.0));
        let k = 2.0 / 4.0;
        assert!((ema[2].unwrap() - (8.0 * k + 4.0 * (1.0 - k))).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_span_one_tracks_input() {
        let ema = exponential_average(&[Some(1.0), Some(5.0), Some(-2.0)], 1);
        assert_eq!(ema, vec![Some(1.0), Some(5.0), Some(-2.0)]);
    }

    #[test]
    fn lagged_change_undefined_for_first_lag_days() {
        let change = lagged_change(&[Some(1.0), Some(2.0), Some(4.0), Some(7.0)], 2);
        assert_eq!(change, vec![None, None, Some(3.0), Some(5.0)]);
    }

    #[test]
    fn rising_market_has_positive_trend_after_lag() {
        let rows: Vec<Vec<Option<f64>>> = (0..10)
            .map(|t| vec![Some(10.0 + t as f64), Some(20.0 + t as f64)])
            .collect();
        let refs: Vec<&[Option<f64>]> = rows.iter().map(|r| r.as_slice()).collect();
        let market = frame(&refs);
        let signal = build_trend(&market, &TrendParams { ema_span: 3, lag: 2 });

        assert_eq!(signal.first_defined(), Some(2));
        assert!(!signal.positive_trend(0));
        assert!(!signal.positive_trend(1));
        assert!(signal.positive_trend(2));
        assert!(signal.trend_flags()[2..].iter().all(|&f| f));
    }

    #[test]
    fn too_little_history_is_undefined() {
        let market = frame(&[&[Some(10.0)], &[Some(11.0)], &[Some(12.0)]]);
        let signal = build_trend(&market, &TrendParams { ema_span: 5, lag: 3 });
        assert!(signal.is_undefined());
        assert!(signal.advance_decline.iter().all(Option::is_none));
        assert_eq!(signal.trend_flags(), vec![false, false, false]);
    }

    #[test]
    fn zero_lag_is_undefined() {
        let market = frame(&[&[Some(10.0)], &[Some(11.0)]]);
        let signal = build_trend(&market, &TrendParams { ema_span: 5, lag: 0 });
        assert!(signal.is_undefined());
    }

    #[test]
    fn default_params() {
        let params = TrendParams::default();
        assert_eq!(params.ema_span, 110);
        assert_eq!(params.lag, 13);
    }
}
