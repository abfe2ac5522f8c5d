//! Configuration validation.
//!
//! Validates all config fields before any data is loaded.

use crate::domain::acceptance::{DEFAULT_MAX_CORRELATION, DEFAULT_MIN_SHARPE};
use crate::domain::error::BreadthtraderError;
use crate::domain::exposure::DEFAULT_LEVERAGE_EPSILON;
use crate::domain::performance::{DEFAULT_WINDOW, TRADING_DAYS_PER_YEAR};
use crate::domain::signal::{DEFAULT_EMA_SPAN, DEFAULT_LAG};
use crate::domain::weights::AllocationMode;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), BreadthtraderError> {
    validate_data_source(config)?;
    validate_dates(config)?;
    validate_signal(config)?;
    validate_allocation_mode(config)?;
    validate_window(config)?;
    validate_periods_per_year(config)?;
    validate_leverage_epsilon(config)?;
    validate_acceptance(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> BreadthtraderError {
    BreadthtraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Getters fall back to the default on unparsable input, so a present value
/// is checked here first.
fn ensure_number(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), BreadthtraderError> {
    match config.get_string(section, key) {
        Some(s) if s.trim().parse::<f64>().is_err() => {
            Err(invalid(section, key, &format!("{} must be a number", key)))
        }
        _ => Ok(()),
    }
}

fn ensure_integer(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), BreadthtraderError> {
    match config.get_string(section, key) {
        Some(s) if s.trim().parse::<i64>().is_err() => {
            Err(invalid(section, key, &format!("{} must be an integer", key)))
        }
        _ => Ok(()),
    }
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), BreadthtraderError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(BreadthtraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

/// `[data] source` selects the backend; each one needs its own path.
fn validate_data_source(config: &dyn ConfigPort) -> Result<(), BreadthtraderError> {
    let source = config
        .get_string("data", "source")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "csv".to_string());

    match source.as_str() {
        "csv" => require(config, "data", "path"),
        "sqlite" => require(config, "sqlite", "path"),
        other => Err(invalid(
            "data",
            "source",
            &format!("unknown data source '{}', expected csv or sqlite", other),
        )),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), BreadthtraderError> {
    let start_date = parse_optional_date(config, "start_date")?;
    let end_date = parse_optional_date(config, "end_date")?;

    match (start_date, end_date) {
        (Some(start), Some(end)) if start >= end => Err(invalid(
            "data",
            "start_date",
            "start_date must be before end_date",
        )),
        _ => Ok(()),
    }
}

pub fn parse_optional_date(
    config: &dyn ConfigPort,
    key: &str,
) -> Result<Option<NaiveDate>, BreadthtraderError> {
    match config.get_string("data", key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                invalid(
                    "data",
                    key,
                    &format!("invalid {} format, expected YYYY-MM-DD", key),
                )
            }),
    }
}

fn validate_signal(config: &dyn ConfigPort) -> Result<(), BreadthtraderError> {
    ensure_integer(config, "signal", "ema_span")?;
    ensure_integer(config, "signal", "lag")?;
    if config.get_int("signal", "ema_span", DEFAULT_EMA_SPAN as i64) < 1 {
        return Err(invalid("signal", "ema_span", "ema_span must be at least 1"));
    }
    if config.get_int("signal", "lag", DEFAULT_LAG as i64) < 1 {
        return Err(invalid("signal", "lag", "lag must be at least 1"));
    }
    Ok(())
}

fn validate_allocation_mode(config: &dyn ConfigPort) -> Result<(), BreadthtraderError> {
    match config.get_string("allocation", "mode") {
        None => Ok(()),
        Some(s) => s
            .parse::<AllocationMode>()
            .map(|_| ())
            .map_err(|reason| invalid("allocation", "mode", &reason)),
    }
}

fn validate_window(config: &dyn ConfigPort) -> Result<(), BreadthtraderError> {
    ensure_integer(config, "performance", "window")?;
    if config.get_int("performance", "window", DEFAULT_WINDOW as i64) < 2 {
        return Err(invalid("performance", "window", "window must be at least 2"));
    }
    Ok(())
}

fn validate_periods_per_year(config: &dyn ConfigPort) -> Result<(), BreadthtraderError> {
    ensure_number(config, "performance", "periods_per_year")?;
    let value = config.get_double(
        "performance",
        "periods_per_year",
        TRADING_DAYS_PER_YEAR as f64,
    );
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(
            "performance",
            "periods_per_year",
            "periods_per_year must be a positive finite number",
        ));
    }
    Ok(())
}

fn validate_leverage_epsilon(config: &dyn ConfigPort) -> Result<(), BreadthtraderError> {
    ensure_number(config, "performance", "leverage_epsilon")?;
    let value = config.get_double("performance", "leverage_epsilon", DEFAULT_LEVERAGE_EPSILON);
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(
            "performance",
            "leverage_epsilon",
            "leverage_epsilon must be non-negative",
        ));
    }
    Ok(())
}

fn validate_acceptance(config: &dyn ConfigPort) -> Result<(), BreadthtraderError> {
    ensure_number(config, "acceptance", "min_sharpe")?;
    ensure_number(config, "acceptance", "max_correlation")?;
    let min_sharpe = config.get_double("acceptance", "min_sharpe", DEFAULT_MIN_SHARPE);
    if !min_sharpe.is_finite() {
        return Err(invalid("acceptance", "min_sharpe", "min_sharpe must be finite"));
    }
    let max_correlation =
        config.get_double("acceptance", "max_correlation", DEFAULT_MAX_CORRELATION);
    if max_correlation.is_nan() || max_correlation <= 0.0 || max_correlation > 1.0 {
        return Err(invalid(
            "acceptance",
            "max_correlation",
            "max_correlation must be in (0, 1]",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn valid_config_passes() {
        let config = make_config(
            r#"
[data]
path = ./data
assets = SPY,QQQ,IWM
start_date = 2015-01-01
end_date = 2024-12-31

[signal]
ema_span = 110
lag = 13

[allocation]
mode = trend

[performance]
window = 756
periods_per_year = 252
leverage_epsilon = 0.000001

[acceptance]
min_sharpe = 1.0
max_correlation = 0.8
"#,
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn minimal_config_passes() {
        let config = make_config("[data]\npath = ./data\n");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn missing_data_path_fails() {
        let config = make_config("[signal]\nlag = 5\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, BreadthtraderError::ConfigMissing { key, .. } if key == "path"));
    }

    #[test]
    fn sqlite_source_needs_sqlite_path() {
        let config = make_config("[data]\nsource = sqlite\n");
        let err = validate_config(&config).unwrap_err();
        assert!(
            matches!(err, BreadthtraderError::ConfigMissing { section, key } if section == "sqlite" && key == "path")
        );

        let config = make_config("[data]\nsource = SQLite\n[sqlite]\npath = bars.db\n");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn unknown_source_fails() {
        let config = make_config("[data]\npath = d\nsource = parquet\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, BreadthtraderError::ConfigInvalid { key, .. } if key == "source"));
    }

    #[test]
    fn invalid_date_format_fails() {
        let config = make_config("[data]\npath = d\nstart_date = 2020/01/01\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, BreadthtraderError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn start_after_end_fails() {
        let config =
            make_config("[data]\npath = d\nstart_date = 2024-12-31\nend_date = 2020-01-01\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, BreadthtraderError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn zero_span_fails() {
        let config = make_config("[data]\npath = d\n[signal]\nema_span = 0\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, BreadthtraderError::ConfigInvalid { key, .. } if key == "ema_span"));
    }

    #[test]
    fn zero_lag_fails() {
        let config = make_config("[data]\npath = d\n[signal]\nlag = 0\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, BreadthtraderError::ConfigInvalid { key, .. } if key == "lag"));
    }

    #[test]
    fn unknown_mode_fails() {
        let config = make_config("[data]\npath = d\n[allocation]\nmode = momentum\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, BreadthtraderError::ConfigInvalid { key, .. } if key == "mode"));
    }

    #[test]
    fn non_numeric_lag_fails() {
        let config = make_config("[data]\npath = d\n[signal]\nlag = thirteen\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, BreadthtraderError::ConfigInvalid { key, .. } if key == "lag"));
    }

    #[test]
    fn window_of_one_fails() {
        let config = make_config("[data]\npath = d\n[performance]\nwindow = 1\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, BreadthtraderError::ConfigInvalid { key, .. } if key == "window"));
    }

    #[test]
    fn non_positive_periods_fail() {
        let config = make_config("[data]\npath = d\n[performance]\nperiods_per_year = 0\n");
        let err = validate_config(&config).unwrap_err();
        assert!(
            matches!(err, BreadthtraderError::ConfigInvalid { key, .. } if key == "periods_per_year")
        );
    }

    #[test]
    fn non_finite_periods_fail() {
        for value in ["NaN", "inf", "-inf"] {
            let config = make_config(&format!(
                "[data]\npath = d\n[performance]\nperiods_per_year = {}\n",
                value
            ));
            let err = validate_config(&config).unwrap_err();
            assert!(
                matches!(err, BreadthtraderError::ConfigInvalid { key, .. } if key == "periods_per_year"),
                "{value} accepted"
            );
        }
    }

    #[test]
    fn nan_correlation_threshold_fails() {
        let config = make_config("[data]\npath = d\n[acceptance]\nmax_correlation = NaN\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, BreadthtraderError::ConfigInvalid { key, .. } if key == "max_correlation"));
    }

    #[test]
    fn negative_epsilon_fails() {
        let config = make_config("[data]\npath = d\n[performance]\nleverage_epsilon = -0.1\n");
        let err = validate_config(&config).unwrap_err();
        assert!(
            matches!(err, BreadthtraderError::ConfigInvalid { key, .. } if key == "leverage_epsilon")
        );
    }

    #[test]
    fn correlation_above_one_fails() {
        let config = make_config("[data]\npath = d\n[acceptance]\nmax_correlation = 1.5\n");
        let err = validate_config(&config).unwrap_err();
        assert!(
            matches!(err, BreadthtraderError::ConfigInvalid { key, .. } if key == "max_correlation")
        );
    }
}
