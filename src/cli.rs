//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_output_adapter::{self, CsvOutputAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
#[cfg(feature = "sqlite")]
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::acceptance::{self, AcceptanceReport, AcceptanceThresholds, ReferenceReturns};
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{parse_optional_date, validate_config};
use crate::domain::error::BreadthtraderError;
use crate::domain::exposure::DEFAULT_LEVERAGE_EPSILON;
use crate::domain::market_frame::MarketFrame;
use crate::domain::performance::{DEFAULT_WINDOW, PerformanceParams, TRADING_DAYS_PER_YEAR};
use crate::domain::signal::{DEFAULT_EMA_SPAN, DEFAULT_LAG, TrendParams};
use crate::domain::universe::{parse_assets, validate_universe};
use crate::domain::weights::{AllocationMode, WeightMatrix};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::output_port::OutputPort;

pub const DEFAULT_OUTPUT_DIR: &str = "out";

#[derive(Parser, Debug)]
#[command(
    name = "breadthtrader",
    about = "Market-breadth trend allocation backtester"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build trend weights from market data and evaluate them
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Evaluate an externally produced weights CSV
    Evaluate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        weights: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range for asset(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        asset: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest { config, output } => run_backtest(&config, output.as_deref()),
        Command::Evaluate {
            config,
            weights,
            output,
        } => run_evaluate(&config, &weights, output.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, asset } => run_info(&config, asset.as_deref()),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, BreadthtraderError> {
    FileConfigAdapter::from_file(path).map_err(|e| BreadthtraderError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Validate first, then read every engine tunable with its default.
pub fn build_backtest_config(
    config: &dyn ConfigPort,
) -> Result<BacktestConfig, BreadthtraderError> {
    validate_config(config)?;

    let mode = match config.get_string("allocation", "mode") {
        Some(s) => s
            .parse::<AllocationMode>()
            .map_err(|reason| BreadthtraderError::ConfigInvalid {
                section: "allocation".into(),
                key: "mode".into(),
                reason,
            })?,
        None => AllocationMode::default(),
    };

    Ok(BacktestConfig {
        trend: TrendParams {
            ema_span: config.get_int("signal", "ema_span", DEFAULT_EMA_SPAN as i64) as usize,
            lag: config.get_int("signal", "lag", DEFAULT_LAG as i64) as usize,
        },
        mode,
        performance: PerformanceParams {
            window: config.get_int("performance", "window", DEFAULT_WINDOW as i64) as usize,
            periods_per_year: config.get_double(
                "performance",
                "periods_per_year",
                TRADING_DAYS_PER_YEAR as f64,
            ),
        },
        leverage_epsilon: config.get_double(
            "performance",
            "leverage_epsilon",
            DEFAULT_LEVERAGE_EPSILON,
        ),
    })
}

pub fn build_thresholds(config: &dyn ConfigPort) -> AcceptanceThresholds {
    let defaults = AcceptanceThresholds::default();
    AcceptanceThresholds {
        min_sharpe: config.get_double("acceptance", "min_sharpe", defaults.min_sharpe),
        max_correlation: config.get_double(
            "acceptance",
            "max_correlation",
            defaults.max_correlation,
        ),
    }
}

/// Configured asset list, or every asset the data source knows.
pub fn resolve_assets(
    config: &dyn ConfigPort,
    data_port: &dyn DataPort,
) -> Result<Vec<String>, BreadthtraderError> {
    match config
        .get_string("data", "assets")
        .filter(|s| !s.trim().is_empty())
    {
        Some(list) => Ok(parse_assets(&list)?),
        None => data_port.list_assets(),
    }
}

pub fn load_market(
    config: &dyn ConfigPort,
    data_port: &dyn DataPort,
) -> Result<MarketFrame, BreadthtraderError> {
    let assets = resolve_assets(config, data_port)?;
    if assets.is_empty() {
        return Err(BreadthtraderError::NoData {
            asset: "all".into(),
        });
    }

    let start_date = parse_optional_date(config, "start_date")?;
    let end_date = parse_optional_date(config, "end_date")?;

    let universe = validate_universe(data_port, assets, start_date, end_date)?;
    let market = MarketFrame::from_observations(&universe.observations)?;
    if market.is_empty() {
        return Err(BreadthtraderError::NoData {
            asset: "all".into(),
        });
    }
    Ok(market)
}

pub fn load_references(
    config: &dyn ConfigPort,
) -> Result<Vec<ReferenceReturns>, BreadthtraderError> {
    match config
        .get_string("acceptance", "reference_returns")
        .filter(|s| !s.trim().is_empty())
    {
        Some(path) => csv_output_adapter::read_reference_returns(Path::new(path.trim())),
        None => Ok(Vec::new()),
    }
}

pub fn output_dir(output_override: Option<&Path>, config: &dyn ConfigPort) -> PathBuf {
    match output_override {
        Some(p) => p.to_path_buf(),
        None => config
            .get_string("output", "path")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
    }
}

fn data_port_for(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, BreadthtraderError> {
    let source = config
        .get_string("data", "source")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "csv".to_string());

    match source.as_str() {
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let adapter = SqliteAdapter::from_config(config)?;
            adapter.initialize_schema()?;
            Ok(Box::new(adapter))
        }
        "csv" => {
            let path = config.get_string("data", "path").ok_or_else(|| {
                BreadthtraderError::ConfigMissing {
                    section: "data".into(),
                    key: "path".into(),
                }
            })?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(path.trim()))))
        }
        other => Err(BreadthtraderError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: format!("data source '{}' is not available in this build", other),
        }),
    }
}

/// Stages after config: reference returns, market data, allocation, checks,
/// statistics, outputs, acceptance. Every input is read before anything is
/// written.
pub fn run_backtest_pipeline(
    config: &dyn ConfigPort,
    data_port: &dyn DataPort,
    output_port: &dyn OutputPort,
) -> Result<(BacktestResult, AcceptanceReport), BreadthtraderError> {
    let bt_config = build_backtest_config(config)?;
    let references = load_references(config)?;
    let market = load_market(config, data_port)?;
    let result = backtest_engine::run_backtest(&market, &bt_config)?;
    finish_pipeline(config, output_port, result, &references)
}

pub fn run_evaluate_pipeline(
    config: &dyn ConfigPort,
    data_port: &dyn DataPort,
    output_port: &dyn OutputPort,
    weights: &WeightMatrix,
) -> Result<(BacktestResult, AcceptanceReport), BreadthtraderError> {
    let bt_config = build_backtest_config(config)?;
    let references = load_references(config)?;
    let market = load_market(config, data_port)?;
    let result = backtest_engine::evaluate_weights(&market, weights, &bt_config)?;
    finish_pipeline(config, output_port, result, &references)
}

fn finish_pipeline(
    config: &dyn ConfigPort,
    output_port: &dyn OutputPort,
    result: BacktestResult,
    references: &[ReferenceReturns],
) -> Result<(BacktestResult, AcceptanceReport), BreadthtraderError> {
    output_port.write_weights(result.weights())?;
    output_port.write_statistics(&result.statistics)?;

    let report = acceptance::evaluate(
        &result.statistics,
        &result.violations,
        references,
        &build_thresholds(config),
    );
    Ok((result, report))
}

fn run_backtest(
    config_path: &Path,
    output: Option<&Path>,
) -> Result<ExitCode, BreadthtraderError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    let data_port = data_port_for(&config)?;
    let dir = output_dir(output, &config);
    let output_port = CsvOutputAdapter::new(dir.clone());

    let (result, report) = run_backtest_pipeline(&config, data_port.as_ref(), &output_port)?;
    print_summary(&result, &report);
    eprintln!("\nResults written to: {}", dir.display());
    Ok(ExitCode::SUCCESS)
}

fn run_evaluate(
    config_path: &Path,
    weights_path: &Path,
    output: Option<&Path>,
) -> Result<ExitCode, BreadthtraderError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    let data_port = data_port_for(&config)?;
    let dir = output_dir(output, &config);
    let output_port = CsvOutputAdapter::new(dir.clone());

    eprintln!("Loading weights from {}", weights_path.display());
    let weights = csv_output_adapter::read_weights(weights_path)?;

    let (result, report) = run_evaluate_pipeline(&config, data_port.as_ref(), &output_port, &weights)?;
    print_summary(&result, &report);
    eprintln!("\nResults written to: {}", dir.display());
    Ok(ExitCode::SUCCESS)
}

fn run_validate(config_path: &Path) -> Result<ExitCode, BreadthtraderError> {
    eprintln!("Validating config: {}", config_path.display());
    let config = load_config(config_path)?;
    let bt_config = build_backtest_config(&config)?;
    let thresholds = build_thresholds(&config);

    if let Some(list) = config
        .get_string("data", "assets")
        .filter(|s| !s.trim().is_empty())
    {
        let assets = parse_assets(&list).map_err(BreadthtraderError::from)?;
        eprintln!("  assets:          {}", assets.join(", "));
    } else {
        eprintln!("  assets:          all files under data path");
    }
    eprintln!("  mode:            {}", bt_config.mode);
    eprintln!(
        "  trend:           ema_span={} lag={}",
        bt_config.trend.ema_span, bt_config.trend.lag
    );
    eprintln!(
        "  performance:     window={} periods_per_year={}",
        bt_config.performance.window, bt_config.performance.periods_per_year
    );
    eprintln!(
        "  acceptance:      sharpe > {} correlation < {}",
        thresholds.min_sharpe, thresholds.max_correlation
    );
    eprintln!("\nConfiguration is valid.");
    Ok(ExitCode::SUCCESS)
}

fn run_info(config_path: &Path, asset: Option<&str>) -> Result<ExitCode, BreadthtraderError> {
    let config = load_config(config_path)?;
    let data_port = data_port_for(&config)?;

    let assets = match asset {
        Some(a) => vec![a.trim().to_uppercase()],
        None => resolve_assets(&config, data_port.as_ref())?,
    };

    for a in &assets {
        match data_port.get_data_range(a) {
            Ok(Some((min_date, max_date, count))) => {
                println!("{}: {} rows, {} to {}", a, count, min_date, max_date);
            }
            Ok(None) => {
                eprintln!("{}: no data found", a);
            }
            Err(e) => {
                eprintln!("error querying {}: {}", a, e);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn pass_fail(passed: bool) -> &'static str {
    if passed { "PASS" } else { "FAIL" }
}

fn format_optional(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "n/a".to_string())
}

fn print_summary(result: &BacktestResult, report: &AcceptanceReport) {
    let summary = result.statistics.summary();

    eprintln!("\n=== Performance ===");
    eprintln!("Days:             {}", summary.days);
    eprintln!("Instruments:      {}", summary.instruments);
    eprintln!("Total Return:     {:.2}%", summary.total_return * 100.0);
    eprintln!(
        "Annualized:       {:.2}%",
        summary.annualized_return * 100.0
    );
    eprintln!("Sharpe Ratio:     {}", format_optional(summary.sharpe_ratio));
    eprintln!(
        "Rolling Sharpe:   {}",
        format_optional(summary.latest_rolling_sharpe)
    );
    eprintln!("Max Drawdown:     {:.1}%", summary.max_drawdown * 100.0);
    eprintln!("Mean Turnover:    {:.4}", summary.mean_turnover);
    eprintln!(
        "Carried Forward:  {} days",
        result.normalization.corrected_count()
    );

    eprintln!("\n=== Acceptance ===");
    eprintln!(
        "Sharpe:           {} ({})",
        pass_fail(report.sharpe_passed),
        format_optional(report.sharpe_ratio)
    );
    for check in &report.correlations {
        eprintln!(
            "Correlation {}:  {} ({})",
            check.name,
            pass_fail(check.passed),
            format_optional(check.correlation)
        );
    }
    eprintln!("Leverage:         {}", pass_fail(report.leverage_passed));
    eprintln!(
        "Exposure:         {} ({} illiquid, {} over-leveraged, {} undefined)",
        pass_fail(report.exposure_passed),
        report.violations.illiquid_exposure,
        report.violations.over_leveraged,
        report.violations.undefined_weight
    );
    eprintln!("Verdict:          {}", pass_fail(report.passed()));
}
