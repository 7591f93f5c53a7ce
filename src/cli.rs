//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{
    run_backtest, BacktestConfig, BacktestResult, DEFAULT_COMMISSION_RATE, DEFAULT_INITIAL_CASH,
};
use crate::domain::comparison::{compare_results, ComparisonRow};
use crate::domain::config_validation::{
    parse_date_range, parse_period_list, validate_backtest_config, validate_strategy_config,
    validate_sweep_config, STRATEGY_KINDS,
};
use crate::domain::error::BacktestError;
use crate::domain::indicator::{bollinger, macd, IndicatorType};
use crate::domain::metrics::TRADING_DAYS_PER_YEAR;
use crate::domain::ohlcv::BarSeries;
use crate::domain::rotation::{BuyAndHold, RotationEngine, RotationParams, RotationVariant};
use crate::domain::strategy::signals::{
    BollingerBand, FilteredCrossover, MacdCrossover, MaFilter, RsiThreshold, SmaCrossover,
};
use crate::domain::strategy::vote::{self, MultiSignalVote};
use crate::domain::strategy::{RiskParams, SignalStrategy, Strategy};
use crate::domain::sweep::{rank_sweep, run_sweep, ParamGrid};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "barsim", about = "Bar-driven strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory for trades.csv, equity.csv and metrics.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        code: Option<String>,
    },
    /// Run several strategies over the same data and rank them
    Compare {
        #[arg(short, long)]
        config: PathBuf,
        /// Strategy kinds to compare; all kinds when omitted
        #[arg(short, long, value_delimiter = ',')]
        kinds: Vec<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Sweep SMA crossover periods in parallel
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration without loading data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            code,
        } => run_single(&config, output.as_deref(), code.as_deref()),
        Command::Compare {
            config,
            kinds,
            output,
        } => run_compare(&config, &kinds, output.as_deref()),
        Command::Sweep { config, output } => run_sweep_command(&config, output.as_deref()),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: BacktestError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

fn run_single(config_path: &Path, output: Option<&Path>, code_override: Option<&str>) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Validate
    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }
    if let Err(e) = validate_strategy_config(&adapter) {
        return fail(e);
    }

    // Stage 3: Build strategy and engine config
    let mut strategy = match build_strategy(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    eprintln!("Strategy: {}", strategy.name());

    // Stage 4: Load data
    let series = match load_series(&adapter, code_override) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    print_universe(&series);

    // Stage 5: Run
    let result = match run_backtest(&series, strategy.as_mut(), &bt_config) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    print_summary(&result);

    // Stage 6: Report
    if let Some(dir) = output {
        if let Err(e) = CsvReportAdapter::new().write(&result, dir) {
            return fail(e);
        }
        eprintln!("\nReport written to: {}", dir.display());
    }
    ExitCode::SUCCESS
}

fn run_compare(config_path: &Path, kinds: &[String], output: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }

    let kinds: Vec<&str> = if kinds.is_empty() {
        STRATEGY_KINDS.to_vec()
    } else {
        kinds.iter().map(String::as_str).collect()
    };

    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let series = match load_series(&adapter, None) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    print_universe(&series);

    let mut results = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let mut strategy = match build_strategy_kind(kind, &adapter) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };
        eprintln!("  Running: {}", strategy.name());
        match run_backtest(&series, strategy.as_mut(), &bt_config) {
            Ok(r) => results.push(r),
            Err(e) => return fail(e),
        }
    }

    let rows = compare_results(&results);
    print_table(&rows);
    write_comparison(&rows, output)
}

fn run_sweep_command(config_path: &Path, output: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }
    if let Err(e) = validate_sweep_config(&adapter) {
        return fail(e);
    }

    let grid = match build_param_grid(&adapter) {
        Ok(g) => g,
        Err(e) => return fail(e),
    };
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let risk = build_risk(&adapter, RiskParams::default());
    let series = match load_series(&adapter, None) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    print_universe(&series);
    eprintln!("  Grid: {} combinations", grid.combinations().len());

    let points = match run_sweep(&series, &grid, risk, &bt_config) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let rows = rank_sweep(&points);
    print_table(&rows);
    write_comparison(&rows, output)
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }
    if let Err(e) = validate_strategy_config(&adapter) {
        return fail(e);
    }
    if let Err(e) = validate_sweep_config(&adapter) {
        return fail(e);
    }
    let strategy = match build_strategy(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    eprintln!("\nStrategy: {}", strategy.name());
    eprintln!("Initial cash:     {:.2}", bt_config.initial_cash);
    eprintln!("Commission rate:  {}", bt_config.commission_rate);
    eprintln!("Codes:            {}", resolve_codes(None, &adapter).join(", "));
    eprintln!("\nConfiguration is valid");
    ExitCode::SUCCESS
}

fn write_comparison(rows: &[ComparisonRow], output: Option<&Path>) -> ExitCode {
    if let Some(dir) = output {
        if let Err(e) = CsvReportAdapter::new().write_comparison(rows, dir) {
            return fail(e);
        }
        eprintln!("\nComparison written to: {}", dir.display());
    }
    ExitCode::SUCCESS
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, BacktestError> {
    let config = BacktestConfig {
        initial_cash: adapter.get_double("backtest", "initial_cash", DEFAULT_INITIAL_CASH),
        commission_rate: adapter.get_double("backtest", "commission_rate", DEFAULT_COMMISSION_RATE),
        annualization_factor: adapter.get_double(
            "backtest",
            "annualization_factor",
            TRADING_DAYS_PER_YEAR,
        ),
    };
    config.validate()?;
    Ok(config)
}

/// Build the strategy named by `[strategy] kind`.
pub fn build_strategy(adapter: &dyn ConfigPort) -> Result<Box<dyn Strategy>, BacktestError> {
    let kind = adapter
        .get_string("strategy", "kind")
        .ok_or_else(|| BacktestError::ConfigMissing {
            section: "strategy".into(),
            key: "kind".into(),
        })?;
    build_strategy_kind(kind.trim(), adapter)
}

/// Build a strategy of the given kind, reading its parameters from
/// `[strategy]` and falling back to that kind's defaults.
pub fn build_strategy_kind(
    kind: &str,
    adapter: &dyn ConfigPort,
) -> Result<Box<dyn Strategy>, BacktestError> {
    let risk = build_risk(adapter, RiskParams::default());
    let strategy: Box<dyn Strategy> = match kind {
        "sma_crossover" => Box::new(SignalStrategy::new(
            SmaCrossover::new(
                period(adapter, "fast_period", SmaCrossover::DEFAULT_FAST),
                period(adapter, "slow_period", SmaCrossover::DEFAULT_SLOW),
            ),
            risk,
        )?),
        "rsi" => Box::new(SignalStrategy::new(
            RsiThreshold::new(
                period(adapter, "rsi_period", RsiThreshold::DEFAULT_PERIOD),
                adapter.get_double("strategy", "oversold", RsiThreshold::DEFAULT_OVERSOLD),
                adapter.get_double("strategy", "overbought", RsiThreshold::DEFAULT_OVERBOUGHT),
            ),
            risk,
        )?),
        "macd" => Box::new(SignalStrategy::new(
            MacdCrossover::new(
                period(adapter, "macd_fast", macd::DEFAULT_FAST),
                period(adapter, "macd_slow", macd::DEFAULT_SLOW),
                period(adapter, "macd_signal", macd::DEFAULT_SIGNAL),
            ),
            risk,
        )?),
        "bollinger" => Box::new(SignalStrategy::new(
            BollingerBand::new(
                period(adapter, "bb_period", bollinger::DEFAULT_PERIOD),
                stddev_mult_x100(adapter)?,
            ),
            risk,
        )?),
        "multi_signal" => {
            let defaults = MultiSignalVote::default();
            let signal = MultiSignalVote {
                fast: period(adapter, "fast_period", defaults.fast),
                slow: period(adapter, "slow_period", defaults.slow),
                rsi_period: period(adapter, "rsi_period", defaults.rsi_period),
                rsi_oversold: adapter.get_double("strategy", "oversold", defaults.rsi_oversold),
                rsi_overbought: adapter.get_double(
                    "strategy",
                    "overbought",
                    defaults.rsi_overbought,
                ),
                macd: IndicatorType::Macd {
                    fast: period(adapter, "macd_fast", macd::DEFAULT_FAST),
                    slow: period(adapter, "macd_slow", macd::DEFAULT_SLOW),
                    signal: period(adapter, "macd_signal", macd::DEFAULT_SIGNAL),
                },
                threshold: period(adapter, "vote_threshold", defaults.threshold),
            };
            let risk = build_risk(
                adapter,
                RiskParams {
                    max_position_fraction: vote::DEFAULT_MAX_POSITION_FRACTION,
                    ..RiskParams::default()
                },
            );
            Box::new(SignalStrategy::new(signal, risk)?)
        }
        "ma_filter" => {
            let risk = build_risk(
                adapter,
                RiskParams {
                    stop_loss_pct: MaFilter::DEFAULT_STOP_LOSS_PCT,
                    take_profit_pct: MaFilter::DEFAULT_TAKE_PROFIT_PCT,
                    max_position_fraction: MaFilter::DEFAULT_MAX_POSITION_FRACTION,
                },
            );
            Box::new(SignalStrategy::new(
                MaFilter::new(period(adapter, "trend_period", MaFilter::DEFAULT_PERIOD)),
                risk,
            )?)
        }
        "filtered_crossover" => {
            let risk = build_risk(
                adapter,
                RiskParams {
                    max_position_fraction: FilteredCrossover::DEFAULT_MAX_POSITION_FRACTION,
                    ..RiskParams::default()
                },
            );
            Box::new(SignalStrategy::new(
                FilteredCrossover::new(
                    period(adapter, "fast_period", SmaCrossover::DEFAULT_FAST),
                    period(adapter, "slow_period", SmaCrossover::DEFAULT_SLOW),
                    period(adapter, "trend_period", FilteredCrossover::DEFAULT_TREND),
                ),
                risk,
            )?)
        }
        "momentum" => {
            let defaults = RotationParams::momentum();
            let default_filter = match defaults.variant {
                RotationVariant::Momentum { ma_filter } => ma_filter.unwrap_or(0),
                RotationVariant::DualMomentum => 0,
            };
            let ma_filter = match adapter.get_int("strategy", "ma_filter", default_filter as i64) {
                n if n > 0 => Some(n as usize),
                _ => None,
            };
            Box::new(RotationEngine::new(RotationParams {
                variant: RotationVariant::Momentum { ma_filter },
                ..rotation_params(adapter, defaults)
            })?)
        }
        "dual_momentum" => Box::new(RotationEngine::new(rotation_params(
            adapter,
            RotationParams::dual_momentum(),
        ))?),
        "buy_and_hold" => Box::new(BuyAndHold::new()),
        other => {
            return Err(BacktestError::configuration(
                "kind",
                format!("unknown strategy kind {:?}", other),
            ));
        }
    };
    Ok(strategy)
}

pub fn build_risk(adapter: &dyn ConfigPort, defaults: RiskParams) -> RiskParams {
    RiskParams {
        stop_loss_pct: adapter.get_double("strategy", "stop_loss_pct", defaults.stop_loss_pct),
        take_profit_pct: adapter.get_double(
            "strategy",
            "take_profit_pct",
            defaults.take_profit_pct,
        ),
        max_position_fraction: adapter.get_double(
            "strategy",
            "max_position_fraction",
            defaults.max_position_fraction,
        ),
    }
}

pub fn build_param_grid(adapter: &dyn ConfigPort) -> Result<ParamGrid, BacktestError> {
    let defaults = ParamGrid::default();
    Ok(ParamGrid {
        fast_periods: parse_period_list(adapter, "sweep", "fast_periods")?
            .unwrap_or(defaults.fast_periods),
        slow_periods: parse_period_list(adapter, "sweep", "slow_periods")?
            .unwrap_or(defaults.slow_periods),
    })
}

fn rotation_params(adapter: &dyn ConfigPort, defaults: RotationParams) -> RotationParams {
    RotationParams {
        lookback: period(adapter, "lookback", defaults.lookback),
        top_n: period(adapter, "top_n", defaults.top_n),
        rebalance_period: period(adapter, "rebalance_period", defaults.rebalance_period),
        variant: defaults.variant,
    }
}

/// Non-positive values map to 0 so the domain constructors reject them.
fn period(adapter: &dyn ConfigPort, key: &str, default: usize) -> usize {
    let value = adapter.get_int("strategy", key, default as i64);
    usize::try_from(value).unwrap_or(0)
}

fn stddev_mult_x100(adapter: &dyn ConfigPort) -> Result<u32, BacktestError> {
    let default = bollinger::DEFAULT_MULT_X100 as f64 / 100.0;
    let mult = adapter.get_double("strategy", "bb_stddev", default);
    if !(mult > 0.0 && mult <= 10.0) {
        return Err(BacktestError::configuration(
            "bb_stddev",
            format!("must be in (0, 10], got {}", mult),
        ));
    }
    Ok((mult * 100.0).round() as u32)
}

pub fn resolve_codes(code_override: Option<&str>, config: &dyn ConfigPort) -> Vec<String> {
    if let Some(c) = code_override {
        return vec![c.trim().to_uppercase()];
    }
    config
        .get_list("backtest", "codes")
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.to_uppercase())
        .collect()
}

/// Load every configured series from `[backtest] data_dir`.
pub fn load_series(
    adapter: &dyn ConfigPort,
    code_override: Option<&str>,
) -> Result<Vec<BarSeries>, BacktestError> {
    let data_dir = adapter
        .get_string("backtest", "data_dir")
        .ok_or_else(|| BacktestError::ConfigMissing {
            section: "backtest".into(),
            key: "data_dir".into(),
        })?;
    let codes = resolve_codes(code_override, adapter);
    if codes.is_empty() {
        return Err(BacktestError::configuration("codes", "no codes configured"));
    }
    let (start, end) = parse_date_range(adapter)?;
    CsvAdapter::new(PathBuf::from(data_dir)).fetch_universe(&codes, start, end)
}

fn print_universe(series: &[BarSeries]) {
    let bars = series.first().map_or(0, BarSeries::len);
    let codes: Vec<&str> = series.iter().map(|s| s.code.as_str()).collect();
    eprintln!(
        "Running backtest: {} codes ({}), {} bars",
        series.len(),
        codes.join(", "),
        bars
    );
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    eprintln!("\n=== Results: {} ===", result.strategy_name);
    eprintln!("Start Value:      {:.2}", m.start_value);
    eprintln!("End Value:        {:.2}", m.end_value);
    eprintln!("Total Return:     {:.2}%", m.return_pct());
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", m.max_drawdown_pct());
    eprintln!("Max DD Duration:  {} bars", m.max_drawdown_duration);
    eprintln!("Total Trades:     {}", m.total_trades);
    eprintln!("Win Rate:         {:.1}%", m.win_rate_pct());
    eprintln!("Avg Win:          {:.2}", m.avg_win);
    eprintln!("Avg Loss:         {:.2}", m.avg_loss);
    eprintln!("Largest Win:      {:.2}", m.largest_win);
    eprintln!("Largest Loss:     {:.2}", m.largest_loss);
    eprintln!("Profit Factor:    {:.2}", m.profit_factor);
    eprintln!("Avg Duration:     {:.1} days", m.avg_trade_duration);
}

fn print_table(rows: &[ComparisonRow]) {
    eprintln!(
        "\n{:<4} {:<48} {:>12} {:>9} {:>7} {:>8} {:>7} {:>8} {:>7}",
        "#", "Strategy", "End Value", "Return%", "Trades", "Win%", "PF", "MaxDD%", "Sharpe"
    );
    for (i, row) in rows.iter().enumerate() {
        eprintln!(
            "{:<4} {:<48} {:>12.2} {:>9.2} {:>7} {:>8.1} {:>7.2} {:>8.1} {:>7.2}",
            i + 1,
            row.label,
            row.end_value,
            row.return_pct,
            row.total_trades,
            row.win_rate_pct,
            row.profit_factor,
            row.max_drawdown_pct,
            row.sharpe_ratio,
        );
    }
}
