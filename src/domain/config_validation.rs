//! Configuration validation.
//!
//! Checks raw config values before any data is loaded. Range checks that
//! depend on the strategy kind are repeated by the domain constructors, so
//! a value that passes here can still be rejected when the run is built.

use crate::domain::error::BacktestError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Every accepted `[strategy] kind`.
pub const STRATEGY_KINDS: &[&str] = &[
    "sma_crossover",
    "rsi",
    "macd",
    "bollinger",
    "multi_signal",
    "ma_filter",
    "filtered_crossover",
    "momentum",
    "dual_momentum",
    "buy_and_hold",
];

/// Integer `[strategy]` keys that must be at least 1 when present.
const PERIOD_KEYS: &[&str] = &[
    "fast_period",
    "slow_period",
    "rsi_period",
    "macd_fast",
    "macd_slow",
    "macd_signal",
    "bb_period",
    "trend_period",
    "vote_threshold",
    "lookback",
    "top_n",
    "rebalance_period",
];

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    validate_initial_cash(config)?;
    validate_commission(config)?;
    validate_annualization(config)?;
    validate_dates(config)?;
    validate_data_dir(config)?;
    validate_codes(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    validate_kind(config)?;
    validate_fraction(config, "stop_loss_pct", false)?;
    validate_fraction(config, "max_position_fraction", true)?;
    validate_take_profit(config)?;
    validate_periods(config)?;
    validate_ma_filter(config)?;
    Ok(())
}

pub fn validate_sweep_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let fast = parse_period_list(config, "sweep", "fast_periods")?;
    let slow = parse_period_list(config, "sweep", "slow_periods")?;
    match (fast, slow) {
        (Some(fast), Some(slow)) if !fast.iter().any(|f| slow.iter().any(|s| f < s)) => {
            Err(BacktestError::configuration(
                "fast_periods",
                "no fast period is below any slow period",
            ))
        }
        _ => Ok(()),
    }
}

/// Parse `[backtest] start_date` / `end_date`. Absent bounds are open.
pub fn parse_date_range(
    config: &dyn ConfigPort,
) -> Result<(NaiveDate, NaiveDate), BacktestError> {
    let start = parse_date(config, "start_date")?.unwrap_or(NaiveDate::MIN);
    let end = parse_date(config, "end_date")?.unwrap_or(NaiveDate::MAX);
    Ok((start, end))
}

/// Comma-separated positive integers, or `None` when the key is absent.
pub fn parse_period_list(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<Vec<usize>>, BacktestError> {
    let Some(items) = config.get_list(section, key) else {
        return Ok(None);
    };
    if items.is_empty() {
        return Err(BacktestError::configuration(key, "list is empty"));
    }
    items
        .iter()
        .map(|item| match item.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(BacktestError::configuration(
                key,
                format!("{:?} is not a positive integer", item),
            )),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn validate_initial_cash(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let value = config.get_double("backtest", "initial_cash", 100_000.0);
    if value <= 0.0 {
        return Err(BacktestError::configuration(
            "initial_cash",
            "initial_cash must be positive",
        ));
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let value = config.get_double("backtest", "commission_rate", 0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(BacktestError::configuration(
            "commission_rate",
            "commission_rate must be in [0, 1)",
        ));
    }
    Ok(())
}

fn validate_annualization(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let value = config.get_double("backtest", "annualization_factor", 252.0);
    if value <= 0.0 {
        return Err(BacktestError::configuration(
            "annualization_factor",
            "annualization_factor must be positive",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let (start, end) = parse_date_range(config)?;
    if start > end {
        return Err(BacktestError::configuration(
            "start_date",
            "start_date must not be after end_date",
        ));
    }
    Ok(())
}

fn parse_date(config: &dyn ConfigPort, key: &str) -> Result<Option<NaiveDate>, BacktestError> {
    match config.get_string("backtest", key) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
            .map(Some)
            .map_err(|_| {
                BacktestError::configuration(
                    key,
                    format!("invalid {} format, expected YYYY-MM-DD", key),
                )
            }),
    }
}

fn validate_data_dir(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    match config.get_string("backtest", "data_dir") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(BacktestError::ConfigMissing {
            section: "backtest".to_string(),
            key: "data_dir".to_string(),
        }),
    }
}

fn validate_codes(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    match config.get_list("backtest", "codes") {
        Some(codes) if !codes.is_empty() => Ok(()),
        Some(_) => Err(BacktestError::configuration("codes", "no codes listed")),
        None => Err(BacktestError::ConfigMissing {
            section: "backtest".to_string(),
            key: "codes".to_string(),
        }),
    }
}

fn validate_kind(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    match config.get_string("strategy", "kind") {
        None => Err(BacktestError::ConfigMissing {
            section: "strategy".to_string(),
            key: "kind".to_string(),
        }),
        Some(kind) if STRATEGY_KINDS.contains(&kind.trim()) => Ok(()),
        Some(kind) => Err(BacktestError::configuration(
            "kind",
            format!(
                "unknown strategy kind {:?}, expected one of {}",
                kind,
                STRATEGY_KINDS.join(", ")
            ),
        )),
    }
}

fn validate_fraction(
    config: &dyn ConfigPort,
    key: &str,
    exclude_zero: bool,
) -> Result<(), BacktestError> {
    if config.get_string("strategy", key).is_none() {
        return Ok(());
    }
    let value = config.get_double("strategy", key, f64::NAN);
    let ok = if exclude_zero {
        value > 0.0 && value <= 1.0
    } else {
        (0.0..1.0).contains(&value)
    };
    if !ok {
        let range = if exclude_zero { "(0, 1]" } else { "[0, 1)" };
        return Err(BacktestError::configuration(
            key,
            format!("{} must be a number in {}", key, range),
        ));
    }
    Ok(())
}

fn validate_take_profit(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    if config.get_string("strategy", "take_profit_pct").is_none() {
        return Ok(());
    }
    let value = config.get_double("strategy", "take_profit_pct", f64::NAN);
    if !(value >= 0.0) {
        return Err(BacktestError::configuration(
            "take_profit_pct",
            "take_profit_pct must be non-negative",
        ));
    }
    Ok(())
}

fn validate_periods(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    for &key in PERIOD_KEYS {
        if config.get_string("strategy", key).is_none() {
            continue;
        }
        if config.get_int("strategy", key, 0) < 1 {
            return Err(BacktestError::configuration(
                key,
                format!("{} must be a positive integer", key),
            ));
        }
    }
    Ok(())
}

/// `ma_filter = 0` disables the trend filter, so only negatives are invalid.
fn validate_ma_filter(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    if config.get_string("strategy", "ma_filter").is_none() {
        return Ok(());
    }
    if config.get_int("strategy", "ma_filter", -1) < 0 {
        return Err(BacktestError::configuration(
            "ma_filter",
            "ma_filter must be a non-negative integer",
        ));
    }
    Ok(())
}
