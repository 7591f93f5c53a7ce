#![allow(dead_code)]

use barsim::domain::backtest::BacktestConfig;
use barsim::domain::error::BacktestError;
pub use barsim::domain::ohlcv::{BarSeries, OhlcvBar};
use barsim::domain::strategy::RiskParams;
use barsim::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, BacktestError> {
        let bars = self.data.get(code).ok_or_else(|| BacktestError::NoData {
            code: code.to_string(),
        })?;
        Ok(bars
            .iter()
            .filter(|b| b.date >= start_date && b.date <= end_date)
            .cloned()
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacktestError> {
        let mut codes: Vec<String> = self.data.keys().cloned().collect();
        codes.sort();
        Ok(codes)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Day `index` of a synthetic calendar starting 2024-01-01.
pub fn day(index: usize) -> NaiveDate {
    date(2024, 1, 1) + chrono::Duration::days(index as i64)
}

pub fn make_bar(index: usize, close: f64) -> OhlcvBar {
    OhlcvBar {
        date: day(index),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1_000,
    }
}

pub fn series_from_closes(code: &str, closes: &[f64]) -> BarSeries {
    BarSeries::new(
        code,
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| make_bar(i, c))
            .collect(),
    )
}

/// Compounding price path starting at 100.
pub fn geometric(len: usize, growth: f64) -> Vec<f64> {
    (0..len).map(|i| 100.0 * growth.powi(i as i32)).collect()
}

pub fn frictionless(initial_cash: f64) -> BacktestConfig {
    BacktestConfig {
        initial_cash,
        commission_rate: 0.0,
        ..BacktestConfig::default()
    }
}

/// Full-size entries with stop-loss and take-profit disabled.
pub fn all_in() -> RiskParams {
    RiskParams {
        stop_loss_pct: 0.0,
        take_profit_pct: 0.0,
        max_position_fraction: 1.0,
    }
}
