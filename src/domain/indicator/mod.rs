//! Technical indicators, updated incrementally one bar at a time.
//!
//! This module provides:
//! - `IndicatorType`: indicator identity + parameters (serves as map key)
//! - `IndicatorValue`: enum for the different indicator output shapes
//! - `Indicator`: the rolling state behind one `IndicatorType`
//! - `IndicatorSet`: every indicator one instrument needs, plus its warm-up
//!   bookkeeping (`bars_observed`, `is_ready`)

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod roc;
pub mod rsi;
pub mod sma;

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::OhlcvBar;
use std::fmt;

use bollinger::{Bands, Bollinger};
use ema::Ema;
use macd::{Macd, MacdValue};
use roc::Roc;
use rsi::Rsi;
use sma::Sma;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd(MacdValue),
    Bollinger(Bands),
}

impl IndicatorValue {
    pub fn as_simple(&self) -> Option<f64> {
        match self {
            IndicatorValue::Simple(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_macd(&self) -> Option<MacdValue> {
        match self {
            IndicatorValue::Macd(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bands(&self) -> Option<Bands> {
        match self {
            IndicatorValue::Bollinger(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Roc(usize),
    Rsi(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

impl IndicatorType {
    /// Number of bars that must be observed before the indicator has a value.
    pub fn warmup(&self) -> usize {
        match *self {
            IndicatorType::Sma(n) | IndicatorType::Ema(n) => n,
            IndicatorType::Roc(n) | IndicatorType::Rsi(n) => n + 1,
            IndicatorType::Macd { slow, signal, .. } => slow + signal - 1,
            IndicatorType::Bollinger { period, .. } => period,
        }
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        let periods: Vec<(&str, usize)> = match *self {
            IndicatorType::Sma(n)
            | IndicatorType::Ema(n)
            | IndicatorType::Roc(n)
            | IndicatorType::Rsi(n) => vec![("period", n)],
            IndicatorType::Macd { fast, slow, signal } => {
                vec![("fast", fast), ("slow", slow), ("signal", signal)]
            }
            IndicatorType::Bollinger { period, .. } => vec![("period", period)],
        };
        for (name, value) in periods {
            if value == 0 {
                return Err(BacktestError::configuration(
                    &format!("{self} {name}"),
                    "lookback period must be positive",
                ));
            }
        }
        if let IndicatorType::Macd { fast, slow, .. } = *self {
            if fast >= slow {
                return Err(BacktestError::configuration(
                    &self.to_string(),
                    "fast period must be shorter than slow period",
                ));
            }
        }
        Ok(())
    }

    fn build(&self) -> Indicator {
        match *self {
            IndicatorType::Sma(n) => Indicator::Sma(Sma::new(n)),
            IndicatorType::Ema(n) => Indicator::Ema(Ema::new(n)),
            IndicatorType::Roc(n) => Indicator::Roc(Roc::new(n)),
            IndicatorType::Rsi(n) => Indicator::Rsi(Rsi::new(n)),
            IndicatorType::Macd { fast, slow, signal } => {
                Indicator::Macd(Macd::new(fast, slow, signal))
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => Indicator::Bollinger(Bollinger::new(period, stddev_mult_x100)),
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Roc(period) => write!(f, "ROC({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Indicator {
    Sma(Sma),
    Ema(Ema),
    Roc(Roc),
    Rsi(Rsi),
    Macd(Macd),
    Bollinger(Bollinger),
}

impl Indicator {
    pub fn update(&mut self, close: f64) -> Option<IndicatorValue> {
        match self {
            Indicator::Sma(i) => i.update(close).map(IndicatorValue::Simple),
            Indicator::Ema(i) => i.update(close).map(IndicatorValue::Simple),
            Indicator::Roc(i) => i.update(close).map(IndicatorValue::Simple),
            Indicator::Rsi(i) => i.update(close).map(IndicatorValue::Simple),
            Indicator::Macd(i) => i.update(close).map(IndicatorValue::Macd),
            Indicator::Bollinger(i) => i.update(close).map(IndicatorValue::Bollinger),
        }
    }

    pub fn value(&self) -> Option<IndicatorValue> {
        match self {
            Indicator::Sma(i) => i.value().map(IndicatorValue::Simple),
            Indicator::Ema(i) => i.value().map(IndicatorValue::Simple),
            Indicator::Roc(i) => i.value().map(IndicatorValue::Simple),
            Indicator::Rsi(i) => i.value().map(IndicatorValue::Simple),
            Indicator::Macd(i) => i.value().map(IndicatorValue::Macd),
            Indicator::Bollinger(i) => i.value().map(IndicatorValue::Bollinger),
        }
    }
}

/// All indicators for one instrument.
///
/// `is_ready` is true once `bars_observed >= max(warmup)`; trading logic
/// checks it instead of probing each indicator.
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    indicators: Vec<(IndicatorType, Indicator)>,
    bars_observed: usize,
    warmup: usize,
}

impl IndicatorSet {
    pub fn new(types: &[IndicatorType]) -> Result<Self, BacktestError> {
        let mut indicators: Vec<(IndicatorType, Indicator)> = Vec::with_capacity(types.len());
        for t in types {
            t.validate()?;
            if indicators.iter().all(|(existing, _)| existing != t) {
                indicators.push((*t, t.build()));
            }
        }
        let warmup = types.iter().map(|t| t.warmup()).max().unwrap_or(0);
        Ok(IndicatorSet {
            indicators,
            bars_observed: 0,
            warmup,
        })
    }

    pub fn update(&mut self, bar: &OhlcvBar) {
        self.bars_observed += 1;
        for (_, indicator) in &mut self.indicators {
            indicator.update(bar.close);
        }
    }

    pub fn bars_observed(&self) -> usize {
        self.bars_observed
    }

    pub fn warmup(&self) -> usize {
        self.warmup
    }

    pub fn is_ready(&self) -> bool {
        self.bars_observed >= self.warmup
    }

    pub fn get(&self, indicator_type: &IndicatorType) -> Option<IndicatorValue> {
        self.indicators
            .iter()
            .find(|(t, _)| t == indicator_type)
            .and_then(|(_, i)| i.value())
    }

    pub fn simple(&self, indicator_type: &IndicatorType) -> Option<f64> {
        self.get(indicator_type).and_then(|v| v.as_simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(i: usize, close: f64) -> OhlcvBar {
        OhlcvBar {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn indicator_type_display() {
        assert_eq!(IndicatorType::Sma(20).to_string(), "SMA(20)");
        assert_eq!(
            IndicatorType::Macd {
                fast: 12,
                slow: 26,
                signal: 9
            }
            .to_string(),
            "MACD(12,26,9)"
        );
        assert_eq!(
            IndicatorType::Bollinger {
                period: 20,
                stddev_mult_x100: 200
            }
            .to_string(),
            "BOLLINGER(20,2)"
        );
    }

    #[test]
    fn warmup_lengths() {
        assert_eq!(IndicatorType::Sma(5).warmup(), 5);
        assert_eq!(IndicatorType::Roc(5).warmup(), 6);
        assert_eq!(IndicatorType::Rsi(14).warmup(), 15);
        assert_eq!(
            IndicatorType::Macd {
                fast: 12,
                slow: 26,
                signal: 9
            }
            .warmup(),
            34
        );
    }

    #[test]
    fn zero_period_is_configuration_error() {
        let err = IndicatorSet::new(&[IndicatorType::Sma(0)]).unwrap_err();
        assert!(matches!(err, BacktestError::Configuration { .. }));
    }

    #[test]
    fn macd_fast_not_below_slow_rejected() {
        let t = IndicatorType::Macd {
            fast: 26,
            slow: 12,
            signal: 9,
        };
        assert!(t.validate().is_err());
    }

    #[test]
    fn set_ready_after_longest_warmup() {
        let mut set = IndicatorSet::new(&[IndicatorType::Sma(2), IndicatorType::Roc(3)]).unwrap();
        assert_eq!(set.warmup(), 4);
        for i in 0..3 {
            set.update(&bar(i, 10.0 + i as f64));
            assert!(!set.is_ready());
        }
        set.update(&bar(3, 13.0));
        assert!(set.is_ready());
        assert_eq!(set.bars_observed(), 4);
        assert!((set.simple(&IndicatorType::Sma(2)).unwrap() - 12.5).abs() < f64::EPSILON);
        assert!((set.simple(&IndicatorType::Roc(3)).unwrap() - 30.0).abs() < 1e-10);
    }

    #[test]
    fn duplicate_types_share_state() {
        let set = IndicatorSet::new(&[IndicatorType::Sma(3), IndicatorType::Sma(3)]).unwrap();
        assert_eq!(set.indicators.len(), 1);
    }

    #[test]
    fn unknown_indicator_is_none() {
        let set = IndicatorSet::new(&[IndicatorType::Sma(3)]).unwrap();
        assert!(set.get(&IndicatorType::Ema(3)).is_none());
    }

    #[test]
    fn value_accessors() {
        let v = IndicatorValue::Simple(1.5);
        assert_eq!(v.as_simple(), Some(1.5));
        assert!(v.as_macd().is_none());
        assert!(v.as_bands().is_none());
    }
}
