//! Technical signals for `SignalStrategy`.
//!
//! Crossovers follow the usual convention: `left` crosses above `right` when
//! `left_curr > right_curr && left_prev <= right_prev`. A crossover needs the
//! previous bar's values, so it is ready one bar after its slowest input.

use crate::domain::error::BacktestError;
use crate::domain::indicator::bollinger::{DEFAULT_MULT_X100, DEFAULT_PERIOD};
use crate::domain::indicator::macd::{DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};
use crate::domain::indicator::{IndicatorSet, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

use super::{Signal, Verdict};

/// Previous `(left, right)` pair for crossover detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cross {
    prev: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Crossing {
    pub above: bool,
    pub below: bool,
}

impl Cross {
    /// `None` on the first observation.
    pub fn step(&mut self, left: f64, right: f64) -> Option<Crossing> {
        let prev = self.prev.replace((left, right));
        let (left_prev, right_prev) = prev?;
        Some(Crossing {
            above: left > right && left_prev <= right_prev,
            below: left < right && left_prev >= right_prev,
        })
    }
}

fn check_fast_slow(fast: usize, slow: usize) -> Result<(), BacktestError> {
    if fast >= slow {
        return Err(BacktestError::configuration(
            "fast_period",
            format!("must be shorter than slow_period ({fast} >= {slow})"),
        ));
    }
    Ok(())
}

/// Fast SMA crossing the slow SMA.
#[derive(Debug, Clone)]
pub struct SmaCrossover {
    fast: usize,
    slow: usize,
    cross: Cross,
}

impl SmaCrossover {
    pub const DEFAULT_FAST: usize = 20;
    pub const DEFAULT_SLOW: usize = 50;

    pub fn new(fast: usize, slow: usize) -> Self {
        SmaCrossover {
            fast,
            slow,
            cross: Cross::default(),
        }
    }
}

impl Signal for SmaCrossover {
    fn name(&self) -> String {
        format!("SMA crossover {}/{}", self.fast, self.slow)
    }

    fn indicators(&self) -> Vec<IndicatorType> {
        vec![IndicatorType::Sma(self.fast), IndicatorType::Sma(self.slow)]
    }

    fn validate(&self) -> Result<(), BacktestError> {
        for indicator in self.indicators() {
            indicator.validate()?;
        }
        check_fast_slow(self.fast, self.slow)
    }

    fn evaluate(&mut self, _bar: &OhlcvBar, indicators: &IndicatorSet) -> Option<Verdict> {
        if !indicators.is_ready() {
            return None;
        }
        let fast = indicators.simple(&IndicatorType::Sma(self.fast))?;
        let slow = indicators.simple(&IndicatorType::Sma(self.slow))?;
        let crossing = self.cross.step(fast, slow)?;
        Some(Verdict {
            entry: crossing.above,
            exit: crossing.below,
        })
    }
}

/// RSI below the oversold level enters, above the overbought level exits.
#[derive(Debug, Clone)]
pub struct RsiThreshold {
    period: usize,
    oversold: f64,
    overbought: f64,
}

impl RsiThreshold {
    pub const DEFAULT_PERIOD: usize = 14;
    pub const DEFAULT_OVERSOLD: f64 = 30.0;
    pub const DEFAULT_OVERBOUGHT: f64 = 70.0;

    pub fn new(period: usize, oversold: f64, overbought: f64) -> Self {
        RsiThreshold {
            period,
            oversold,
            overbought,
        }
    }
}

pub(crate) fn check_rsi_levels(oversold: f64, overbought: f64) -> Result<(), BacktestError> {
    if !(0.0..=100.0).contains(&oversold) || !(0.0..=100.0).contains(&overbought) {
        return Err(BacktestError::configuration(
            "rsi_oversold",
            "RSI levels must be within [0, 100]",
        ));
    }
    if oversold >= overbought {
        return Err(BacktestError::configuration(
            "rsi_oversold",
            format!("must be below rsi_overbought ({oversold} >= {overbought})"),
        ));
    }
    Ok(())
}

impl Signal for RsiThreshold {
    fn name(&self) -> String {
        format!(
            "RSI {} ({}/{})",
            self.period, self.oversold, self.overbought
        )
    }

    fn indicators(&self) -> Vec<IndicatorType> {
        vec![IndicatorType::Rsi(self.period)]
    }

    fn validate(&self) -> Result<(), BacktestError> {
        IndicatorType::Rsi(self.period).validate()?;
        check_rsi_levels(self.oversold, self.overbought)
    }

    fn evaluate(&mut self, _bar: &OhlcvBar, indicators: &IndicatorSet) -> Option<Verdict> {
        if !indicators.is_ready() {
            return None;
        }
        let rsi = indicators.simple(&IndicatorType::Rsi(self.period))?;
        Some(Verdict {
            entry: rsi < self.oversold,
            exit: rsi > self.overbought,
        })
    }
}

/// MACD line crossing its signal line.
#[derive(Debug, Clone)]
pub struct MacdCrossover {
    indicator: IndicatorType,
    cross: Cross,
}

impl MacdCrossover {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        MacdCrossover {
            indicator: IndicatorType::Macd { fast, slow, signal },
            cross: Cross::default(),
        }
    }
}

impl Default for MacdCrossover {
    fn default() -> Self {
        MacdCrossover::new(DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
    }
}

impl Signal for MacdCrossover {
    fn name(&self) -> String {
        format!("{} crossover", self.indicator)
    }

    fn indicators(&self) -> Vec<IndicatorType> {
        vec![self.indicator]
    }

    fn evaluate(&mut self, _bar: &OhlcvBar, indicators: &IndicatorSet) -> Option<Verdict> {
        if !indicators.is_ready() {
            return None;
        }
        let macd = indicators.get(&self.indicator)?.as_macd()?;
        let crossing = self.cross.step(macd.line, macd.signal)?;
        Some(Verdict {
            entry: crossing.above,
            exit: crossing.below,
        })
    }
}

/// Close below the lower band enters, close above the upper band exits.
#[derive(Debug, Clone)]
pub struct BollingerBand {
    indicator: IndicatorType,
}

impl BollingerBand {
    pub fn new(period: usize, stddev_mult_x100: u32) -> Self {
        BollingerBand {
            indicator: IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            },
        }
    }
}

impl Default for BollingerBand {
    fn default() -> Self {
        BollingerBand::new(DEFAULT_PERIOD, DEFAULT_MULT_X100)
    }
}

impl Signal for BollingerBand {
    fn name(&self) -> String {
        self.indicator.to_string()
    }

    fn indicators(&self) -> Vec<IndicatorType> {
        vec![self.indicator]
    }

    fn evaluate(&mut self, bar: &OhlcvBar, indicators: &IndicatorSet) -> Option<Verdict> {
        if !indicators.is_ready() {
            return None;
        }
        let bands = indicators.get(&self.indicator)?.as_bands()?;
        Some(Verdict {
            entry: bar.close < bands.lower,
            exit: bar.close > bands.upper,
        })
    }
}

/// Close crossing above a long trend SMA enters; a close at or below it exits.
#[derive(Debug, Clone)]
pub struct MaFilter {
    period: usize,
    cross: Cross,
}

impl MaFilter {
    pub const DEFAULT_PERIOD: usize = 200;
    pub const DEFAULT_STOP_LOSS_PCT: f64 = 0.10;
    pub const DEFAULT_TAKE_PROFIT_PCT: f64 = 0.20;
    pub const DEFAULT_MAX_POSITION_FRACTION: f64 = 0.30;

    pub fn new(period: usize) -> Self {
        MaFilter {
            period,
            cross: Cross::default(),
        }
    }
}

impl Signal for MaFilter {
    fn name(&self) -> String {
        format!("MA filter {}", self.period)
    }

    fn indicators(&self) -> Vec<IndicatorType> {
        vec![IndicatorType::Sma(self.period)]
    }

    fn evaluate(&mut self, bar: &OhlcvBar, indicators: &IndicatorSet) -> Option<Verdict> {
        if !indicators.is_ready() {
            return None;
        }
        let trend = indicators.simple(&IndicatorType::Sma(self.period))?;
        let crossing = self.cross.step(bar.close, trend)?;
        Some(Verdict {
            entry: crossing.above,
            exit: bar.close <= trend,
        })
    }
}

/// SMA crossover that only enters above a trend SMA and exits once close is
/// no longer above it.
#[derive(Debug, Clone)]
pub struct FilteredCrossover {
    crossover: SmaCrossover,
    trend: usize,
}

impl FilteredCrossover {
    pub const DEFAULT_TREND: usize = 200;
    pub const DEFAULT_MAX_POSITION_FRACTION: f64 = 0.30;

    pub fn new(fast: usize, slow: usize, trend: usize) -> Self {
        FilteredCrossover {
            crossover: SmaCrossover::new(fast, slow),
            trend,
        }
    }
}

impl Signal for FilteredCrossover {
    fn name(&self) -> String {
        format!("{} above SMA {}", self.crossover.name(), self.trend)
    }

    fn indicators(&self) -> Vec<IndicatorType> {
        let mut indicators = self.crossover.indicators();
        indicators.push(IndicatorType::Sma(self.trend));
        indicators
    }

    fn validate(&self) -> Result<(), BacktestError> {
        self.crossover.validate()?;
        IndicatorType::Sma(self.trend).validate()
    }

    fn evaluate(&mut self, bar: &OhlcvBar, indicators: &IndicatorSet) -> Option<Verdict> {
        let crossing = self.crossover.evaluate(bar, indicators)?;
        let trend = indicators.simple(&IndicatorType::Sma(self.trend))?;
        Some(Verdict {
            entry: crossing.entry && bar.close > trend,
            exit: crossing.exit || bar.close <= trend,
        })
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
            volume: 1_000,
        }
    }

    /// Feed closes through a signal and collect its verdicts.
    fn run<S: Signal>(mut signal: S, closes: &[f64]) -> Vec<Option<Verdict>> {
        let mut set = IndicatorSet::new(&signal.indicators()).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let b = bar(i, c);
                set.update(&b);
                signal.evaluate(&b, &set)
            })
            .collect()
    }

    #[test]
    fn cross_detects_both_directions() {
        let mut cross = Cross::default();
        assert_eq!(cross.step(1.0, 2.0), None);
        assert_eq!(cross.step(2.0, 2.0), Some(Crossing::default()));
        assert_eq!(
            cross.step(3.0, 2.0),
            Some(Crossing {
                above: true,
                below: false
            })
        );
        assert_eq!(
            cross.step(1.0, 2.0),
            Some(Crossing {
                above: false,
                below: true
            })
        );
    }

    #[test]
    fn sma_crossover_hand_computed() {
        // SMA2 / SMA3: bar2 10/10, bar3 11/10.67 (cross up), bar4 13/12, bar5 11.5/11.67 (cross down)
        let verdicts = run(
            SmaCrossover::new(2, 3),
            &[10.0, 10.0, 10.0, 12.0, 14.0, 9.0, 9.0, 9.0],
        );
        assert!(verdicts[..3].iter().all(|v| v.is_none()));
        let entries: Vec<usize> = verdicts
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_some_and(|v| v.entry))
            .map(|(i, _)| i)
            .collect();
        let exits: Vec<usize> = verdicts
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_some_and(|v| v.exit))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(entries, vec![3]);
        assert_eq!(exits, vec![5]);
    }

    #[test]
    fn sma_crossover_rejects_fast_not_below_slow() {
        assert!(SmaCrossover::new(50, 20).validate().is_err());
        assert!(SmaCrossover::new(20, 20).validate().is_err());
        assert!(SmaCrossover::new(0, 20).validate().is_err());
        assert!(SmaCrossover::new(20, 50).validate().is_ok());
    }

    #[test]
    fn rsi_threshold_levels() {
        let falling: Vec<f64> = (0..6).map(|i| 100.0 - i as f64).collect();
        let verdicts = run(RsiThreshold::new(3, 30.0, 70.0), &falling);
        let last = verdicts[5].unwrap();
        assert!(last.entry);
        assert!(!last.exit);

        let rising: Vec<f64> = (0..6).map(|i| 100.0 + i as f64).collect();
        let last = run(RsiThreshold::new(3, 30.0, 70.0), &rising)[5].unwrap();
        assert!(last.exit);
        assert!(!last.entry);
    }

    #[test]
    fn rsi_levels_validated() {
        assert!(RsiThreshold::new(14, 70.0, 30.0).validate().is_err());
        assert!(RsiThreshold::new(14, -1.0, 30.0).validate().is_err());
        assert!(RsiThreshold::new(0, 30.0, 70.0).validate().is_err());
    }

    #[test]
    fn bollinger_band_touches() {
        let mut closes = vec![100.0, 101.0, 99.0, 100.0, 101.0];
        closes.push(80.0);
        let verdicts = run(BollingerBand::new(5, 150), &closes);
        assert!(verdicts[3].is_none());
        assert!(verdicts[5].unwrap().entry);

        let mut closes = vec![100.0, 101.0, 99.0, 100.0, 101.0];
        closes.push(130.0);
        assert!(run(BollingerBand::new(5, 150), &closes)[5].unwrap().exit);
    }

    #[test]
    fn macd_crossover_ready_after_signal_plus_one() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let verdicts = run(MacdCrossover::new(2, 3, 2), &closes);
        // MACD has a value from bar 3; the crossover needs a previous one
        assert!(verdicts[..4].iter().all(|v| v.is_none()));
        assert!(verdicts[4].is_some());
    }

    #[test]
    fn ma_filter_crosses() {
        let verdicts = run(MaFilter::new(3), &[10.0, 10.0, 10.0, 10.0, 12.0, 12.0, 8.0]);
        assert!(verdicts[4].unwrap().entry);
        assert!(!verdicts[5].unwrap().entry);
        assert!(verdicts[6].unwrap().exit);
    }

    #[test]
    fn ma_filter_exits_when_close_touches_average() {
        // bar 5: SMA3 = (10 + 13 + 11.5) / 3 = 11.5 = close
        let verdicts = run(MaFilter::new(3), &[10.0, 10.0, 10.0, 10.0, 13.0, 11.5, 11.5]);
        assert!(verdicts[4].unwrap().entry);
        assert!(verdicts[5].unwrap().exit);
    }

    #[test]
    fn filtered_crossover_exits_at_trend_level() {
        // flat prices: no crossing, close equals every SMA
        let verdicts = run(FilteredCrossover::new(2, 3, 4), &[10.0; 5]);
        assert!(verdicts[3].is_none());
        let last = verdicts[4].unwrap();
        assert!(!last.entry);
        assert!(last.exit);
    }

    #[test]
    fn filtered_crossover_requires_trend() {
        // downtrend: fast crosses slow but close stays below the trend SMA
        let mut closes: Vec<f64> = (0..10).map(|i| 100.0 - 5.0 * i as f64).collect();
        closes.push(66.0);
        let verdicts = run(FilteredCrossover::new(2, 3, 8), &closes);
        let last = verdicts[10].unwrap();
        assert!(!last.entry);
        assert!(last.exit);
    }

    #[test]
    fn signal_names() {
        assert_eq!(SmaCrossover::new(20, 50).name(), "SMA crossover 20/50");
        assert_eq!(MacdCrossover::default().name(), "MACD(12,26,9) crossover");
        assert_eq!(BollingerBand::default().name(), "BOLLINGER(20,2)");
    }
}
