//! Multi-signal vote: trend, oscillator and MACD sub-signals each cast a
//! bullish or bearish vote every bar.
//!
//! - Trend: fast SMA above slow SMA is bullish, otherwise bearish.
//! - Oscillator: RSI below oversold is bullish, above overbought is bearish,
//!   anything in between abstains.
//! - MACD: line above signal is bullish, otherwise bearish.
//!
//! Entry needs `threshold` bullish votes, the technical exit `threshold`
//! bearish votes. Stop-loss and take-profit still apply on top.

use crate::domain::error::BacktestError;
use crate::domain::indicator::macd::{DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};
use crate::domain::indicator::{IndicatorSet, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

use super::signals::check_rsi_levels;
use super::{Signal, Verdict};

pub const DEFAULT_THRESHOLD: usize = 2;
pub const DEFAULT_MAX_POSITION_FRACTION: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Votes {
    pub bullish: usize,
    pub bearish: usize,
}

#[derive(Debug, Clone)]
pub struct MultiSignalVote {
    pub fast: usize,
    pub slow: usize,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub macd: IndicatorType,
    pub threshold: usize,
}

impl Default for MultiSignalVote {
    fn default() -> Self {
        MultiSignalVote {
            fast: 20,
            slow: 50,
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            macd: IndicatorType::Macd {
                fast: DEFAULT_FAST,
                slow: DEFAULT_SLOW,
                signal: DEFAULT_SIGNAL,
            },
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl MultiSignalVote {
    pub fn tally(&self, indicators: &IndicatorSet) -> Option<Votes> {
        let fast = indicators.simple(&IndicatorType::Sma(self.fast))?;
        let slow = indicators.simple(&IndicatorType::Sma(self.slow))?;
        let rsi = indicators.simple(&IndicatorType::Rsi(self.rsi_period))?;
        let macd = indicators.get(&self.macd)?.as_macd()?;

        let mut votes = Votes::default();
        if fast > slow {
            votes.bullish += 1;
        } else {
            votes.bearish += 1;
        }
        if rsi < self.rsi_oversold {
            votes.bullish += 1;
        } else if rsi > self.rsi_overbought {
            votes.bearish += 1;
        }
        if macd.line > macd.signal {
            votes.bullish += 1;
        } else {
            votes.bearish += 1;
        }
        Some(votes)
    }
}

impl Signal for MultiSignalVote {
    fn name(&self) -> String {
        format!("multi-signal vote ({} of 3)", self.threshold)
    }

    fn indicators(&self) -> Vec<IndicatorType> {
        vec![
            IndicatorType::Sma(self.fast),
            IndicatorType::Sma(self.slow),
            IndicatorType::Rsi(self.rsi_period),
            self.macd,
        ]
    }

    fn validate(&self) -> Result<(), BacktestError> {
        for indicator in self.indicators() {
            indicator.validate()?;
        }
        if self.fast >= self.slow {
            return Err(BacktestError::configuration(
                "fast_period",
                format!("must be shorter than slow_period ({} >= {})", self.fast, self.slow),
            ));
        }
        check_rsi_levels(self.rsi_oversold, self.rsi_overbought)?;
        if self.threshold == 0 || self.threshold > 3 {
            return Err(BacktestError::configuration(
                "vote_threshold",
                format!("must be between 1 and 3, got {}", self.threshold),
            ));
        }
        Ok(())
    }

    fn evaluate(&mut self, _bar: &OhlcvBar, indicators: &IndicatorSet) -> Option<Verdict> {
        if !indicators.is_ready() {
            return None;
        }
        let votes = self.tally(indicators)?;
        Some(Verdict {
            entry: votes.bullish >= self.threshold,
            exit: votes.bearish >= self.threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn small_vote() -> MultiSignalVote {
        MultiSignalVote {
            fast: 2,
            slow: 4,
            rsi_period: 3,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            macd: IndicatorType::Macd {
                fast: 2,
                slow: 3,
                signal: 2,
            },
            threshold: 2,
        }
    }

    fn feed(vote: &MultiSignalVote, closes: &[f64]) -> IndicatorSet {
        let mut set = IndicatorSet::new(&vote.indicators()).unwrap();
        for (i, &close) in closes.iter().enumerate() {
            set.update(&OhlcvBar {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000,
            });
        }
        set
    }

    #[test]
    fn not_ready_before_warmup() {
        let vote = small_vote();
        let set = feed(&vote, &[10.0, 11.0, 12.0]);
        let mut signal = vote.clone();
        let bar = OhlcvBar {
            date: NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
            open: 12.0,
            high: 12.0,
            low: 12.0,
            close: 12.0,
            volume: 1_000,
        };
        assert!(signal.evaluate(&bar, &set).is_none());
    }

    #[test]
    fn accelerating_uptrend_is_bearish_on_rsi_only() {
        let vote = small_vote();
        let closes: Vec<f64> = (0..12).map(|i| 100.0 + (i * i) as f64).collect();
        let votes = vote.tally(&feed(&vote, &closes)).unwrap();
        // SMA and MACD bullish, RSI at 100 is overbought
        assert_eq!(
            votes,
            Votes {
                bullish: 2,
                bearish: 1
            }
        );
    }

    #[test]
    fn accelerating_downtrend_is_bearish() {
        let vote = small_vote();
        let closes: Vec<f64> = (0..12).map(|i| 200.0 - (i * i) as f64).collect();
        let votes = vote.tally(&feed(&vote, &closes)).unwrap();
        // SMA and MACD bearish, RSI at 0 is oversold
        assert_eq!(
            votes,
            Votes {
                bullish: 1,
                bearish: 2
            }
        );
    }

    #[test]
    fn flat_prices_abstain_on_rsi() {
        let vote = small_vote();
        let votes = vote.tally(&feed(&vote, &[50.0; 12])).unwrap();
        assert_eq!(votes.bullish + votes.bearish, 2);
        assert!(votes.bearish >= 1);
    }

    #[test]
    fn threshold_validated() {
        let vote = MultiSignalVote {
            threshold: 4,
            ..MultiSignalVote::default()
        };
        assert!(vote.validate().is_err());
        assert!(MultiSignalVote::default().validate().is_ok());
    }
}
