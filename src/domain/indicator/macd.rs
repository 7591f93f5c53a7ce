//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Ready after slow + signal - 1 bars.

use crate::domain::indicator::ema::Ema;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
    value: Option<MacdValue>,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Macd {
            fast: Ema::new(fast),
            slow: Ema::new(slow),
            signal: Ema::new(signal),
            value: None,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<MacdValue> {
        let fast = self.fast.update(close);
        let slow = self.slow.update(close);

        if let (Some(fast), Some(slow)) = (fast, slow) {
            let line = fast - slow;
            if let Some(signal) = self.signal.update(line) {
                self.value = Some(MacdValue {
                    line,
                    signal,
                    histogram: line - signal,
                });
            }
        }
        self.value
    }

    pub fn value(&self) -> Option<MacdValue> {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_warmup() {
        let mut macd = Macd::new(2, 3, 2);
        let values: Vec<_> = [10.0, 11.0, 12.0, 13.0, 14.0]
            .iter()
            .map(|&c| macd.update(c))
            .collect();
        // slow ready at bar 2, signal needs 2 MACD values -> bar 3
        assert!(values[..3].iter().all(|v| v.is_none()));
        assert!(values[3].is_some());
        assert!(values[4].is_some());
    }

    #[test]
    fn macd_constant_prices_zero() {
        let mut macd = Macd::new(DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
        for _ in 0..40 {
            macd.update(50.0);
        }
        let v = macd.value().unwrap();
        assert!(v.line.abs() < 1e-10);
        assert!(v.signal.abs() < 1e-10);
        assert!(v.histogram.abs() < 1e-10);
    }

    #[test]
    fn macd_histogram_is_line_minus_signal() {
        let mut macd = Macd::new(3, 5, 3);
        for i in 0..20 {
            macd.update(100.0 + (i as f64 * 0.7).sin() * 5.0);
        }
        let v = macd.value().unwrap();
        assert!((v.histogram - (v.line - v.signal)).abs() < 1e-12);
    }

    #[test]
    fn macd_rising_prices_positive_line() {
        let mut macd = Macd::new(3, 6, 3);
        for i in 0..20 {
            macd.update(100.0 + i as f64);
        }
        assert!(macd.value().unwrap().line > 0.0);
    }
}
