//! RSI (Relative Strength Index).
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100, or 50 when avg_gain is also 0.
//!
//! Ready after n+1 bars (n price changes).

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev_close: Option<f64>,
    changes: usize,
    avg_gain: f64,
    avg_loss: f64,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Rsi {
            period,
            prev_close: None,
            changes: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        let Some(prev) = self.prev_close.replace(close) else {
            return None;
        };
        if self.period == 0 {
            return None;
        }

        let change = close - prev;
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };
        let n = self.period as f64;

        self.changes += 1;
        if self.changes <= self.period {
            // Accumulate sums until the seed average is complete.
            self.avg_gain += gain;
            self.avg_loss += loss;
            if self.changes == self.period {
                self.avg_gain /= n;
                self.avg_loss /= n;
            }
        } else {
            self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
        }

        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if self.period == 0 || self.changes < self.period {
            return None;
        }
        let rsi = if self.avg_loss == 0.0 {
            if self.avg_gain == 0.0 { 50.0 } else { 100.0 }
        } else {
            100.0 - (100.0 / (1.0 + self.avg_gain / self.avg_loss))
        };
        Some(rsi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(period: usize, closes: &[f64]) -> Vec<Option<f64>> {
        let mut rsi = Rsi::new(period);
        closes.iter().map(|&c| rsi.update(c)).collect()
    }

    #[test]
    fn rsi_warmup_period() {
        let closes: Vec<f64> = (1..=15).map(|i| 100.0 + (i as f64 % 5.0) * 2.0).collect();
        let values = run(14, &closes);
        for (i, v) in values.iter().enumerate().take(14) {
            assert!(v.is_none(), "Bar {} should be not ready", i);
        }
        assert!(values[14].is_some(), "Bar 14 should be ready");
    }

    #[test]
    fn rsi_all_gains_no_losses() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let values = run(14, &closes);
        assert!((values[14].unwrap() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_all_losses_no_gains() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        let values = run(14, &closes);
        assert!(values[14].unwrap().abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_flat_prices_is_neutral() {
        let values = run(3, &[50.0, 50.0, 50.0, 50.0]);
        assert_eq!(values[3], Some(50.0));
    }

    #[test]
    fn rsi_seed_and_wilder_smoothing() {
        // changes: +2, -1, +3 -> seed avg_gain = 5/3, avg_loss = 1/3
        let values = run(3, &[10.0, 12.0, 11.0, 14.0, 13.0]);
        let rs = (5.0 / 3.0) / (1.0 / 3.0);
        let expected_seed = 100.0 - 100.0 / (1.0 + rs);
        assert!((values[3].unwrap() - expected_seed).abs() < 1e-10);

        // next change: -1
        let avg_gain = (5.0 / 3.0 * 2.0 + 0.0) / 3.0;
        let avg_loss = (1.0 / 3.0 * 2.0 + 1.0) / 3.0;
        let expected = 100.0 - 100.0 / (1.0 + avg_gain / avg_loss);
        assert!((values[4].unwrap() - expected).abs() < 1e-10);
    }

    #[test]
    fn rsi_bounded() {
        let closes: Vec<f64> = (1..=40)
            .map(|i| 100.0 + (i as f64 % 7.0 - 3.0) * 2.0)
            .collect();
        for v in run(14, &closes).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v));
        }
    }
}
