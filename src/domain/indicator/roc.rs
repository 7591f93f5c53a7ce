//! ROC (Rate of Change).
//!
//! ROC(n) = ((C[i] - C[i-n]) / C[i-n]) * 100
//! If C[i-n] == 0: ROC = 0
//! Ready after n+1 bars.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct Roc {
    period: usize,
    window: VecDeque<f64>,
}

impl Roc {
    pub fn new(period: usize) -> Self {
        Roc {
            period,
            window: VecDeque::with_capacity(period + 1),
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        if self.window.len() == self.period + 1 {
            self.window.pop_front();
        }
        self.window.push_back(close);
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if self.period == 0 || self.window.len() < self.period + 1 {
            return None;
        }
        let prev_close = *self.window.front()?;
        let curr_close = *self.window.back()?;
        if prev_close == 0.0 {
            Some(0.0)
        } else {
            Some(((curr_close - prev_close) / prev_close) * 100.0)
        }
    }
}
