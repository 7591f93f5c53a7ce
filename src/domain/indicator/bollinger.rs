//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Ready after n bars.

use std::collections::VecDeque;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULT_X100: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    mult: f64,
    window: VecDeque<f64>,
}

impl Bollinger {
    pub fn new(period: usize, stddev_mult_x100: u32) -> Self {
        Bollinger {
            period,
            mult: stddev_mult_x100 as f64 / 100.0,
            window: VecDeque::with_capacity(period),
        }
    }

    pub fn update(&mut self, close: f64) -> Option<Bands> {
        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(close);
        self.value()
    }

    pub fn value(&self) -> Option<Bands> {
        if self.period == 0 || self.window.len() < self.period {
            return None;
        }
        let n = self.period as f64;
        let middle = self.window.iter().sum::<f64>() / n;
        let variance = self
            .window
            .iter()
            .map(|c| {
                let diff = c - middle;
                diff * diff
            })
            .sum::<f64>()
            / n;
        let stddev = variance.sqrt();

        Some(Bands {
            upper: middle + self.mult * stddev,
            middle,
            lower: middle - self.mult * stddev,
        })
    }
}
