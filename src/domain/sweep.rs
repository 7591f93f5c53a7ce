//! Parameter sweep over SMA crossover periods.
//!
//! Each grid point is an independent run with its own ledger, indicators and
//! analyzer. Runs share only the read-only bar series, so they execute in
//! parallel on the rayon pool.

use rayon::prelude::*;

use super::backtest::{run_backtest, BacktestConfig};
use super::comparison::{compare, ComparisonRow};
use super::error::BacktestError;
use super::metrics::Metrics;
use super::ohlcv::BarSeries;
use super::strategy::signals::SmaCrossover;
use super::strategy::{RiskParams, SignalStrategy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamGrid {
    pub fast_periods: Vec<usize>,
    pub slow_periods: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        ParamGrid {
            fast_periods: vec![10, 20, 30],
            slow_periods: vec![40, 50, 60],
        }
    }
}

impl ParamGrid {
    /// Valid `(fast, slow)` pairs in grid order; pairs with `fast >= slow` are skipped.
    pub fn combinations(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for &fast in &self.fast_periods {
            for &slow in &self.slow_periods {
                if fast >= slow {
                    continue;
                }
                pairs.push((fast, slow));
            }
        }
        pairs
    }
}

#[derive(Debug, Clone)]
pub struct SweepPoint {
    pub fast: usize,
    pub slow: usize,
    pub metrics: Metrics,
}

impl SweepPoint {
    pub fn label(&self) -> String {
        format!("SMA {}/{}", self.fast, self.slow)
    }
}

/// Run every grid point and return them in grid order.
pub fn run_sweep(
    series: &[BarSeries],
    grid: &ParamGrid,
    risk: RiskParams,
    config: &BacktestConfig,
) -> Result<Vec<SweepPoint>, BacktestError> {
    let pairs = grid.combinations();
    if pairs.is_empty() {
        return Err(BacktestError::configuration(
            "fast_periods",
            "sweep grid has no pair with fast < slow",
        ));
    }

    pairs
        .par_iter()
        .map(|&(fast, slow)| {
            let mut strategy = SignalStrategy::new(SmaCrossover::new(fast, slow), risk)?;
            let result = run_backtest(series, &mut strategy, config)?;
            Ok(SweepPoint {
                fast,
                slow,
                metrics: result.metrics,
            })
        })
        .collect()
}

/// Sweep results as comparison rows, best total return first.
pub fn rank_sweep(points: &[SweepPoint]) -> Vec<ComparisonRow> {
    let labels: Vec<String> = points.iter().map(SweepPoint::label).collect();
    compare(
        labels
            .iter()
            .zip(points)
            .map(|(label, point)| (label.as_str(), &point.metrics)),
    )
}
