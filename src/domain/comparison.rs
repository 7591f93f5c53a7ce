//! Comparison mode: rank labelled runs by total return.

use super::backtest::BacktestResult;
use super::metrics::Metrics;

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub label: String,
    pub end_value: f64,
    pub return_pct: f64,
    pub total_trades: usize,
    pub win_rate_pct: f64,
    pub profit_factor: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
}

impl ComparisonRow {
    pub fn from_metrics(label: impl Into<String>, metrics: &Metrics) -> Self {
        ComparisonRow {
            label: label.into(),
            end_value: metrics.end_value,
            return_pct: metrics.return_pct(),
            total_trades: metrics.total_trades,
            win_rate_pct: metrics.win_rate_pct(),
            profit_factor: metrics.profit_factor,
            max_drawdown_pct: metrics.max_drawdown_pct(),
            sharpe_ratio: metrics.sharpe_ratio,
        }
    }
}

/// Rows sorted by return descending; equal returns keep input order.
pub fn compare<'a, I>(runs: I) -> Vec<ComparisonRow>
where
    I: IntoIterator<Item = (&'a str, &'a Metrics)>,
{
    let mut rows: Vec<ComparisonRow> = runs
        .into_iter()
        .map(|(label, metrics)| ComparisonRow::from_metrics(label, metrics))
        .collect();
    rows.sort_by(|a, b| b.return_pct.total_cmp(&a.return_pct));
    rows
}

/// Convenience over `compare` labelling each result with its strategy name.
pub fn compare_results(results: &[BacktestResult]) -> Vec<ComparisonRow> {
    compare(
        results
            .iter()
            .map(|r| (r.strategy_name.as_str(), &r.metrics)),
    )
}
