//! Performance analyzer and summary metrics.
//!
//! The analyzer observes one `EquityPoint` per simulated step and every
//! closed `Trade`, keeping a running peak for drawdown. `finalize` turns the
//! observations into a `Metrics` record. Every ratio with an empty or zero
//! denominator reports 0 rather than NaN or infinity.

use chrono::NaiveDate;

use super::ledger::Trade;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub start_value: f64,
    pub end_value: f64,
    pub total_return: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    /// Signed mean, so non-positive.
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub profit_factor: f64,
    pub max_drawdown: f64,
    /// Longest run of consecutive steps below the running peak.
    pub max_drawdown_duration: usize,
    pub sharpe_ratio: f64,
    pub avg_trade_duration: f64,
}

impl Metrics {
    pub fn return_pct(&self) -> f64 {
        self.total_return * 100.0
    }

    pub fn win_rate_pct(&self) -> f64 {
        self.win_rate * 100.0
    }

    pub fn max_drawdown_pct(&self) -> f64 {
        self.max_drawdown * 100.0
    }
}

#[derive(Debug, Clone)]
pub struct PerformanceAnalyzer {
    start_value: f64,
    annualization_factor: f64,
    peak: Option<f64>,
    equity_curve: Vec<EquityPoint>,
    drawdowns: Vec<f64>,
    trades: Vec<(f64, i64)>,
}

impl PerformanceAnalyzer {
    pub fn new(start_value: f64, annualization_factor: f64) -> Self {
        PerformanceAnalyzer {
            start_value,
            annualization_factor,
            peak: None,
            equity_curve: Vec::new(),
            drawdowns: Vec::new(),
            trades: Vec::new(),
        }
    }

    /// Record the post-fill portfolio value of one step; returns its drawdown.
    pub fn record_equity(&mut self, date: NaiveDate, equity: f64) -> f64 {
        let peak = self.peak.map_or(equity, |p| p.max(equity));
        self.peak = Some(peak);
        let drawdown = if peak > 0.0 {
            ((peak - equity) / peak).max(0.0)
        } else {
            0.0
        };
        self.equity_curve.push(EquityPoint { date, equity });
        self.drawdowns.push(drawdown);
        drawdown
    }

    pub fn record_trade(&mut self, trade: &Trade) {
        let duration = (trade.exit_date - trade.entry_date).num_days();
        self.trades.push((trade.net_pnl, duration));
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn drawdowns(&self) -> &[f64] {
        &self.drawdowns
    }

    pub fn into_equity_curve(self) -> Vec<EquityPoint> {
        self.equity_curve
    }

    pub fn finalize(&self) -> Metrics {
        let end_value = self
            .equity_curve
            .last()
            .map_or(self.start_value, |p| p.equity);
        let total_return = if self.start_value > 0.0 {
            (end_value - self.start_value) / self.start_value
        } else {
            0.0
        };

        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_duration_days = 0i64;

        for &(pnl, duration) in &self.trades {
            if pnl > 0.0 {
                winning_trades += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else {
                losing_trades += 1;
                total_losses += pnl;
                largest_loss = largest_loss.min(pnl);
            }
            total_duration_days += duration;
        }

        let total_trades = self.trades.len();
        let win_rate = ratio(winning_trades as f64, total_trades as f64);
        let avg_win = ratio(total_wins, winning_trades as f64);
        let avg_loss = ratio(total_losses, losing_trades as f64);
        // saturates to 0 when there is nothing to divide by
        let profit_factor = ratio(total_wins, total_losses.abs());
        let avg_trade_duration = ratio(total_duration_days as f64, total_trades as f64);

        let max_drawdown = self.drawdowns.iter().copied().fold(0.0_f64, f64::max);

        Metrics {
            start_value: self.start_value,
            end_value,
            total_return,
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            profit_factor,
            max_drawdown,
            max_drawdown_duration: drawdown_duration(&self.drawdowns),
            sharpe_ratio: sharpe_ratio(
                &self.equity_curve,
                self.start_value,
                self.annualization_factor,
            ),
            avg_trade_duration,
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn drawdown_duration(drawdowns: &[f64]) -> usize {
    let mut longest = 0usize;
    let mut current = 0usize;
    for &dd in drawdowns {
        if dd > 0.0 {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// `mean / stdev * sqrt(annualization_factor)` over first differences of
/// equity relative to the starting value. Population standard deviation.
pub fn sharpe_ratio(equity_curve: &[EquityPoint], start_value: f64, annualization_factor: f64) -> f64 {
    if equity_curve.len() < 2 || start_value <= 0.0 {
        return 0.0;
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| (w[1].equity - w[0].equity) / start_value)
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev == 0.0 {
        0.0
    } else {
        mean / stddev * annualization_factor.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn date(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64)
    }

    fn analyzer_with(values: &[f64]) -> PerformanceAnalyzer {
        let mut analyzer = PerformanceAnalyzer::new(values.first().copied().unwrap_or(100_000.0), 252.0);
        for (i, &v) in values.iter().enumerate() {
            analyzer.record_equity(date(i), v);
        }
        analyzer
    }

    fn make_trade(net_pnl: f64, days: i64) -> Trade {
        Trade {
            code: "SPY".into(),
            entry_price: 100.0,
            exit_price: 100.0 + net_pnl / 100.0,
            size: 100,
            gross_pnl: net_pnl,
            net_pnl,
            commission: 0.0,
            entry_date: date(0),
            exit_date: date(days as usize),
        }
    }

    #[test]
    fn zero_trades_boundary() {
        let metrics = PerformanceAnalyzer::new(100_000.0, 252.0).finalize();
        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.win_rate, 0.0);
        assert_eq!(metrics.profit_factor, 0.0);
        assert_eq!(metrics.avg_win, 0.0);
        assert_eq!(metrics.avg_loss, 0.0);
        assert_eq!(metrics.max_drawdown, 0.0);
        assert_eq!(metrics.sharpe_ratio, 0.0);
        assert_eq!(metrics.end_value, 100_000.0);
        assert_eq!(metrics.total_return, 0.0);
    }

    #[test]
    fn flat_equity_reports_zero_sharpe() {
        let metrics = analyzer_with(&[1_000.0; 10]).finalize();
        assert_eq!(metrics.sharpe_ratio, 0.0);
        assert_eq!(metrics.max_drawdown, 0.0);
        assert_eq!(metrics.max_drawdown_duration, 0);
    }

    #[test]
    fn single_point_sharpe_is_zero() {
        assert_eq!(analyzer_with(&[1_000.0]).finalize().sharpe_ratio, 0.0);
    }

    #[test]
    fn total_return() {
        assert_relative_eq!(
            analyzer_with(&[100_000.0, 110_000.0]).finalize().total_return,
            0.10,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            analyzer_with(&[100_000.0, 90_000.0]).finalize().total_return,
            -0.10,
            epsilon = 1e-12
        );
    }

    #[test]
    fn profit_factor_exact() {
        let mut analyzer = analyzer_with(&[100_000.0, 100_200.0]);
        analyzer.record_trade(&make_trade(100.0, 2));
        analyzer.record_trade(&make_trade(200.0, 4));
        analyzer.record_trade(&make_trade(-100.0, 3));
        let metrics = analyzer.finalize();
        assert_eq!(metrics.profit_factor, 3.0);
    }

    #[test]
    fn profit_factor_saturates_without_losses() {
        let mut analyzer = analyzer_with(&[100_000.0, 100_300.0]);
        analyzer.record_trade(&make_trade(300.0, 2));
        assert_eq!(analyzer.finalize().profit_factor, 0.0);
    }

    #[test]
    fn breakeven_counts_as_losing() {
        let mut analyzer = analyzer_with(&[100_000.0]);
        analyzer.record_trade(&make_trade(100.0, 5));
        analyzer.record_trade(&make_trade(0.0, 1));
        let metrics = analyzer.finalize();
        assert_eq!(metrics.winning_trades, 1);
        assert_eq!(metrics.losing_trades, 1);
        assert_relative_eq!(metrics.win_rate, 0.5);
        // losing sum is exactly zero
        assert_eq!(metrics.profit_factor, 0.0);
    }

    #[test]
    fn average_win_and_signed_average_loss() {
        let mut analyzer = analyzer_with(&[100_000.0]);
        for (pnl, days) in [(100.0, 5), (-60.0, 3), (200.0, 10), (-40.0, 2)] {
            analyzer.record_trade(&make_trade(pnl, days));
        }
        let metrics = analyzer.finalize();
        assert_relative_eq!(metrics.avg_win, 150.0);
        assert_relative_eq!(metrics.avg_loss, -50.0);
        assert_relative_eq!(metrics.largest_win, 200.0);
        assert_relative_eq!(metrics.largest_loss, -60.0);
        assert_relative_eq!(metrics.avg_trade_duration, 5.0);
    }

    #[test]
    fn max_drawdown_from_running_peak() {
        let analyzer = analyzer_with(&[100.0, 110.0, 90.0, 95.0, 80.0, 100.0]);
        let metrics = analyzer.finalize();
        assert_relative_eq!(metrics.max_drawdown, (110.0 - 80.0) / 110.0, epsilon = 1e-12);
        assert_eq!(metrics.max_drawdown_duration, 4);
        assert!(analyzer.drawdowns().iter().all(|&dd| dd >= 0.0));
    }

    #[test]
    fn sharpe_ratio_hand_computed() {
        // relative diffs: +0.01, -0.01, +0.02 -> mean 1/150, population std
        let analyzer = analyzer_with(&[100.0, 101.0, 100.0, 102.0]);
        let returns = [0.01, -0.01, 0.02];
        let mean = returns.iter().sum::<f64>() / 3.0;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / 3.0;
        let expected = mean / var.sqrt() * 252.0_f64.sqrt();
        assert_relative_eq!(analyzer.finalize().sharpe_ratio, expected, epsilon = 1e-12);
    }

    #[test]
    fn percent_helpers() {
        let metrics = analyzer_with(&[100.0, 150.0]).finalize();
        assert_relative_eq!(metrics.return_pct(), 50.0);
    }
}
