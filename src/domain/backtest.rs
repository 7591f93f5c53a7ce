//! Backtest engine and event loop.
//!
//! Every step runs the same fixed sequence: mark all instruments at their
//! close, let the strategy update its indicators and emit intents, submit
//! each intent to the ledger, report the outcome back, then record the
//! post-fill equity. Order rejections are logged and absorbed; only
//! configuration and data-integrity failures abort a run.

use tracing::{debug, info, warn};

use super::error::{BacktestError, OrderError};
use super::ledger::{Ledger, Order, Trade};
use super::metrics::{EquityPoint, Metrics, PerformanceAnalyzer, TRADING_DAYS_PER_YEAR};
use super::ohlcv::{lockstep_timeline, BarSeries};
use super::strategy::{MarketView, Strategy};

pub const DEFAULT_INITIAL_CASH: f64 = 100_000.0;
pub const DEFAULT_COMMISSION_RATE: f64 = 0.001;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_cash: f64,
    pub commission_rate: f64,
    pub annualization_factor: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_cash: DEFAULT_INITIAL_CASH,
            commission_rate: DEFAULT_COMMISSION_RATE,
            annualization_factor: TRADING_DAYS_PER_YEAR,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if !(self.initial_cash > 0.0 && self.initial_cash.is_finite()) {
            return Err(BacktestError::configuration(
                "initial_cash",
                format!("must be positive, got {}", self.initial_cash),
            ));
        }
        if !(0.0..1.0).contains(&self.commission_rate) {
            return Err(BacktestError::configuration(
                "commission_rate",
                format!("must be in [0, 1), got {}", self.commission_rate),
            ));
        }
        if !(self.annualization_factor > 0.0 && self.annualization_factor.is_finite()) {
            return Err(BacktestError::configuration(
                "annualization_factor",
                format!("must be positive, got {}", self.annualization_factor),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub strategy_name: String,
    pub metrics: Metrics,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub orders: Vec<Order>,
}

/// Replay `series` in lockstep through `strategy`.
///
/// Fails before the first bar on invalid configuration or series that are
/// empty, corrupt, or not aligned on the same dates.
pub fn run_backtest<S: Strategy + ?Sized>(
    series: &[BarSeries],
    strategy: &mut S,
    config: &BacktestConfig,
) -> Result<BacktestResult, BacktestError> {
    config.validate()?;
    if series.is_empty() {
        return Err(BacktestError::configuration(
            "codes",
            "at least one instrument is required",
        ));
    }
    let timeline = lockstep_timeline(series)?;

    let mut ledger = Ledger::new(config.initial_cash, config.commission_rate);
    let mut analyzer = PerformanceAnalyzer::new(config.initial_cash, config.annualization_factor);

    info!(
        strategy = strategy.name(),
        instruments = series.len(),
        bars = timeline.len(),
        "backtest started"
    );

    for (index, &date) in timeline.iter().enumerate() {
        ledger.advance_to(date);
        for s in series {
            ledger.mark_to_market(&s.code, s.bars[index].close);
        }

        let market = MarketView {
            index,
            date,
            series,
        };
        let intents = strategy.on_bar(&market, &ledger);

        for intent in intents {
            let outcome = ledger.submit(&intent.code, intent.direction, intent.size);
            match &outcome {
                Ok(fill) => {
                    if let Some(trade) = &fill.closed_trade {
                        debug!(
                            code = %trade.code,
                            net_pnl = trade.net_pnl,
                            "trade closed"
                        );
                        analyzer.record_trade(trade);
                    }
                }
                Err(OrderError::NoPosition { code }) => {
                    debug!(%date, code = %code, "close on flat instrument ignored");
                }
                Err(err) => {
                    warn!(%date, direction = %intent.direction, "order rejected: {err}");
                }
            }
            strategy.on_order(&intent, &outcome);
        }

        analyzer.record_equity(date, ledger.portfolio_value());
    }

    let metrics = analyzer.finalize();
    info!(
        strategy = strategy.name(),
        end_value = metrics.end_value,
        trades = metrics.total_trades,
        "backtest finished"
    );

    let (trades, orders) = ledger.into_records();
    Ok(BacktestResult {
        strategy_name: strategy.name().to_string(),
        metrics,
        trades,
        equity_curve: analyzer.into_equity_curve(),
        orders,
    })
}
