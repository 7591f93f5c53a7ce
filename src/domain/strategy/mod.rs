//! Strategy interface and the per-instrument FLAT/LONG state machine.
//!
//! The engine drives any `Strategy` through `on_bar` and reports each order
//! outcome back through `on_order`. `SignalStrategy` is the shared state
//! machine for single-signal strategies: a `Signal` decides technical entry
//! and exit, and the state machine layers sizing, stop-loss, take-profit and
//! the pending-order guard on top.

pub mod signals;
pub mod vote;

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::domain::error::{BacktestError, OrderError};
use crate::domain::indicator::{IndicatorSet, IndicatorType};
use crate::domain::ledger::{Direction, Fill, Ledger, Position};
use crate::domain::ohlcv::{BarSeries, OhlcvBar};

pub const DEFAULT_STOP_LOSS_PCT: f64 = 0.05;
pub const DEFAULT_TAKE_PROFIT_PCT: f64 = 0.15;
pub const DEFAULT_MAX_POSITION_FRACTION: f64 = 0.2;

/// Read-only view of every instrument at the current step.
#[derive(Debug, Clone, Copy)]
pub struct MarketView<'a> {
    pub index: usize,
    pub date: NaiveDate,
    pub series: &'a [BarSeries],
}

impl<'a> MarketView<'a> {
    /// `(code, bar)` for every instrument at this step, in series order.
    pub fn bars(&self) -> impl Iterator<Item = (&'a str, &'a OhlcvBar)> + 'a {
        let index = self.index;
        self.series
            .iter()
            .filter_map(move |s| s.bar(index).map(|bar| (s.code.as_str(), bar)))
    }

    pub fn is_first_bar(&self) -> bool {
        self.index == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub code: String,
    pub direction: Direction,
    pub size: i64,
}

impl OrderIntent {
    pub fn buy(code: &str, size: i64) -> Self {
        OrderIntent {
            code: code.to_string(),
            direction: Direction::Buy,
            size,
        }
    }

    pub fn sell(code: &str, size: i64) -> Self {
        OrderIntent {
            code: code.to_string(),
            direction: Direction::Sell,
            size,
        }
    }

    pub fn close(code: &str) -> Self {
        OrderIntent {
            code: code.to_string(),
            direction: Direction::Close,
            size: 0,
        }
    }
}

pub trait Strategy {
    fn name(&self) -> &str;

    /// Update indicator state with this step's bars and return the orders to submit.
    fn on_bar(&mut self, market: &MarketView<'_>, ledger: &Ledger) -> Vec<OrderIntent>;

    /// Called once per submitted intent with the ledger's verdict.
    fn on_order(&mut self, intent: &OrderIntent, outcome: &Result<Fill, OrderError>);
}

impl std::fmt::Debug for dyn Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy").field("name", &self.name()).finish()
    }
}

/// Technical verdict of a signal for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Verdict {
    pub entry: bool,
    pub exit: bool,
}

/// Entry/exit rule evaluated over one instrument's indicators.
///
/// One clone of the signal is kept per instrument, so implementations may
/// carry the previous bar's values for crossover detection.
pub trait Signal: Clone {
    fn name(&self) -> String;

    fn indicators(&self) -> Vec<IndicatorType>;

    fn validate(&self) -> Result<(), BacktestError> {
        for indicator in self.indicators() {
            indicator.validate()?;
        }
        Ok(())
    }

    /// `None` while the instrument is not ready.
    fn evaluate(&mut self, bar: &OhlcvBar, indicators: &IndicatorSet) -> Option<Verdict>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskParams {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub max_position_fraction: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        RiskParams {
            stop_loss_pct: DEFAULT_STOP_LOSS_PCT,
            take_profit_pct: DEFAULT_TAKE_PROFIT_PCT,
            max_position_fraction: DEFAULT_MAX_POSITION_FRACTION,
        }
    }
}

impl RiskParams {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if !(0.0..1.0).contains(&self.stop_loss_pct) {
            return Err(BacktestError::configuration(
                "stop_loss_pct",
                format!("must be in [0, 1), got {}", self.stop_loss_pct),
            ));
        }
        if !(self.take_profit_pct >= 0.0 && self.take_profit_pct.is_finite()) {
            return Err(BacktestError::configuration(
                "take_profit_pct",
                format!("must be non-negative, got {}", self.take_profit_pct),
            ));
        }
        if !(self.max_position_fraction > 0.0 && self.max_position_fraction <= 1.0) {
            return Err(BacktestError::configuration(
                "max_position_fraction",
                format!("must be in (0, 1], got {}", self.max_position_fraction),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Technical,
    StopLoss,
    TakeProfit,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Technical => write!(f, "technical exit"),
            ExitReason::StopLoss => write!(f, "stop-loss"),
            ExitReason::TakeProfit => write!(f, "take-profit"),
        }
    }
}

/// First satisfied exit condition, checked technical, then stop-loss, then take-profit.
pub fn exit_reason(
    technical_exit: bool,
    position: &Position,
    close: f64,
    risk: &RiskParams,
) -> Option<ExitReason> {
    if technical_exit {
        Some(ExitReason::Technical)
    } else if position.hits_stop_loss(close, risk.stop_loss_pct) {
        Some(ExitReason::StopLoss)
    } else if position.hits_take_profit(close, risk.take_profit_pct) {
        Some(ExitReason::TakeProfit)
    } else {
        None
    }
}

/// `floor(portfolio_value * fraction / price)`.
pub fn entry_size(portfolio_value: f64, fraction: f64, price: f64) -> i64 {
    if price <= 0.0 || portfolio_value <= 0.0 {
        return 0;
    }
    (portfolio_value * fraction / price).floor() as i64
}

#[derive(Debug, Clone)]
struct InstrumentSlot<S> {
    signal: S,
    indicators: IndicatorSet,
    state: PositionState,
    pending: bool,
}

/// FLAT/LONG state machine driven by a technical `Signal`.
#[derive(Debug, Clone)]
pub struct SignalStrategy<S: Signal> {
    name: String,
    template: S,
    indicators: IndicatorSet,
    risk: RiskParams,
    slots: Vec<InstrumentSlot<S>>,
    by_code: BTreeMap<String, usize>,
}

impl<S: Signal> SignalStrategy<S> {
    pub fn new(signal: S, risk: RiskParams) -> Result<Self, BacktestError> {
        signal.validate()?;
        risk.validate()?;
        let indicators = IndicatorSet::new(&signal.indicators())?;
        Ok(SignalStrategy {
            name: signal.name(),
            template: signal,
            indicators,
            risk,
            slots: Vec::new(),
            by_code: BTreeMap::new(),
        })
    }

    pub fn risk(&self) -> &RiskParams {
        &self.risk
    }

    pub fn state(&self, code: &str) -> Option<PositionState> {
        self.by_code.get(code).map(|&i| self.slots[i].state)
    }

    fn slot_index(&mut self, code: &str) -> usize {
        if let Some(&i) = self.by_code.get(code) {
            return i;
        }
        self.slots.push(InstrumentSlot {
            signal: self.template.clone(),
            indicators: self.indicators.clone(),
            state: PositionState::Flat,
            pending: false,
        });
        let i = self.slots.len() - 1;
        self.by_code.insert(code.to_string(), i);
        i
    }
}

impl<S: Signal> Strategy for SignalStrategy<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_bar(&mut self, market: &MarketView<'_>, ledger: &Ledger) -> Vec<OrderIntent> {
        let portfolio_value = ledger.portfolio_value();
        let mut cash = ledger.cash();
        let mut intents = Vec::new();

        for (code, bar) in market.bars() {
            let i = self.slot_index(code);
            let risk = self.risk;
            let slot = &mut self.slots[i];
            slot.indicators.update(bar);
            let verdict = slot.signal.evaluate(bar, &slot.indicators);

            if slot.pending {
                continue;
            }

            let position = ledger.position(code);
            if slot.state == PositionState::Long && position.is_none() {
                slot.state = PositionState::Flat;
            }

            match (slot.state, position) {
                (PositionState::Long, Some(position)) => {
                    let technical = verdict.is_some_and(|v| v.exit);
                    if let Some(reason) = exit_reason(technical, position, bar.close, &risk) {
                        debug!(code, close = bar.close, %reason, "exit signalled");
                        slot.pending = true;
                        intents.push(OrderIntent::close(code));
                    }
                }
                _ => {
                    if !verdict.is_some_and(|v| v.entry) {
                        continue;
                    }
                    let size = entry_size(portfolio_value, risk.max_position_fraction, bar.close)
                        .min(ledger.affordable_size(bar.close, cash));
                    if size <= 0 {
                        debug!(code, close = bar.close, "entry skipped, size rounds to zero");
                        continue;
                    }
                    cash -= size as f64 * bar.close * (1.0 + ledger.commission_rate());
                    slot.pending = true;
                    intents.push(OrderIntent::buy(code, size));
                }
            }
        }
        intents
    }

    fn on_order(&mut self, intent: &OrderIntent, outcome: &Result<Fill, OrderError>) {
        let Some(&i) = self.by_code.get(&intent.code) else {
            return;
        };
        let slot = &mut self.slots[i];
        slot.pending = false;
        match outcome {
            Ok(fill) if fill.direction == Direction::Buy => slot.state = PositionState::Long,
            Ok(fill) if fill.closed_trade.is_some() => slot.state = PositionState::Flat,
            Err(OrderError::NoPosition { .. }) => slot.state = PositionState::Flat,
            _ => {}
        }
    }
}
