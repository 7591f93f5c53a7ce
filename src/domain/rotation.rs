//! Rotation engine: periodic top-K momentum rebalancing over a universe that
//! shares one capital pool, plus an equal-weight buy-and-hold baseline.
//!
//! On a rebalance bar every instrument gets a `RankingEntry`. An instrument
//! is only eligible once it has seen `lookback + HISTORY_MARGIN` bars. Eligible
//! entries are ranked by score descending with a stable sort, so ties keep
//! universe order. Held instruments outside the top `top_n` are closed; the
//! rest are moved toward `portfolio_value / |targets|` unless already within
//! the deadband.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::domain::error::{BacktestError, OrderError};
use crate::domain::indicator::{IndicatorSet, IndicatorType};
use crate::domain::ledger::{Fill, Ledger};
use crate::domain::strategy::{MarketView, OrderIntent, Strategy};

/// Relative deviation from target value below which no order is sent.
pub const DEADBAND: f64 = 0.10;

/// Bars beyond `lookback` an instrument must have before it can be ranked.
pub const HISTORY_MARGIN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationVariant {
    /// Rank by ROC; optionally require close above an SMA of this period.
    Momentum { ma_filter: Option<usize> },
    /// Rank by ROC among instruments whose ROC is strictly positive.
    DualMomentum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationParams {
    pub lookback: usize,
    pub top_n: usize,
    pub rebalance_period: usize,
    pub variant: RotationVariant,
}

impl RotationParams {
    pub fn momentum() -> Self {
        RotationParams {
            lookback: 90,
            top_n: 2,
            rebalance_period: 21,
            variant: RotationVariant::Momentum {
                ma_filter: Some(200),
            },
        }
    }

    pub fn dual_momentum() -> Self {
        RotationParams {
            lookback: 60,
            top_n: 2,
            rebalance_period: 21,
            variant: RotationVariant::DualMomentum,
        }
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.lookback == 0 {
            return Err(BacktestError::configuration("lookback", "must be at least 1"));
        }
        if self.top_n == 0 {
            return Err(BacktestError::configuration("top_n", "must be at least 1"));
        }
        if self.rebalance_period == 0 {
            return Err(BacktestError::configuration(
                "rebalance_period",
                "must be at least 1",
            ));
        }
        if let RotationVariant::Momentum {
            ma_filter: Some(0),
        } = self.variant
        {
            return Err(BacktestError::configuration("ma_period", "must be at least 1"));
        }
        Ok(())
    }

    fn indicators(&self) -> Vec<IndicatorType> {
        let mut indicators = vec![IndicatorType::Roc(self.lookback)];
        if let RotationVariant::Momentum {
            ma_filter: Some(period),
        } = self.variant
        {
            indicators.push(IndicatorType::Sma(period));
        }
        indicators
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankingEntry {
    pub code: String,
    pub score: f64,
    pub eligible: bool,
}

/// Codes of the best `top_n` eligible entries, highest score first.
pub fn select_top(entries: &[RankingEntry], top_n: usize) -> Vec<String> {
    let mut eligible: Vec<&RankingEntry> = entries.iter().filter(|e| e.eligible).collect();
    // `sort_by` is stable: equal scores keep universe order.
    eligible.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    eligible
        .into_iter()
        .take(top_n)
        .map(|e| e.code.clone())
        .collect()
}

/// Orders moving the ledger from its current holdings to an equal-weight
/// allocation over `targets`. Closes come first, then reductions, then buys,
/// so buys can be capped by the cash those sells free up.
pub fn rebalance_orders(targets: &[String], ledger: &Ledger) -> Vec<OrderIntent> {
    let mut closes = Vec::new();
    let mut sells = Vec::new();
    let mut buys = Vec::new();
    let rate = ledger.commission_rate();
    let mut cash = ledger.cash();

    for position in ledger.positions() {
        if !targets.contains(&position.code) {
            if let Some(price) = ledger.price(&position.code) {
                cash += position.size as f64 * price * (1.0 - rate);
            }
            closes.push(OrderIntent::close(&position.code));
        }
    }

    if targets.is_empty() {
        return closes;
    }

    let target_value = ledger.portfolio_value() / targets.len() as f64;
    let mut wanted = Vec::new();
    for code in targets {
        let Some(price) = ledger.price(code) else {
            continue;
        };
        let current = ledger.position_size(code);
        let current_value = current as f64 * price;
        if target_value <= 0.0 || (current_value - target_value).abs() / target_value <= DEADBAND {
            debug!(code, current_value, target_value, "within deadband");
            continue;
        }
        let target_size = (target_value / price).floor() as i64;
        if target_size <= 0 {
            continue;
        }
        let delta = target_size - current;
        if delta < 0 {
            cash += (-delta) as f64 * price * (1.0 - rate);
            sells.push(OrderIntent::sell(code, -delta));
        } else if delta > 0 {
            wanted.push((code.as_str(), price, delta));
        }
    }

    for (code, price, delta) in wanted {
        let size = delta.min(ledger.affordable_size(price, cash));
        if size <= 0 {
            debug!(code, "rebalance buy skipped, no cash left");
            continue;
        }
        cash -= size as f64 * price * (1.0 + rate);
        buys.push(OrderIntent::buy(code, size));
    }

    closes.extend(sells);
    closes.extend(buys);
    closes
}

#[derive(Debug, Clone)]
struct RotationSlot {
    code: String,
    indicators: IndicatorSet,
    close: f64,
}

#[derive(Debug, Clone)]
pub struct RotationEngine {
    name: String,
    params: RotationParams,
    template: IndicatorSet,
    slots: Vec<RotationSlot>,
    by_code: BTreeMap<String, usize>,
    bars_since_rebalance: usize,
    pending: usize,
    last_ranking: Vec<RankingEntry>,
}

impl RotationEngine {
    pub fn new(params: RotationParams) -> Result<Self, BacktestError> {
        params.validate()?;
        let template = IndicatorSet::new(&params.indicators())?;
        let name = match params.variant {
            RotationVariant::Momentum { ma_filter: Some(p) } => format!(
                "momentum rotation top {} of ROC({}) above SMA({})",
                params.top_n, params.lookback, p
            ),
            RotationVariant::Momentum { ma_filter: None } => format!(
                "momentum rotation top {} of ROC({})",
                params.top_n, params.lookback
            ),
            RotationVariant::DualMomentum => format!(
                "dual momentum top {} of ROC({})",
                params.top_n, params.lookback
            ),
        };
        Ok(RotationEngine {
            name,
            params,
            template,
            slots: Vec::new(),
            by_code: BTreeMap::new(),
            // the first bar is always a rebalance bar
            bars_since_rebalance: params.rebalance_period,
            pending: 0,
            last_ranking: Vec::new(),
        })
    }

    pub fn params(&self) -> &RotationParams {
        &self.params
    }

    /// Ranking computed at the most recent rebalance.
    pub fn last_ranking(&self) -> &[RankingEntry] {
        &self.last_ranking
    }

    fn score(&self, slot: &RotationSlot) -> RankingEntry {
        let roc = slot.indicators.simple(&IndicatorType::Roc(self.params.lookback));
        let seasoned =
            slot.indicators.bars_observed() >= self.params.lookback + HISTORY_MARGIN;
        let eligible = seasoned
            && slot.indicators.is_ready()
            && match (self.params.variant, roc) {
                (_, None) => false,
                (RotationVariant::Momentum { ma_filter: None }, Some(_)) => true,
                (RotationVariant::Momentum { ma_filter: Some(p) }, Some(_)) => slot
                    .indicators
                    .simple(&IndicatorType::Sma(p))
                    .is_some_and(|ma| slot.close > ma),
                (RotationVariant::DualMomentum, Some(score)) => score > 0.0,
            };
        RankingEntry {
            code: slot.code.clone(),
            score: roc.unwrap_or(0.0),
            eligible,
        }
    }
}

impl Strategy for RotationEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_bar(&mut self, market: &MarketView<'_>, ledger: &Ledger) -> Vec<OrderIntent> {
        for (code, bar) in market.bars() {
            let i = match self.by_code.get(code) {
                Some(&i) => i,
                None => {
                    self.slots.push(RotationSlot {
                        code: code.to_string(),
                        indicators: self.template.clone(),
                        close: bar.close,
                    });
                    self.by_code.insert(code.to_string(), self.slots.len() - 1);
                    self.slots.len() - 1
                }
            };
            let slot = &mut self.slots[i];
            slot.indicators.update(bar);
            slot.close = bar.close;
        }

        let due = self.bars_since_rebalance >= self.params.rebalance_period;
        self.bars_since_rebalance += 1;
        if !due || self.pending > 0 {
            return Vec::new();
        }
        self.bars_since_rebalance = 1;

        let ranking: Vec<RankingEntry> = self.slots.iter().map(|s| self.score(s)).collect();
        let targets = select_top(&ranking, self.params.top_n);
        info!(
            date = %market.date,
            eligible = ranking.iter().filter(|e| e.eligible).count(),
            targets = ?targets,
            "rebalance"
        );
        self.last_ranking = ranking;

        let intents = rebalance_orders(&targets, ledger);
        self.pending = intents.len();
        intents
    }

    fn on_order(&mut self, _intent: &OrderIntent, _outcome: &Result<Fill, OrderError>) {
        self.pending = self.pending.saturating_sub(1);
    }
}

/// Buys an equal-weight slice of every instrument on the first bar and holds.
#[derive(Debug, Clone, Default)]
pub struct BuyAndHold {
    invested: bool,
}

impl BuyAndHold {
    pub fn new() -> Self {
        BuyAndHold::default()
    }
}

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        "buy and hold"
    }

    fn on_bar(&mut self, market: &MarketView<'_>, ledger: &Ledger) -> Vec<OrderIntent> {
        if self.invested {
            return Vec::new();
        }
        self.invested = true;

        let codes: Vec<&str> = market.bars().map(|(code, _)| code).collect();
        if codes.is_empty() {
            return Vec::new();
        }
        let target_value = ledger.portfolio_value() / codes.len() as f64;
        let mut cash = ledger.cash();
        let mut intents = Vec::new();
        for (code, bar) in market.bars() {
            let size = ((target_value / bar.close).floor() as i64)
                .min(ledger.affordable_size(bar.close, cash));
            if size > 0 {
                cash -= size as f64 * bar.close * (1.0 + ledger.commission_rate());
                intents.push(OrderIntent::buy(code, size));
            }
        }
        intents
    }

    fn on_order(&mut self, _intent: &OrderIntent, _outcome: &Result<Fill, OrderError>) {}
}
