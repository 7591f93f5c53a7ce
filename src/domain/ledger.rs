//! Order and position ledger: the broker simulation.
//!
//! The ledger is the only writer of cash and positions. Strategies read it
//! and hand it order intents; every fill executes at the last marked close
//! with a flat proportional commission. Orders are finalized in the same
//! call they are submitted in (no partial fills, no multi-bar pending state).

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

use super::error::OrderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Buy,
    Sell,
    Close,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => write!(f, "buy"),
            Direction::Sell => write!(f, "sell"),
            Direction::Close => write!(f, "close"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Filled,
    Rejected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: u64,
    pub code: String,
    pub direction: Direction,
    pub requested_size: i64,
    pub date: NaiveDate,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub order_id: u64,
    pub code: String,
    pub direction: Direction,
    pub size: i64,
    pub price: f64,
    pub commission: f64,
    /// Set when this fill took the position to flat.
    pub closed_trade: Option<Trade>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub code: String,
    pub size: i64,
    pub average_entry_price: f64,
    pub entry_date: NaiveDate,
    /// Commissions paid on every fill since the position was opened.
    pub commissions: f64,
    /// Gross PnL already realised by partial sells.
    pub realized_gross: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.size as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.size as f64 * (price - self.average_entry_price)
    }

    /// A percentage of 0 disables the check.
    pub fn hits_stop_loss(&self, price: f64, stop_loss_pct: f64) -> bool {
        stop_loss_pct > 0.0 && price <= self.average_entry_price * (1.0 - stop_loss_pct)
    }

    /// A percentage of 0 disables the check.
    pub fn hits_take_profit(&self, price: f64, take_profit_pct: f64) -> bool {
        take_profit_pct > 0.0 && price >= self.average_entry_price * (1.0 + take_profit_pct)
    }
}

/// A closed round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub code: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: i64,
    pub gross_pnl: f64,
    pub net_pnl: f64,
    pub commission: f64,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    cash: f64,
    initial_cash: f64,
    commission_rate: f64,
    date: Option<NaiveDate>,
    positions: BTreeMap<String, Position>,
    prices: BTreeMap<String, f64>,
    trades: Vec<Trade>,
    orders: Vec<Order>,
    next_order_id: u64,
}

impl Ledger {
    pub fn new(initial_cash: f64, commission_rate: f64) -> Self {
        Ledger {
            cash: initial_cash,
            initial_cash,
            commission_rate,
            date: None,
            positions: BTreeMap::new(),
            prices: BTreeMap::new(),
            trades: Vec::new(),
            orders: Vec::new(),
            next_order_id: 1,
        }
    }

    /// Set the simulated date stamped on subsequent orders and trades.
    pub fn advance_to(&mut self, date: NaiveDate) {
        self.date = Some(date);
    }

    pub fn mark_to_market(&mut self, code: &str, price: f64) {
        self.prices.insert(code.to_string(), price);
    }

    pub fn submit(&mut self, code: &str, direction: Direction, size: i64) -> Result<Fill, OrderError> {
        let id = self.next_order_id;
        self.next_order_id += 1;
        let date = self.date.unwrap_or_default();
        self.orders.push(Order {
            id,
            code: code.to_string(),
            direction,
            requested_size: size,
            date,
            status: OrderStatus::Pending,
        });

        let result = match direction {
            Direction::Buy => self.fill_buy(id, code, size, date),
            Direction::Sell => self.fill_sell(id, code, direction, size, date),
            Direction::Close => {
                let held = self.position_size(code);
                self.fill_sell(id, code, direction, held, date)
            }
        };

        if let Some(order) = self.orders.last_mut() {
            order.status = if result.is_ok() {
                OrderStatus::Filled
            } else {
                OrderStatus::Rejected
            };
        }
        result
    }

    fn fill_buy(&mut self, id: u64, code: &str, size: i64, date: NaiveDate) -> Result<Fill, OrderError> {
        if size <= 0 {
            return Err(OrderError::InvalidSize {
                code: code.to_string(),
                size,
            });
        }
        let price = self.price_of(code)?;
        let debit = self.buy_cost(size, price);
        if debit > self.cash {
            return Err(OrderError::InsufficientCash {
                code: code.to_string(),
                required: debit,
                available: self.cash,
            });
        }
        let commission = size as f64 * price * self.commission_rate;
        self.cash -= debit;

        let position = self
            .positions
            .entry(code.to_string())
            .or_insert_with(|| Position {
                code: code.to_string(),
                size: 0,
                average_entry_price: 0.0,
                entry_date: date,
                commissions: 0.0,
                realized_gross: 0.0,
            });
        let new_size = position.size + size;
        position.average_entry_price = (position.average_entry_price * position.size as f64
            + price * size as f64)
            / new_size as f64;
        position.size = new_size;
        position.commissions += commission;

        debug!(code, size, price, commission, cash = self.cash, "buy filled");
        Ok(Fill {
            order_id: id,
            code: code.to_string(),
            direction: Direction::Buy,
            size,
            price,
            commission,
            closed_trade: None,
        })
    }

    fn fill_sell(
        &mut self,
        id: u64,
        code: &str,
        direction: Direction,
        size: i64,
        date: NaiveDate,
    ) -> Result<Fill, OrderError> {
        if direction == Direction::Sell && size <= 0 {
            return Err(OrderError::InvalidSize {
                code: code.to_string(),
                size,
            });
        }
        if !self.positions.contains_key(code) {
            return Err(OrderError::NoPosition {
                code: code.to_string(),
            });
        }
        let price = self.price_of(code)?;
        let commission_rate = self.commission_rate;
        let Some(position) = self.positions.get_mut(code) else {
            return Err(OrderError::NoPosition {
                code: code.to_string(),
            });
        };

        // Oversized sells are clipped to a full close.
        let size = size.min(position.size);
        let commission = size as f64 * price * commission_rate;
        let gross = (price - position.average_entry_price) * size as f64;
        self.cash += size as f64 * price * (1.0 - commission_rate);
        position.size -= size;
        position.commissions += commission;
        position.realized_gross += gross;

        let closed_trade = if position.size == 0 {
            let gross_pnl = position.realized_gross;
            let trade = Trade {
                code: code.to_string(),
                entry_price: position.average_entry_price,
                exit_price: price,
                size,
                gross_pnl,
                net_pnl: gross_pnl - position.commissions,
                commission: position.commissions,
                entry_date: position.entry_date,
                exit_date: date,
            };
            self.positions.remove(code);
            self.trades.push(trade.clone());
            Some(trade)
        } else {
            None
        };

        debug!(code, size, price, commission, cash = self.cash, "{} filled", direction);
        Ok(Fill {
            order_id: id,
            code: code.to_string(),
            direction,
            size,
            price,
            commission,
            closed_trade,
        })
    }

    fn price_of(&self, code: &str) -> Result<f64, OrderError> {
        self.prices
            .get(code)
            .copied()
            .ok_or_else(|| OrderError::NoPrice {
                code: code.to_string(),
            })
    }

    fn buy_cost(&self, size: i64, price: f64) -> f64 {
        size as f64 * price * (1.0 + self.commission_rate)
    }

    /// Largest whole size that `cash` can pay for at `price`, commission included.
    pub fn affordable_size(&self, price: f64, cash: f64) -> i64 {
        if price <= 0.0 || cash <= 0.0 {
            return 0;
        }
        let mut size = (cash / (price * (1.0 + self.commission_rate))).floor() as i64;
        while size > 0 && self.buy_cost(size, price) > cash {
            size -= 1;
        }
        size.max(0)
    }

    /// Cash plus every open position valued at its last marked price.
    pub fn portfolio_value(&self) -> f64 {
        let holdings: f64 = self
            .positions
            .values()
            .map(|pos| {
                let price = self
                    .prices
                    .get(&pos.code)
                    .copied()
                    .unwrap_or(pos.average_entry_price);
                pos.market_value(price)
            })
            .sum();
        self.cash + holdings
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn commission_rate(&self) -> f64 {
        self.commission_rate
    }

    pub fn price(&self, code: &str) -> Option<f64> {
        self.prices.get(code).copied()
    }

    pub fn position(&self, code: &str) -> Option<&Position> {
        self.positions.get(code)
    }

    pub fn position_size(&self, code: &str) -> i64 {
        self.positions.get(code).map_or(0, |p| p.size)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn into_records(self) -> (Vec<Trade>, Vec<Order>) {
        (self.trades, self.orders)
    }
}
