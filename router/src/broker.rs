use crate::balance::Balance;
use crate::error::RouterError;
use crate::state::OrderState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use instrument::{Position, Symbol};
use parking_lot::Mutex;
use queue::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub enum TimeInForce {
    Day,
    GoodTillCancelled,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NewOrder {
    pub symbol: Symbol,
    pub order_type: OrderType,
    pub side: Side,
    pub quantity: u64,
    pub time_in_force: TimeInForce,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderDetail {
    pub broker_order_id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: u64,
    pub filled_quantity: u64,
    pub price: Option<Decimal>,
    pub average_fill_price: Option<Decimal>,
    pub state: OrderState,
    pub submitted_at: DateTime<Utc>,
}

/// Thin wrapper over a brokerage's trading API. [`SimulatedBroker`] fulfils this trait for
/// local runs and tests.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn account_balance(&self, currency: Option<&str>) -> Result<HashMap<String, Balance>, RouterError>;
    async fn stock_positions(&self) -> Result<Vec<Position>, RouterError>;
    async fn submit_order(&self, order: NewOrder) -> Result<OrderDetail, RouterError>;
    async fn cancel_order(&self, broker_order_id: &str) -> Result<(), RouterError>;
    async fn replace_order(
        &self,
        broker_order_id: &str,
        quantity: Option<u64>,
        price: Option<Decimal>,
    ) -> Result<OrderDetail, RouterError>;
    async fn today_orders(&self) -> Result<Vec<OrderDetail>, RouterError>;
    async fn order_detail(&self, broker_order_id: &str) -> Result<OrderDetail, RouterError>;
    async fn history_orders(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<OrderDetail>, RouterError>;
    async fn estimate_max_purchase_quantity(
        &self,
        symbol: &Symbol,
        order_type: OrderType,
        side: Side,
        price: Decimal,
    ) -> Result<u64, RouterError>;
}

struct SimulatedOrder {
    detail: OrderDetail,
}

/// In-memory broker: fills the full quantity the poll after submission, tracks a simple
/// per-currency cash balance, and carries no margin.
pub struct SimulatedBroker {
    orders: Mutex<HashMap<String, SimulatedOrder>>,
    balances: Mutex<HashMap<String, Balance>>,
    positions: Mutex<Vec<Position>>,
    next_id: Mutex<u64>,
    /// Broker error code injected on the next `submit_order`, for adaptive-retry tests.
    inject_error: Mutex<Option<(String, String)>>,
}

impl SimulatedBroker {
    pub fn new(initial_balances: HashMap<String, Balance>) -> Self {
        Self {
            orders: Mutex::new(HashMap::new()),
            balances: Mutex::new(initial_balances),
            positions: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
            inject_error: Mutex::new(None),
        }
    }

    pub fn inject_error_once(&self, code: impl Into<String>, message: impl Into<String>) {
        *self.inject_error.lock() = Some((code.into(), message.into()));
    }

    pub fn set_position(&self, position: Position) {
        self.positions.lock().push(position);
    }

    /// Apply a just-completed fill to the in-memory position book: average the cost basis in
    /// on a buy, reduce quantity on a sell, and drop the position once it reaches zero.
    fn apply_fill(&self, detail: &OrderDetail) {
        if detail.filled_quantity == 0 {
            return;
        }
        let Some(fill_price) = detail.average_fill_price else { return };
        let mut positions = self.positions.lock();
        let existing = positions.iter_mut().find(|p| p.symbol == detail.symbol);
        match (detail.side, existing) {
            (Side::Buy, Some(position)) => {
                let filled_cost = fill_price * Decimal::from(detail.filled_quantity);
                let prior_cost = position.average_cost * Decimal::from(position.quantity);
                position.quantity += detail.filled_quantity;
                position.available_quantity += detail.filled_quantity;
                position.average_cost = (prior_cost + filled_cost) / Decimal::from(position.quantity);
            }
            (Side::Buy, None) => {
                let Some(market) = detail.symbol.market() else { return };
                positions.push(Position::new(
                    detail.symbol.clone(),
                    detail.filled_quantity,
                    detail.filled_quantity,
                    fill_price,
                    market.currency().into(),
                    market,
                    Utc::now(),
                ));
            }
            (Side::Sell, Some(position)) => {
                position.quantity = position.quantity.saturating_sub(detail.filled_quantity);
                position.available_quantity = position.available_quantity.saturating_sub(detail.filled_quantity);
            }
            (Side::Sell, None) => {}
        }
        positions.retain(|p| p.quantity > 0);
    }
}

impl Default for SimulatedBroker {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

#[async_trait]
impl Broker for SimulatedBroker {
    async fn account_balance(&self, currency: Option<&str>) -> Result<HashMap<String, Balance>, RouterError> {
        let balances = self.balances.lock();
        Ok(match currency {
            Some(ccy) => balances.get(ccy).map(|b| HashMap::from([(ccy.to_string(), *b)])).unwrap_or_default(),
            None => balances.clone(),
        })
    }

    async fn stock_positions(&self) -> Result<Vec<Position>, RouterError> {
        Ok(self.positions.lock().clone())
    }

    async fn submit_order(&self, order: NewOrder) -> Result<OrderDetail, RouterError> {
        if let Some((code, message)) = self.inject_error.lock().take() {
            return Err(RouterError::Broker { code, message });
        }
        let mut next_id = self.next_id.lock();
        let id = format!("SIM-{}", *next_id);
        *next_id += 1;
        let detail = OrderDetail {
            broker_order_id: id.clone(),
            symbol: order.symbol,
            side: order.side,
            order_type: order.order_type,
            quantity: order.quantity,
            filled_quantity: 0,
            price: order.price,
            average_fill_price: None,
            state: OrderState::New,
            submitted_at: Utc::now(),
        };
        self.orders.lock().insert(id, SimulatedOrder { detail: detail.clone() });
        Ok(detail)
    }

    async fn cancel_order(&self, broker_order_id: &str) -> Result<(), RouterError> {
        let mut orders = self.orders.lock();
        let order = orders.get_mut(broker_order_id).ok_or_else(|| RouterError::UnknownOrder(broker_order_id.to_string()))?;
        if order.detail.state.is_terminal() {
            return Err(RouterError::TerminalOrder(broker_order_id.to_string()));
        }
        order.detail.state = OrderState::Cancelled;
        Ok(())
    }

    async fn replace_order(
        &self,
        broker_order_id: &str,
        quantity: Option<u64>,
        price: Option<Decimal>,
    ) -> Result<OrderDetail, RouterError> {
        let mut orders = self.orders.lock();
        let order = orders.get_mut(broker_order_id).ok_or_else(|| RouterError::UnknownOrder(broker_order_id.to_string()))?;
        if order.detail.state.is_terminal() {
            return Err(RouterError::TerminalOrder(broker_order_id.to_string()));
        }
        if let Some(qty) = quantity {
            order.detail.quantity = qty;
        }
        if let Some(px) = price {
            order.detail.price = Some(px);
        }
        Ok(order.detail.clone())
    }

    async fn today_orders(&self) -> Result<Vec<OrderDetail>, RouterError> {
        Ok(self.orders.lock().values().map(|o| o.detail.clone()).collect())
    }

    async fn order_detail(&self, broker_order_id: &str) -> Result<OrderDetail, RouterError> {
        let detail = {
            let mut orders = self.orders.lock();
            let order = orders.get_mut(broker_order_id).ok_or_else(|| RouterError::UnknownOrder(broker_order_id.to_string()))?;
            let newly_filled = !order.detail.state.is_terminal();
            if newly_filled {
                order.detail.filled_quantity = order.detail.quantity;
                order.detail.average_fill_price = order.detail.price;
                order.detail.state = OrderState::Filled;
            }
            newly_filled.then(|| order.detail.clone())
        };
        if let Some(detail) = &detail {
            self.apply_fill(detail);
        }
        let orders = self.orders.lock();
        Ok(orders.get(broker_order_id).expect("order present, looked up above").detail.clone())
    }

    async fn history_orders(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<OrderDetail>, RouterError> {
        Ok(self
            .orders
            .lock()
            .values()
            .map(|o| o.detail.clone())
            .filter(|d| d.submitted_at >= start && d.submitted_at <= end)
            .collect())
    }

    async fn estimate_max_purchase_quantity(
        &self,
        _symbol: &Symbol,
        _order_type: OrderType,
        _side: Side,
        price: Decimal,
    ) -> Result<u64, RouterError> {
        if price.is_zero() {
            return Ok(0);
        }
        let cash: Decimal = self.balances.lock().values().map(|b| b.free).sum();
        Ok((cash / price).trunc().try_into().unwrap_or(0u64).max(0))
    }
}
