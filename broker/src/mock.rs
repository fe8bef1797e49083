//! Mock broker for testing. Implements the `Broker` trait with configurable behavior.
//!
//! Use this in integration tests to simulate broker responses without network calls.
//! The mock is stateful: filled orders become positions, closes remove them,
//! and cancels remove open orders, so back-to-back rebalances see the effects
//! of the previous run.
//!
//! ```ignore
//! use volbarometer_broker::mock::{MockBroker, FillMode};
//! use volbarometer::Symbol;
//!
//! let broker = MockBroker::builder()
//!     .fill_mode(FillMode::ImmediateFull)
//!     .with_position(Symbol::new("SSO"), 100.0, 25_000_00)
//!     .with_equity(100_000_00)
//!     .build();
//! ```

use std::sync::{Mutex, MutexGuard};

use volbarometer::Symbol;

use crate::Broker;
use crate::error::BrokerError;
use crate::types::*;

/// How the mock broker handles submitted orders.
#[derive(Clone, Debug, PartialEq)]
pub enum FillMode {
    /// Orders fill immediately and become (or grow) a position.
    ImmediateFull,
    /// Orders are accepted but stay open.
    Resting,
    /// All orders are rejected.
    Reject,
}

/// Broker operations, for failure injection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Positions,
    ClosePosition,
    OpenOrders,
    CancelOrder,
    Account,
    SubmitOrder,
}

/// A recorded broker call, in invocation order.
#[derive(Clone, Debug, PartialEq)]
pub enum BrokerCall {
    Positions,
    ClosePosition(Symbol),
    OpenOrders,
    CancelOrder(OrderId),
    Account,
    SubmitOrder(NotionalOrder),
}

impl BrokerCall {
    fn operation(&self) -> Operation {
        match self {
            BrokerCall::Positions => Operation::Positions,
            BrokerCall::ClosePosition(_) => Operation::ClosePosition,
            BrokerCall::OpenOrders => Operation::OpenOrders,
            BrokerCall::CancelOrder(_) => Operation::CancelOrder,
            BrokerCall::Account => Operation::Account,
            BrokerCall::SubmitOrder(_) => Operation::SubmitOrder,
        }
    }

    /// True for calls that change broker state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            BrokerCall::ClosePosition(_) | BrokerCall::CancelOrder(_) | BrokerCall::SubmitOrder(_)
        )
    }
}

/// Builder for `MockBroker`.
pub struct MockBrokerBuilder {
    fill_mode: FillMode,
    positions: Vec<Position>,
    open_orders: Vec<OpenOrder>,
    prices: Vec<(Symbol, i64)>,
    equity_cents: i64,
    cash_cents: i64,
    fail_on: Option<Operation>,
}

impl MockBrokerBuilder {
    pub fn fill_mode(mut self, mode: FillMode) -> Self {
        self.fill_mode = mode;
        self
    }

    pub fn with_position(mut self, symbol: Symbol, quantity: f64, market_value_cents: i64) -> Self {
        self.positions.push(Position {
            symbol,
            quantity,
            market_value_cents,
        });
        self
    }

    pub fn with_open_order(mut self, id: &str, symbol: Symbol) -> Self {
        self.open_orders.push(OpenOrder {
            id: OrderId(id.to_string()),
            symbol,
            side: BrokerSide::Buy,
        });
        self
    }

    /// Price used to convert filled notional into shares (default $100).
    pub fn with_price(mut self, symbol: Symbol, price_cents: i64) -> Self {
        self.prices.push((symbol, price_cents));
        self
    }

    pub fn with_equity(mut self, equity_cents: i64) -> Self {
        self.equity_cents = equity_cents;
        self.cash_cents = equity_cents;
        self
    }

    pub fn with_account(mut self, equity_cents: i64, cash_cents: i64) -> Self {
        self.equity_cents = equity_cents;
        self.cash_cents = cash_cents;
        self
    }

    /// Make every call of `op` fail with `BrokerError::Other`.
    pub fn fail_on(mut self, op: Operation) -> Self {
        self.fail_on = Some(op);
        self
    }

    pub fn build(self) -> MockBroker {
        MockBroker {
            connected: false,
            fill_mode: self.fill_mode,
            prices: self.prices,
            fail_on: self.fail_on,
            state: Mutex::new(MockState {
                positions: self.positions,
                open_orders: self.open_orders,
                equity_cents: self.equity_cents,
                cash_cents: self.cash_cents,
                next_order_id: 1,
                calls: Vec::new(),
            }),
        }
    }
}

struct MockState {
    positions: Vec<Position>,
    open_orders: Vec<OpenOrder>,
    equity_cents: i64,
    cash_cents: i64,
    next_order_id: u64,
    calls: Vec<BrokerCall>,
}

/// A mock broker that records calls and keeps simple in-memory state.
pub struct MockBroker {
    connected: bool,
    fill_mode: FillMode,
    prices: Vec<(Symbol, i64)>,
    fail_on: Option<Operation>,
    state: Mutex<MockState>,
}

const DEFAULT_PRICE_CENTS: i64 = 100_00;

impl MockBroker {
    pub fn builder() -> MockBrokerBuilder {
        MockBrokerBuilder {
            fill_mode: FillMode::ImmediateFull,
            positions: Vec::new(),
            open_orders: Vec::new(),
            prices: Vec::new(),
            equity_cents: 1_000_000_00,
            cash_cents: 1_000_000_00,
            fail_on: None,
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<BrokerCall> {
        self.state().calls.clone()
    }

    /// Calls that changed broker state.
    pub fn mutations(&self) -> Vec<BrokerCall> {
        self.calls().into_iter().filter(BrokerCall::is_mutation).collect()
    }

    /// Orders that were submitted (for assertion in tests).
    pub fn submitted_orders(&self) -> Vec<NotionalOrder> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BrokerCall::SubmitOrder(o) => Some(o),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Current position symbols (for assertion in tests).
    pub fn held_symbols(&self) -> Vec<Symbol> {
        self.state().positions.iter().map(|p| p.symbol.clone()).collect()
    }

    fn price_of(&self, symbol: &Symbol) -> i64 {
        self.prices
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, p)| *p)
            .unwrap_or(DEFAULT_PRICE_CENTS)
    }

    /// Record `call`, then fail if it is connected-only or injected.
    fn record(&self, call: BrokerCall) -> Result<MutexGuard<'_, MockState>, BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        let op = call.operation();
        let mut state = self.state();
        state.calls.push(call);
        if self.fail_on == Some(op) {
            return Err(BrokerError::Other(format!("mock: {op:?} failed")));
        }
        Ok(state)
    }
}

impl Broker for MockBroker {
    fn connect(&mut self) -> Result<(), BrokerError> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), BrokerError> {
        self.connected = false;
        Ok(())
    }

    fn positions(&self) -> Result<Vec<Position>, BrokerError> {
        let state = self.record(BrokerCall::Positions)?;
        Ok(state.positions.clone())
    }

    fn close_position(&self, symbol: &Symbol) -> Result<(), BrokerError> {
        let mut state = self.record(BrokerCall::ClosePosition(symbol.clone()))?;
        let idx = state
            .positions
            .iter()
            .position(|p| &p.symbol == symbol)
            .ok_or_else(|| BrokerError::InvalidSymbol(format!("no position in {symbol}")))?;
        let closed = state.positions.remove(idx);
        state.cash_cents += closed.market_value_cents;
        Ok(())
    }

    fn open_orders(&self) -> Result<Vec<OpenOrder>, BrokerError> {
        let state = self.record(BrokerCall::OpenOrders)?;
        Ok(state.open_orders.clone())
    }

    fn cancel_order(&self, id: &OrderId) -> Result<(), BrokerError> {
        let mut state = self.record(BrokerCall::CancelOrder(id.clone()))?;
        let before = state.open_orders.len();
        state.open_orders.retain(|o| &o.id != id);
        if state.open_orders.len() == before {
            return Err(BrokerError::Order(format!("unknown order {id}")));
        }
        Ok(())
    }

    fn account(&self) -> Result<Account, BrokerError> {
        let state = self.record(BrokerCall::Account)?;
        Ok(Account {
            equity_cents: state.equity_cents,
            cash_cents: state.cash_cents,
            buying_power_cents: state.cash_cents,
        })
    }

    fn submit_order(&self, order: &NotionalOrder) -> Result<OrderId, BrokerError> {
        let price = self.price_of(&order.symbol);
        let mut state = self.record(BrokerCall::SubmitOrder(order.clone()))?;

        let id = OrderId(format!("mock-{}", state.next_order_id));
        state.next_order_id += 1;

        match self.fill_mode {
            FillMode::Reject => return Err(BrokerError::Order("mock: order rejected".into())),
            FillMode::Resting => state.open_orders.push(OpenOrder {
                id: id.clone(),
                symbol: order.symbol.clone(),
                side: order.side,
            }),
            FillMode::ImmediateFull => {
                let signed = match order.side {
                    BrokerSide::Buy => order.notional_cents,
                    BrokerSide::Sell => -order.notional_cents,
                };
                let shares = signed as f64 / price as f64;
                state.cash_cents -= signed;
                match state.positions.iter_mut().find(|p| p.symbol == order.symbol) {
                    Some(p) => {
                        p.quantity += shares;
                        p.market_value_cents += signed;
                    }
                    None => state.positions.push(Position {
                        symbol: order.symbol.clone(),
                        quantity: shares,
                        market_value_cents: signed,
                    }),
                }
            }
        }
        Ok(id)
    }
}
