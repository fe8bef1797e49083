//! Broker trait and implementations for volbarometer.
//!
//! Provides a generic `Broker` trait covering the operations a rebalance
//! needs: list and cancel open orders, list and close positions, read
//! equity, and submit notional market orders.
//!
//! Implementations:
//!
//! - **Alpaca** (feature `alpaca`): Alpaca Trading API v2 over blocking REST
//! - **Mock** ([`mock::MockBroker`]): in-memory, stateful, for tests

pub mod error;
pub mod mock;
pub mod types;

#[cfg(feature = "alpaca")]
pub mod alpaca;

pub use error::BrokerError;
pub use types::*;

use volbarometer::Symbol;

/// A broker connection. Every call is synchronous and either succeeds or
/// returns a definitive error; no partial-fill reasoning is exposed.
pub trait Broker {
    /// Connect to the broker (verifies credentials where applicable).
    fn connect(&mut self) -> Result<(), BrokerError>;

    /// Disconnect gracefully.
    fn disconnect(&mut self) -> Result<(), BrokerError>;

    /// Get all current positions.
    fn positions(&self) -> Result<Vec<Position>, BrokerError>;

    /// Liquidate the whole position in `symbol`.
    fn close_position(&self, symbol: &Symbol) -> Result<(), BrokerError>;

    /// Get every open (unfilled) order.
    fn open_orders(&self) -> Result<Vec<OpenOrder>, BrokerError>;

    /// Cancel a pending order.
    fn cancel_order(&self, id: &OrderId) -> Result<(), BrokerError>;

    /// Get account summary (equity, cash, buying power).
    fn account(&self) -> Result<Account, BrokerError>;

    /// Submit an order. Returns the broker's order ID.
    fn submit_order(&self, order: &NotionalOrder) -> Result<OrderId, BrokerError>;
}

impl<B: Broker + ?Sized> Broker for Box<B> {
    fn connect(&mut self) -> Result<(), BrokerError> {
        (**self).connect()
    }

    fn disconnect(&mut self) -> Result<(), BrokerError> {
        (**self).disconnect()
    }

    fn positions(&self) -> Result<Vec<Position>, BrokerError> {
        (**self).positions()
    }

    fn close_position(&self, symbol: &Symbol) -> Result<(), BrokerError> {
        (**self).close_position(symbol)
    }

    fn open_orders(&self) -> Result<Vec<OpenOrder>, BrokerError> {
        (**self).open_orders()
    }

    fn cancel_order(&self, id: &OrderId) -> Result<(), BrokerError> {
        (**self).cancel_order(id)
    }

    fn account(&self) -> Result<Account, BrokerError> {
        (**self).account()
    }

    fn submit_order(&self, order: &NotionalOrder) -> Result<OrderId, BrokerError> {
        (**self).submit_order(order)
    }
}
