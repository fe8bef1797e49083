//! Shared broker types: positions, accounts, orders.

use std::fmt;

use volbarometer::Symbol;

/// Broker-level position.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: Symbol,
    /// Positive = long, negative = short. Fractional for notional fills.
    pub quantity: f64,
    pub market_value_cents: i64,
}

/// Account summary from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub equity_cents: i64,
    pub cash_cents: i64,
    pub buying_power_cents: i64,
}

/// Opaque order ID returned by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An order resting at the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOrder {
    pub id: OrderId,
    pub symbol: Symbol,
    pub side: BrokerSide,
}

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerSide {
    Buy,
    Sell,
}

impl BrokerSide {
    pub fn as_str(self) -> &'static str {
        match self {
            BrokerSide::Buy => "buy",
            BrokerSide::Sell => "sell",
        }
    }
}

/// Order pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrokerOrderType {
    #[default]
    Market,
}

/// Order grouping. Only standalone orders are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderClass {
    #[default]
    Simple,
}

/// How long an unfilled order stays live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeInForce {
    #[default]
    Day,
}

/// Order sized by dollar amount rather than share count.
#[derive(Debug, Clone, PartialEq)]
pub struct NotionalOrder {
    pub symbol: Symbol,
    pub side: BrokerSide,
    pub notional_cents: i64,
    pub order_type: BrokerOrderType,
    pub order_class: OrderClass,
    pub time_in_force: TimeInForce,
}

impl NotionalOrder {
    /// A simple market buy for `notional_cents`.
    pub fn market_buy(symbol: Symbol, notional_cents: i64) -> Self {
        Self {
            symbol,
            side: BrokerSide::Buy,
            notional_cents,
            order_type: BrokerOrderType::Market,
            order_class: OrderClass::Simple,
            time_in_force: TimeInForce::Day,
        }
    }
}

/// Format cents as a plain decimal amount (e.g., 2500000 → "25000.00").
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
