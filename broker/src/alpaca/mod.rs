//! Alpaca broker implementation.

pub mod client;
pub mod types;

use log::warn;
use volbarometer::Symbol;

use crate::Broker;
use crate::error::BrokerError;
use crate::types::*;
use client::AlpacaClient;
use types::{OrderRequest, parse_cents, parse_qty};

/// Alpaca Trading API v2 broker implementing the generic Broker trait.
///
/// Uses REST for all operations. Blocking (sync) via reqwest::blocking.
pub struct AlpacaBroker {
    api_key: String,
    api_secret: String,
    base_url: String,
    client: Option<AlpacaClient>,
}

impl AlpacaBroker {
    /// Create a new Alpaca broker handle (not yet connected).
    pub fn new(api_key: &str, api_secret: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            base_url: base_url.to_string(),
            client: None,
        }
    }

    /// Create a handle against the paper-trading endpoint.
    pub fn paper(api_key: &str, api_secret: &str) -> Self {
        Self::new(api_key, api_secret, client::PAPER_BASE_URL)
    }

    fn require_client(&self) -> Result<&AlpacaClient, BrokerError> {
        self.client.as_ref().ok_or(BrokerError::NotConnected)
    }
}

fn to_symbol(s: &str) -> Result<Symbol, BrokerError> {
    Symbol::try_new(s).ok_or_else(|| BrokerError::InvalidSymbol(s.to_string()))
}

fn to_side(s: &str) -> BrokerSide {
    match s {
        "sell" => BrokerSide::Sell,
        _ => BrokerSide::Buy,
    }
}

fn order_type_str(t: BrokerOrderType) -> &'static str {
    match t {
        BrokerOrderType::Market => "market",
    }
}

fn order_class_str(c: OrderClass) -> &'static str {
    match c {
        OrderClass::Simple => "simple",
    }
}

fn tif_str(t: TimeInForce) -> &'static str {
    match t {
        TimeInForce::Day => "day",
    }
}

impl Broker for AlpacaBroker {
    fn connect(&mut self) -> Result<(), BrokerError> {
        let client = AlpacaClient::new(&self.api_key, &self.api_secret, &self.base_url)?;
        let info = client.account()?;
        if info.trading_blocked {
            warn!("Alpaca account status {}: trading is blocked", info.status);
        }
        self.client = Some(client);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), BrokerError> {
        self.client = None;
        Ok(())
    }

    fn positions(&self) -> Result<Vec<Position>, BrokerError> {
        let client = self.require_client()?;
        client
            .positions()?
            .iter()
            .map(|p| {
                let qty = parse_qty(&p.qty)?;
                let market_value_cents = match p.market_value.as_deref() {
                    Some(v) if !v.is_empty() => parse_cents(v)?,
                    _ => 0,
                };
                // qty is unsigned on some endpoints; side carries the sign
                let quantity = if p.side == "short" { -qty.abs() } else { qty };
                Ok(Position {
                    symbol: to_symbol(&p.symbol)?,
                    quantity,
                    market_value_cents,
                })
            })
            .collect()
    }

    fn close_position(&self, symbol: &Symbol) -> Result<(), BrokerError> {
        self.require_client()?.close_position(symbol.as_str())
    }

    fn open_orders(&self) -> Result<Vec<OpenOrder>, BrokerError> {
        let client = self.require_client()?;
        client
            .open_orders()?
            .iter()
            .map(|o| {
                Ok(OpenOrder {
                    id: OrderId(o.id.clone()),
                    symbol: to_symbol(&o.symbol)?,
                    side: to_side(&o.side),
                })
            })
            .collect()
    }

    fn cancel_order(&self, id: &OrderId) -> Result<(), BrokerError> {
        self.require_client()?.cancel_order(&id.0)
    }

    fn account(&self) -> Result<Account, BrokerError> {
        let info = self.require_client()?.account()?;
        let buying_power_cents = if info.buying_power.is_empty() {
            0
        } else {
            parse_cents(&info.buying_power)?
        };
        Ok(Account {
            equity_cents: parse_cents(&info.equity)?,
            cash_cents: parse_cents(&info.cash)?,
            buying_power_cents,
        })
    }

    fn submit_order(&self, order: &NotionalOrder) -> Result<OrderId, BrokerError> {
        let client = self.require_client()?;
        if order.notional_cents <= 0 {
            return Err(BrokerError::Order(format!(
                "notional must be positive, got {}",
                format_cents(order.notional_cents)
            )));
        }
        let request = build_order_request(order);
        let resp = client.submit_order(&request)?;
        Ok(OrderId(resp.id))
    }
}

/// Translate a `NotionalOrder` into the Alpaca request body.
pub fn build_order_request(order: &NotionalOrder) -> OrderRequest<'_> {
    OrderRequest {
        symbol: order.symbol.as_str(),
        notional: format_cents(order.notional_cents),
        side: order.side.as_str(),
        order_type: order_type_str(order.order_type),
        time_in_force: tif_str(order.time_in_force),
        order_class: order_class_str(order.order_class),
    }
}
