//! Alpaca-specific API request and response types.
//!
//! Alpaca encodes money and quantities as decimal strings. They are kept as
//! strings here and converted to cents with [`parse_cents`].

use serde::{Deserialize, Serialize};

use crate::error::BrokerError;

/// Alpaca account response (GET /v2/account). Unused fields are skipped.
#[derive(Debug, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub status: String,
    pub equity: String,
    pub cash: String,
    #[serde(default)]
    pub buying_power: String,
    #[serde(default)]
    pub trading_blocked: bool,
}

/// Alpaca position entry (GET /v2/positions).
#[derive(Debug, Deserialize)]
pub struct PositionInfo {
    pub symbol: String,
    pub qty: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub market_value: Option<String>,
}

/// Alpaca order entry (GET /v2/orders, POST /v2/orders).
#[derive(Debug, Deserialize)]
pub struct OrderInfo {
    pub id: String,
    pub symbol: String,
    pub side: String,
    #[serde(default)]
    pub status: String,
}

/// Body of POST /v2/orders for a notional order.
#[derive(Debug, Serialize)]
pub struct OrderRequest<'a> {
    pub symbol: &'a str,
    pub notional: String,
    pub side: &'a str,
    #[serde(rename = "type")]
    pub order_type: &'a str,
    pub time_in_force: &'a str,
    pub order_class: &'a str,
}

/// Alpaca error body (`{"code": 40310000, "message": "..."}`).
#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: i64,
    pub message: String,
}

/// Parse a decimal string to cents (e.g., "185.50" → 18550).
///
/// Rounds to the nearest cent. Empty or malformed input is an error.
pub fn parse_cents(s: &str) -> Result<i64, BrokerError> {
    let val: f64 = s
        .trim()
        .parse()
        .map_err(|_| BrokerError::Other(format!("invalid decimal amount {s:?}")))?;
    if !val.is_finite() {
        return Err(BrokerError::Other(format!("invalid decimal amount {s:?}")));
    }
    Ok((val * 100.0).round() as i64)
}

/// Parse a decimal quantity string (fractional shares allowed).
pub fn parse_qty(s: &str) -> Result<f64, BrokerError> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|q| q.is_finite())
        .ok_or_else(|| BrokerError::Other(format!("invalid quantity {s:?}")))
}
