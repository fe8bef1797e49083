//! Alpaca Trading API v2 REST client.

use std::time::Duration;

use log::debug;
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder, Response};

use super::types::{AccountInfo, ApiError, OrderInfo, OrderRequest, PositionInfo};
use crate::error::BrokerError;

/// Paper-trading endpoint used when no base URL is configured.
pub const PAPER_BASE_URL: &str = "https://paper-api.alpaca.markets";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking Alpaca REST client.
pub struct AlpacaClient {
    client: Client,
    api_key: String,
    api_secret: String,
    base_url: Url,
}

impl AlpacaClient {
    /// Create a new client against `base_url` (e.g. `https://api.alpaca.markets`).
    pub fn new(api_key: &str, api_secret: &str, base_url: &str) -> Result<Self, BrokerError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BrokerError::Connection(format!("invalid base url {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(BrokerError::Connection(format!(
                "base url {base_url} cannot carry a path"
            )));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BrokerError::Connection(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            base_url,
        })
    }

    /// Build `base_url` + `/v2/...` with each segment percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("v2").extend(segments);
        }
        url
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.api_secret)
    }

    /// Get account information (GET /v2/account).
    pub fn account(&self) -> Result<AccountInfo, BrokerError> {
        let url = self.endpoint(&["account"]);
        let resp = self
            .authed(self.client.get(url))
            .send()
            .map_err(|e| BrokerError::Connection(format!("account request failed: {e}")))?;
        let resp = check(resp, "account", BrokerError::Connection)?;

        resp.json::<AccountInfo>()
            .map_err(|e| BrokerError::Connection(format!("failed to parse account: {e}")))
    }

    /// Get open positions (GET /v2/positions).
    pub fn positions(&self) -> Result<Vec<PositionInfo>, BrokerError> {
        let url = self.endpoint(&["positions"]);
        let resp = self
            .authed(self.client.get(url))
            .send()
            .map_err(|e| BrokerError::Connection(format!("positions request failed: {e}")))?;
        let resp = check(resp, "positions", BrokerError::Connection)?;

        resp.json::<Vec<PositionInfo>>()
            .map_err(|e| BrokerError::Connection(format!("failed to parse positions: {e}")))
    }

    /// Liquidate a position (DELETE /v2/positions/{symbol}).
    pub fn close_position(&self, symbol: &str) -> Result<(), BrokerError> {
        let url = self.endpoint(&["positions", symbol]);
        debug!("Closing Alpaca position {symbol}");
        let resp = self
            .authed(self.client.delete(url))
            .send()
            .map_err(|e| BrokerError::Order(format!("close request failed: {e}")))?;
        check(resp, "close position", BrokerError::Order)?;
        Ok(())
    }

    /// Get open orders (GET /v2/orders?status=open).
    pub fn open_orders(&self) -> Result<Vec<OrderInfo>, BrokerError> {
        let mut url = self.endpoint(&["orders"]);
        url.query_pairs_mut()
            .append_pair("status", "open")
            .append_pair("limit", "500");
        let resp = self
            .authed(self.client.get(url))
            .send()
            .map_err(|e| BrokerError::Connection(format!("orders request failed: {e}")))?;
        let resp = check(resp, "orders", BrokerError::Connection)?;

        resp.json::<Vec<OrderInfo>>()
            .map_err(|e| BrokerError::Connection(format!("failed to parse orders: {e}")))
    }

    /// Cancel an order (DELETE /v2/orders/{id}).
    pub fn cancel_order(&self, id: &str) -> Result<(), BrokerError> {
        let url = self.endpoint(&["orders", id]);
        debug!("Cancelling Alpaca order {id}");
        let resp = self
            .authed(self.client.delete(url))
            .send()
            .map_err(|e| BrokerError::Order(format!("cancel request failed: {e}")))?;
        check(resp, "cancel", BrokerError::Order)?;
        Ok(())
    }

    /// Submit a new order (POST /v2/orders).
    pub fn submit_order(&self, order: &OrderRequest<'_>) -> Result<OrderInfo, BrokerError> {
        let url = self.endpoint(&["orders"]);
        debug!(
            "Submitting Alpaca order: {} {} notional {}",
            order.side, order.symbol, order.notional
        );
        let resp = self
            .authed(self.client.post(url))
            .json(order)
            .send()
            .map_err(|e| BrokerError::Order(format!("order request failed: {e}")))?;
        let resp = check(resp, "order", BrokerError::Order)?;

        resp.json::<OrderInfo>()
            .map_err(|e| BrokerError::Order(format!("failed to parse order response: {e}")))
    }
}

/// Map a non-success response to a `BrokerError`.
fn check(
    resp: Response,
    what: &str,
    other: fn(String) -> BrokerError,
) -> Result<Response, BrokerError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(status_error(status, what, &body, other))
}

/// Classify an HTTP error status. Auth and rate-limit statuses get their own
/// variants; everything else goes through `other`.
pub fn status_error(
    status: StatusCode,
    what: &str,
    body: &str,
    other: fn(String) -> BrokerError,
) -> BrokerError {
    let detail = serde_json::from_str::<ApiError>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.to_string());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            BrokerError::Auth(format!("{what} returned {status}: {detail}"))
        }
        StatusCode::TOO_MANY_REQUESTS => BrokerError::RateLimit,
        _ => other(format!("{what} returned {status}: {detail}")),
    }
}
