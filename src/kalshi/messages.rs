//! Kalshi REST request and response bodies

use serde::{Deserialize, Serialize};

use crate::common::types::{Action, Market, MarketPosition, Order, OrderRequest, OrderType, Side};

/// `GET /markets`
#[derive(Debug, Clone, Deserialize)]
pub struct MarketsResponse {
    #[serde(default)]
    pub markets: Vec<Market>,
    /// Pagination cursor; empty or absent on the last page
    #[serde(default)]
    pub cursor: Option<String>,
}

/// `GET /markets/{ticker}`
#[derive(Debug, Clone, Deserialize)]
pub struct MarketResponse {
    pub market: Market,
}

/// `GET /markets/{ticker}/orderbook`
#[derive(Debug, Clone, Deserialize)]
pub struct OrderBookResponse {
    pub orderbook: RawOrderBook,
}

/// Bid levels as `[price_cents, quantity]` pairs, ascending by price.
/// Either side is `null` when empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOrderBook {
    #[serde(default)]
    pub yes: Option<Vec<(i64, i64)>>,
    #[serde(default)]
    pub no: Option<Vec<(i64, i64)>>,
}

/// `GET /portfolio/balance`
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    /// Available balance in cents
    pub balance: i64,
}

/// `GET /portfolio/positions`
#[derive(Debug, Clone, Deserialize)]
pub struct PositionsResponse {
    #[serde(default)]
    pub market_positions: Vec<MarketPosition>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// `POST /portfolio/orders` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub ticker: String,
    pub action: Action,
    pub side: Side,
    pub count: u32,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yes_price: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_price: Option<u32>,
    pub client_order_id: String,
}

impl From<&OrderRequest> for CreateOrderRequest {
    fn from(order: &OrderRequest) -> Self {
        let (yes_price, no_price) = match order.side {
            Side::Yes => (Some(order.price_cents), None),
            Side::No => (None, Some(order.price_cents)),
        };

        Self {
            ticker: order.ticker.clone(),
            action: order.action,
            side: order.side,
            count: order.quantity,
            order_type: order.order_type,
            yes_price,
            no_price,
            client_order_id: order.client_order_id.clone(),
        }
    }
}

/// Create and cancel responses
#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    pub order: Order,
}

/// Error envelope: `{"error": {"code": ..., "message": ...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

impl ApiErrorDetail {
    /// Whether the server blamed the request signature or the API key
    pub fn is_auth_failure(&self) -> bool {
        self.code
            .as_deref()
            .map(|code| {
                let code = code.to_ascii_lowercase();
                code.contains("signature")
                    || code.contains("api_key")
                    || code.contains("unauthorized")
            })
            .unwrap_or(false)
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(code) = &self.code {
            parts.push(code.as_str());
        }
        if let Some(message) = &self.message {
            parts.push(message.as_str());
        }
        if let Some(details) = &self.details {
            parts.push(details.as_str());
        }
        parts.join(": ")
    }
}
