//! Domain types shared by the client and its callers

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::errors::ClientError;

/// Converts an integer amount of cents into dollars
pub fn cents_to_dollars(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Contract side of a binary market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Yes => write!(f, "yes"),
            Side::No => write!(f, "no"),
        }
    }
}

impl FromStr for Side {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(Side::Yes),
            "no" => Ok(Side::No),
            other => Err(ClientError::Validation(format!(
                "side must be 'yes' or 'no', got '{}'",
                other
            ))),
        }
    }
}

/// Whether an order opens (buy) or closes (sell) exposure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Buy,
    Sell,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "buy"),
            Action::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for Action {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Action::Buy),
            "sell" => Ok(Action::Sell),
            other => Err(ClientError::Validation(format!(
                "action must be 'buy' or 'sell', got '{}'",
                other
            ))),
        }
    }
}

/// Order type. Only resting limit orders are placed by this client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    Limit,
}

/// Market metadata as returned by the markets endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub ticker: String,
    #[serde(default)]
    pub event_ticker: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub status: Option<String>,
    /// Last yes price in cents
    #[serde(default)]
    pub yes_price: Option<i64>,
    /// Last no price in cents
    #[serde(default)]
    pub no_price: Option<i64>,
    #[serde(default)]
    pub volume_24h: i64,
    #[serde(default)]
    pub open_interest: i64,
    #[serde(default)]
    pub close_time: Option<DateTime<Utc>>,
}

impl Market {
    /// Yes price in dollars; a zero price is reported as absent
    pub fn yes_price_dollars(&self) -> Option<Decimal> {
        self.yes_price.filter(|p| *p != 0).map(cents_to_dollars)
    }

    /// No price in dollars; a zero price is reported as absent
    pub fn no_price_dollars(&self) -> Option<Decimal> {
        self.no_price.filter(|p| *p != 0).map(cents_to_dollars)
    }

    /// Case-insensitive keyword match against title, subtitle and ticker
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let needle = keyword.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.subtitle.to_lowercase().contains(&needle)
            || self.ticker.to_lowercase().contains(&needle)
    }

    /// Weighted blend of 24h volume and open interest
    pub fn liquidity_score(&self) -> Decimal {
        Decimal::from(self.volume_24h) * dec!(0.6) + Decimal::from(self.open_interest) * dec!(0.4)
    }
}

/// A market together with its liquidity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMarket {
    #[serde(flatten)]
    pub market: Market,
    pub liquidity_score: Decimal,
}

/// A single resting bid level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price in cents (1-99)
    pub price_cents: i64,
    /// Number of contracts resting at this price
    pub quantity: i64,
}

impl PriceLevel {
    /// Create a new price level
    pub fn new(price_cents: i64, quantity: i64) -> Self {
        Self {
            price_cents,
            quantity,
        }
    }

    /// Price in dollars
    pub fn price(&self) -> Decimal {
        cents_to_dollars(self.price_cents)
    }
}

/// Order book of a binary market.
///
/// Kalshi only publishes bids for each side; a yes bid at `p` is equivalent
/// to a no ask at `100 - p`. Both sides are kept sorted best (highest) first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub ticker: String,
    pub yes_bids: Vec<PriceLevel>,
    pub no_bids: Vec<PriceLevel>,
    /// Local time the snapshot was received
    pub timestamp: DateTime<Utc>,
}

impl OrderBook {
    /// Highest yes bid
    pub fn best_yes_bid(&self) -> Option<&PriceLevel> {
        self.yes_bids.first()
    }

    /// Highest no bid
    pub fn best_no_bid(&self) -> Option<&PriceLevel> {
        self.no_bids.first()
    }

    /// Cheapest price at which yes can be bought, in cents
    pub fn implied_yes_ask(&self) -> Option<i64> {
        self.best_no_bid().map(|level| 100 - level.price_cents)
    }

    /// Spread between implied yes ask and best yes bid, in cents
    pub fn spread(&self) -> Option<i64> {
        match (self.best_yes_bid(), self.implied_yes_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid.price_cents),
            _ => None,
        }
    }

    /// Copy of the book limited to the best `depth` levels per side
    pub fn top(&self, depth: usize) -> OrderBook {
        OrderBook {
            ticker: self.ticker.clone(),
            yes_bids: self.yes_bids.iter().take(depth).copied().collect(),
            no_bids: self.no_bids.iter().take(depth).copied().collect(),
            timestamp: self.timestamp,
        }
    }
}

/// Market metadata plus the top of its order book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDetails {
    pub market: Market,
    pub orderbook: OrderBook,
}

/// Account cash balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub balance_cents: i64,
}

impl Balance {
    pub fn dollars(&self) -> Decimal {
        cents_to_dollars(self.balance_cents)
    }
}

/// Position held in a single market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPosition {
    pub ticker: String,
    /// Signed contract count: positive for yes, negative for no
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub total_traded: i64,
    /// Current exposure in cents
    #[serde(default)]
    pub market_exposure: i64,
    #[serde(default)]
    pub realized_pnl: Option<i64>,
    #[serde(default)]
    pub resting_orders_count: Option<i64>,
}

impl MarketPosition {
    /// Side implied by the sign of the position, `None` when flat
    pub fn side(&self) -> Option<Side> {
        match self.position {
            p if p > 0 => Some(Side::Yes),
            p if p < 0 => Some(Side::No),
            _ => None,
        }
    }

    /// Average entry price in dollars
    pub fn average_price(&self) -> Decimal {
        let traded = self.total_traded.max(1);
        Decimal::from(self.market_exposure) / Decimal::from(traded) / dec!(100)
    }

    /// Current exposure in dollars
    pub fn current_value(&self) -> Decimal {
        cents_to_dollars(self.market_exposure)
    }
}

/// Balance and open positions together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub balance: Balance,
    pub positions: Vec<MarketPosition>,
}

/// Order lifecycle state reported by the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Resting,
    Canceled,
    Executed,
    Pending,
    #[serde(other)]
    Unknown,
}

/// Order as acknowledged by the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    #[serde(default)]
    pub client_order_id: Option<String>,
    pub status: OrderStatus,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub yes_price: Option<i64>,
    #[serde(default)]
    pub no_price: Option<i64>,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
}

/// A fully specified limit order.
///
/// `client_order_id` is fixed when the request is built and travels
/// unchanged through every attempt of the same logical submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub ticker: String,
    pub side: Side,
    pub action: Action,
    pub order_type: OrderType,
    /// Limit price in cents (1-99)
    pub price_cents: u32,
    /// Number of contracts
    pub quantity: u32,
    pub client_order_id: String,
}

impl OrderRequest {
    /// Checks ticker, quantity and price bounds
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.ticker.trim().is_empty() {
            return Err(ClientError::Validation("ticker must not be empty".to_string()));
        }
        if self.quantity < 1 {
            return Err(ClientError::Validation(format!(
                "quantity must be a positive integer, got {}",
                self.quantity
            )));
        }
        if !(1..=99).contains(&self.price_cents) {
            return Err(ClientError::Validation(format!(
                "price_cents must be 1-99, got {}",
                self.price_cents
            )));
        }
        if self.client_order_id.is_empty() {
            return Err(ClientError::Validation(
                "client_order_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Limit price in dollars
    pub fn price(&self) -> Decimal {
        cents_to_dollars(i64::from(self.price_cents))
    }
}
