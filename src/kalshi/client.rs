//! Kalshi client - the trading operations exposed to callers

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::auth::{Credential, Signer};
use super::rate_limit::RateLimiter;
use super::rest::{KalshiRestClient, MarketsQuery};
use super::transport::ReqwestTransport;
use crate::common::errors::{ClientError, Result};
use crate::common::types::{
    Action, Balance, Market, MarketDetails, MarketPosition, Order, OrderRequest, OrderType,
    Portfolio, RankedMarket, Side,
};
use crate::config::types::KalshiConfig;

/// Markets scanned per search or trending request
pub const MARKET_SCAN_LIMIT: u32 = 200;
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;
pub const MAX_SEARCH_LIMIT: u32 = 100;
pub const DEFAULT_TRENDING_LIMIT: u32 = 10;
pub const MAX_TRENDING_LIMIT: u32 = 50;
/// Order book levels per side returned with market details
pub const DETAIL_BOOK_DEPTH: usize = 5;
/// Upper bound on pages fetched for one series listing
pub const MAX_SERIES_PAGES: usize = 50;

/// Keyword search over open markets
#[derive(Debug, Clone, Default)]
pub struct SearchMarketsParams {
    pub query: String,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct TrendingParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct SeriesParams {
    pub series_ticker: String,
}

/// A limit order as requested by a caller
#[derive(Debug, Clone)]
pub struct PlaceOrderParams {
    pub ticker: String,
    pub side: Side,
    pub action: Action,
    pub quantity: u32,
    pub price_cents: u32,
    /// Caller-chosen idempotency key; generated when absent
    pub client_order_id: Option<String>,
}

impl PlaceOrderParams {
    /// Build the wire order, fixing its client order id
    pub fn to_order_request(&self) -> OrderRequest {
        OrderRequest {
            ticker: self.ticker.trim().to_string(),
            side: self.side,
            action: self.action,
            order_type: OrderType::Limit,
            price_cents: self.price_cents,
            quantity: self.quantity,
            client_order_id: self
                .client_order_id
                .clone()
                .unwrap_or_else(new_client_order_id),
        }
    }
}

/// Fresh idempotency key for one logical order submission
pub fn new_client_order_id() -> String {
    Uuid::new_v4().to_string()
}

/// High-level Kalshi trading client
#[derive(Debug, Clone)]
pub struct KalshiClient {
    rest_client: KalshiRestClient,
}

impl KalshiClient {
    pub fn new(rest_client: KalshiRestClient) -> Self {
        Self { rest_client }
    }

    /// Build a client from configuration.
    ///
    /// The rate limiter is passed in so every client in the process can
    /// share one.
    pub fn from_config(config: &KalshiConfig, rate_limiter: Arc<RateLimiter>) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                ClientError::Configuration(
                    "Kalshi API key is not set (KALSHI_API_KEY)".to_string(),
                )
            })?;

        let key_path = config.resolved_private_key_path();
        let credential = Credential::from_pem_file(api_key, &key_path)?;
        let signer = Signer::new(credential, config.salt_length)?;
        info!(
            path = %key_path.display(),
            salt_len = signer.salt_len(),
            "Loaded Kalshi signing key"
        );

        let transport = ReqwestTransport::with_timeout(config.request_timeout())?;
        let rest_client = KalshiRestClient::with_transport(
            &config.rest_url,
            Arc::new(signer),
            rate_limiter,
            Arc::new(transport),
        )?
        .with_retry_policy(config.retry_policy());

        Ok(Self::new(rest_client))
    }

    // ========================================================================
    // Market discovery
    // ========================================================================

    /// Open markets whose title, subtitle or ticker contain the query.
    ///
    /// An empty query matches every scanned market.
    #[instrument(skip(self))]
    pub async fn search_markets(&self, params: &SearchMarketsParams) -> Result<Vec<Market>> {
        let query = params.query.as_str();
        let limit = clamp_limit(params.limit, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT);

        let page = self.rest_client.get_markets(&scan_query()).await?;
        let matches: Vec<Market> = page
            .markets
            .into_iter()
            .filter(|market| market.matches_keyword(query))
            .take(limit)
            .collect();

        debug!("Search '{}' matched {} markets", query, matches.len());
        Ok(matches)
    }

    /// Open markets ranked by liquidity score, best first
    #[instrument(skip(self))]
    pub async fn trending_markets(&self, params: &TrendingParams) -> Result<Vec<RankedMarket>> {
        let limit = clamp_limit(params.limit, DEFAULT_TRENDING_LIMIT, MAX_TRENDING_LIMIT);

        let page = self.rest_client.get_markets(&scan_query()).await?;
        Ok(rank_by_liquidity(page.markets, limit))
    }

    /// Market metadata with the top of its order book
    #[instrument(skip(self))]
    pub async fn get_market_details(&self, ticker: &str) -> Result<MarketDetails> {
        let (market, orderbook) = tokio::try_join!(
            self.rest_client.get_market(ticker),
            self.rest_client.get_orderbook(ticker, None),
        )?;

        Ok(MarketDetails {
            market,
            orderbook: orderbook.top(DETAIL_BOOK_DEPTH),
        })
    }

    /// Open markets of a series, following pagination.
    ///
    /// Stops on the last page, on an empty page, on a cursor the server
    /// repeats, or after [`MAX_SERIES_PAGES`] pages.
    #[instrument(skip(self))]
    pub async fn series_markets(&self, params: &SeriesParams) -> Result<Vec<Market>> {
        let series = params.series_ticker.trim();
        if series.is_empty() {
            return Err(ClientError::Validation("series ticker must not be empty".to_string()));
        }

        let mut markets = Vec::new();
        let mut query = scan_query().with_series(series);

        for page_number in 1..=MAX_SERIES_PAGES {
            let page = self.rest_client.get_markets(&query).await?;
            let page_was_empty = page.markets.is_empty();
            markets.extend(page.markets);

            let Some(cursor) = page.cursor else {
                break;
            };
            if page_was_empty {
                break;
            }
            if query.cursor.as_deref() == Some(cursor.as_str()) {
                warn!(series, cursor = %cursor, "Pagination cursor repeated, stopping");
                break;
            }
            if page_number == MAX_SERIES_PAGES {
                warn!(series, pages = MAX_SERIES_PAGES, "Series page limit reached, stopping");
                break;
            }
            query = query.with_cursor(cursor);
        }

        debug!("Series {} has {} markets", series, markets.len());
        Ok(markets)
    }

    // ========================================================================
    // Portfolio
    // ========================================================================

    pub async fn get_balance(&self) -> Result<Balance> {
        self.rest_client.get_balance().await
    }

    pub async fn get_positions(&self) -> Result<Vec<MarketPosition>> {
        self.rest_client.get_positions().await
    }

    /// Balance and open positions
    #[instrument(skip(self))]
    pub async fn get_portfolio(&self) -> Result<Portfolio> {
        let (balance, positions) = tokio::try_join!(
            self.rest_client.get_balance(),
            self.rest_client.get_positions(),
        )?;

        Ok(Portfolio { balance, positions })
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// Place a limit order.
    ///
    /// Validation runs before any network traffic. The client order id is
    /// fixed here, once, and shared by every retry of this submission.
    #[instrument(skip(self, params), fields(ticker = %params.ticker))]
    pub async fn place_order(&self, params: &PlaceOrderParams) -> Result<Order> {
        let order = params.to_order_request();
        order.validate()?;

        info!(
            client_order_id = %order.client_order_id,
            side = %order.side,
            action = %order.action,
            price_cents = order.price_cents,
            quantity = order.quantity,
            "Placing order"
        );
        self.rest_client.create_order(&order).await
    }

    /// Cancel a resting order by exchange order id
    pub async fn cancel_order(&self, order_id: &str) -> Result<Order> {
        self.rest_client.cancel_order(order_id).await
    }
}

fn scan_query() -> MarketsQuery {
    MarketsQuery {
        limit: Some(MARKET_SCAN_LIMIT),
        ..MarketsQuery::open()
    }
}

/// Requested limit capped at `max`; zero yields no results
fn clamp_limit(requested: Option<u32>, default: u32, max: u32) -> usize {
    requested.unwrap_or(default).min(max) as usize
}

/// Sort by liquidity score descending, keeping API order among ties
fn rank_by_liquidity(markets: Vec<Market>, limit: usize) -> Vec<RankedMarket> {
    let mut ranked: Vec<RankedMarket> = markets
        .into_iter()
        .map(|market| RankedMarket {
            liquidity_score: market.liquidity_score(),
            market,
        })
        .collect();
    ranked.sort_by(|a, b| b.liquidity_score.cmp(&a.liquidity_score));
    ranked.truncate(limit);
    ranked
}
