//! REST API client for the Kalshi trade API
//!
//! Every call runs the same loop: wait at the shared rate limiter, sign with a
//! fresh timestamp, send, classify the status. Rate-limit and transient
//! failures are retried per [`RetryPolicy`]; the request body (and with it any
//! client order id) is built once per call and resent unchanged.

use chrono::Utc;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::auth::Signer;
use super::messages::*;
use super::rate_limit::RateLimiter;
use super::retry::{RetryDecision, RetryPolicy};
use super::transport::ReqwestTransport;
use crate::common::errors::{ClientError, Result};
use crate::common::traits::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::common::types::{
    Balance, Market, MarketPosition, Order, OrderBook, OrderRequest, PriceLevel,
};

/// Production trade API
pub const DEFAULT_BASE_URL: &str = "https://api.elections.kalshi.com/trade-api/v2";

/// Filters for `GET /markets`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketsQuery {
    pub status: Option<String>,
    pub series_ticker: Option<String>,
    pub event_ticker: Option<String>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

impl MarketsQuery {
    /// Open markets, largest page the API serves
    pub fn open() -> Self {
        Self {
            status: Some("open".to_string()),
            limit: Some(200),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_series(mut self, series_ticker: impl Into<String>) -> Self {
        self.series_ticker = Some(series_ticker.into());
        self
    }

    #[must_use]
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(series) = &self.series_ticker {
            pairs.push(("series_ticker", series.clone()));
        }
        if let Some(event) = &self.event_ticker {
            pairs.push(("event_ticker", event.clone()));
        }
        if let Some(status) = &self.status {
            pairs.push(("status", status.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(cursor) = &self.cursor {
            pairs.push(("cursor", cursor.clone()));
        }
        pairs
    }
}

/// One page of markets
#[derive(Debug, Clone, PartialEq)]
pub struct MarketsPage {
    pub markets: Vec<Market>,
    /// Cursor for the next page, `None` on the last page
    pub cursor: Option<String>,
}

/// Request description, fixed for the lifetime of one logical call
#[derive(Debug, Clone)]
struct Endpoint {
    method: HttpMethod,
    path: String,
    query: Vec<(&'static str, String)>,
    body: Option<Vec<u8>>,
}

impl Endpoint {
    fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    fn delete(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Delete,
            ..Self::get(path)
        }
    }

    fn post_json<T: Serialize>(path: impl Into<String>, body: &T) -> Result<Self> {
        Ok(Self {
            method: HttpMethod::Post,
            body: Some(serde_json::to_vec(body)?),
            ..Self::get(path)
        })
    }

    fn with_query(mut self, query: Vec<(&'static str, String)>) -> Self {
        self.query = query;
        self
    }
}

/// Authenticated REST client for the Kalshi trade API
#[derive(Clone)]
pub struct KalshiRestClient {
    transport: Arc<dyn Transport>,
    signer: Arc<Signer>,
    rate_limiter: Arc<RateLimiter>,
    retry_policy: RetryPolicy,
    /// Base URL including the API path prefix, without trailing slash
    base_url: String,
}

impl KalshiRestClient {
    /// Create a client that sends over HTTPS with `reqwest`
    pub fn new(
        base_url: &str,
        signer: Arc<Signer>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        Self::with_transport(
            base_url,
            signer,
            rate_limiter,
            Arc::new(ReqwestTransport::new()?),
        )
    }

    /// Create a client over a custom transport
    pub fn with_transport(
        base_url: &str,
        signer: Arc<Signer>,
        rate_limiter: Arc<RateLimiter>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)?;

        Ok(Self {
            transport,
            signer,
            rate_limiter,
            retry_policy: RetryPolicy::default(),
            base_url,
        })
    }

    /// Replace the default retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    // ========================================================================
    // Market Data
    // ========================================================================

    /// List markets matching the query
    #[instrument(skip(self))]
    pub async fn get_markets(&self, query: &MarketsQuery) -> Result<MarketsPage> {
        let endpoint = Endpoint::get("/markets").with_query(query.to_pairs());
        let response: MarketsResponse = self.execute(&endpoint).await?;

        debug!("Fetched {} markets", response.markets.len());
        Ok(MarketsPage {
            markets: response.markets,
            cursor: response.cursor.filter(|c| !c.is_empty()),
        })
    }

    /// Get a single market by ticker
    #[instrument(skip(self))]
    pub async fn get_market(&self, ticker: &str) -> Result<Market> {
        let ticker = path_segment("ticker", ticker)?;
        let endpoint = Endpoint::get(format!("/markets/{}", ticker));

        match self.execute::<MarketResponse>(&endpoint).await {
            Ok(response) => Ok(response.market),
            Err(ClientError::BusinessRejection { status: 404, .. }) => {
                Err(ClientError::MarketNotFound(ticker.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Get the order book for a market, optionally limited to `depth` levels
    #[instrument(skip(self))]
    pub async fn get_orderbook(&self, ticker: &str, depth: Option<u32>) -> Result<OrderBook> {
        let ticker = path_segment("ticker", ticker)?;
        let query = depth
            .map(|d| vec![("depth", d.to_string())])
            .unwrap_or_default();
        let endpoint = Endpoint::get(format!("/markets/{}/orderbook", ticker)).with_query(query);

        let response: OrderBookResponse = self.execute(&endpoint).await?;
        Ok(convert_order_book(ticker, response.orderbook))
    }

    // ========================================================================
    // Portfolio
    // ========================================================================

    /// Get the available cash balance
    #[instrument(skip(self))]
    pub async fn get_balance(&self) -> Result<Balance> {
        let response: BalanceResponse = self.execute(&Endpoint::get("/portfolio/balance")).await?;
        Ok(Balance {
            balance_cents: response.balance,
        })
    }

    /// Get open market positions
    #[instrument(skip(self))]
    pub async fn get_positions(&self) -> Result<Vec<MarketPosition>> {
        let response: PositionsResponse =
            self.execute(&Endpoint::get("/portfolio/positions")).await?;
        Ok(response.market_positions)
    }

    /// Submit a limit order.
    ///
    /// The body, including `client_order_id`, is serialized once; every retry
    /// resends the same bytes so the exchange can deduplicate.
    #[instrument(
        skip(self, order),
        fields(ticker = %order.ticker, client_order_id = %order.client_order_id)
    )]
    pub async fn create_order(&self, order: &OrderRequest) -> Result<Order> {
        order.validate()?;
        let endpoint = Endpoint::post_json("/portfolio/orders", &CreateOrderRequest::from(order))?;

        let response: OrderResponse = self.execute(&endpoint).await?;
        info!(
            order_id = %response.order.order_id,
            status = ?response.order.status,
            "Order accepted"
        );
        Ok(response.order)
    }

    /// Cancel a resting order
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: &str) -> Result<Order> {
        let order_id = path_segment("order_id", order_id)?;
        let endpoint = Endpoint::delete(format!("/portfolio/orders/{}", order_id));

        let response: OrderResponse = self.execute(&endpoint).await?;
        Ok(response.order)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Run the call and decode a successful body.
    ///
    /// Decoding happens after the retry loop so a malformed 2xx body is
    /// reported, never resubmitted.
    async fn execute<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<T> {
        let response = self.dispatch(endpoint).await?;
        serde_json::from_slice(&response.body).map_err(|e| {
            error!(path = %endpoint.path, error = %e, "Failed to decode response body");
            ClientError::from(e)
        })
    }

    async fn dispatch(&self, endpoint: &Endpoint) -> Result<HttpResponse> {
        let url = self.endpoint_url(endpoint)?;
        let mut context = self.retry_policy.start();

        loop {
            context.begin_attempt();
            let error = match self.attempt(endpoint, &url, context.attempt()).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            match self.retry_policy.should_retry(&context, &error) {
                RetryDecision::Retry { delay } => {
                    context.record_failure(&error);
                    let delay_ms = delay.as_millis() as u64;
                    if matches!(error, ClientError::RateLimited { .. }) {
                        warn!(
                            method = %endpoint.method,
                            path = %endpoint.path,
                            attempt = context.attempt(),
                            max_attempts = context.max_attempts(),
                            delay_ms,
                            "Rate limited, backing off"
                        );
                    } else {
                        warn!(
                            method = %endpoint.method,
                            path = %endpoint.path,
                            attempt = context.attempt(),
                            max_attempts = context.max_attempts(),
                            delay_ms,
                            error = %error,
                            "Transient failure, backing off"
                        );
                    }
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::Exhausted => {
                    context.record_failure(&error);
                    error!(
                        method = %endpoint.method,
                        path = %endpoint.path,
                        attempts = context.attempt(),
                        error = %error,
                        "Giving up after retries"
                    );
                    return Err(ClientError::RetryExhausted {
                        attempts: context.attempt(),
                        last_status: context.last_status(),
                        source: Box::new(error),
                    });
                }
                RetryDecision::Terminal => {
                    error!(
                        method = %endpoint.method,
                        path = %endpoint.path,
                        error = %error,
                        "Kalshi API error"
                    );
                    return Err(error);
                }
            }
        }
    }

    async fn attempt(&self, endpoint: &Endpoint, url: &Url, attempt: u32) -> Result<HttpResponse> {
        self.rate_limiter.acquire().await;

        // Signed after the limiter grants the slot so the timestamp is fresh.
        let signed = self.signer.sign(endpoint.method, url.path())?;
        debug!(
            method = %endpoint.method,
            path = url.path(),
            attempt,
            timestamp_ms = signed.timestamp_ms,
            "Dispatching request"
        );

        let mut headers = signed.headers;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let response = self
            .transport
            .send(HttpRequest {
                method: endpoint.method,
                url: url.clone(),
                headers,
                body: endpoint.body.clone(),
            })
            .await?;

        classify(response)
    }

    fn endpoint_url(&self, endpoint: &Endpoint) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, endpoint.path))?;
        if !endpoint.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(endpoint.query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }
}

impl std::fmt::Debug for KalshiRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KalshiRestClient")
            .field("base_url", &self.base_url)
            .field("signer", &self.signer)
            .field("rate_limiter", &self.rate_limiter)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

/// Map a raw response onto success or a classified error
pub(crate) fn classify(response: HttpResponse) -> Result<HttpResponse> {
    if response.is_success() {
        return Ok(response);
    }

    let status = response.status;
    let detail = serde_json::from_slice::<ApiErrorResponse>(&response.body)
        .ok()
        .map(|e| e.error);
    let message = detail
        .as_ref()
        .map(ApiErrorDetail::describe)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| response.text());
    let auth_failure = detail.as_ref().map(ApiErrorDetail::is_auth_failure).unwrap_or(false);

    Err(match status {
        429 => ClientError::RateLimited { status },
        401 | 403 => ClientError::AuthenticationRejected { status, message },
        500..=599 => ClientError::TransientTransport {
            status: Some(status),
            message,
        },
        _ if auth_failure => ClientError::AuthenticationRejected { status, message },
        _ => ClientError::BusinessRejection { status, message },
    })
}

fn path_segment<'a>(name: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() || value.contains(|c| matches!(c, '/' | '?' | '#')) {
        return Err(ClientError::Validation(format!("invalid {}: '{}'", name, value)));
    }
    Ok(value)
}

/// Convert the API order book into sorted, best-first levels
fn convert_order_book(ticker: &str, raw: RawOrderBook) -> OrderBook {
    OrderBook {
        ticker: ticker.to_string(),
        yes_bids: best_first(raw.yes),
        no_bids: best_first(raw.no),
        timestamp: Utc::now(),
    }
}

fn best_first(levels: Option<Vec<(i64, i64)>>) -> Vec<PriceLevel> {
    let mut levels: Vec<PriceLevel> = levels
        .unwrap_or_default()
        .into_iter()
        .map(|(price, quantity)| PriceLevel::new(price, quantity))
        .collect();
    levels.sort_by(|a, b| b.price_cents.cmp(&a.price_cents));
    levels
}
