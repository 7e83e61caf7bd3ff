//! KalshiTrader Library
//!
//! An authenticated client for the Kalshi trading API: RSA-PSS request
//! signing, one rate limiter shared by every caller, and retries that keep an
//! order's client order id stable.

pub mod common;
pub mod config;
pub mod kalshi;

// Re-export commonly used types
pub use common::errors::{ClientError, Result, TransportError};
pub use common::traits::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use common::types::{
    Action, Balance, Market, MarketDetails, MarketPosition, Order, OrderBook, OrderRequest,
    OrderStatus, OrderType, Portfolio, PriceLevel, RankedMarket, Side,
};
pub use config::types::AppConfig;
pub use kalshi::auth::{Credential, SaltLength, SignedRequest, Signer};
pub use kalshi::client::{
    KalshiClient, PlaceOrderParams, SearchMarketsParams, SeriesParams, TrendingParams,
};
pub use kalshi::rate_limit::RateLimiter;
pub use kalshi::rest::{KalshiRestClient, MarketsPage, MarketsQuery};
pub use kalshi::retry::{RetryConfig, RetryDecision, RetryPolicy};
pub use kalshi::transport::ReqwestTransport;
