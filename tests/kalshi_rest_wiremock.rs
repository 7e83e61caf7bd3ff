//! End-to-end tests for the Kalshi REST client over real HTTP
//!
//! A local wiremock server stands in for the exchange; requests travel
//! through `ReqwestTransport` exactly as they would in production.

mod common;

use common::*;
use kalshi_trader::kalshi::auth::{
    ACCESS_KEY_HEADER, ACCESS_SIGNATURE_HEADER, ACCESS_TIMESTAMP_HEADER,
};
use kalshi_trader::kalshi::rest::KalshiRestClient;
use kalshi_trader::{
    Action, ClientError, KalshiClient, PlaceOrderParams, RateLimiter, RetryPolicy, SeriesParams,
    Side,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Short delays keep real-time retries fast
fn fast_policy() -> RetryPolicy {
    RetryPolicy::default().with_base_delay(ms(10))
}

fn json_body(status: u16, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_raw(body, "application/json")
}

fn create_test_client(server: &MockServer, policy: RetryPolicy) -> KalshiRestClient {
    KalshiRestClient::new(
        &format!("{}{}", server.uri(), API_PREFIX),
        test_signer(),
        Arc::new(RateLimiter::new(ms(5))),
    )
    .expect("Failed to create REST client")
    .with_retry_policy(policy)
}

fn header_str<'a>(request: &'a Request, name: &str) -> &'a str {
    request
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

// ============================================================================
// Authentication
// ============================================================================

#[test_log::test(tokio::test)]
async fn test_requests_carry_verifiable_signature() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trade-api/v2/portfolio/balance"))
        .and(header(ACCESS_KEY_HEADER, TEST_KEY_ID))
        .and(header_exists(ACCESS_TIMESTAMP_HEADER))
        .and(header_exists(ACCESS_SIGNATURE_HEADER))
        .respond_with(json_body(200, api_responses::BALANCE))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_test_client(&server, fast_policy());
    let balance = client.get_balance().await.unwrap();
    assert_eq!(balance.balance_cents, 250075);

    let requests = server.received_requests().await.unwrap();
    let request = &requests[0];
    let timestamp = header_str(request, ACCESS_TIMESTAMP_HEADER);
    assert!(timestamp.parse::<i64>().is_ok());
    assert!(signature_verifies(
        timestamp,
        "GET",
        "/trade-api/v2/portfolio/balance",
        header_str(request, ACCESS_SIGNATURE_HEADER),
    ));
}

#[tokio::test]
async fn test_query_string_is_sent_but_not_signed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trade-api/v2/markets"))
        .and(query_param("series_ticker", "KXFED"))
        .and(query_param("status", "open"))
        .and(query_param("limit", "200"))
        .respond_with(json_body(200, api_responses::MARKETS))
        .expect(1)
        .mount(&server)
        .await;

    let client = KalshiClient::new(create_test_client(&server, fast_policy()));
    let markets = client
        .series_markets(&SeriesParams {
            series_ticker: "KXFED".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(markets.len(), 2);
    assert_eq!(markets[1].yes_price_dollars(), None);

    let requests = server.received_requests().await.unwrap();
    assert!(signature_verifies(
        header_str(&requests[0], ACCESS_TIMESTAMP_HEADER),
        "GET",
        "/trade-api/v2/markets",
        header_str(&requests[0], ACCESS_SIGNATURE_HEADER),
    ));
}

#[tokio::test]
async fn test_rejected_signature_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trade-api/v2/portfolio/positions"))
        .respond_with(json_body(401, api_responses::INVALID_SIGNATURE))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_test_client(&server, fast_policy());
    let result = client.get_positions().await;

    assert!(matches!(
        result,
        Err(ClientError::AuthenticationRejected { status: 401, .. })
    ));
}

// ============================================================================
// Retries
// ============================================================================

#[tokio::test]
async fn test_rate_limit_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trade-api/v2/portfolio/balance"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/trade-api/v2/portfolio/balance"))
        .respond_with(json_body(200, api_responses::BALANCE))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_test_client(&server, fast_policy());
    let balance = client.get_balance().await.unwrap();

    assert_eq!(balance.balance_cents, 250075);
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trade-api/v2/markets/KXFED-25DEC-T4.00"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .expect(3)
        .mount(&server)
        .await;

    let client = create_test_client(&server, fast_policy().with_max_attempts(3));
    let err = client.get_market("KXFED-25DEC-T4.00").await.unwrap_err();

    assert!(err.is_transport_exhausted());
    assert!(matches!(
        err,
        ClientError::RetryExhausted {
            attempts: 3,
            last_status: Some(503),
            ..
        }
    ));
}

#[tokio::test]
async fn test_unknown_market_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trade-api/v2/markets/KXNOPE"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "not_found", "message": "market not found"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_test_client(&server, fast_policy());
    let result = client.get_market("KXNOPE").await;

    assert!(matches!(result, Err(ClientError::MarketNotFound(ref t)) if t == "KXNOPE"));
}

// ============================================================================
// Orders
// ============================================================================

#[tokio::test]
async fn test_order_id_survives_rate_limit_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/trade-api/v2/portfolio/orders"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/trade-api/v2/portfolio/orders"))
        .and(body_partial_json(json!({
            "ticker": "KXFED-25DEC-T4.00",
            "side": "yes",
            "action": "buy",
            "count": 3,
            "type": "limit",
            "yes_price": 55
        })))
        .respond_with(json_body(201, api_responses::ORDER_RESTING))
        .expect(1)
        .mount(&server)
        .await;

    let client = KalshiClient::new(create_test_client(&server, fast_policy()));
    let order = client
        .place_order(&PlaceOrderParams {
            ticker: "KXFED-25DEC-T4.00".to_string(),
            side: Side::Yes,
            action: Action::Buy,
            quantity: 3,
            price_cents: 55,
            client_order_id: None,
        })
        .await
        .unwrap();
    assert_eq!(order.order_id, "ee587a1c-8b87-4dcf-b721-9f6f790619fa");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let first: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let second: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(first["client_order_id"], second["client_order_id"]);
    assert!(first["client_order_id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_cancel_order() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/trade-api/v2/portfolio/orders/ee587a1c-8b87-4dcf-b721-9f6f790619fa"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "order": {"order_id": "ee587a1c-8b87-4dcf-b721-9f6f790619fa", "status": "canceled"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_test_client(&server, fast_policy());
    let order = client
        .cancel_order("ee587a1c-8b87-4dcf-b721-9f6f790619fa")
        .await
        .unwrap();

    assert_eq!(order.status, kalshi_trader::OrderStatus::Canceled);
}
