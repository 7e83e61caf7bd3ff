//! Common test utilities and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use kalshi_trader::kalshi::rest::KalshiRestClient;
use kalshi_trader::{
    Credential, HttpRequest, HttpResponse, RateLimiter, RetryPolicy, SaltLength, Signer,
    Transport, TransportError,
};
use once_cell::sync::Lazy;
use rsa::pss::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use rsa::RsaPrivateKey;
use sha2::Sha256;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const TEST_KEY_ID: &str = "a952bcbe-ec3b-4b5b-b8f9-11dae589608c";
pub const API_PREFIX: &str = "/trade-api/v2";

/// Generated once per test binary
pub static TEST_KEY: Lazy<RsaPrivateKey> = Lazy::new(|| {
    RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("Failed to generate test key")
});

pub fn test_signer() -> Arc<Signer> {
    let credential = Credential::new(TEST_KEY_ID, TEST_KEY.clone());
    Arc::new(Signer::new(credential, SaltLength::Max).expect("Failed to build signer"))
}

/// Check a base64 signature header against the test key
pub fn signature_verifies(timestamp: &str, method: &str, path: &str, signature_b64: &str) -> bool {
    use base64::{engine::general_purpose::STANDARD, Engine};

    let Ok(raw) = STANDARD.decode(signature_b64) else {
        return false;
    };
    let Ok(signature) = Signature::try_from(raw.as_slice()) else {
        return false;
    };
    let salt_len = test_signer().salt_len();
    let verifying_key =
        VerifyingKey::<Sha256>::new_with_salt_len(TEST_KEY.to_public_key(), salt_len);
    let message = format!("{}{}{}", timestamp, method, path);
    verifying_key.verify(message.as_bytes(), &signature).is_ok()
}

/// A request as seen by [`ScriptedTransport`], with its virtual send time
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub request: HttpRequest,
    pub at: Instant,
}

impl SentRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.request
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(self.request.body.as_deref().unwrap_or(b"null"))
            .expect("request body is not JSON")
    }
}

/// In-memory transport that replays scripted outcomes in order, then keeps
/// answering with a fallback response
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    fallback: HttpResponse,
    sent: Mutex<Vec<SentRequest>>,
}

impl ScriptedTransport {
    pub fn new(
        script: Vec<Result<HttpResponse, TransportError>>,
        fallback: HttpResponse,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn always(response: HttpResponse) -> Arc<Self> {
        Self::new(Vec::new(), response)
    }

    pub fn requests(&self) -> Vec<SentRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Send times relative to `start`
    pub fn offsets_from(&self, start: Instant) -> Vec<Duration> {
        self.requests().iter().map(|r| r.at - start).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.sent.lock().unwrap().push(SentRequest {
            request,
            at: Instant::now(),
        });
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Rest client over `transport` sharing `limiter`
pub fn rest_client(
    transport: Arc<ScriptedTransport>,
    limiter: Arc<RateLimiter>,
    retry_policy: RetryPolicy,
) -> KalshiRestClient {
    KalshiRestClient::with_transport(
        &format!("https://api.example.test{}", API_PREFIX),
        test_signer(),
        limiter,
        transport,
    )
    .expect("Failed to create REST client")
    .with_retry_policy(retry_policy)
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

pub fn rate_limited() -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse::new(429, r#"{"error": {"code": "too_many_requests"}}"#))
}

/// Sample API responses for testing parsing
pub mod api_responses {
    pub const BALANCE: &str = r#"{"balance": 250075}"#;

    pub const ORDER_RESTING: &str = r#"{
        "order": {
            "order_id": "ee587a1c-8b87-4dcf-b721-9f6f790619fa",
            "client_order_id": "ignored-by-tests",
            "status": "resting",
            "ticker": "KXFED-25DEC-T4.00",
            "side": "yes",
            "action": "buy",
            "yes_price": 42,
            "no_price": 58,
            "created_time": "2025-06-10T14:03:11.123Z"
        }
    }"#;

    pub const MARKETS: &str = r#"{
        "markets": [
            {
                "ticker": "KXFED-25DEC-T4.00",
                "event_ticker": "KXFED-25DEC",
                "title": "Fed funds rate above 4.00% after December meeting?",
                "subtitle": "Above 4.00%",
                "status": "open",
                "yes_price": 42,
                "no_price": 58,
                "volume_24h": 15230,
                "open_interest": 88120,
                "close_time": "2025-12-10T19:00:00Z"
            },
            {
                "ticker": "KXFED-25DEC-T4.25",
                "event_ticker": "KXFED-25DEC",
                "title": "Fed funds rate above 4.25% after December meeting?",
                "subtitle": "Above 4.25%",
                "status": "open",
                "yes_price": 0,
                "no_price": 0,
                "volume_24h": 0,
                "open_interest": 0
            }
        ],
        "cursor": ""
    }"#;

    pub const INVALID_SIGNATURE: &str =
        r#"{"error": {"code": "INCORRECT_API_KEY_SIGNATURE", "message": "The signature is invalid"}}"#;
}
