//! Kalshi module - Authenticated client for the Kalshi trade API

pub mod auth;
pub mod client;
pub mod messages;
pub mod rate_limit;
pub mod rest;
pub mod retry;
pub mod transport;

pub use auth::{Credential, SaltLength, Signer};
pub use client::KalshiClient;
pub use rate_limit::RateLimiter;
pub use rest::KalshiRestClient;
pub use retry::{RetryConfig, RetryPolicy};
pub use transport::ReqwestTransport;

#[cfg(test)]
pub(crate) mod test_support {
    use once_cell::sync::Lazy;
    use rsa::RsaPrivateKey;
    use std::sync::Arc;

    use super::auth::{Credential, SaltLength, Signer};
    use super::rate_limit::RateLimiter;
    use super::rest::KalshiRestClient;
    use crate::common::traits::Transport;

    pub const TEST_BASE_URL: &str = "https://api.example.test/trade-api/v2";

    /// Small key so key generation stays fast in tests
    pub static TEST_KEY: Lazy<RsaPrivateKey> = Lazy::new(|| {
        RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("generate test key")
    });

    pub fn test_signer() -> Signer {
        Signer::new(Credential::new("test-key-id", TEST_KEY.clone()), SaltLength::Max)
            .expect("test signer")
    }

    /// Rest client over the given transport with no pacing
    pub fn rest_client_with(transport: impl Transport + 'static) -> KalshiRestClient {
        KalshiRestClient::with_transport(
            TEST_BASE_URL,
            Arc::new(test_signer()),
            Arc::new(RateLimiter::new(std::time::Duration::ZERO)),
            Arc::new(transport),
        )
        .expect("test client")
    }
}
