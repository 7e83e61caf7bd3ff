//! Error types for the application

use thiserror::Error;

/// Result type alias using our ClientError
pub type Result<T> = std::result::Result<T, ClientError>;

/// Main error type for client operations
///
/// Only terminal outcomes reach callers of the trading client. `RateLimited`
/// and `TransientTransport` are produced per attempt and consumed by the retry
/// loop; once attempts run out they surface wrapped in `RetryExhausted`.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Cryptographic failure while signing a request
    #[error("Signing error: {0}")]
    Signing(String),

    /// Private key could not be read or parsed
    #[error("Key load error: {0}")]
    KeyLoad(String),

    /// Server rejected the request with a rate-limit status
    #[error("Rate limited by server (status {status})")]
    RateLimited { status: u16 },

    /// Timeout, connection failure or 5xx response
    #[error("Transient transport error: {message}")]
    TransientTransport { status: Option<u16>, message: String },

    /// Signature or credential rejected by the server
    #[error("Authentication rejected (status {status}): {message}")]
    AuthenticationRejected { status: u16, message: String },

    /// Request understood but refused (insufficient balance, bad ticker, ...)
    #[error("Request rejected (status {status}): {message}")]
    BusinessRejection { status: u16, message: String },

    /// Retryable failures persisted until the attempt cap
    #[error("Retries exhausted after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        last_status: Option<u16>,
        #[source]
        source: Box<ClientError>,
    },

    /// Market not found
    #[error("Market not found: {0}")]
    MarketNotFound(String),

    /// Caller input rejected before any request was sent
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid API response
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Whether the retry policy may attempt the call again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::RateLimited { .. } | ClientError::TransientTransport { .. }
        )
    }

    /// HTTP status attached to this error, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::RateLimited { status }
            | ClientError::AuthenticationRejected { status, .. }
            | ClientError::BusinessRejection { status, .. } => Some(*status),
            ClientError::TransientTransport { status, .. } => *status,
            ClientError::RetryExhausted { last_status, .. } => *last_status,
            _ => None,
        }
    }

    /// True when the call gave up because the server kept answering 429
    pub fn is_rate_limit_exhausted(&self) -> bool {
        matches!(
            self,
            ClientError::RetryExhausted { source, .. }
                if matches!(**source, ClientError::RateLimited { .. })
        )
    }

    /// True when the call gave up on repeated timeouts, resets or 5xx
    pub fn is_transport_exhausted(&self) -> bool {
        matches!(
            self,
            ClientError::RetryExhausted { source, .. }
                if matches!(**source, ClientError::TransientTransport { .. })
        )
    }
}

/// Failure reported by a [`Transport`](crate::common::traits::Transport)
/// before any HTTP status was received
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete in time
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connect failure, reset or truncated response
    #[error("connection failed: {0}")]
    Connection(String),

    /// The request could not be built; sending it again will not help
    #[error("malformed request: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            TransportError::Request(err.to_string())
        } else if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else {
            TransportError::Connection(err.to_string())
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(_) | TransportError::Connection(_) => {
                ClientError::TransientTransport {
                    status: None,
                    message: err.to_string(),
                }
            }
            TransportError::Request(message) => ClientError::Internal(message),
        }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::Configuration(format!("invalid URL: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ClientError::RateLimited { status: 429 }.is_retryable());
        assert!(ClientError::TransientTransport {
            status: Some(503),
            message: "unavailable".to_string(),
        }
        .is_retryable());

        assert!(!ClientError::AuthenticationRejected {
            status: 401,
            message: "bad signature".to_string(),
        }
        .is_retryable());
        assert!(!ClientError::BusinessRejection {
            status: 400,
            message: "insufficient_balance".to_string(),
        }
        .is_retryable());
        assert!(!ClientError::Signing("boom".to_string()).is_retryable());
    }

    #[test]
    fn test_exhaustion_helpers() {
        let rate_limited = ClientError::RetryExhausted {
            attempts: 3,
            last_status: Some(429),
            source: Box::new(ClientError::RateLimited { status: 429 }),
        };
        assert!(rate_limited.is_rate_limit_exhausted());
        assert!(!rate_limited.is_transport_exhausted());
        assert_eq!(rate_limited.status(), Some(429));

        let transport = ClientError::RetryExhausted {
            attempts: 4,
            last_status: None,
            source: Box::new(ClientError::TransientTransport {
                status: None,
                message: "reset".to_string(),
            }),
        };
        assert!(transport.is_transport_exhausted());
        assert_eq!(transport.status(), None);
    }

    #[test]
    fn test_transport_error_mapping() {
        let err: ClientError = TransportError::Timeout("30s".to_string()).into();
        assert!(err.is_retryable());

        let err: ClientError = TransportError::Request("bad header".to_string()).into();
        assert!(!err.is_retryable());
    }
}
