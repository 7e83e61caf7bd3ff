//! Authentication utilities for the Kalshi API
//!
//! Every request carries three headers: the API key id, a millisecond
//! timestamp, and an RSA-PSS (SHA-256, MGF1-SHA-256) signature over
//! `timestamp + METHOD + path`, base64 encoded.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::header::{HeaderMap, HeaderValue};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::pss::BlindedSigningKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::path::Path;

use crate::common::errors::{ClientError, Result};
use crate::common::traits::HttpMethod;

pub const ACCESS_KEY_HEADER: &str = "kalshi-access-key";
pub const ACCESS_TIMESTAMP_HEADER: &str = "kalshi-access-timestamp";
pub const ACCESS_SIGNATURE_HEADER: &str = "kalshi-access-signature";

const SHA256_OUTPUT_LEN: usize = 32;

/// PSS salt length
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaltLength {
    /// Largest salt the key modulus allows (`emLen - hLen - 2`)
    #[default]
    Max,
    /// Salt as long as the SHA-256 digest
    Digest,
}

impl SaltLength {
    fn resolve(self, key: &RsaPrivateKey) -> Result<usize> {
        match self {
            SaltLength::Digest => Ok(SHA256_OUTPUT_LEN),
            SaltLength::Max => {
                let em_len = (key.n().bits() + 6) / 8;
                em_len.checked_sub(SHA256_OUTPUT_LEN + 2).ok_or_else(|| {
                    ClientError::KeyLoad(format!(
                        "{}-bit key is too small for RSA-PSS with SHA-256",
                        key.n().bits()
                    ))
                })
            }
        }
    }
}

/// API key id paired with its RSA private key
pub struct Credential {
    key_id: String,
    private_key: RsaPrivateKey,
}

impl Credential {
    pub fn new(key_id: impl Into<String>, private_key: RsaPrivateKey) -> Self {
        Self {
            key_id: key_id.into(),
            private_key,
        }
    }

    /// Parse a PKCS#8 or PKCS#1 PEM private key.
    ///
    /// The PEM text stays inside the `SecretString` and is wiped when it is
    /// dropped at the end of this call.
    pub fn from_pem(key_id: impl Into<String>, pem: SecretString) -> Result<Self> {
        let text = pem.expose_secret();
        let private_key = RsaPrivateKey::from_pkcs8_pem(text).or_else(|pkcs8_err| {
            RsaPrivateKey::from_pkcs1_pem(text).map_err(|pkcs1_err| {
                ClientError::KeyLoad(format!(
                    "not a PKCS#8 ({}) or PKCS#1 ({}) RSA private key",
                    pkcs8_err, pkcs1_err
                ))
            })
        })?;

        Ok(Self::new(key_id, private_key))
    }

    /// Read and parse a PEM private key file
    pub fn from_pem_file(key_id: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path).map_err(|e| {
            ClientError::KeyLoad(format!(
                "cannot read private key at {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_pem(key_id, SecretString::from(pem))
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("key_id", &self.key_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Produces signed authentication headers.
///
/// Holds the private key read-only for its whole lifetime; share it behind an
/// `Arc` across tasks.
pub struct Signer {
    key_id: String,
    key_header: HeaderValue,
    signing_key: BlindedSigningKey<Sha256>,
    salt_len: usize,
}

impl Signer {
    /// Build a signer, taking ownership of the credential's key
    pub fn new(credential: Credential, salt: SaltLength) -> Result<Self> {
        let Credential {
            key_id,
            private_key,
        } = credential;

        if key_id.trim().is_empty() {
            return Err(ClientError::KeyLoad("API key id must not be empty".to_string()));
        }
        let key_header = HeaderValue::from_str(&key_id)
            .map_err(|e| ClientError::KeyLoad(format!("API key id is not a valid header: {}", e)))?;
        let salt_len = salt.resolve(&private_key)?;

        Ok(Self {
            key_id,
            key_header,
            signing_key: BlindedSigningKey::<Sha256>::new_with_salt_len(private_key, salt_len),
            salt_len,
        })
    }

    /// Parse PEM text and build a signer with the maximum salt length
    pub fn from_pem(key_id: impl Into<String>, pem: SecretString) -> Result<Self> {
        Self::new(Credential::from_pem(key_id, pem)?, SaltLength::Max)
    }

    /// Load a PEM key file and build a signer with the maximum salt length
    pub fn from_pem_file(key_id: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Credential::from_pem_file(key_id, path)?, SaltLength::Max)
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn salt_len(&self) -> usize {
        self.salt_len
    }

    /// Sign a request with the current wall-clock time
    pub fn sign(&self, method: HttpMethod, path: &str) -> Result<SignedRequest> {
        self.sign_at(chrono::Utc::now().timestamp_millis(), method, path)
    }

    /// Sign a request with an explicit millisecond timestamp.
    ///
    /// Query strings are not part of the signed message.
    pub fn sign_at(
        &self,
        timestamp_ms: i64,
        method: HttpMethod,
        path: &str,
    ) -> Result<SignedRequest> {
        let path = path.split('?').next().unwrap_or(path);
        let message = signing_message(timestamp_ms, method, path);

        let signature = self
            .signing_key
            .try_sign_with_rng(&mut rand::thread_rng(), message.as_bytes())
            .map_err(|e| ClientError::Signing(e.to_string()))?
            .to_vec();

        let encoded = BASE64.encode(&signature);
        let mut headers = HeaderMap::new();
        headers.insert(ACCESS_KEY_HEADER, self.key_header.clone());
        headers.insert(ACCESS_TIMESTAMP_HEADER, HeaderValue::from(timestamp_ms));
        let signature_header = HeaderValue::from_str(&encoded).map_err(|e| {
            ClientError::Signing(format!("signature is not a valid header: {}", e))
        })?;
        headers.insert(ACCESS_SIGNATURE_HEADER, signature_header);

        Ok(SignedRequest {
            method,
            path: path.to_string(),
            timestamp_ms,
            signature,
            headers,
        })
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("key_id", &self.key_id)
            .field("salt_len", &self.salt_len)
            .finish_non_exhaustive()
    }
}

/// `timestamp + METHOD + path`
pub fn signing_message(timestamp_ms: i64, method: HttpMethod, path: &str) -> String {
    format!("{}{}{}", timestamp_ms, method.as_str(), path)
}

/// Authentication material for a single attempt
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: HttpMethod,
    pub path: String,
    pub timestamp_ms: i64,
    pub signature: Vec<u8>,
    pub headers: HeaderMap,
}

impl SignedRequest {
    pub fn signature_base64(&self) -> String {
        BASE64.encode(&self.signature)
    }

    /// The exact bytes that were signed
    pub fn message(&self) -> String {
        signing_message(self.timestamp_ms, self.method, &self.path)
    }
}
