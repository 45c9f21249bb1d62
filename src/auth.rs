//! ThreatConnect HMAC request signing.
//!
//! Each request carries two headers:
//!
//! - `Timestamp`: Unix seconds.
//! - `Authorization`: `TC <access_id>:<signature>`.
//!
//! The signature is `base64(HMAC-SHA256(secret_key, message))` where the
//! message is `<path>?<query>:<METHOD>:<timestamp>`, or
//! `<path>:<METHOD>:<timestamp>` when there is no query string. Path and
//! query must be exactly what goes on the wire.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// API key pair used to sign requests.
#[derive(Clone)]
pub struct Credentials {
    pub access_id: String,
    secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_id", &self.access_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Header values for one signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub authorization: String,
    pub timestamp: String,
}

impl Credentials {
    pub fn new(access_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_id: access_id.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Sign a request at the current time.
    pub fn sign(&self, path: &str, query: Option<&str>, method: &str) -> SignedHeaders {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.sign_at(path, query, method, &timestamp)
    }

    /// Sign a request with an explicit timestamp.
    pub fn sign_at(
        &self,
        path: &str,
        query: Option<&str>,
        method: &str,
        timestamp: &str,
    ) -> SignedHeaders {
        let message = signing_message(path, query, method, timestamp);
        let signature = STANDARD.encode(hmac_sha256(self.secret_key.as_bytes(), message.as_bytes()));
        SignedHeaders {
            authorization: format!("TC {}:{}", self.access_id, signature),
            timestamp: timestamp.to_string(),
        }
    }
}

/// The string that gets signed.
pub fn signing_message(path: &str, query: Option<&str>, method: &str, timestamp: &str) -> String {
    match query.filter(|q| !q.is_empty()) {
        Some(q) => format!("{}?{}:{}:{}", path, q, method, timestamp),
        None => format!("{}:{}:{}", path, method, timestamp),
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Check `authorization` against the expected signature for a request.
///
/// Used by the mock API in tests.
pub fn verify(
    credentials: &Credentials,
    authorization: &str,
    path: &str,
    query: Option<&str>,
    method: &str,
    timestamp: &str,
) -> bool {
    credentials.sign_at(path, query, method, timestamp).authorization == authorization
}
