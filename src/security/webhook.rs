//! Verification of auth-provider webhooks (Svix signing scheme).
//!
//! The provider signs `"{msg_id}.{timestamp}.{body}"` with HMAC-SHA256 using
//! the base64 secret that follows the `whsec_` prefix, and sends one or more
//! space-separated `v1,<base64 signature>` entries. Any matching entry is
//! accepted.

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

pub const ID_HEADER: &str = "svix-id";
pub const TIMESTAMP_HEADER: &str = "svix-timestamp";
pub const SIGNATURE_HEADER: &str = "svix-signature";
const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";

#[cfg(test)]
pub const TEST_SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookError {
    #[error("Error occurred -- no svix headers")]
    MissingHeaders,
    #[error("webhook signing secret is not configured or not valid base64")]
    InvalidSecret,
    #[error("timestamp header is not a unix timestamp")]
    InvalidTimestamp,
    #[error("timestamp outside the accepted window")]
    Expired,
    #[error("Error verifying webhook")]
    InvalidSignature,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookHeaders {
    pub id: String,
    pub timestamp: String,
    pub signature: String,
}

impl WebhookHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, WebhookError> {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .filter(|v| !v.is_empty())
                .ok_or(WebhookError::MissingHeaders)
        };
        Ok(Self {
            id: get(ID_HEADER)?,
            timestamp: get(TIMESTAMP_HEADER)?,
            signature: get(SIGNATURE_HEADER)?,
        })
    }
}

#[derive(Clone)]
pub struct WebhookVerifier {
    key: Vec<u8>,
    tolerance_seconds: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_seconds", &self.tolerance_seconds)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn from_secret(secret: &str, tolerance_seconds: i64) -> Result<Self, WebhookError> {
        let encoded = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
        let key = BASE64
            .decode(encoded.trim())
            .map_err(|_| WebhookError::InvalidSecret)?;
        if key.is_empty() {
            return Err(WebhookError::InvalidSecret);
        }
        Ok(Self {
            key,
            tolerance_seconds,
        })
    }

    fn mac(&self) -> Result<HmacSha256, WebhookError> {
        HmacSha256::new_from_slice(&self.key).map_err(|_| WebhookError::InvalidSecret)
    }

    /// Base64 signature for one message, without the version prefix.
    pub fn sign(&self, msg_id: &str, timestamp: i64, payload: &[u8]) -> Result<String, WebhookError> {
        let mut mac = self.mac()?;
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    pub fn signature_header(&self, msg_id: &str, timestamp: i64, payload: &[u8]) -> Result<String, WebhookError> {
        Ok(format!("{SIGNATURE_VERSION},{}", self.sign(msg_id, timestamp, payload)?))
    }

    pub fn verify(&self, headers: &WebhookHeaders, payload: &[u8], now: i64) -> Result<(), WebhookError> {
        let timestamp: i64 = headers
            .timestamp
            .trim()
            .parse()
            .map_err(|_| WebhookError::InvalidTimestamp)?;

        if (now - timestamp).abs() > self.tolerance_seconds {
            warn!("Webhook {} rejected: timestamp {timestamp} outside tolerance", headers.id);
            return Err(WebhookError::Expired);
        }

        let expected = self.sign(&headers.id, timestamp, payload)?;
        let matched = parse_signature_header(&headers.signature)
            .filter(|(version, _)| *version == SIGNATURE_VERSION)
            .any(|(_, sig)| constant_time_compare(sig, &expected));

        if matched {
            Ok(())
        } else {
            warn!("Webhook {} rejected: signature mismatch", headers.id);
            Err(WebhookError::InvalidSignature)
        }
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Splits `"v1,abc v1,def"` into `(version, signature)` pairs.
pub fn parse_signature_header(header: &str) -> impl Iterator<Item = (&str, &str)> {
    header
        .split_whitespace()
        .filter_map(|entry| entry.split_once(','))
}
