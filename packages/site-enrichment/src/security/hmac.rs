//! HMAC-SHA256 request signing for the enrichment trigger.
//!
//! Canonical string: `METHOD|PATH|TIMESTAMP_MS|BODY`, signed with the shared
//! secret and sent as `Authorization: HMAC <hex>` plus `X-Timestamp`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use super::credentials::SecretString;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_SCHEME: &str = "HMAC";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing or malformed authorization header")]
    MissingSignature,

    #[error("missing or malformed timestamp")]
    InvalidTimestamp,

    #[error("request expired (age {age_secs}s, max {max_secs}s)")]
    Expired { age_secs: i64, max_secs: u64 },

    #[error("request timestamp is too far in the future")]
    FromFuture,

    #[error("invalid signature")]
    InvalidSignature,
}

/// Verifies signed requests with replay protection.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    secret: SecretString,
    max_age: Duration,
    max_skew: Duration,
}

impl RequestSigner {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            max_age: Duration::from_secs(300),
            max_skew: Duration::from_secs(60),
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    fn mac(&self, method: &str, path: &str, timestamp_ms: i64, body: &[u8]) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose().as_bytes())
            .expect("HMAC can take a key of any size");
        mac.update(method.to_ascii_uppercase().as_bytes());
        mac.update(b"|");
        mac.update(path.as_bytes());
        mac.update(b"|");
        mac.update(timestamp_ms.to_string().as_bytes());
        mac.update(b"|");
        mac.update(body);
        mac
    }

    /// Hex signature for a request.
    pub fn sign(&self, method: &str, path: &str, timestamp_ms: i64, body: &[u8]) -> String {
        hex::encode(self.mac(method, path, timestamp_ms, body).finalize().into_bytes())
    }

    /// `Authorization` header value for a request.
    pub fn authorization(&self, method: &str, path: &str, timestamp_ms: i64, body: &[u8]) -> String {
        format!("{SIGNATURE_SCHEME} {}", self.sign(method, path, timestamp_ms, body))
    }

    /// Check freshness, then the signature in constant time.
    pub fn verify(
        &self,
        method: &str,
        path: &str,
        timestamp_ms: i64,
        body: &[u8],
        signature_hex: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        // The timestamp is caller-supplied; extreme values must not overflow.
        let age_ms = now
            .timestamp_millis()
            .checked_sub(timestamp_ms)
            .ok_or(SignatureError::InvalidTimestamp)?;
        if age_ms >= 0 && age_ms.unsigned_abs() > self.max_age.as_millis() as u64 {
            return Err(SignatureError::Expired {
                age_secs: age_ms / 1000,
                max_secs: self.max_age.as_secs(),
            });
        }
        if age_ms < 0 && age_ms.unsigned_abs() > self.max_skew.as_millis() as u64 {
            return Err(SignatureError::FromFuture);
        }

        let provided = hex::decode(signature_hex).map_err(|_| SignatureError::InvalidSignature)?;
        self.mac(method, path, timestamp_ms, body)
            .verify_slice(&provided)
            .map_err(|_| SignatureError::InvalidSignature)
    }
}

/// Pull the hex signature out of `HMAC <signature>`.
pub fn extract_signature(authorization: &str) -> Option<&str> {
    let mut parts = authorization.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(SIGNATURE_SCHEME), Some(sig), None) if !sig.is_empty() => Some(sig),
        _ => None,
    }
}

/// Parse an `X-Timestamp` header value (milliseconds since epoch).
pub fn parse_timestamp(value: &str) -> Result<i64, SignatureError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| SignatureError::InvalidTimestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn signer() -> RequestSigner {
        RequestSigner::new(SecretString::new("cron-secret"))
    }

    #[test]
    fn signed_request_verifies() {
        let now = Utc::now();
        let ts = now.timestamp_millis();
        let sig = signer().sign("post", "/api/cron/enrich-sites", ts, b"{}");

        assert_eq!(sig.len(), 64);
        signer()
            .verify("POST", "/api/cron/enrich-sites", ts, b"{}", &sig, now)
            .unwrap();
    }

    #[test]
    fn tampered_body_fails() {
        let now = Utc::now();
        let ts = now.timestamp_millis();
        let sig = signer().sign("POST", "/api/cron/enrich-sites", ts, b"{\"limit\":5}");

        let err = signer()
            .verify("POST", "/api/cron/enrich-sites", ts, b"{\"limit\":500}", &sig, now)
            .unwrap_err();
        assert_eq!(err, SignatureError::InvalidSignature);
    }

    #[test]
    fn replay_window_is_enforced() {
        let now = Utc::now();
        let old = (now - ChronoDuration::seconds(301)).timestamp_millis();
        let sig = signer().sign("GET", "/p", old, b"");
        assert!(matches!(
            signer().verify("GET", "/p", old, b"", &sig, now),
            Err(SignatureError::Expired { max_secs: 300, .. })
        ));

        let future = (now + ChronoDuration::seconds(61)).timestamp_millis();
        let sig = signer().sign("GET", "/p", future, b"");
        assert_eq!(
            signer().verify("GET", "/p", future, b"", &sig, now),
            Err(SignatureError::FromFuture)
        );

        let skewed = (now + ChronoDuration::seconds(30)).timestamp_millis();
        let sig = signer().sign("GET", "/p", skewed, b"");
        assert!(signer().verify("GET", "/p", skewed, b"", &sig, now).is_ok());
    }

    #[test]
    fn extreme_timestamps_are_rejected_without_overflow() {
        let now = Utc::now();
        assert_eq!(
            signer().verify("POST", "/api/cron/enrich-sites", i64::MIN, b"", "00", now),
            Err(SignatureError::InvalidTimestamp)
        );
        assert_eq!(
            signer().verify("POST", "/api/cron/enrich-sites", i64::MAX, b"", "00", now),
            Err(SignatureError::FromFuture)
        );

        let parsed = parse_timestamp("-9223372036854775808").unwrap();
        assert!(signer()
            .verify("POST", "/api/cron/enrich-sites", parsed, b"", "00", now)
            .is_err());
    }

    #[test]
    fn extracts_signature_from_header() {
        assert_eq!(extract_signature("HMAC abc123"), Some("abc123"));
        assert_eq!(extract_signature("Bearer abc123"), None);
        assert_eq!(extract_signature("HMAC"), None);
        assert_eq!(extract_signature("HMAC a b"), None);
    }
}
