//! HMAC request authentication for trigger endpoints.
//!
//! Callers sign `METHOD|PATH|TIMESTAMP|BODY` with the shared cron secret and
//! send `Authorization: HMAC <hex>` plus `X-Timestamp` (epoch millis). The
//! path is the bare request path; query strings are not signed.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use site_enrichment::security::hmac::{
    extract_signature, parse_timestamp, SignatureError, TIMESTAMP_HEADER,
};
use site_enrichment::RequestSigner;
use tracing::{debug, warn};

/// Signed bodies are small JSON payloads at most.
const MAX_SIGNED_BODY: usize = 64 * 1024;

/// Reject requests without a fresh, valid signature.
pub async fn hmac_auth_middleware(
    State(signer): State<Arc<RequestSigner>>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_SIGNED_BODY).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "error": "Request body too large" })),
            )
                .into_response()
        }
    };

    if let Err(e) = verify_request(&signer, &parts, &bytes) {
        warn!(path = %parts.uri.path(), error = %e, "HMAC verification failed");
        return unauthorized(&format!("Authentication failed: {e}"));
    }

    debug!(path = %parts.uri.path(), "Request authenticated via HMAC signature");
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn verify_request(signer: &RequestSigner, parts: &Parts, body: &[u8]) -> Result<(), SignatureError> {
    let signature = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_signature)
        .ok_or(SignatureError::MissingSignature)?;

    let timestamp = parts
        .headers
        .get(TIMESTAMP_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(SignatureError::InvalidTimestamp)
        .and_then(parse_timestamp)?;

    signer.verify(
        parts.method.as_str(),
        parts.uri.path(),
        timestamp,
        body,
        signature,
        Utc::now(),
    )
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}
