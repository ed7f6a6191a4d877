//! Intent signature verification
//!
//! Every state-changing request carries `X-Intent-Signature`, the hex
//! HMAC-SHA256 of the raw request body under the shared intent secret.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::app::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-intent-signature";

/// Largest intent body accepted
pub const MAX_INTENT_BODY: usize = 64 * 1024;

/// Hex HMAC-SHA256 of `body`
pub fn sign_intent(body: &[u8], secret: &str) -> Result<String, IntentAuthError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| IntentAuthError::InvalidSignature)?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a hex signature against `body` in constant time
pub fn verify_intent(body: &[u8], signature: &str, secret: &str) -> Result<(), IntentAuthError> {
    let provided = hex::decode(signature.trim()).map_err(|_| IntentAuthError::InvalidFormat)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| IntentAuthError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| IntentAuthError::InvalidSignature)
}

/// Intent authentication errors
#[derive(Debug, thiserror::Error)]
pub enum IntentAuthError {
    #[error("Missing intent signature header")]
    MissingSignature,

    #[error("Intent signature is not valid hex")]
    InvalidFormat,

    #[error("Invalid intent signature")]
    InvalidSignature,

    #[error("Intent body too large or unreadable")]
    UnreadableBody,
}

impl IntoResponse for IntentAuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            IntentAuthError::MissingSignature => StatusCode::UNAUTHORIZED,
            IntentAuthError::InvalidFormat => StatusCode::BAD_REQUEST,
            IntentAuthError::InvalidSignature => StatusCode::UNAUTHORIZED,
            IntentAuthError::UnreadableBody => StatusCode::PAYLOAD_TOO_LARGE,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}

/// Middleware to require a signed intent body
pub async fn require_signed_intent(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, IntentAuthError> {
    let signature = request
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .ok_or(IntentAuthError::MissingSignature)?;

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_INTENT_BODY)
        .await
        .map_err(|_| IntentAuthError::UnreadableBody)?;

    if let Err(e) = verify_intent(&bytes, &signature, &state.config.intent_secret) {
        warn!(path = %parts.uri.path(), error = %e, "Rejected unsigned intent");
        return Err(e);
    }

    // Handlers read the body again
    let request = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(request).await)
}
