//! Shopify webhook authentication.
//!
//! A webhook is accepted when its timestamp header is within the tolerance
//! window and its `X-Shopify-Hmac-Sha256` header equals
//! base64(HMAC-SHA256(app secret, raw body)).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

pub const HMAC_HEADER: &str = "x-shopify-hmac-sha256";
pub const TIMESTAMP_HEADER: &str = "x-shopify-webhook-timestamp";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookRejection {
    #[error("webhook timestamp missing or outside the accepted window")]
    StaleTimestamp,

    #[error("webhook signature mismatch")]
    BadSignature,
}

fn keyed(secret: &str, body: &[u8]) -> Result<HmacSha256, WebhookRejection> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookRejection::BadSignature)?;
    mac.update(body);
    Ok(mac)
}

/// Base64 HMAC-SHA256 of `body` under `secret`, as Shopify sends it.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, WebhookRejection> {
    Ok(STANDARD.encode(keyed(secret, body)?.finalize().into_bytes()))
}

/// Check a webhook's timestamp and signature.
///
/// `timestamp` is the raw header value in (possibly fractional) Unix seconds,
/// `now` the current Unix time in seconds.
pub fn verify_webhook(
    secret: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
    now: f64,
    tolerance_secs: u64,
) -> Result<(), WebhookRejection> {
    let sent_at: f64 = timestamp
        .and_then(|t| t.trim().parse().ok())
        .filter(|t: &f64| t.is_finite())
        .ok_or(WebhookRejection::StaleTimestamp)?;
    if (now - sent_at).abs() > tolerance_secs as f64 {
        return Err(WebhookRejection::StaleTimestamp);
    }

    let provided = signature
        .and_then(|s| STANDARD.decode(s.trim()).ok())
        .ok_or(WebhookRejection::BadSignature)?;

    // verify_slice compares in constant time
    keyed(secret, body)?
        .verify_slice(&provided)
        .map_err(|_| WebhookRejection::BadSignature)
}
