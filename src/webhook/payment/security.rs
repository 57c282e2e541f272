//! Signature and timestamp verification for payment gateway webhooks
//!
//! The gateway signs every delivery following the Standard Webhooks scheme:
//! HMAC-SHA256 over `{webhook-id}.{webhook-timestamp}.{raw body}`, base64
//! encoded and sent in the `webhook-signature` header as a space separated
//! list of `v1,<signature>` entries (several entries appear while a secret
//! is being rotated).
//!
//! # Important Notes
//!
//! - The signature MUST be computed on the raw request body bytes, not parsed JSON
//! - The comparison is constant-time
//! - Neither the secret nor the received signature is ever logged

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::consts;

type HmacSha256 = Hmac<Sha256>;

/// The three headers every signed delivery carries
#[derive(Debug, Clone, Copy)]
pub struct WebhookHeaders<'a> {
    pub webhook_id: &'a str,
    pub timestamp: &'a str,
    pub signature: &'a str,
}

/// HMAC key for a configured secret. `whsec_` secrets carry a base64 key,
/// anything else is used as raw bytes.
pub fn signing_key(secret: &str) -> Vec<u8> {
    secret
        .strip_prefix(consts::WEBHOOK_SECRET_PREFIX)
        .and_then(|encoded| STANDARD.decode(encoded).ok())
        .unwrap_or_else(|| secret.as_bytes().to_vec())
}

fn compute_signature(
    key: &[u8],
    webhook_id: &str,
    timestamp: &str,
    payload: &[u8],
) -> Option<Vec<u8>> {
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(m) => m,
        Err(e) => {
            logfire::error!(
                "Failed to create HMAC instance: {error}",
                error = e.to_string()
            );
            return None;
        }
    };

    mac.update(webhook_id.as_bytes());
    mac.update(b".");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    Some(mac.finalize().into_bytes().to_vec())
}

/// Base64 signature for a delivery, as the gateway would send it (without
/// the version prefix)
pub fn sign(secret: &str, webhook_id: &str, timestamp: &str, payload: &[u8]) -> Option<String> {
    compute_signature(&signing_key(secret), webhook_id, timestamp, payload)
        .map(|signature| STANDARD.encode(signature))
}

/// Verifies the `webhook-signature` header against the raw request body.
///
/// Returns `true` when any `v1` entry of the header matches. Entries for other
/// versions and entries that are not valid base64 are ignored.
pub fn verify_signature(headers: &WebhookHeaders<'_>, payload: &[u8], secret: &str) -> bool {
    let Some(computed_signature) = compute_signature(
        &signing_key(secret),
        headers.webhook_id,
        headers.timestamp,
        payload,
    ) else {
        return false;
    };

    let is_valid = headers
        .signature
        .split_whitespace()
        .filter_map(|entry| match entry.split_once(',') {
            Some((version, signature)) if version == consts::WEBHOOK_SIGNATURE_VERSION => {
                Some(signature)
            }
            Some(_) => None,
            None => Some(entry),
        })
        .filter_map(|signature| STANDARD.decode(signature).ok())
        .any(|expected_signature| {
            computed_signature
                .ct_eq(&expected_signature[..])
                .into()
        });

    if !is_valid {
        logfire::warn!(
            "Webhook signature verification failed for {webhook_id}",
            webhook_id = headers.webhook_id.to_string()
        );
    }

    is_valid
}

/// Checks that the `webhook-timestamp` header (seconds since the epoch) is
/// within `tolerance` of `now`, in either direction.
pub fn verify_timestamp(timestamp: &str, tolerance: TimeDelta, now: DateTime<Utc>) -> bool {
    let Some(sent_at) = timestamp
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
    else {
        return false;
    };

    let drift = now.signed_duration_since(sent_at);
    drift <= tolerance && drift >= -tolerance
}
