//! Stripe webhook signature verification.
//!
//! Stripe signs webhook requests using HMAC-SHA256 over `"{timestamp}.{body}"`
//! and sends the result in the `Stripe-Signature` header.
//! Reference: https://docs.stripe.com/webhooks#verify-manually

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Reasons a request fails verification.
///
/// The `Display` text is returned to the caller in the 400 response body.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("No stripe-signature header value was provided.")]
    MissingHeader,

    #[error("Unable to extract timestamp and signatures from header")]
    MalformedHeader,

    #[error("No signatures found with expected scheme v1")]
    NoV1Signature,

    #[error("Invalid timestamp in signature header: {0}")]
    InvalidTimestamp(String),

    #[error("Timestamp outside the tolerance zone ({age_seconds}s > {tolerance_seconds}s)")]
    TimestampOutsideTolerance {
        age_seconds: u64,
        tolerance_seconds: u64,
    },

    #[error("No signatures found matching the expected signature for payload")]
    Mismatch,

    #[error("Signing secret is empty or unusable")]
    InvalidSecret,
}

/// Parsed `Stripe-Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: u64,
    pub v1: Vec<String>,
}

/// Parse a header of the form `t=1492774577,v1=5257a8...,v0=6ffbb5...`.
///
/// Multiple `v1` entries are kept (Stripe sends one per active secret during
/// secret rotation). Unknown schemes are ignored.
pub fn parse_signature_header(header: &str) -> Result<SignatureHeader, SignatureError> {
    let mut timestamp = None;
    let mut v1 = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };

        match key {
            "t" => timestamp = Some(value.to_string()),
            "v1" if !value.is_empty() => v1.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    let timestamp = timestamp
        .parse::<u64>()
        .map_err(|_| SignatureError::InvalidTimestamp(timestamp.clone()))?;

    if v1.is_empty() {
        return Err(SignatureError::NoV1Signature);
    }

    Ok(SignatureHeader { timestamp, v1 })
}

/// Compute the hex `v1` signature for a payload signed at `timestamp`.
pub fn compute_signature(
    secret: &str,
    timestamp: u64,
    payload: &[u8],
) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a Stripe webhook against the current clock.
///
/// # Arguments
///
/// * `secret` - The endpoint's signing secret
/// * `payload` - The raw request body, exactly as received
/// * `header` - The `Stripe-Signature` header value, if present
/// * `tolerance_seconds` - Maximum allowed distance between the signed timestamp and now
pub fn verify_stripe_signature(
    secret: &str,
    payload: &[u8],
    header: Option<&str>,
    tolerance_seconds: u64,
) -> Result<(), SignatureError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    verify_stripe_signature_at(secret, payload, header, tolerance_seconds, now)
}

/// Same as [`verify_stripe_signature`] with an explicit clock.
pub fn verify_stripe_signature_at(
    secret: &str,
    payload: &[u8],
    header: Option<&str>,
    tolerance_seconds: u64,
    now: u64,
) -> Result<(), SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::InvalidSecret);
    }

    let header = match header.map(str::trim) {
        Some(h) if !h.is_empty() => h,
        _ => {
            warn!("stripe_signature_missing_header");
            return Err(SignatureError::MissingHeader);
        }
    };

    let parsed = parse_signature_header(header).map_err(|e| {
        warn!(error = %e, header_length = header.len(), "stripe_signature_malformed");
        e
    })?;

    let expected = compute_signature(secret, parsed.timestamp, payload)?;

    // Constant-time comparison to prevent timing attacks
    if !parsed
        .v1
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        warn!(
            candidates = parsed.v1.len(),
            payload_length = payload.len(),
            "stripe_signature_mismatch"
        );
        return Err(SignatureError::Mismatch);
    }

    let age = now.abs_diff(parsed.timestamp);

    if age > tolerance_seconds {
        warn!(
            webhook_time = parsed.timestamp,
            current_time = now,
            age_seconds = age,
            max_age_seconds = tolerance_seconds,
            "stripe_signature_stale"
        );
        return Err(SignatureError::TimestampOutsideTolerance {
            age_seconds: age,
            tolerance_seconds,
        });
    }

    Ok(())
}

/// Constant-time string comparison to prevent timing attacks.
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
