//! Access token decoding.
//!
//! Tokens are JWT-shaped (`header.payload.signature`). Only the payload is
//! read; the signature is the server's concern and is never verified here.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;

/// Tokens expiring within this window are treated as already expired.
pub const DEFAULT_EXPIRY_SKEW_MS: i64 = 5 * 60 * 1000;

/// Why a token could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("token is not in header.payload.signature form")]
    Malformed,

    #[error("token payload is not base64url: {0}")]
    Base64(String),

    #[error("token claims are invalid: {0}")]
    Claims(String),
}

/// Claims the session core cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// User id carried in `id` (or the standard `sub`)
    pub subject_id: Option<String>,
    pub expires_at_ms: i64,
}

impl TokenClaims {
    pub fn is_expired_at(&self, now_ms: i64, skew_ms: i64) -> bool {
        self.expires_at_ms < now_ms.saturating_add(skew_ms)
    }
}

#[derive(Deserialize)]
struct RawClaims {
    exp: f64,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    sub: Option<String>,
}

/// Decode the claims of `token`.
pub fn decode(token: &str) -> Result<TokenClaims, DecodeError> {
    let mut parts = token.trim().split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_header), Some(payload), Some(_signature), None) if !payload.is_empty() => payload,
        _ => return Err(DecodeError::Malformed),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| DecodeError::Base64(e.to_string()))?;
    let raw: RawClaims =
        serde_json::from_slice(&bytes).map_err(|e| DecodeError::Claims(e.to_string()))?;

    if !raw.exp.is_finite() {
        return Err(DecodeError::Claims("exp is not a finite number".to_string()));
    }

    Ok(TokenClaims {
        subject_id: raw.id.or(raw.sub),
        expires_at_ms: (raw.exp * 1000.0) as i64,
    })
}

/// Expiry check against an explicit clock. Undecodable tokens count as expired.
pub fn is_expired_at(token: &str, now_ms: i64, skew_ms: i64) -> bool {
    match decode(token) {
        Ok(claims) => claims.is_expired_at(now_ms, skew_ms),
        Err(e) => {
            tracing::debug!(error = %e, "Treating undecodable token as expired");
            true
        }
    }
}

/// Expiry check against the system clock.
pub fn is_expired(token: &str, skew_ms: i64) -> bool {
    is_expired_at(token, Utc::now().timestamp_millis(), skew_ms)
}
