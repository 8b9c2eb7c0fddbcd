// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-effort bearer token inspection.
//!
//! Reads the claims segment of a JWT-shaped token without verifying the
//! signature. Every decode failure collapses to `None`; nothing here panics
//! or returns an error.

use base64::alphabet;
use base64::engine::general_purpose::GeneralPurpose;
use base64::engine::{DecodePaddingMode, GeneralPurposeConfig};
use base64::Engine;
use serde_json::Value;

/// Accepts both padded and unpadded input, and both alphabets once `+`/`/`
/// have been mapped onto the URL-safe ones.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Claims decoded from a token's payload segment.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenClaims {
    inner: Value,
}

impl TokenClaims {
    /// Subject id: the `id` claim, falling back to `sub`. Numeric ids are
    /// rendered as strings.
    pub fn subject(&self) -> Option<String> {
        self.text("id").or_else(|| self.text("sub"))
    }

    pub fn email(&self) -> Option<String> {
        self.text("email")
    }

    pub fn first_name(&self) -> Option<String> {
        self.text("first_name")
    }

    pub fn last_name(&self) -> Option<String> {
        self.text("last_name")
    }

    pub fn role(&self) -> Option<String> {
        self.text("role")
    }

    /// `exp` in seconds since the epoch. Zero, negative and non-numeric
    /// values count as absent.
    pub fn exp_secs(&self) -> Option<u64> {
        let exp = self.inner.get("exp")?.as_f64()?;
        if exp.is_finite() && exp >= 1.0 {
            Some(exp as u64)
        } else {
            None
        }
    }

    fn text(&self, key: &str) -> Option<String> {
        match self.inner.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Decode the payload segment of `token`.
pub fn decode_payload(token: Option<&str>) -> Option<TokenClaims> {
    let token = token?;
    let mut parts = token.split('.');
    let _header = parts.next()?;
    let payload = parts.next()?;

    let normalized: String = payload
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    let bytes = LENIENT.decode(normalized.as_bytes()).ok()?;
    let inner: Value = serde_json::from_slice(&bytes).ok()?;
    if !inner.is_object() {
        return None;
    }
    Some(TokenClaims { inner })
}

/// Expiry of `token` in milliseconds since the epoch.
pub fn decode_expiry_ms(token: Option<&str>) -> Option<u64> {
    decode_payload(token)?.exp_secs().map(|s| s.saturating_mul(1000))
}

/// Expiry of `token`, or `now_ms + fallback_ms` when it cannot be decoded.
pub fn expiry_or_fallback(token: Option<&str>, now_ms: u64, fallback_ms: u64) -> u64 {
    decode_expiry_ms(token).unwrap_or_else(|| now_ms.saturating_add(fallback_ms))
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
