// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Helpers shared by unit and integration tests.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};

/// Assert that `$expr` is an `Err` whose message contains `$substr`.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}

/// Build an unsigned JWT-shaped token carrying `claims`.
pub fn encode_token(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// Access token for a property owner expiring at `exp_secs`.
pub fn owner_token(exp_secs: u64) -> String {
    identity_token("u-100", "owner@example.com", "Ada", "Okafor", "property_owner", exp_secs)
}

/// Access token with the full identity claim set.
pub fn identity_token(
    id: &str,
    email: &str,
    first_name: &str,
    last_name: &str,
    role: &str,
    exp_secs: u64,
) -> String {
    encode_token(&json!({
        "id": id,
        "email": email,
        "first_name": first_name,
        "last_name": last_name,
        "role": role,
        "exp": exp_secs,
    }))
}

/// Refresh token expiring at `exp_secs`.
pub fn refresh_token(exp_secs: u64, nonce: &str) -> String {
    encode_token(&json!({ "id": "u-100", "kind": "refresh", "nonce": nonce, "exp": exp_secs }))
}
