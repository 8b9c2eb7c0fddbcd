// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential and session view types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ErrorTag;
use crate::token::{self, TokenClaims};

/// Access token lifetime assumed when its `exp` claim cannot be read.
pub const ACCESS_FALLBACK_MS: u64 = 10 * 60 * 1000;

/// Refresh token lifetime assumed when its `exp` claim cannot be read.
pub const REFRESH_FALLBACK_MS: u64 = 15 * 60 * 1000;

/// Token pair as returned by the login endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// Identity claims cached from the access token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
}

impl Identity {
    pub fn from_claims(claims: &TokenClaims) -> Self {
        Self {
            user_id: claims.subject(),
            email: claims.email(),
            first_name: claims.first_name(),
            last_name: claims.last_name(),
            role: claims.role(),
        }
    }

    /// Claims from a renewed token laid over these; a claim the token
    /// leaves out keeps its current value.
    pub fn updated_from(&self, claims: &TokenClaims) -> Self {
        Self {
            user_id: claims.subject().or_else(|| self.user_id.clone()),
            email: claims.email().or_else(|| self.email.clone()),
            first_name: claims.first_name().or_else(|| self.first_name.clone()),
            last_name: claims.last_name().or_else(|| self.last_name.clone()),
            role: claims.role().or_else(|| self.role.clone()),
        }
    }

    /// "First Last", trimmed; empty when neither part is known.
    pub fn display_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or_default();
        let last = self.last_name.as_deref().unwrap_or_default();
        format!("{first} {last}").trim().to_owned()
    }
}

/// The live session secret pair. Replaced whole, never patched in place.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Milliseconds since the epoch.
    pub access_token_expires_at: u64,
    /// Milliseconds since the epoch; `None` when unknown.
    pub refresh_token_expires_at: Option<u64>,
    pub error: Option<ErrorTag>,
    pub identity: Identity,
}

impl Credential {
    /// Build the first credential of a session from the login response.
    ///
    /// Both expiries fall back to fixed lifetimes when the tokens cannot be
    /// decoded, and identity claims are decoded once here.
    pub fn issue(pair: TokenPair, now_ms: u64) -> Self {
        let access_token_expires_at =
            token::expiry_or_fallback(Some(&pair.access_token), now_ms, ACCESS_FALLBACK_MS);
        let refresh_token_expires_at =
            token::expiry_or_fallback(pair.refresh_token.as_deref(), now_ms, REFRESH_FALLBACK_MS);
        let identity = token::decode_payload(Some(&pair.access_token))
            .map(|claims| Identity::from_claims(&claims))
            .unwrap_or_default();
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            access_token_expires_at,
            refresh_token_expires_at: Some(refresh_token_expires_at),
            error: None,
            identity,
        }
    }

    /// Whether the access token is still usable `window_ms` from now.
    pub fn access_valid_at(&self, now_ms: u64, window_ms: u64) -> bool {
        now_ms.saturating_add(window_ms) < self.access_token_expires_at
    }

    /// Whether the refresh token is known to have expired.
    pub fn refresh_expired_at(&self, now_ms: u64) -> bool {
        matches!(self.refresh_token_expires_at, Some(at) if now_ms >= at)
    }

    pub fn with_error(&self, tag: ErrorTag) -> Self {
        Self { error: Some(tag), ..self.clone() }
    }

    /// Credential that replaces this one after a successful refresh.
    ///
    /// Identity claims carried by the new access token replace the cached
    /// ones; everything else is kept. An unknown refresh expiry inherits the
    /// previous one.
    pub fn renewed(
        &self,
        access_token: String,
        refresh_token: String,
        access_token_expires_at: u64,
        refresh_token_expires_at: Option<u64>,
    ) -> Self {
        let identity = token::decode_payload(Some(&access_token))
            .map(|claims| self.identity.updated_from(&claims))
            .unwrap_or_else(|| self.identity.clone());
        Self {
            access_token,
            refresh_token: Some(refresh_token),
            access_token_expires_at,
            refresh_token_expires_at: refresh_token_expires_at.or(self.refresh_token_expires_at),
            error: None,
            identity,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            access_token: self.access_token.clone(),
            user_id: self.identity.user_id.clone(),
            email: self.identity.email.clone(),
            name: self.identity.display_name(),
            first_name: self.identity.first_name.clone(),
            last_name: self.identity.last_name.clone(),
            role: self.identity.role.clone(),
            error: self.error,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("access_token_expires_at", &self.access_token_expires_at)
            .field("refresh_token_expires_at", &self.refresh_token_expires_at)
            .field("error", &self.error)
            .field("identity", &self.identity)
            .finish()
    }
}

/// Externally visible view of the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    #[serde(default, skip_serializing)]
    pub access_token: String,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub error: Option<ErrorTag>,
}

impl SessionView {
    pub fn is_vendor(&self) -> bool {
        self.role.as_deref() == Some("vendor")
    }
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
