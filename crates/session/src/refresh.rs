// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exchange of a refresh token for a new token pair.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use regex::Regex;
use reqwest::header::CACHE_CONTROL;
use reqwest::StatusCode;
use serde_json::Value;

use crate::clock::Clock;
use crate::config::{RefreshExpiryFallback, RefreshMethod, SessionConfig, SessionPolicy};
use crate::credential::{ACCESS_FALLBACK_MS, REFRESH_FALLBACK_MS};
use crate::error::{ConfigError, ErrorTag};
use crate::token;

/// Path of the refresh endpoint, relative to the API base.
pub const REFRESH_PATH: &str = "/auth/refresh-token";

/// Result of one refresh attempt. Never an error: every failure is tagged.
#[derive(Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed {
        access_token: String,
        refresh_token: String,
        access_token_expires_at: u64,
        /// `None` when undecodable and the expiry policy leaves it unknown.
        refresh_token_expires_at: Option<u64>,
    },
    Failed(RefreshFailure),
}

impl RefreshOutcome {
    fn failed(tag: ErrorTag, detail: impl Into<String>) -> Self {
        Self::Failed(RefreshFailure { tag, detail: detail.into() })
    }
}

impl fmt::Debug for RefreshOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Refreshed { access_token_expires_at, refresh_token_expires_at, .. } => f
                .debug_struct("Refreshed")
                .field("access_token_expires_at", access_token_expires_at)
                .field("refresh_token_expires_at", refresh_token_expires_at)
                .finish_non_exhaustive(),
            Self::Failed(failure) => f.debug_tuple("Failed").field(failure).finish(),
        }
    }
}

/// A classified refresh failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    pub tag: ErrorTag,
    /// Diagnostic detail for logs. Never shown to end users.
    pub detail: String,
}

impl RefreshFailure {
    pub fn is_fatal(&self) -> bool {
        self.tag.is_fatal()
    }
}

impl fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.tag)
        } else {
            write!(f, "{}: {}", self.tag, self.detail)
        }
    }
}

/// Anything that can exchange a refresh token for a new pair.
pub trait Refresher: Send + Sync {
    fn refresh<'a>(
        &'a self,
        refresh_token: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = RefreshOutcome> + Send + 'a>>;
}

/// Calls the backend refresh endpoint with the refresh token as bearer.
///
/// Only reports outcomes; sign-out policy belongs to the session controller.
pub struct RefreshExecutor {
    http: reqwest::Client,
    base: Result<String, ConfigError>,
    method: RefreshMethod,
    fallback: RefreshExpiryFallback,
    invalid_pattern: Regex,
    clock: Arc<dyn Clock>,
}

impl RefreshExecutor {
    pub fn new(config: &SessionConfig, policy: &SessionPolicy) -> Self {
        Self::with_client(crate::http_client(config.timeout()), config.api_base(), policy)
    }

    /// Build with an explicit client and base. A base error is reported as
    /// `MissingApiBase` on every attempt instead of failing construction.
    pub fn with_client(
        http: reqwest::Client,
        base: Result<String, ConfigError>,
        policy: &SessionPolicy,
    ) -> Self {
        Self {
            http,
            base,
            method: policy.refresh_method,
            fallback: policy.refresh_expiry_fallback,
            invalid_pattern: policy.invalid_refresh_pattern.clone(),
            clock: Arc::clone(&policy.clock),
        }
    }

    pub async fn perform(&self, refresh_token: Option<&str>) -> RefreshOutcome {
        let Some(refresh_token) = refresh_token.filter(|t| !t.is_empty()) else {
            return RefreshOutcome::failed(ErrorTag::NoRefreshToken, "");
        };
        let base = match &self.base {
            Ok(base) => base,
            Err(e) => return RefreshOutcome::failed(ErrorTag::MissingApiBase, e.to_string()),
        };

        let url = format!("{base}{REFRESH_PATH}");
        let request = match self.method {
            RefreshMethod::Get => self.http.get(&url),
            RefreshMethod::Post => self.http.post(&url).json(&serde_json::json!({})),
        };
        let resp = match request.bearer_auth(refresh_token).header(CACHE_CONTROL, "no-store").send().await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(err = %e, "refresh request failed");
                return RefreshOutcome::failed(ErrorTag::RefreshAccessTokenError, e.to_string());
            }
        };

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let body: Option<Value> = serde_json::from_str(&text).ok();

        if let Some(failure) = classify(status, body.as_ref(), &self.invalid_pattern) {
            tracing::debug!(%status, tag = %failure.tag, "refresh rejected");
            return RefreshOutcome::Failed(failure);
        }

        let data = body.as_ref().and_then(|b| b.get("data"));
        let access = data.and_then(|d| d.get("access_token")).and_then(Value::as_str);
        let refresh = data.and_then(|d| d.get("refresh_token")).and_then(Value::as_str);
        let (Some(access), Some(refresh)) =
            (access.filter(|t| !t.is_empty()), refresh.filter(|t| !t.is_empty()))
        else {
            return RefreshOutcome::failed(
                ErrorTag::MalformedRefreshResponse,
                "response missing access_token or refresh_token",
            );
        };

        let now = self.clock.now_ms();
        let access_token_expires_at = token::expiry_or_fallback(Some(access), now, ACCESS_FALLBACK_MS);
        let refresh_token_expires_at =
            token::decode_expiry_ms(Some(refresh)).or(match self.fallback {
                RefreshExpiryFallback::FifteenMinutes => Some(now.saturating_add(REFRESH_FALLBACK_MS)),
                RefreshExpiryFallback::Inherit => None,
            });
        tracing::debug!(access_token_expires_at, "refresh succeeded");

        RefreshOutcome::Refreshed {
            access_token: access.to_owned(),
            refresh_token: refresh.to_owned(),
            access_token_expires_at,
            refresh_token_expires_at,
        }
    }
}

impl Refresher for RefreshExecutor {
    fn refresh<'a>(
        &'a self,
        refresh_token: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = RefreshOutcome> + Send + 'a>> {
        Box::pin(self.perform(refresh_token))
    }
}

/// Classify a refresh response that cannot yield a new pair.
///
/// The refresh token is confirmed dead when the backend says so in its
/// message, or reports `statusCode: 400` in the body. Any other non-2xx is
/// transient. Returns `None` when the body should be inspected for tokens.
pub fn classify(status: StatusCode, body: Option<&Value>, invalid_pattern: &Regex) -> Option<RefreshFailure> {
    let message = body.and_then(|b| b.get("message")).and_then(Value::as_str).unwrap_or_default();
    let reported_failure = body.and_then(|b| b.get("success")).and_then(Value::as_bool) == Some(false);
    let body_status = body.and_then(|b| b.get("statusCode")).and_then(Value::as_u64);

    let rejected = !status.is_success() || reported_failure;
    if (rejected && !message.is_empty() && invalid_pattern.is_match(message)) || body_status == Some(400) {
        return Some(RefreshFailure { tag: ErrorTag::RefreshTokenInvalid, detail: message.to_owned() });
    }
    if !status.is_success() {
        let detail = if message.is_empty() {
            format!("refresh failed ({status})")
        } else {
            format!("refresh failed ({status}): {message}")
        };
        return Some(RefreshFailure { tag: ErrorTag::RefreshAccessTokenError, detail });
    }
    None
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
