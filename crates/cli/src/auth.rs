// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unauthenticated account endpoints: login and password recovery.

use std::fmt;

use serde_json::{json, Value};
use tenantdesk_session::error::friendly_login_message;
use tenantdesk_session::{ConfigError, TokenPair};

use crate::api::{envelope_message, read_envelope, ApiError};

pub const LOGIN_PATH: &str = "/auth/login";
pub const FORGOT_PASSWORD_PATH: &str = "/auth/forgot-password";
pub const RESET_PASSWORD_PATH: &str = "/auth/reset-password";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Email or password was empty; nothing was sent.
    MissingCredentials,
    Config(ConfigError),
    /// The backend refused the login or could not be reached.
    /// `message` is already fit to show the user.
    Failed { message: String, status: Option<u16> },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredentials => f.write_str("Email and password are required"),
            Self::Config(e) => write!(f, "{e}"),
            Self::Failed { message, .. } => f.write_str(message),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<ConfigError> for AuthError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

fn failed(raw: &str, status: Option<u16>) -> AuthError {
    AuthError::Failed { message: friendly_login_message(raw), status }
}

pub struct AuthClient {
    http: reqwest::Client,
    base: Result<String, ConfigError>,
}

impl AuthClient {
    pub fn new(http: reqwest::Client, base: Result<String, ConfigError>) -> Self {
        Self { http, base }
    }

    /// Exchange email and password for a token pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        let base = self.base.clone()?;

        let resp = self
            .http
            .post(format!("{base}{LOGIN_PATH}"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(err = %e, "login request failed");
                failed(&e.to_string(), None)
            })?;

        let status = resp.status();
        let body: Option<Value> = resp.json().await.ok();
        if !status.is_success() {
            tracing::info!(status = %status, "login rejected");
            let raw = envelope_message(body.as_ref()).unwrap_or("Login failed");
            return Err(failed(raw, Some(status.as_u16())));
        }

        let invalid = || failed(envelope_message(body.as_ref()).unwrap_or("Invalid login response"), None);
        let Some(ref json) = body else {
            return Err(invalid());
        };
        if json.get("success").and_then(Value::as_bool) != Some(true) {
            return Err(invalid());
        }
        let data = json.get("data");
        let access_token = data
            .and_then(|d| d.get("access_token"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(invalid)?;
        let refresh_token = data
            .and_then(|d| d.get("refresh_token"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_owned);

        Ok(TokenPair { access_token: access_token.to_owned(), refresh_token })
    }

    /// Ask the backend to mail a reset link to `email`.
    pub async fn forgot_password(&self, email: &str) -> Result<Value, ApiError> {
        self.post(FORGOT_PASSWORD_PATH, json!({ "email": email.trim() })).await
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<Value, ApiError> {
        self.post(RESET_PASSWORD_PATH, json!({ "token": token.trim(), "newPassword": new_password })).await
    }

    /// POST `body` and return the envelope, or a default success envelope
    /// when the backend sends no JSON.
    async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        let base = self.base.as_ref().map_err(|e| ApiError::from(e.clone()))?;
        let resp = self
            .http
            .post(format!("{base}{path}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::new(e.to_string()))?;
        match read_envelope(resp, |status| format!("Request failed ({status})")).await? {
            Value::Null => Ok(json!({ "success": true, "message": "Success", "data": null })),
            envelope => Ok(envelope),
        }
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
