// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated request gateway.
//!
//! One logical call is `attempt -> maybe refresh -> retry once`. The retry is
//! a single straight-line step, so a call can never loop.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::controller::SessionController;
use crate::error::{AccessError, GatewayError};
use crate::event::SignOutReason;

/// Everything needed to (re)build one outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self { method, url: url.into(), query: Vec::new(), headers: Vec::new(), body: None }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, url).with_body(body)
    }

    pub fn put(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, url).with_body(body)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_owned(), value.to_string()));
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }
}

/// Response of an authenticated call, tagged with how it was obtained.
#[derive(Debug)]
pub enum Delivery {
    FirstAttempt(reqwest::Response),
    /// Sent again after a 401 and a successful refresh.
    Retried(reqwest::Response),
}

impl Delivery {
    pub fn was_retried(&self) -> bool {
        matches!(self, Self::Retried(_))
    }

    pub fn status(&self) -> StatusCode {
        self.response().status()
    }

    pub fn response(&self) -> &reqwest::Response {
        match self {
            Self::FirstAttempt(resp) | Self::Retried(resp) => resp,
        }
    }

    pub fn into_response(self) -> reqwest::Response {
        match self {
            Self::FirstAttempt(resp) | Self::Retried(resp) => resp,
        }
    }
}

pub struct AuthGateway {
    http: reqwest::Client,
    controller: Arc<SessionController>,
}

impl AuthGateway {
    pub fn new(http: reqwest::Client, controller: Arc<SessionController>) -> Self {
        Self { http, controller }
    }

    pub fn controller(&self) -> &Arc<SessionController> {
        &self.controller
    }

    /// Send `request` with the session's bearer token.
    ///
    /// Non-401 responses pass through untouched. A 401 triggers one reactive
    /// refresh and one retry; a second 401 signs the session out.
    pub async fn execute(&self, request: &ApiRequest) -> Result<Delivery, GatewayError> {
        let credential = self.controller.access().await.map_err(proactive_failure)?;

        let first = self.send(request, &credential.access_token).await?;
        if first.status() != StatusCode::UNAUTHORIZED {
            return Ok(Delivery::FirstAttempt(first));
        }

        tracing::debug!(method = %request.method, url = %request.url, "request rejected, refreshing");
        let renewed = match self.controller.refresh_after_rejection(&credential.access_token).await {
            Ok(renewed) => renewed,
            Err(e) => {
                // Fatal failures already signed out. Transient ones keep the
                // session for the next call, but this call is over.
                tracing::debug!(err = %e, "reactive refresh failed");
                return Err(GatewayError::SignInRequired);
            }
        };

        let second = self.send(request, &renewed.access_token).await?;
        if second.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(method = %request.method, url = %request.url, "retry rejected, signing out");
            self.controller.sign_out_for(SignOutReason::RetryRejected);
            return Err(GatewayError::SignInRequired);
        }
        Ok(Delivery::Retried(second))
    }

    async fn send(&self, request: &ApiRequest, bearer: &str) -> Result<reqwest::Response, GatewayError> {
        let mut builder = self.http.request(request.method.clone(), &request.url).bearer_auth(bearer);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }
}

fn proactive_failure(err: AccessError) -> GatewayError {
    match err {
        AccessError::Refresh(failure) if !failure.is_fatal() => GatewayError::RefreshUnavailable(failure.tag),
        AccessError::Unauthenticated | AccessError::Superseded | AccessError::Refresh(_) => {
            GatewayError::SignInRequired
        }
    }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
