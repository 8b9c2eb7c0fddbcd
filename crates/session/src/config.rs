// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::error::ConfigError;

/// Backend message that marks the refresh token itself as dead.
pub const DEFAULT_INVALID_REFRESH_PATTERN: &str = "(?i)invalid or expired refresh token";

/// Which backend the dashboard is talking to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    #[default]
    Property,
    Hospitality,
}

impl fmt::Display for AppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Property => f.write_str("property"),
            Self::Hospitality => f.write_str("hospitality"),
        }
    }
}

impl FromStr for AppMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "property" => Ok(Self::Property),
            "hospitality" => Ok(Self::Hospitality),
            other => Err(format!("invalid mode: {other}")),
        }
    }
}

/// HTTP method the refresh endpoint expects.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshMethod {
    Get,
    #[default]
    Post,
}

impl fmt::Display for RefreshMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("get"),
            Self::Post => f.write_str("post"),
        }
    }
}

impl FromStr for RefreshMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "post" => Ok(Self::Post),
            other => Err(format!("invalid refresh method: {other}")),
        }
    }
}

/// What to assume for a refreshed refresh token whose expiry cannot be decoded.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshExpiryFallback {
    /// Assume the standard 15 minute lifetime.
    #[default]
    FifteenMinutes,
    /// Leave it unknown and keep the previous expiry.
    Inherit,
}

impl fmt::Display for RefreshExpiryFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FifteenMinutes => f.write_str("fifteen-minutes"),
            Self::Inherit => f.write_str("inherit"),
        }
    }
}

impl FromStr for RefreshExpiryFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fifteen-minutes" | "15m" => Ok(Self::FifteenMinutes),
            "inherit" | "none" => Ok(Self::Inherit),
            other => Err(format!("invalid refresh expiry fallback: {other}")),
        }
    }
}

/// Session and backend settings.
#[derive(Debug, Clone, clap::Args)]
pub struct SessionConfig {
    /// Base URL of the property backend.
    #[arg(long, env = "TENANTDESK_API_BASE_URL")]
    pub api_base_url: Option<String>,

    /// Base URL of the hospitality backend.
    #[arg(long, env = "TENANTDESK_API_BASE_URL_HOSPITALITY")]
    pub hospitality_api_base_url: Option<String>,

    /// Backend to use (property, hospitality).
    #[arg(long, env = "TENANTDESK_MODE", default_value = "property")]
    pub mode: AppMode,

    /// HTTP method of the refresh endpoint (get, post).
    #[arg(long, env = "TENANTDESK_REFRESH_METHOD", default_value = "post")]
    pub refresh_method: RefreshMethod,

    /// Refresh-token lifetime to assume when it cannot be decoded
    /// (fifteen-minutes, inherit).
    #[arg(long, env = "TENANTDESK_REFRESH_EXPIRY_FALLBACK", default_value = "fifteen-minutes")]
    pub refresh_expiry_fallback: RefreshExpiryFallback,

    /// Refresh this many milliseconds before the access token expires.
    #[arg(long, env = "TENANTDESK_REFRESH_WINDOW_MS", default_value_t = 5000)]
    pub refresh_window_ms: u64,

    /// Timeout for refresh and API calls in milliseconds.
    #[arg(long, env = "TENANTDESK_REFRESH_TIMEOUT_MS", default_value_t = 30000)]
    pub refresh_timeout_ms: u64,

    /// Regex matched against refresh error messages that mean the refresh
    /// token itself is invalid or expired.
    #[arg(long, env = "TENANTDESK_INVALID_REFRESH_PATTERN", default_value = DEFAULT_INVALID_REFRESH_PATTERN)]
    pub invalid_refresh_pattern: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            hospitality_api_base_url: None,
            mode: AppMode::Property,
            refresh_method: RefreshMethod::Post,
            refresh_expiry_fallback: RefreshExpiryFallback::FifteenMinutes,
            refresh_window_ms: 5000,
            refresh_timeout_ms: 30000,
            invalid_refresh_pattern: DEFAULT_INVALID_REFRESH_PATTERN.to_owned(),
        }
    }
}

impl SessionConfig {
    /// Validated base URL for the configured mode, without a trailing `/`.
    pub fn api_base(&self) -> Result<String, ConfigError> {
        self.api_base_for(self.mode)
    }

    pub fn api_base_for(&self, mode: AppMode) -> Result<String, ConfigError> {
        let raw = match mode {
            AppMode::Property => self.api_base_url.as_deref(),
            AppMode::Hospitality => self.hospitality_api_base_url.as_deref(),
        };
        validate_base(raw.unwrap_or_default(), mode)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    pub fn policy(&self) -> Result<SessionPolicy, ConfigError> {
        let invalid_refresh_pattern = Regex::new(&self.invalid_refresh_pattern).map_err(|e| {
            ConfigError::InvalidPattern {
                pattern: self.invalid_refresh_pattern.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(SessionPolicy {
            refresh_window_ms: self.refresh_window_ms,
            refresh_method: self.refresh_method,
            refresh_expiry_fallback: self.refresh_expiry_fallback,
            invalid_refresh_pattern,
            clock: Arc::new(SystemClock),
        })
    }
}

fn validate_base(raw: &str, mode: AppMode) -> Result<String, ConfigError> {
    let cleaned = raw.trim().trim_end_matches('/');
    if cleaned.is_empty() {
        return Err(ConfigError::MissingApiBase { mode });
    }
    match reqwest::Url::parse(cleaned) {
        Ok(url) if !url.cannot_be_a_base() => Ok(cleaned.to_owned()),
        _ => Err(ConfigError::InvalidApiBase { mode, value: cleaned.to_owned() }),
    }
}

/// Runtime knobs for the session controller and refresh executor.
#[derive(Clone)]
pub struct SessionPolicy {
    pub refresh_window_ms: u64,
    pub refresh_method: RefreshMethod,
    pub refresh_expiry_fallback: RefreshExpiryFallback,
    pub invalid_refresh_pattern: Regex,
    pub clock: Arc<dyn Clock>,
}

impl SessionPolicy {
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
