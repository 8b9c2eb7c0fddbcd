// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::AppMode;
use crate::refresh::RefreshFailure;

/// Message shown whenever a call ends because the session cannot be renewed.
pub const SIGN_IN_AGAIN: &str = "Please sign in again";

/// Message shown in place of transport-level failure details.
pub const TRY_AGAIN: &str = "Unable to reach the server. Please try again.";

/// Known-bad marker recorded on a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorTag {
    NoRefreshToken,
    MissingApiBase,
    MalformedRefreshResponse,
    RefreshAccessTokenError,
    RefreshTokenExpired,
    RefreshTokenInvalid,
}

impl ErrorTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoRefreshToken => "NoRefreshToken",
            Self::MissingApiBase => "MissingApiBase",
            Self::MalformedRefreshResponse => "MalformedRefreshResponse",
            Self::RefreshAccessTokenError => "RefreshAccessTokenError",
            Self::RefreshTokenExpired => "RefreshTokenExpired",
            Self::RefreshTokenInvalid => "RefreshTokenInvalid",
        }
    }

    /// Whether the session can never be renewed once this tag is seen.
    ///
    /// Fatal tags force sign-out. `MissingApiBase` is a configuration
    /// problem and is surfaced to the caller without touching the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoRefreshToken | Self::RefreshTokenExpired | Self::RefreshTokenInvalid)
    }

    /// Whether a later refresh attempt may still succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RefreshAccessTokenError | Self::MalformedRefreshResponse)
    }
}

impl fmt::Display for ErrorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration problems, raised on first use of the offending value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingApiBase { mode: AppMode },
    InvalidApiBase { mode: AppMode, value: String },
    InvalidPattern { pattern: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiBase { mode } => write!(f, "API base URL not configured for {mode}"),
            Self::InvalidApiBase { mode, value } => {
                write!(f, "invalid API base URL for {mode}: {value}")
            }
            Self::InvalidPattern { pattern, reason } => {
                write!(f, "invalid refresh error pattern {pattern:?}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Why the controller could not hand out a usable credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// No session is installed.
    Unauthenticated,
    /// Refresh failed. Fatal failures have already signed the session out.
    Refresh(RefreshFailure),
    /// The session was signed out or replaced while the refresh was in flight.
    Superseded,
}

impl AccessError {
    pub fn tag(&self) -> Option<ErrorTag> {
        match self {
            Self::Refresh(failure) => Some(failure.tag),
            Self::Unauthenticated | Self::Superseded => None,
        }
    }
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => f.write_str("not signed in"),
            Self::Refresh(failure) => write!(f, "token refresh failed: {failure}"),
            Self::Superseded => f.write_str("session ended while refreshing"),
        }
    }
}

impl std::error::Error for AccessError {}

/// Failure of an authenticated call.
///
/// Every unrecovered 401 surfaces as [`GatewayError::SignInRequired`] so UI
/// code can catch it generically.
#[derive(Debug)]
pub enum GatewayError {
    SignInRequired,
    /// Refresh hit a transient failure; the session is kept for the next call.
    RefreshUnavailable(ErrorTag),
    Transport(reqwest::Error),
}

impl GatewayError {
    /// HTTP-like status for callers that mirror the backend's error shape.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::SignInRequired => Some(401),
            Self::RefreshUnavailable(_) => Some(503),
            Self::Transport(_) => None,
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignInRequired => f.write_str(SIGN_IN_AGAIN),
            Self::RefreshUnavailable(_) => f.write_str(TRY_AGAIN),
            Self::Transport(e) => write!(f, "request failed: {e}"),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::SignInRequired | Self::RefreshUnavailable(_) => None,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e)
    }
}

/// Substrings of low-level failures that should never reach the user verbatim.
const TRANSPORT_MARKERS: &[&str] = &[
    "fetch failed",
    "network",
    "error sending request",
    "connection refused",
    "timed out",
    "dns error",
];

/// Reduce a login failure to one friendly line.
///
/// Transport-level failures collapse to a generic "try again"; backend
/// messages pass through (first line only).
pub fn friendly_login_message(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if TRANSPORT_MARKERS.iter().any(|m| lower.contains(m)) {
        return TRY_AGAIN.to_owned();
    }
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or_default();
    if line.is_empty() {
        "Login failed".to_owned()
    } else {
        line.to_owned()
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
