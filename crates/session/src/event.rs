// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

use crate::error::ErrorTag;
use crate::guard::SIGN_IN_PATH;

/// Session changes published by the controller.
///
/// Application wiring subscribes once and reacts to [`SessionEvent::SignedOut`]
/// by sending the user to the sign-in surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    SignedIn { user_id: Option<String> },
    Refreshed { user_id: Option<String> },
    #[serde(rename = "refresh:failed")]
    RefreshFailed { tag: ErrorTag, fatal: bool },
    SignedOut { reason: SignOutReason },
}

impl SessionEvent {
    /// Where the UI should navigate in response, if anywhere.
    pub fn redirect_target(&self) -> Option<&'static str> {
        match self {
            Self::SignedOut { .. } => Some(SIGN_IN_PATH),
            Self::SignedIn { .. } | Self::Refreshed { .. } | Self::RefreshFailed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignOutReason {
    UserRequested,
    /// The refresh token was past its expiry before any refresh was tried.
    RefreshTokenExpired,
    /// The refresh token is missing, or the backend confirmed it dead.
    RefreshRejected,
    /// The request was still rejected after a successful refresh.
    RetryRejected,
}
