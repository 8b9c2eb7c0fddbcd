// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session and token lifecycle for the tenantdesk dashboard client.
//!
//! The [`controller::SessionController`] owns the only mutable session state
//! (through an injected [`store::CredentialStore`]), refreshes the access
//! token proactively before expiry, and serializes concurrent refreshes so a
//! single network call services every waiter. The
//! [`gateway::AuthGateway`] wraps outbound API calls with the bearer token and
//! recovers from server-side 401s with exactly one refresh and one retry.

pub mod clock;
pub mod config;
pub mod controller;
pub mod credential;
pub mod error;
pub mod event;
pub mod gateway;
pub mod guard;
#[cfg(test)]
mod mock_backend;
pub mod persist;
pub mod refresh;
pub mod store;
pub mod test_support;
pub mod token;

use std::sync::Once;

pub use clock::{Clock, SystemClock};
pub use config::{AppMode, RefreshExpiryFallback, RefreshMethod, SessionConfig, SessionPolicy};
pub use controller::{SessionController, SessionState};
pub use credential::{Credential, Identity, SessionView, TokenPair};
pub use error::{AccessError, ConfigError, ErrorTag, GatewayError};
pub use event::{SessionEvent, SignOutReason};
pub use gateway::{ApiRequest, AuthGateway, Delivery};
pub use guard::{route_guard, GuardDecision};
pub use persist::{FileStore, PersistError, SessionSigner, SessionSnapshot};
pub use refresh::{RefreshExecutor, RefreshFailure, RefreshOutcome, Refresher};
pub use store::{CredentialStore, MemoryStore};

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto_provider() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Build the shared HTTP client used for refresh and API calls.
pub fn http_client(timeout: std::time::Duration) -> reqwest::Client {
    ensure_crypto_provider();
    reqwest::Client::builder().timeout(timeout).build().unwrap_or_default()
}
