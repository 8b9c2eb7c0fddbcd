// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session controller: owns the credential lifecycle, refreshes tokens with a
//! single in-flight refresh per session, and publishes session events.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::SessionPolicy;
use crate::credential::{Credential, SessionView, TokenPair};
use crate::error::{AccessError, ErrorTag};
use crate::event::{SessionEvent, SignOutReason};
use crate::refresh::{RefreshFailure, RefreshOutcome, Refresher};
use crate::store::CredentialStore;

const EVENT_CAPACITY: usize = 64;

/// Observable state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    Valid,
    Refreshing,
    /// Access token is past the safety window, or the last refresh failed.
    Expired,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Valid => "valid",
            Self::Refreshing => "refreshing",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The only writer of the credential store.
pub struct SessionController {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn Refresher>,
    policy: SessionPolicy,
    /// Held for the whole duration of a refresh.
    flight: tokio::sync::Mutex<()>,
    /// Bumped after every completed refresh.
    generation: AtomicU64,
    last_outcome: parking_lot::Mutex<Option<Result<Credential, AccessError>>>,
    /// Bumped on login and sign-out. Refresh results from an older epoch are dropped.
    epoch: parking_lot::Mutex<u64>,
    refreshing: AtomicBool,
    event_tx: broadcast::Sender<SessionEvent>,
}

/// Clears the refreshing flag even if the refresh future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SessionController {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn Refresher>,
        policy: SessionPolicy,
    ) -> (Arc<Self>, broadcast::Receiver<SessionEvent>) {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CAPACITY);
        let controller = Arc::new(Self {
            store,
            refresher,
            policy,
            flight: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            last_outcome: parking_lot::Mutex::new(None),
            epoch: parking_lot::Mutex::new(0),
            refreshing: AtomicBool::new(false),
            event_tx,
        });
        (controller, event_rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Install the credential from a successful login and start a new session.
    pub fn install_login(&self, pair: TokenPair) -> SessionView {
        let credential = Credential::issue(pair, self.policy.now_ms());
        let view = credential.view();
        {
            let mut epoch = self.epoch.lock();
            *epoch += 1;
            self.store.set(credential);
        }
        tracing::info!(user_id = ?view.user_id, role = ?view.role, "signed in");
        self.emit(SessionEvent::SignedIn { user_id: view.user_id.clone() });
        view
    }

    pub fn state(&self) -> SessionState {
        let Some(credential) = self.store.get() else {
            return SessionState::Unauthenticated;
        };
        if self.refreshing.load(Ordering::SeqCst) {
            return SessionState::Refreshing;
        }
        if credential.error.is_some()
            || !credential.access_valid_at(self.policy.now_ms(), self.policy.refresh_window_ms)
        {
            return SessionState::Expired;
        }
        SessionState::Valid
    }

    pub fn session(&self) -> Option<SessionView> {
        self.store.get().map(|c| c.view())
    }

    /// A credential whose access token is usable right now.
    ///
    /// Within the safety window the stored credential is returned untouched.
    /// Past it, the access token is refreshed first; concurrent callers share
    /// a single refresh call and its outcome.
    pub async fn access(&self) -> Result<Credential, AccessError> {
        let current = self.store.get().ok_or(AccessError::Unauthenticated)?;
        let window = self.policy.refresh_window_ms;
        if current.access_valid_at(self.policy.now_ms(), window) {
            return Ok(current);
        }
        self.single_flight(|credential, now| !credential.access_valid_at(now, window)).await
    }

    /// Refresh after the server rejected `rejected_access_token` with a 401.
    ///
    /// Runs regardless of the local expiry. If another caller already replaced
    /// the rejected token, its credential is returned without a second refresh.
    pub async fn refresh_after_rejection(&self, rejected_access_token: &str) -> Result<Credential, AccessError> {
        self.single_flight(|credential, _| credential.access_token == rejected_access_token).await
    }

    /// End the session at the user's request.
    pub fn sign_out(&self) {
        self.sign_out_for(SignOutReason::UserRequested);
    }

    /// End the session, discarding any refresh that is still in flight.
    pub fn sign_out_for(&self, reason: SignOutReason) {
        let had_session = {
            let mut epoch = self.epoch.lock();
            *epoch += 1;
            let had_session = self.store.get().is_some();
            self.store.clear();
            had_session
        };
        if had_session {
            tracing::info!(?reason, "signed out");
            self.emit(SessionEvent::SignedOut { reason });
        }
    }

    /// Run `perform_refresh` unless a refresh that completed while we waited
    /// already answered the question, or `needs_refresh` no longer holds.
    async fn single_flight(
        &self,
        needs_refresh: impl Fn(&Credential, u64) -> bool,
    ) -> Result<Credential, AccessError> {
        let seen = self.generation.load(Ordering::SeqCst);
        let _flight = self.flight.lock().await;

        if self.generation.load(Ordering::SeqCst) != seen {
            let shared = self.last_outcome.lock().clone();
            if let Some(outcome) = shared {
                tracing::debug!("joined in-flight refresh");
                return outcome;
            }
        }

        // Login and sign-out swap the store under this lock, so the epoch
        // always belongs to the credential read with it.
        let (epoch, current) = {
            let guard = self.epoch.lock();
            (*guard, self.store.get())
        };
        let current = current.ok_or(AccessError::Unauthenticated)?;
        let now = self.policy.now_ms();
        if !needs_refresh(&current, now) {
            return Ok(current);
        }

        let outcome = self.perform_refresh(epoch, current, now).await;
        *self.last_outcome.lock() = Some(outcome.clone());
        self.generation.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    async fn perform_refresh(&self, epoch: u64, current: Credential, now: u64) -> Result<Credential, AccessError> {
        if current.refresh_expired_at(now) {
            let failure = RefreshFailure {
                tag: ErrorTag::RefreshTokenExpired,
                detail: "refresh token past its expiry".to_owned(),
            };
            self.fail_fatally(epoch, &failure, SignOutReason::RefreshTokenExpired);
            return Err(AccessError::Refresh(failure));
        }

        let outcome = {
            let _in_flight = InFlight::start(&self.refreshing);
            self.refresher.refresh(current.refresh_token.as_deref()).await
        };

        match outcome {
            RefreshOutcome::Refreshed {
                access_token,
                refresh_token,
                access_token_expires_at,
                refresh_token_expires_at,
            } => {
                let renewed = current.renewed(
                    access_token,
                    refresh_token,
                    access_token_expires_at,
                    refresh_token_expires_at,
                );
                {
                    let guard = self.epoch.lock();
                    if *guard != epoch {
                        tracing::debug!("discarding refresh result for ended session");
                        return Err(AccessError::Superseded);
                    }
                    self.store.set(renewed.clone());
                }
                tracing::info!(user_id = ?renewed.identity.user_id, expires_at = renewed.access_token_expires_at, "session refreshed");
                self.emit(SessionEvent::Refreshed { user_id: renewed.identity.user_id.clone() });
                Ok(renewed)
            }
            RefreshOutcome::Failed(failure) if failure.is_fatal() => {
                self.fail_fatally(epoch, &failure, SignOutReason::RefreshRejected);
                Err(AccessError::Refresh(failure))
            }
            RefreshOutcome::Failed(failure) => {
                {
                    let guard = self.epoch.lock();
                    if *guard != epoch {
                        return Err(AccessError::Superseded);
                    }
                    self.store.set(current.with_error(failure.tag));
                }
                if failure.tag == ErrorTag::MissingApiBase {
                    tracing::error!(detail = %failure.detail, "refresh not configured");
                } else {
                    tracing::warn!(tag = %failure.tag, detail = %failure.detail, "refresh failed, keeping session");
                }
                self.emit(SessionEvent::RefreshFailed { tag: failure.tag, fatal: false });
                Err(AccessError::Refresh(failure))
            }
        }
    }

    /// Clear the session that was current at `epoch` and announce why.
    fn fail_fatally(&self, epoch: u64, failure: &RefreshFailure, reason: SignOutReason) {
        {
            let mut guard = self.epoch.lock();
            if *guard != epoch {
                return;
            }
            *guard += 1;
            self.store.clear();
        }
        tracing::warn!(tag = %failure.tag, "refresh token unusable, signing out");
        self.emit(SessionEvent::RefreshFailed { tag: failure.tag, fatal: true });
        self.emit(SessionEvent::SignedOut { reason });
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
