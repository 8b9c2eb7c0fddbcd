// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{OnceLock, Weak};
use std::time::Duration;

use super::*;
use crate::clock::ManualClock;
use crate::config::SessionConfig;
use crate::store::MemoryStore;
use crate::test_support::{owner_token, refresh_token};

const NOW_MS: u64 = 1_750_000_000_000;
const NOW_SECS: u64 = NOW_MS / 1000;

/// Refresher that replays scripted outcomes and counts calls.
struct ScriptedRefresher {
    calls: AtomicU32,
    outcomes: parking_lot::Mutex<VecDeque<RefreshOutcome>>,
    delay: Duration,
    seen_tokens: parking_lot::Mutex<Vec<Option<String>>>,
}

impl ScriptedRefresher {
    fn new(outcomes: Vec<RefreshOutcome>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            outcomes: parking_lot::Mutex::new(outcomes.into()),
            delay,
            seen_tokens: parking_lot::Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Refresher for ScriptedRefresher {
    fn refresh<'a>(
        &'a self,
        refresh_token: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = RefreshOutcome> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_tokens.lock().push(refresh_token.map(str::to_owned));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let mut outcomes = self.outcomes.lock();
            if outcomes.len() > 1 {
                outcomes.pop_front().unwrap_or_else(transient)
            } else {
                outcomes.front().cloned().unwrap_or_else(transient)
            }
        })
    }
}

fn refreshed(access: &str) -> RefreshOutcome {
    RefreshOutcome::Refreshed {
        access_token: access.to_owned(),
        refresh_token: refresh_token(NOW_SECS + 90_000, access),
        access_token_expires_at: NOW_MS + 7_200_000,
        refresh_token_expires_at: Some(NOW_MS + 90_000_000),
    }
}

fn transient() -> RefreshOutcome {
    RefreshOutcome::Failed(RefreshFailure { tag: ErrorTag::RefreshAccessTokenError, detail: "503".into() })
}

fn invalid() -> RefreshOutcome {
    RefreshOutcome::Failed(RefreshFailure {
        tag: ErrorTag::RefreshTokenInvalid,
        detail: "Invalid or expired refresh token".into(),
    })
}

struct Harness {
    controller: Arc<SessionController>,
    events: broadcast::Receiver<SessionEvent>,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    refresher: Arc<ScriptedRefresher>,
}

fn harness(outcomes: Vec<RefreshOutcome>, delay: Duration) -> anyhow::Result<Harness> {
    let clock = Arc::new(ManualClock::new(NOW_MS));
    let policy = SessionConfig::default().policy()?.with_clock(clock.clone());
    let store = Arc::new(MemoryStore::new());
    let refresher = ScriptedRefresher::new(outcomes, delay);
    let (controller, events) = SessionController::new(store.clone(), refresher.clone(), policy);
    Ok(Harness { controller, events, store, clock, refresher })
}

fn login(h: &Harness) -> SessionView {
    h.controller.install_login(TokenPair {
        access_token: owner_token(NOW_SECS + 3600),
        refresh_token: Some(refresh_token(NOW_SECS + 86_400, "r0")),
    })
}

fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test]
async fn login_installs_identity_and_expiry() -> anyhow::Result<()> {
    let mut h = harness(vec![refreshed("a1")], Duration::ZERO)?;
    let view = login(&h);

    assert_eq!(view.user_id.as_deref(), Some("u-100"));
    assert_eq!(view.name, "Ada Okafor");
    assert_eq!(h.controller.state(), SessionState::Valid);
    assert_eq!(h.store.get().map(|c| c.access_token_expires_at), Some(NOW_MS + 3_600_000));
    assert_eq!(drain(&mut h.events), vec![SessionEvent::SignedIn { user_id: Some("u-100".into()) }]);
    Ok(())
}

#[tokio::test]
async fn access_just_before_safety_window_does_not_refresh() -> anyhow::Result<()> {
    let h = harness(vec![refreshed("a1")], Duration::ZERO)?;
    let view = login(&h);
    h.clock.advance_ms(3_600_000 - 5_001);

    let credential = h.controller.access().await?;
    assert_eq!(credential.view(), view);
    assert_eq!(h.refresher.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn access_inside_safety_window_refreshes() -> anyhow::Result<()> {
    let h = harness(vec![refreshed("a1")], Duration::ZERO)?;
    login(&h);
    h.clock.advance_ms(3_600_000 - 4_999);
    assert_eq!(h.controller.state(), SessionState::Expired);

    let credential = h.controller.access().await?;
    assert_eq!(credential.access_token, "a1");
    assert_eq!(h.refresher.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn access_past_expiry_refreshes_once() -> anyhow::Result<()> {
    let mut h = harness(vec![refreshed("a1")], Duration::ZERO)?;
    login(&h);
    drain(&mut h.events);
    h.clock.advance_ms(3_601_000);
    assert_eq!(h.controller.state(), SessionState::Expired);

    let credential = h.controller.access().await?;
    assert_eq!(credential.access_token, "a1");
    assert_eq!(h.refresher.calls(), 1);
    assert_eq!(h.controller.state(), SessionState::Valid);

    // Fresh token now; no second refresh.
    h.controller.access().await?;
    assert_eq!(h.refresher.calls(), 1);
    assert_eq!(drain(&mut h.events), vec![SessionEvent::Refreshed { user_id: Some("u-100".into()) }]);
    Ok(())
}

#[tokio::test]
async fn refresh_presents_current_refresh_token() -> anyhow::Result<()> {
    let h = harness(vec![refreshed("a1")], Duration::ZERO)?;
    login(&h);
    h.clock.advance_ms(3_601_000);
    h.controller.access().await?;

    assert_eq!(*h.refresher.seen_tokens.lock(), vec![Some(refresh_token(NOW_SECS + 86_400, "r0"))]);
    Ok(())
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() -> anyhow::Result<()> {
    let h = harness(vec![refreshed("a1")], Duration::from_millis(50))?;
    login(&h);
    let old = h.controller.access().await?.access_token;
    h.clock.advance_ms(3_601_000);

    let (a, b, c) = tokio::join!(
        h.controller.access(),
        h.controller.access(),
        h.controller.refresh_after_rejection(&old),
    );

    assert_eq!(h.refresher.calls(), 1);
    assert_eq!(a?.access_token, "a1");
    assert_eq!(b?.access_token, "a1");
    assert_eq!(c?.access_token, "a1");
    Ok(())
}

#[tokio::test]
async fn concurrent_callers_share_one_failure() -> anyhow::Result<()> {
    let h = harness(vec![transient()], Duration::from_millis(50))?;
    login(&h);
    h.clock.advance_ms(3_601_000);

    let (a, b) = tokio::join!(h.controller.access(), h.controller.access());

    assert_eq!(h.refresher.calls(), 1);
    assert_eq!(a.as_ref().err().and_then(AccessError::tag), Some(ErrorTag::RefreshAccessTokenError));
    assert_eq!(a, b);
    Ok(())
}

#[tokio::test]
async fn confirmed_invalid_refresh_signs_out() -> anyhow::Result<()> {
    let mut h = harness(vec![invalid()], Duration::ZERO)?;
    login(&h);
    drain(&mut h.events);
    h.clock.advance_ms(3_601_000);

    let err = h.controller.access().await.err();
    assert_eq!(err.and_then(|e| e.tag()), Some(ErrorTag::RefreshTokenInvalid));
    assert!(h.store.get().is_none());
    assert_eq!(h.controller.state(), SessionState::Unauthenticated);

    let events = drain(&mut h.events);
    assert_eq!(
        events,
        vec![
            SessionEvent::RefreshFailed { tag: ErrorTag::RefreshTokenInvalid, fatal: true },
            SessionEvent::SignedOut { reason: SignOutReason::RefreshRejected },
        ]
    );
    assert_eq!(events.last().and_then(SessionEvent::redirect_target), Some("/sign-in"));
    Ok(())
}

#[tokio::test]
async fn transient_failure_keeps_session_for_next_call() -> anyhow::Result<()> {
    let mut h = harness(vec![transient(), refreshed("a2")], Duration::ZERO)?;
    login(&h);
    drain(&mut h.events);
    h.clock.advance_ms(3_601_000);

    assert!(h.controller.access().await.is_err());
    let kept = h.store.get().ok_or_else(|| anyhow::anyhow!("session cleared"))?;
    assert_eq!(kept.error, Some(ErrorTag::RefreshAccessTokenError));
    assert_eq!(h.controller.state(), SessionState::Expired);
    assert_eq!(
        drain(&mut h.events),
        vec![SessionEvent::RefreshFailed { tag: ErrorTag::RefreshAccessTokenError, fatal: false }]
    );

    let credential = h.controller.access().await?;
    assert_eq!(credential.access_token, "a2");
    assert_eq!(credential.error, None);
    assert_eq!(h.refresher.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn expired_refresh_token_is_not_sent() -> anyhow::Result<()> {
    let mut h = harness(vec![refreshed("a1")], Duration::ZERO)?;
    login(&h);
    drain(&mut h.events);
    h.clock.advance_ms(86_400_000);

    let err = h.controller.access().await.err();
    assert_eq!(err.and_then(|e| e.tag()), Some(ErrorTag::RefreshTokenExpired));
    assert_eq!(h.refresher.calls(), 0);
    assert!(h.store.get().is_none());
    assert!(drain(&mut h.events).contains(&SessionEvent::SignedOut { reason: SignOutReason::RefreshTokenExpired }));
    Ok(())
}

#[tokio::test]
async fn missing_refresh_token_is_fatal() -> anyhow::Result<()> {
    let h = harness(
        vec![RefreshOutcome::Failed(RefreshFailure { tag: ErrorTag::NoRefreshToken, detail: String::new() })],
        Duration::ZERO,
    )?;
    h.controller.install_login(TokenPair { access_token: owner_token(NOW_SECS + 60), refresh_token: None });
    h.clock.advance_ms(61_000);

    assert!(h.controller.access().await.is_err());
    assert_eq!(h.controller.state(), SessionState::Unauthenticated);
    Ok(())
}

#[tokio::test]
async fn rejection_of_stale_token_reuses_newer_credential() -> anyhow::Result<()> {
    let h = harness(vec![refreshed("a1")], Duration::ZERO)?;
    login(&h);
    let old = h.controller.access().await?.access_token;
    h.clock.advance_ms(3_601_000);
    h.controller.access().await?;

    let credential = h.controller.refresh_after_rejection(&old).await?;
    assert_eq!(credential.access_token, "a1");
    assert_eq!(h.refresher.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn rejection_refreshes_even_when_locally_valid() -> anyhow::Result<()> {
    let h = harness(vec![refreshed("a1")], Duration::ZERO)?;
    login(&h);
    let current = h.controller.access().await?.access_token;

    let credential = h.controller.refresh_after_rejection(&current).await?;
    assert_eq!(credential.access_token, "a1");
    assert_eq!(h.refresher.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn sign_out_discards_in_flight_refresh() -> anyhow::Result<()> {
    let h = harness(vec![refreshed("a1")], Duration::from_millis(100))?;
    login(&h);
    h.clock.advance_ms(3_601_000);

    let controller = Arc::clone(&h.controller);
    let pending = tokio::spawn(async move { controller.access().await });
    while h.controller.state() != SessionState::Refreshing {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    h.controller.sign_out();

    assert_eq!(pending.await?, Err(AccessError::Superseded));
    assert!(h.store.get().is_none());
    Ok(())
}

#[tokio::test]
async fn identity_survives_refresh_with_same_claims() -> anyhow::Result<()> {
    let h = harness(
        vec![RefreshOutcome::Refreshed {
            access_token: owner_token(NOW_SECS + 7200),
            refresh_token: refresh_token(NOW_SECS + 90_000, "r1"),
            access_token_expires_at: NOW_MS + 7_200_000,
            refresh_token_expires_at: None,
        }],
        Duration::ZERO,
    )?;
    let before = login(&h);
    h.clock.advance_ms(3_601_000);
    h.controller.access().await?;

    let after = h.controller.session().ok_or_else(|| anyhow::anyhow!("no session"))?;
    assert_eq!(after.user_id, before.user_id);
    assert_eq!(after.email, before.email);
    assert_eq!(after.name, before.name);
    assert_eq!(after.role, before.role);
    // Unknown refresh expiry keeps the previous one.
    assert_eq!(h.store.get().and_then(|c| c.refresh_token_expires_at), Some(NOW_MS + 86_400_000));
    Ok(())
}

#[tokio::test]
async fn user_sign_out_emits_event_once() -> anyhow::Result<()> {
    let mut h = harness(vec![refreshed("a1")], Duration::ZERO)?;
    login(&h);
    drain(&mut h.events);

    h.controller.sign_out();
    h.controller.sign_out();
    assert_eq!(drain(&mut h.events), vec![SessionEvent::SignedOut { reason: SignOutReason::UserRequested }]);
    assert!(matches!(h.controller.access().await, Err(AccessError::Unauthenticated)));
    Ok(())
}

/// Store that, once armed, lets another thread log in while the next read
/// is still in progress.
#[derive(Default)]
struct LoginDuringRead {
    inner: MemoryStore,
    armed: AtomicBool,
    controller: OnceLock<Weak<SessionController>>,
    login: parking_lot::Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl CredentialStore for LoginDuringRead {
    fn get(&self) -> Option<Credential> {
        let current = self.inner.get();
        if self.armed.swap(false, Ordering::SeqCst) {
            let controller = self.controller.get().and_then(Weak::upgrade);
            *self.login.lock() = Some(std::thread::spawn(move || {
                if let Some(controller) = controller {
                    controller.install_login(TokenPair {
                        access_token: "next-user".into(),
                        refresh_token: Some(refresh_token(NOW_SECS + 86_400, "next")),
                    });
                }
            }));
            std::thread::sleep(Duration::from_millis(50));
        }
        current
    }

    fn set(&self, credential: Credential) {
        self.inner.set(credential);
    }

    fn clear(&self) {
        self.inner.clear();
    }
}

#[tokio::test]
async fn login_racing_refresh_start_wins() -> anyhow::Result<()> {
    let clock = Arc::new(ManualClock::new(NOW_MS));
    let policy = SessionConfig::default().policy()?.with_clock(clock.clone());
    let store = Arc::new(LoginDuringRead::default());
    let refresher = ScriptedRefresher::new(vec![refreshed("a1")], Duration::from_millis(200));
    let (controller, _events) = SessionController::new(store.clone(), refresher.clone(), policy);
    let _ = store.controller.set(Arc::downgrade(&controller));

    controller.install_login(TokenPair {
        access_token: owner_token(NOW_SECS + 3600),
        refresh_token: Some(refresh_token(NOW_SECS + 86_400, "r0")),
    });
    let old = owner_token(NOW_SECS + 3600);
    store.armed.store(true, Ordering::SeqCst);

    let result = controller.refresh_after_rejection(&old).await;
    if let Some(login) = store.login.lock().take() {
        login.join().map_err(|_| anyhow::anyhow!("login thread panicked"))?;
    }

    assert_eq!(result, Err(AccessError::Superseded));
    assert_eq!(store.get().map(|c| c.access_token).as_deref(), Some("next-user"));
    Ok(())
}
