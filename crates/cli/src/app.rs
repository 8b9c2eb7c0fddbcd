// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application wiring: session store, controller, gateway and clients.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tenantdesk_session::{
    AuthGateway, CredentialStore, FileStore, RefreshExecutor, SessionConfig, SessionController, SessionEvent,
    SessionPolicy, SessionSigner, SessionView,
};

use crate::api::ApiClient;
use crate::auth::{AuthClient, AuthError};
use crate::config::Config;

pub struct App {
    pub controller: Arc<SessionController>,
    pub gateway: Arc<AuthGateway>,
    pub auth: AuthClient,
    pub api: ApiClient,
}

impl App {
    /// Restore the session from the session file and wire everything to it.
    pub fn open(config: &Config) -> anyhow::Result<(Self, broadcast::Receiver<SessionEvent>)> {
        let secret = config
            .session_secret
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("session secret not configured (set TENANTDESK_SESSION_SECRET)"))?;
        let path = config.session_file();
        let store = FileStore::open(&path, SessionSigner::new(secret.as_bytes())?)?;
        tracing::debug!(path = %path.display(), restored = store.get().is_some(), "session store opened");
        Ok(Self::assemble(&config.session, config.session.policy()?, Arc::new(store)))
    }

    /// Wire the clients over `store` with an explicit policy.
    pub fn assemble(
        session: &SessionConfig,
        policy: SessionPolicy,
        store: Arc<dyn CredentialStore>,
    ) -> (Self, broadcast::Receiver<SessionEvent>) {
        let http = tenantdesk_session::http_client(session.timeout());
        let base = session.api_base();
        let refresher = Arc::new(RefreshExecutor::with_client(http.clone(), base.clone(), &policy));
        let (controller, events) = SessionController::new(store, refresher, policy);
        let gateway = Arc::new(AuthGateway::new(http.clone(), Arc::clone(&controller)));
        let app = Self {
            auth: AuthClient::new(http, base.clone()),
            api: ApiClient::new(Arc::clone(&gateway), base),
            controller,
            gateway,
        };
        (app, events)
    }

    /// Log in and install the resulting session.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionView, AuthError> {
        let pair = self.auth.login(email, password).await?;
        Ok(self.controller.install_login(pair))
    }
}

/// Spawn a task that sends the user to sign-in whenever the session ends.
///
/// `redirect` receives the ending event and the target path. Pending events
/// are drained before the task honours `shutdown`.
pub fn spawn_sign_out_watcher<F>(
    mut event_rx: broadcast::Receiver<SessionEvent>,
    shutdown: CancellationToken,
    mut redirect: F,
) -> JoinHandle<()>
where
    F: FnMut(&SessionEvent, &str) + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                event = event_rx.recv() => event,
                _ = shutdown.cancelled() => break,
            };
            let event = match event {
                Ok(e) => e,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!(skipped = n, "sign-out watcher lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event.redirect_target() {
                Some(target) => {
                    tracing::info!(?event, redirect = target, "session ended");
                    redirect(&event, target);
                }
                None => tracing::debug!(?event, "session event"),
            }
        }
    })
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
