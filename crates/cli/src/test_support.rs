// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted dashboard backend and app fixtures for unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use tenantdesk_session::clock::ManualClock;
use tenantdesk_session::test_support::{owner_token, refresh_token};
use tenantdesk_session::{MemoryStore, SessionConfig, SessionEvent, SessionView, TokenPair};

use crate::app::App;

pub const NOW_MS: u64 = 1_760_000_000_000;
pub const NOW_SECS: u64 = NOW_MS / 1000;

/// One request as the backend saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct Seen {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

/// Backend answering `"METHOD /path"` routes from scripted replies.
///
/// Replies for a route are served in order and the last one repeats. A
/// `Value::Null` body is sent as an empty (non-JSON) response.
#[derive(Clone, Default)]
pub struct MockApi {
    replies: Arc<Mutex<HashMap<String, Vec<(u16, Value)>>>>,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl MockApi {
    pub fn reply(&self, route: &str, status: u16, body: Value) -> &Self {
        self.replies.lock().entry(route.to_owned()).or_default().push((status, body));
        self
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }

    /// `"METHOD /path"` of every request, in order.
    pub fn routes(&self) -> Vec<String> {
        self.seen.lock().iter().map(|s| format!("{} {}", s.method, s.path)).collect()
    }

    pub async fn spawn(&self) -> anyhow::Result<String> {
        let app = Router::new().fallback(handle).with_state(self.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        Ok(format!("http://{addr}"))
    }
}

async fn handle(State(api): State<MockApi>, method: Method, uri: Uri, headers: HeaderMap, body: String) -> Response {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned);
    let route = format!("{method} {}", uri.path());
    api.seen.lock().push(Seen {
        method: method.to_string(),
        path: uri.path().to_owned(),
        query: uri.query().map(str::to_owned),
        bearer,
        body: serde_json::from_str(&body).ok(),
    });

    let reply = {
        let mut replies = api.replies.lock();
        match replies.get_mut(&route) {
            Some(queue) if queue.len() > 1 => Some(queue.remove(0)),
            Some(queue) => queue.first().cloned(),
            None => None,
        }
    };
    match reply {
        Some((status, Value::Null)) => status_code(status).into_response(),
        Some((status, body)) => (status_code(status), Json(body)).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "message": format!("no route {route}") }))).into_response(),
    }
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// App wired to `base` over an in-memory store and a manual clock at [`NOW_MS`].
pub fn app_for(base: &str) -> anyhow::Result<(App, broadcast::Receiver<SessionEvent>, Arc<ManualClock>)> {
    let session = SessionConfig { api_base_url: Some(base.to_owned()), ..SessionConfig::default() };
    let clock = Arc::new(ManualClock::new(NOW_MS));
    let policy = session.policy()?.with_clock(clock.clone());
    let (app, events) = App::assemble(&session, policy, Arc::new(MemoryStore::new()));
    Ok((app, events, clock))
}

/// Install an owner session valid for an hour.
pub fn sign_in(app: &App) -> SessionView {
    app.controller.install_login(TokenPair {
        access_token: owner_token(NOW_SECS + 3600),
        refresh_token: Some(refresh_token(NOW_SECS + 86_400, "r0")),
    })
}

/// Successful refresh envelope.
pub fn refreshed(access_token: &str) -> Value {
    json!({ "success": true, "data": {
        "access_token": access_token,
        "refresh_token": refresh_token(NOW_SECS + 90_000, "r1"),
    } })
}
