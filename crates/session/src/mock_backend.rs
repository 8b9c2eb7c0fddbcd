// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted backend for refresh and gateway tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
pub struct MockBackend {
    pub refresh_calls: Arc<AtomicU32>,
    pub data_calls: Arc<AtomicU32>,
    pub refresh_methods: Arc<Mutex<Vec<String>>>,
    pub refresh_bearers: Arc<Mutex<Vec<String>>>,
    pub data_bearers: Arc<Mutex<Vec<String>>>,
    /// Bearer tokens `/data` accepts. Successful refreshes add theirs.
    pub accepted: Arc<Mutex<HashSet<String>>>,
    responses: Arc<Mutex<VecDeque<(u16, Value)>>>,
    refresh_delay_ms: Arc<AtomicU64>,
    reject_refreshed: Arc<AtomicBool>,
}

impl MockBackend {
    /// Queue refresh responses; the last one repeats.
    pub fn script(&self, responses: Vec<(u16, Value)>) -> &Self {
        self.responses.lock().extend(responses);
        self
    }

    pub fn accept(&self, token: &str) -> &Self {
        self.accepted.lock().insert(token.to_owned());
        self
    }

    pub fn delay_refresh(&self, ms: u64) -> &Self {
        self.refresh_delay_ms.store(ms, Ordering::Relaxed);
        self
    }

    /// Keep rejecting tokens minted by refresh, so retries see a 401 too.
    pub fn reject_refreshed_tokens(&self) -> &Self {
        self.reject_refreshed.store(true, Ordering::Relaxed);
        self
    }

    pub fn refresh_count(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn data_count(&self) -> u32 {
        self.data_calls.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> (u16, Value) {
        let mut queue = self.responses.lock();
        if queue.len() > 1 {
            queue.pop_front().unwrap_or((500, json!({})))
        } else {
            queue.front().cloned().unwrap_or((500, json!({})))
        }
    }

    /// Serve on an ephemeral port and return the base URL.
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/auth/refresh-token", get(refresh).post(refresh))
            .route("/data", get(data).post(data).put(data))
            .with_state(self.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{addr}")
    }
}

pub fn success(access: &str, refresh: &str) -> (u16, Value) {
    (200, json!({ "success": true, "data": { "access_token": access, "refresh_token": refresh } }))
}

pub fn invalid_refresh() -> (u16, Value) {
    (400, json!({ "success": false, "message": "Invalid or expired refresh token", "statusCode": 400 }))
}

fn bearer(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_owned()
}

async fn refresh(State(mock): State<MockBackend>, method: Method, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    mock.refresh_calls.fetch_add(1, Ordering::SeqCst);
    mock.refresh_methods.lock().push(method.to_string());
    mock.refresh_bearers.lock().push(bearer(&headers));
    let delay = mock.refresh_delay_ms.load(Ordering::Relaxed);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let (status, body) = mock.next_response();
    if let Some(token) = body.pointer("/data/access_token").and_then(Value::as_str) {
        if !mock.reject_refreshed.load(Ordering::Relaxed) {
            mock.accepted.lock().insert(token.to_owned());
        }
    }
    (StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), Json(body))
}

async fn data(State(mock): State<MockBackend>, headers: HeaderMap, body: String) -> (StatusCode, Json<Value>) {
    mock.data_calls.fetch_add(1, Ordering::SeqCst);
    let token = bearer(&headers);
    mock.data_bearers.lock().push(token.clone());
    if mock.accepted.lock().contains(&token) {
        (StatusCode::OK, Json(json!({ "ok": true, "echo": body })))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized" })))
    }
}
