// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use serde_json::json;

use super::*;
use crate::clock::ManualClock;
use crate::config::AppMode;
use crate::mock_backend::{invalid_refresh, success, MockBackend};
use crate::test_support::{owner_token, refresh_token};

const NOW_MS: u64 = 1_750_000_000_000;
const NOW_SECS: u64 = NOW_MS / 1000;

fn policy(method: RefreshMethod, fallback: RefreshExpiryFallback) -> anyhow::Result<SessionPolicy> {
    let config =
        SessionConfig { refresh_method: method, refresh_expiry_fallback: fallback, ..SessionConfig::default() };
    Ok(config.policy()?.with_clock(Arc::new(ManualClock::new(NOW_MS))))
}

fn executor(base: &str, policy: &SessionPolicy) -> RefreshExecutor {
    RefreshExecutor::with_client(crate::http_client(std::time::Duration::from_secs(5)), Ok(base.to_owned()), policy)
}

fn tag_of(outcome: &RefreshOutcome) -> Option<ErrorTag> {
    match outcome {
        RefreshOutcome::Failed(failure) => Some(failure.tag),
        RefreshOutcome::Refreshed { .. } => None,
    }
}

#[tokio::test]
async fn post_refresh_presents_refresh_token_as_bearer() -> anyhow::Result<()> {
    let mock = MockBackend::default();
    let access = owner_token(NOW_SECS + 3600);
    let refresh = refresh_token(NOW_SECS + 86_400, "r2");
    mock.script(vec![success(&access, &refresh)]);
    let base = mock.spawn().await;

    let policy = policy(RefreshMethod::Post, RefreshExpiryFallback::FifteenMinutes)?;
    let outcome = executor(&base, &policy).perform(Some("old-refresh")).await;

    assert_eq!(
        outcome,
        RefreshOutcome::Refreshed {
            access_token: access,
            refresh_token: refresh,
            access_token_expires_at: NOW_MS + 3_600_000,
            refresh_token_expires_at: Some(NOW_MS + 86_400_000),
        }
    );
    assert_eq!(*mock.refresh_methods.lock(), vec!["POST".to_owned()]);
    assert_eq!(*mock.refresh_bearers.lock(), vec!["old-refresh".to_owned()]);
    Ok(())
}

#[tokio::test]
async fn get_method_is_configurable() -> anyhow::Result<()> {
    let mock = MockBackend::default();
    mock.script(vec![success("opaque-a", "opaque-r")]);
    let base = mock.spawn().await;

    let policy = policy(RefreshMethod::Get, RefreshExpiryFallback::FifteenMinutes)?;
    let outcome = executor(&base, &policy).perform(Some("r1")).await;

    assert_eq!(*mock.refresh_methods.lock(), vec!["GET".to_owned()]);
    match outcome {
        RefreshOutcome::Refreshed { access_token_expires_at, refresh_token_expires_at, .. } => {
            assert_eq!(access_token_expires_at, NOW_MS + ACCESS_FALLBACK_MS);
            assert_eq!(refresh_token_expires_at, Some(NOW_MS + REFRESH_FALLBACK_MS));
        }
        other => anyhow::bail!("unexpected outcome: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn inherit_fallback_leaves_refresh_expiry_unknown() -> anyhow::Result<()> {
    let mock = MockBackend::default();
    mock.script(vec![success("opaque-a", "opaque-r")]);
    let base = mock.spawn().await;

    let policy = policy(RefreshMethod::Post, RefreshExpiryFallback::Inherit)?;
    let outcome = executor(&base, &policy).perform(Some("r1")).await;

    assert!(matches!(outcome, RefreshOutcome::Refreshed { refresh_token_expires_at: None, .. }));
    Ok(())
}

#[tokio::test]
async fn invalid_refresh_message_is_fatal() -> anyhow::Result<()> {
    let mock = MockBackend::default();
    mock.script(vec![invalid_refresh()]);
    let base = mock.spawn().await;

    let policy = policy(RefreshMethod::Post, RefreshExpiryFallback::FifteenMinutes)?;
    let outcome = executor(&base, &policy).perform(Some("r1")).await;

    assert_eq!(tag_of(&outcome), Some(ErrorTag::RefreshTokenInvalid));
    Ok(())
}

#[yare::parameterized(
    server_error   = { 500, json!({ "message": "Internal server error" }), ErrorTag::RefreshAccessTokenError },
    bad_gateway    = { 502, json!(null), ErrorTag::RefreshAccessTokenError },
    missing_tokens = { 200, json!({ "success": true, "data": {} }), ErrorTag::MalformedRefreshResponse },
    only_access    = { 200, json!({ "data": { "access_token": "a" } }), ErrorTag::MalformedRefreshResponse },
    empty_tokens   = { 200, json!({ "data": { "access_token": "", "refresh_token": "" } }),
                       ErrorTag::MalformedRefreshResponse },
)]
#[test_macro(tokio::test)]
async fn failed_refresh_is_tagged(status: u16, body: serde_json::Value, expected: ErrorTag) -> anyhow::Result<()> {
    let mock = MockBackend::default();
    mock.script(vec![(status, body)]);
    let base = mock.spawn().await;

    let policy = policy(RefreshMethod::Post, RefreshExpiryFallback::FifteenMinutes)?;
    let outcome = executor(&base, &policy).perform(Some("r1")).await;

    assert_eq!(tag_of(&outcome), Some(expected));
    Ok(())
}

#[tokio::test]
async fn missing_refresh_token_skips_network() -> anyhow::Result<()> {
    let mock = MockBackend::default();
    let base = mock.spawn().await;
    let policy = policy(RefreshMethod::Post, RefreshExpiryFallback::FifteenMinutes)?;
    let executor = executor(&base, &policy);

    assert_eq!(tag_of(&executor.perform(None).await), Some(ErrorTag::NoRefreshToken));
    assert_eq!(tag_of(&executor.perform(Some("")).await), Some(ErrorTag::NoRefreshToken));
    assert_eq!(mock.refresh_count(), 0);
    Ok(())
}

#[tokio::test]
async fn missing_base_is_reported_not_thrown() -> anyhow::Result<()> {
    let policy = policy(RefreshMethod::Post, RefreshExpiryFallback::FifteenMinutes)?;
    let executor = RefreshExecutor::with_client(
        reqwest::Client::new(),
        Err(ConfigError::MissingApiBase { mode: AppMode::Property }),
        &policy,
    );
    let outcome = executor.perform(Some("r1")).await;
    assert_eq!(tag_of(&outcome), Some(ErrorTag::MissingApiBase));
    Ok(())
}

#[tokio::test]
async fn unreachable_backend_is_transient() -> anyhow::Result<()> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);

    let policy = policy(RefreshMethod::Post, RefreshExpiryFallback::FifteenMinutes)?;
    let outcome = executor(&format!("http://{addr}"), &policy).perform(Some("r1")).await;
    assert_eq!(tag_of(&outcome), Some(ErrorTag::RefreshAccessTokenError));
    Ok(())
}

#[yare::parameterized(
    message_on_401   = { 401, json!({ "message": "Invalid or expired refresh token" }), Some(ErrorTag::RefreshTokenInvalid) },
    body_status_400  = { 400, json!({ "message": "Bad request", "statusCode": 400 }), Some(ErrorTag::RefreshTokenInvalid) },
    success_false    = { 200, json!({ "success": false, "message": "invalid or expired refresh token" }),
                         Some(ErrorTag::RefreshTokenInvalid) },
    plain_401        = { 401, json!({ "message": "Unauthorized" }), Some(ErrorTag::RefreshAccessTokenError) },
    ok_body          = { 200, json!({ "success": true }), None },
)]
fn classification(status: u16, body: serde_json::Value, expected: Option<ErrorTag>) -> anyhow::Result<()> {
    let pattern = Regex::new(crate::config::DEFAULT_INVALID_REFRESH_PATTERN)?;
    let status = StatusCode::from_u16(status)?;
    assert_eq!(classify(status, Some(&body), &pattern).map(|f| f.tag), expected);
    Ok(())
}

#[test]
fn outcome_debug_hides_tokens() {
    let outcome = RefreshOutcome::Refreshed {
        access_token: "secret-a".into(),
        refresh_token: "secret-r".into(),
        access_token_expires_at: 1,
        refresh_token_expires_at: None,
    };
    assert!(!format!("{outcome:?}").contains("secret"));
}
