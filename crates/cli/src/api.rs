// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dashboard endpoints behind the authenticated gateway.
//!
//! Every call goes through [`AuthGateway::execute`], so 401 recovery and
//! forced sign-out happen here without any endpoint-specific code. Payloads
//! are opaque JSON; only the envelope (`success`, `message`, `data`) is read.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tenantdesk_session::{ApiRequest, AuthGateway, ConfigError, GatewayError};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;

/// Failure of a dashboard call, shaped like the backend's error envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub message: String,
    pub status: Option<u16>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), status: None }
    }

    fn with_status(message: impl Into<String>, status: u16) -> Self {
        Self { message: message.into(), status: Some(status) }
    }

    /// Whether the user has to sign in before trying again.
    pub fn needs_sign_in(&self) -> bool {
        self.status == Some(401)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        Self { message: e.to_string(), status: e.status() }
    }
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        Self::new(e.to_string())
    }
}

/// Backend-provided `message`, if it carries one.
pub(crate) fn envelope_message(body: Option<&Value>) -> Option<&str> {
    body.and_then(|b| b.get("message")).and_then(Value::as_str).filter(|m| !m.is_empty())
}

/// Turn a finished response into its JSON body, or the call's error.
///
/// `fallback` builds the message from the status when the backend gives none.
pub(crate) async fn read_envelope(
    resp: reqwest::Response,
    fallback: impl FnOnce(u16) -> String,
) -> Result<Value, ApiError> {
    let status = resp.status();
    let body: Option<Value> = resp.json().await.ok();
    if !status.is_success() {
        let message = match envelope_message(body.as_ref()) {
            Some(m) => m.to_owned(),
            None => fallback(status.as_u16()),
        };
        return Err(ApiError::with_status(message, status.as_u16()));
    }
    Ok(body.unwrap_or(Value::Null))
}

fn data(body: &Value) -> Option<&Value> {
    body.get("data").filter(|d| is_present(d))
}

fn is_present(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// First present candidate, which must carry an `id`.
fn record<'a>(candidates: &[Option<&'a Value>], what: &str) -> Result<&'a Value, ApiError> {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|v| is_present(v))
        .filter(|v| v.get("id").is_some_and(is_present))
        .ok_or_else(|| ApiError::new(format!("Malformed {what} response")))
}

/// Work order fields the backend accepts on create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkOrderPayload {
    pub complain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_id: Option<String>,
}

/// Partial work order update; absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkOrderUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct NewTenant {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub property_id: String,
    /// Kept as text so leading zeros survive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apartment_number: Option<String>,
}

impl fmt::Debug for NewTenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewTenant")
            .field("email", &self.email)
            .field("property_id", &self.property_id)
            .finish_non_exhaustive()
    }
}

/// Headline counts for the dashboard overview.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_complaints: u64,
    pub open_complaints: u64,
    pub resolved_complaints: u64,
    pub assigned_vendors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_vendor_acceptance: Option<u64>,
}

impl DashboardStats {
    /// Normalise `data.stats` (or `data` itself) into the overview counts.
    ///
    /// Counts may arrive as numbers or numeric strings; anything else is 0.
    pub fn from_data(data: &Value) -> Self {
        let raw = data.get("stats").filter(|s| is_present(s)).unwrap_or(data);
        Self {
            total_complaints: count(raw.get("total")).unwrap_or(0),
            open_complaints: count(raw.get("open")).unwrap_or(0),
            resolved_complaints: count(raw.get("completed")).unwrap_or(0),
            assigned_vendors: count(raw.get("assigned")).unwrap_or(0),
            pending_vendor_acceptance: raw
                .get("pending_vendor_acceptance")
                .filter(|v| !v.is_null())
                .map(|v| count(Some(v)).unwrap_or(0)),
        }
    }
}

fn count(value: Option<&Value>) -> Option<u64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (n.is_finite() && n > 0.0).then_some(n as u64)
}

/// Client for the dashboard endpoints.
pub struct ApiClient {
    gateway: Arc<AuthGateway>,
    base: Result<String, ConfigError>,
}

impl ApiClient {
    pub fn new(gateway: Arc<AuthGateway>, base: Result<String, ConfigError>) -> Self {
        Self { gateway, base }
    }

    fn url(&self, path: &str) -> Result<String, ApiError> {
        let base = self.base.as_ref().map_err(|e| ApiError::from(e.clone()))?;
        Ok(format!("{base}{path}"))
    }

    async fn call(&self, request: ApiRequest, action: &str) -> Result<Value, ApiError> {
        let delivery = self.gateway.execute(&request).await?;
        if delivery.was_retried() {
            tracing::debug!(url = %request.url, "request succeeded after refresh");
        }
        read_envelope(delivery.into_response(), |status| format!("Failed to {action} ({status})")).await
    }

    // -- Complaints ---------------------------------------------------------

    pub async fn complaints(&self, page: u32, limit: u32) -> Result<Value, ApiError> {
        let request =
            ApiRequest::get(self.url("/complaints")?).with_query("page", page).with_query("limit", limit);
        let body = self.call(request, "fetch complaints").await?;
        data(&body).cloned().ok_or_else(|| ApiError::new("Malformed complaints response"))
    }

    pub async fn assign_vendor(&self, complaint_id: &str, vendor_id: &str) -> Result<Value, ApiError> {
        let request = ApiRequest::put(
            self.url("/complaints/assign-vendor")?,
            json!({ "complaint_id": complaint_id, "vendor_id": vendor_id }),
        );
        let body = self.call(request, "assign vendor").await?;
        complaint(&body, "assign vendor")
    }

    /// Move a complaint to `status` (e.g. `in-progress`, `completed`).
    pub async fn update_complaint_status(&self, id: &str, status: &str) -> Result<Value, ApiError> {
        let request = ApiRequest::put(self.url(&format!("/complaints/{id}/status"))?, json!({ "status": status }));
        let body = self.call(request, "update complaint").await?;
        complaint(&body, "update complaint")
    }

    pub async fn accept_work_order(&self, id: &str) -> Result<Value, ApiError> {
        let request = ApiRequest::new(
            reqwest::Method::PUT,
            self.url(&format!("/complaints/accept-work-order/{id}"))?,
        );
        let body = self.call(request, "accept work order").await?;
        complaint(&body, "accept work order")
    }

    /// Schedule a complaint visit on `date` (ISO date).
    pub async fn set_schedule(&self, complaint_id: &str, date: &str) -> Result<Value, ApiError> {
        let request = ApiRequest::put(
            self.url("/complaints/set-schedule")?,
            json!({ "complaint_id": complaint_id, "date": date }),
        );
        let body = self.call(request, "set schedule").await?;
        complaint(&body, "set schedule")
    }

    // -- Vendors ------------------------------------------------------------

    pub async fn vendors(&self, page: u32, limit: u32) -> Result<Value, ApiError> {
        let request = ApiRequest::get(self.url("/users/fetch/vendors")?)
            .with_query("page", page)
            .with_query("limit", limit);
        let body = self.call(request, "fetch vendors").await?;
        data(&body).cloned().ok_or_else(|| ApiError::new("Malformed vendors response"))
    }

    // -- Tenants ------------------------------------------------------------

    /// Tenants page, reshaped from `{users, pagination}` to `{tenants, pagination}`.
    pub async fn tenants(&self, page: u32, limit: u32) -> Result<Value, ApiError> {
        let request = ApiRequest::get(self.url("/users/fetch/property-users")?)
            .with_query("page", page)
            .with_query("limit", limit);
        let body = self.call(request, "fetch tenants").await?;
        let data = data(&body).ok_or_else(|| ApiError::new("Malformed tenants response"))?;
        let users = data
            .get("users")
            .filter(|u| u.is_array())
            .ok_or_else(|| ApiError::new("Malformed tenants response"))?;
        Ok(json!({
            "tenants": users,
            "pagination": data.get("pagination").cloned().unwrap_or(Value::Null),
        }))
    }

    pub async fn tenant(&self, id: &str) -> Result<Value, ApiError> {
        let request = ApiRequest::get(self.url(&format!("/users/fetch/property-users/{id}"))?);
        let body = self.call(request, "fetch tenant").await?;
        let data = data(&body);
        let user = data.and_then(|d| d.get("user"));
        let nested = user.and_then(|u| u.get("user"));
        record(&[nested, user, data], "tenant detail").cloned()
    }

    pub async fn add_tenant(&self, tenant: &NewTenant) -> Result<Value, ApiError> {
        let payload = serde_json::to_value(tenant).map_err(|e| ApiError::new(e.to_string()))?;
        let request = ApiRequest::post(self.url("/users/register/property-users")?, payload);
        let body = self.call(request, "add tenant").await?;
        let data = data(&body);
        record(&[data.and_then(|d| d.get("tenant")), data, Some(&body)], "add tenant").cloned()
    }

    pub async fn delete_tenant(&self, id: &str) -> Result<(), ApiError> {
        let request = ApiRequest::delete(self.url(&format!("/users/delete/property-users/{id}"))?);
        self.call(request, "delete tenant").await?;
        Ok(())
    }

    // -- Work orders --------------------------------------------------------

    pub async fn create_work_order(&self, payload: &WorkOrderPayload) -> Result<Value, ApiError> {
        let body = serde_json::to_value(payload).map_err(|e| ApiError::new(e.to_string()))?;
        let request = ApiRequest::post(self.url("/complaints/create")?, body);
        let body = self.call(request, "create work order").await?;
        work_order(&body, "create")
    }

    pub async fn update_work_order(&self, id: &str, update: &WorkOrderUpdate) -> Result<Value, ApiError> {
        let body = serde_json::to_value(update).map_err(|e| ApiError::new(e.to_string()))?;
        let request = ApiRequest::put(self.url(&format!("/complaints/{id}"))?, body);
        let body = self.call(request, "update work order").await?;
        work_order(&body, "update")
    }

    pub async fn work_order(&self, id: &str) -> Result<Value, ApiError> {
        let request = ApiRequest::get(self.url(&format!("/complaints/{id}"))?);
        let body = self.call(request, "fetch work order").await?;
        work_order(&body, "work order")
    }

    // -- Properties ---------------------------------------------------------

    pub async fn retract_vendor(&self, property_id: &str, vendor_id: &str) -> Result<(), ApiError> {
        let request = ApiRequest::delete(self.url("/properties/retract-vendor")?)
            .with_body(json!({ "property_id": property_id, "vendor_id": vendor_id }));
        self.call(request, "retract vendor").await?;
        Ok(())
    }

    // -- Dashboard ----------------------------------------------------------

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        let request = ApiRequest::get(self.url("/dashboard")?);
        let body = self.call(request, "fetch dashboard stats").await?;
        let data = data(&body).ok_or_else(|| ApiError::new("Malformed dashboard stats response"))?;
        Ok(DashboardStats::from_data(data))
    }
}

/// `data.complaint` of a complaint mutation.
fn complaint(body: &Value, what: &str) -> Result<Value, ApiError> {
    data(body)
        .and_then(|d| d.get("complaint"))
        .filter(|c| is_present(c))
        .cloned()
        .ok_or_else(|| ApiError::new(format!("Malformed {what} response")))
}

/// Work order record from `data.complaint`, else `data`, else the body.
fn work_order(body: &Value, what: &str) -> Result<Value, ApiError> {
    let data = data(body);
    record(&[data.and_then(|d| d.get("complaint")), data, Some(body)], what).cloned()
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
