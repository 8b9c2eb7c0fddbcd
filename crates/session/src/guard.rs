// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Route guard for the dashboard sections.

use crate::credential::SessionView;

pub const SIGN_IN_PATH: &str = "/sign-in";

/// Prefixes that require a session.
pub const PROTECTED_PREFIXES: &[&str] = &["/vendor", "/property-owner", "/hospitality"];

const VENDOR_HOME: &str = "/vendor";
const OWNER_HOME: &str = "/property-owner/overview";
const HOSPITALITY_HOME: &str = "/hospitality/overview";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Send the user to this path (with query, if any).
    Redirect(String),
}

/// Decide whether `path` may be shown for `session`.
///
/// `callback_url` is the destination remembered on the sign-in page.
pub fn route_guard(path: &str, callback_url: Option<&str>, session: Option<&SessionView>) -> GuardDecision {
    let is_protected = PROTECTED_PREFIXES.iter().any(|p| path.starts_with(p));
    let is_vendor = session.is_some_and(SessionView::is_vendor);

    match session {
        Some(_) if path == SIGN_IN_PATH => {
            let home = if is_vendor {
                VENDOR_HOME
            } else if callback_url.unwrap_or_default().starts_with("/hospitality") {
                HOSPITALITY_HOME
            } else {
                OWNER_HOME
            };
            GuardDecision::Redirect(home.to_owned())
        }
        None if is_protected => GuardDecision::Redirect(sign_in_with_callback(path)),
        Some(_) if is_vendor && path.starts_with("/property-owner") => {
            GuardDecision::Redirect(VENDOR_HOME.to_owned())
        }
        Some(_) if !is_vendor && path.starts_with("/vendor") => GuardDecision::Redirect(OWNER_HOME.to_owned()),
        _ => GuardDecision::Allow,
    }
}

/// Sign-in path that remembers `path` as the callback.
pub fn sign_in_with_callback(path: &str) -> String {
    let mut url = match reqwest::Url::parse("http://localhost/sign-in") {
        Ok(url) => url,
        Err(_) => return SIGN_IN_PATH.to_owned(),
    };
    url.query_pairs_mut().append_pair("callbackUrl", path);
    format!("{}?{}", url.path(), url.query().unwrap_or_default())
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
