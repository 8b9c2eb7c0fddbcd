// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;
use tenantdesk_session::SessionConfig;

use crate::command::account::{ForgotPasswordArgs, GuardArgs, LoginArgs, ResetPasswordArgs};
use crate::command::records::{ComplaintsArgs, PropertiesArgs, TenantsArgs, VendorsArgs, WorkOrdersArgs};

/// Command-line client for the tenantdesk maintenance dashboard.
#[derive(Debug, Parser)]
#[command(name = "tenantdesk", version, about)]
pub struct Config {
    #[command(flatten)]
    pub session: SessionConfig,

    /// Signed session file (defaults to the user state directory).
    #[arg(long, env = "TENANTDESK_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    /// Secret the session file is signed with.
    #[arg(long, env = "TENANTDESK_SESSION_SECRET", hide_env_values = true)]
    pub session_secret: Option<String>,

    /// Log format (json or text).
    #[arg(long, env = "TENANTDESK_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "TENANTDESK_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Sign in and keep the session.
    Login(LoginArgs),
    /// Sign out and forget the session.
    Logout,
    /// Show the signed-in user and session state.
    Whoami,
    /// Show where a dashboard path leads for the current session.
    Guard(GuardArgs),
    /// Request a password reset email.
    ForgotPassword(ForgotPasswordArgs),
    /// Set a new password with a reset token.
    ResetPassword(ResetPasswordArgs),
    Complaints(ComplaintsArgs),
    Vendors(VendorsArgs),
    Tenants(TenantsArgs),
    WorkOrders(WorkOrdersArgs),
    Properties(PropertiesArgs),
    /// Show dashboard statistics.
    Dashboard,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        self.session.policy()?;
        if self.session_secret.as_deref().is_some_and(str::is_empty) {
            anyhow::bail!("--session-secret must not be empty");
        }
        Ok(())
    }

    /// Where the session is kept between runs.
    pub fn session_file(&self) -> PathBuf {
        self.session_file.clone().unwrap_or_else(|| state_dir().join("session.json"))
    }
}

/// Resolve the state directory for tenantdesk.
///
/// `$XDG_STATE_HOME/tenantdesk`, then `$HOME/.local/state/tenantdesk`,
/// then `.tenantdesk` relative to the working directory.
pub fn state_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("tenantdesk");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/tenantdesk");
    }
    PathBuf::from(".tenantdesk")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
