// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Account subcommands: `login`, `logout`, `whoami`, `guard` and password
//! recovery.

use serde_json::json;
use tenantdesk_session::{route_guard, GuardDecision};

use super::{finish, print_json};
use crate::app::App;

#[derive(Debug, clap::Args)]
pub struct LoginArgs {
    #[arg(long, env = "TENANTDESK_EMAIL")]
    pub email: String,
    #[arg(long, env = "TENANTDESK_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Debug, clap::Args)]
pub struct GuardArgs {
    /// Dashboard path, e.g. `/vendor/jobs`.
    pub path: String,
    /// Destination remembered by the sign-in page.
    #[arg(long)]
    pub callback_url: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct ForgotPasswordArgs {
    #[arg(long)]
    pub email: String,
}

#[derive(Debug, clap::Args)]
pub struct ResetPasswordArgs {
    /// Token from the reset email.
    #[arg(long)]
    pub token: String,
    #[arg(long, env = "TENANTDESK_NEW_PASSWORD", hide_env_values = true)]
    pub new_password: String,
}

pub async fn login(app: &App, args: &LoginArgs) -> i32 {
    match app.sign_in(&args.email, &args.password).await {
        Ok(view) => {
            eprintln!("Signed in as {}.", if view.name.is_empty() { "unknown user" } else { view.name.as_str() });
            print_json(&view)
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

pub fn logout(app: &App) -> i32 {
    if app.controller.session().is_none() {
        eprintln!("Not signed in.");
        return 0;
    }
    app.controller.sign_out();
    0
}

pub fn whoami(app: &App) -> i32 {
    let state = app.controller.state();
    match app.controller.session() {
        Some(view) => print_json(&json!({ "state": state.as_str(), "session": view })),
        None => {
            eprintln!("Not signed in.");
            1
        }
    }
}

pub fn guard(app: &App, args: &GuardArgs) -> i32 {
    let session = app.controller.session();
    match route_guard(&args.path, args.callback_url.as_deref(), session.as_ref()) {
        GuardDecision::Allow => println!("allow {}", args.path),
        GuardDecision::Redirect(to) => println!("redirect {to}"),
    }
    0
}

pub async fn forgot_password(app: &App, args: &ForgotPasswordArgs) -> i32 {
    finish(app.auth.forgot_password(&args.email).await)
}

pub async fn reset_password(app: &App, args: &ResetPasswordArgs) -> i32 {
    finish(app.auth.reset_password(&args.token, &args.new_password).await)
}
