// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI subcommands. Each returns a process exit code.

pub mod account;
pub mod records;

use serde::Serialize;

use crate::api::ApiError;
use crate::app::App;
use crate::config::Command;

/// Run one subcommand against the assembled app.
pub async fn dispatch(app: &App, command: &Command) -> i32 {
    match command {
        Command::Login(args) => account::login(app, args).await,
        Command::Logout => account::logout(app),
        Command::Whoami => account::whoami(app),
        Command::Guard(args) => account::guard(app, args),
        Command::ForgotPassword(args) => account::forgot_password(app, args).await,
        Command::ResetPassword(args) => account::reset_password(app, args).await,
        Command::Complaints(args) => records::complaints(app, args).await,
        Command::Vendors(args) => records::vendors(app, args).await,
        Command::Tenants(args) => records::tenants(app, args).await,
        Command::WorkOrders(args) => records::work_orders(app, args).await,
        Command::Properties(args) => records::properties(app, args).await,
        Command::Dashboard => records::dashboard(app).await,
    }
}

fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{text}");
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

/// Print the result of a dashboard call. Sign-in failures exit with 3.
fn finish<T: Serialize>(result: Result<T, ApiError>) -> i32 {
    match result {
        Ok(value) => print_json(&value),
        Err(e) if e.needs_sign_in() => {
            eprintln!("error: {e}");
            3
        }
        Err(e) => {
            match e.status {
                Some(status) => eprintln!("error ({status}): {e}"),
                None => eprintln!("error: {e}"),
            }
            1
        }
    }
}
