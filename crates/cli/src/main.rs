// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::error;

use tenantdesk::app::{spawn_sign_out_watcher, App};
use tenantdesk::command;
use tenantdesk::config::Config;
use tenantdesk_session::{SessionEvent, SignOutReason};

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&config);

    match run(config).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("fatal: {e:#}");
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries command output.
    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

async fn run(config: Config) -> anyhow::Result<i32> {
    let shutdown = CancellationToken::new();
    let (app, events) = App::open(&config)?;

    let watcher = spawn_sign_out_watcher(events, shutdown.clone(), |event, target| {
        match event {
            SessionEvent::SignedOut { reason: SignOutReason::UserRequested } => eprintln!("Signed out."),
            _ => eprintln!("Session expired. Please sign in again ({target}): tenantdesk login"),
        }
    });

    let code = command::dispatch(&app, &config.command).await;

    shutdown.cancel();
    let _ = watcher.await;
    Ok(code)
}
