// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod api;
pub mod app;
pub mod auth;
pub mod command;
pub mod config;
#[cfg(test)]
mod test_support;
