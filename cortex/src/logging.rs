// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Tracing subscriber setup for binaries embedding the core.
//! `RUST_LOG` wins over the supplied level.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

fn filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to create log filter")
}

/// Compact human-readable output
pub fn init_logging(level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(level)?)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install subscriber: {}", e))
}

/// One JSON object per event, for container log collectors
pub fn init_json_logging(level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(level)?)
        .json()
        .with_current_span(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install subscriber: {}", e))
}
