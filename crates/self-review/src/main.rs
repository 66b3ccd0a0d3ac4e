// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! self-review: turn a year of git commits into review summaries
//!
//! This binary finds the repositories you contributed to, caches your commits
//! in a local SQLite database and asks an external summarizer to write
//! quarterly and yearly self-review narratives.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

use self_review::commands;
use self_review::config::Config;

fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(config.log_level().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!(settings = %config.settings_path().display(), "Starting self-review");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    commands::run(&config, &mut out)?;
    Ok(())
}
