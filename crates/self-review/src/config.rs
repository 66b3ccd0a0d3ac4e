// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Command-line configuration for self-review
//!
//! This module provides the clap-derived command line: global options for
//! the settings file, database location and logging, plus one subcommand per
//! pipeline stage.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use self_review_git::locator::DEFAULT_MAX_DEPTH;

use crate::periods::Quarter;

/// Default settings file, relative to the working directory
pub const DEFAULT_SETTINGS_FILE: &str = "config.toml";

/// Self-review - turn a year of git commits into review summaries
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "self-review")]
#[command(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Config {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the TOML settings file
    ///
    /// Defaults to ./config.toml.
    #[arg(short, long, env = "SELF_REVIEW_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Path to SQLite database file
    ///
    /// If the file doesn't exist, it will be created and initialized.
    /// Defaults to the platform data directory, e.g.
    /// ~/.local/share/self-review/self-review.db on Linux.
    #[arg(short, long, env = "SELF_REVIEW_DATABASE", global = true)]
    pub database: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, default_value = "false", global = true)]
    pub verbose: bool,

    /// Quiet mode - suppress info-level logs
    ///
    /// Only errors and warnings will be logged.
    #[arg(short, long, default_value = "false", global = true)]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Write a commented settings template
    Init {
        /// Overwrite an existing settings file
        #[arg(short, long)]
        force: bool,
    },

    /// Find repositories containing your commits
    ///
    /// Walks a directory tree, collapses worktrees and clones of the same
    /// project, and lists those with at least one matching commit in the
    /// target year.
    Discover {
        /// Directory to scan
        #[arg(short, long, default_value = "~/repos")]
        path: PathBuf,

        /// Author name or email to search for (partial match)
        #[arg(short, long)]
        author: String,

        /// Only keep repositories whose remote belongs to this organisation
        #[arg(short, long)]
        org: Option<String>,

        /// Year to check (defaults to the current year)
        #[arg(short, long)]
        year: Option<i32>,

        /// How many directory levels below the scan root to visit
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,

        /// Match the author as a plain substring instead of whole tokens
        #[arg(long)]
        substring: bool,

        /// Write author, year and repositories into the settings file
        #[arg(short, long)]
        update: bool,
    },

    /// Fetch new commits from the configured repositories
    Fetch {
        /// Delete all cached commits and cursors before fetching
        #[arg(long)]
        reset: bool,

        /// Recompute cursors from the stored commits before fetching
        #[arg(long)]
        reconcile: bool,

        /// Extract repositories one at a time
        #[arg(long)]
        sequential: bool,
    },

    /// Generate or show summaries for the configured year
    ///
    /// Without options all four quarters are reviewed.
    Review {
        /// Quarter to review (Q1, Q2, Q3 or Q4)
        #[arg(long, conflicts_with = "all")]
        quarter: Option<Quarter>,

        /// Review the entire year as one period
        #[arg(short, long)]
        all: bool,

        /// Regenerate even when a cached summary exists
        #[arg(short, long)]
        force: bool,
    },

    /// Export cached commits as JSON
    Export {
        /// Output file
        #[arg(short, long, default_value = "commits.json")]
        output: PathBuf,
    },
}

impl Config {
    /// Get the settings file path, using `config.toml` if not specified
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
    }

    /// Get the database path, using a default if not specified
    ///
    /// Default location is platform-specific:
    /// - macOS: ~/Library/Application Support/self-review/self-review.db
    /// - Linux: ~/.local/share/self-review/self-review.db
    /// - Windows: %LOCALAPPDATA%\self-review\self-review.db
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("self-review")
                .join("self-review.db")
        })
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the database parent directory cannot be created.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let db_path = self.database_path();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::DatabaseDirectoryCreateFailed(parent.to_path_buf(), e)
            })?;
        }
        if db_path.is_dir() {
            return Err(ConfigError::DatabaseIsDirectory(db_path));
        }
        Ok(())
    }

    /// Get the log level based on verbose/quiet flags
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to create database directory
    #[error("Failed to create database directory {0}: {1}")]
    DatabaseDirectoryCreateFailed(PathBuf, std::io::Error),

    /// Database path points at a directory
    #[error("Database path is a directory: {0}")]
    DatabaseIsDirectory(PathBuf),
}
