// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Review generation
//!
//! Builds a prompt from a period's cached commits, hands it to an external
//! summarizer and caches the result. Each period is handled independently:
//! a summarizer failure is reported for that period and the others proceed.

use std::process::Command;

use thiserror::Error;
use tracing::{debug, info, warn};

use self_review_git::{AuthorFilter, RepoIdentity};

use crate::db::{Database, DbError};
use crate::periods::{self, PeriodError, ReviewPeriod};
use crate::store::CommitRecord;
use crate::summary::SummaryRecord;

/// Maximum number of changed paths listed per commit in a prompt
pub const MAX_FILES_IN_PROMPT: usize = 5;

/// Errors from an external summarizer
#[derive(Debug, Error)]
pub enum SummarizerError {
    /// No program configured
    #[error("Summarizer command is empty")]
    EmptyCommand,

    /// Program could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        /// Program name
        program: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// Program exited unsuccessfully
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        /// Program name
        program: String,
        /// Exit status description
        status: String,
        /// Captured standard error
        stderr: String,
    },

    /// Program produced no output
    #[error("{program} returned an empty summary")]
    EmptyOutput {
        /// Program name
        program: String,
    },
}

/// Review errors that abort the whole run
#[derive(Debug, Error)]
pub enum ReviewError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Period error
    #[error("Period error: {0}")]
    Period(#[from] PeriodError),
}

/// Something that turns a prompt into a narrative
pub trait Summarizer {
    /// Produce a summary for `prompt`
    ///
    /// # Errors
    ///
    /// Returns an error if no summary could be produced.
    fn summarize(&self, prompt: &str) -> Result<String, SummarizerError>;
}

/// Summarizer that runs an external program with the prompt as last argument
#[derive(Debug, Clone)]
pub struct CommandSummarizer {
    program: String,
    args: Vec<String>,
}

impl CommandSummarizer {
    /// Build from a command line such as `["claude", "-p"]`
    ///
    /// # Errors
    ///
    /// Returns `SummarizerError::EmptyCommand` if `command` is empty.
    pub fn new(command: &[String]) -> Result<Self, SummarizerError> {
        let (program, args) = command
            .split_first()
            .ok_or(SummarizerError::EmptyCommand)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl Summarizer for CommandSummarizer {
    fn summarize(&self, prompt: &str) -> Result<String, SummarizerError> {
        debug!(program = %self.program, prompt_len = prompt.len(), "Running summarizer");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(prompt)
            .output()
            .map_err(|source| SummarizerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SummarizerError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(SummarizerError::EmptyOutput {
                program: self.program.clone(),
            });
        }
        Ok(text)
    }
}

// ============================================================================
// Prompt construction
// ============================================================================

/// Render commits as the prompt's activity listing
///
/// Each commit becomes a `**YYYY-MM-DD** [repo]` line, its message and a
/// `Files:` line listing at most [`MAX_FILES_IN_PROMPT`] paths.
#[must_use]
pub fn format_commits(commits: &[CommitRecord]) -> String {
    let mut lines = Vec::with_capacity(commits.len() * 4);
    for commit in commits {
        lines.push(format!(
            "**{}** [{}]",
            commit.date(),
            commit.repo_identity.short_name()
        ));
        lines.push(commit.message.clone());
        lines.push(format!("Files: {}", format_files(&commit.files_changed)));
        lines.push(String::new());
    }
    lines.join("\n")
}

fn format_files(files: &[String]) -> String {
    let shown = files
        .iter()
        .take(MAX_FILES_IN_PROMPT)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if files.len() > MAX_FILES_IN_PROMPT {
        format!("{shown} (+{} more)", files.len() - MAX_FILES_IN_PROMPT)
    } else {
        shown
    }
}

/// Full summarizer prompt for a period
#[must_use]
pub fn build_prompt(period_name: &str, commits: &[CommitRecord]) -> String {
    format!(
        "Analyze this work activity from {period_name} and generate a self-review summary.

## Git Commits ({count} total)

{listing}

## Instructions

Generate a performance self-review with these sections:

1. **Summary**: A 2-3 paragraph narrative of the work done, highlighting major themes, projects, and impact.

2. **Key Accomplishments**: Bullet points of specific accomplishments, grouped by theme or project area.

Focus on impact and outcomes.",
        count = commits.len(),
        listing = format_commits(commits),
    )
}

// ============================================================================
// Reviewer
// ============================================================================

/// What happened for one period
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodOutcome {
    /// A cached summary was reused
    Cached(SummaryRecord),
    /// A new summary was generated and cached
    Generated(SummaryRecord),
    /// No commits fall inside the period
    NoActivity,
    /// The summarizer failed; nothing was cached
    Failed(String),
}

/// Review result for one period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodReview {
    /// Period reviewed
    pub period: ReviewPeriod,
    /// Human-readable period name, e.g. `2025-Q1`
    pub name: String,
    /// Number of commits in the period (zero when a cached summary was used)
    pub commit_count: usize,
    /// Outcome
    pub outcome: PeriodOutcome,
}

impl PeriodReview {
    /// Whether the period failed
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, PeriodOutcome::Failed(_))
    }
}

/// Generates and caches summaries for one year
pub struct Reviewer<'a, S: Summarizer> {
    db: &'a Database,
    summarizer: S,
    year: i32,
    repos: Vec<RepoIdentity>,
    author: Option<AuthorFilter>,
    force: bool,
}

impl<'a, S: Summarizer> Reviewer<'a, S> {
    /// Create a reviewer over the given repositories
    pub fn new(db: &'a Database, summarizer: S, year: i32, repos: Vec<RepoIdentity>) -> Self {
        Self {
            db,
            summarizer,
            year,
            repos,
            author: None,
            force: false,
        }
    }

    /// Only summarize commits by this author
    ///
    /// The cache may hold commits fetched under an earlier author setting;
    /// those are left out of new summaries.
    #[must_use]
    pub fn by(mut self, author: AuthorFilter) -> Self {
        self.author = Some(author);
        self
    }

    /// Ignore cached summaries and regenerate
    #[must_use]
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Review a single period
    ///
    /// # Errors
    ///
    /// Returns an error only for database or period failures; summarizer
    /// failures are reported in the outcome.
    pub fn review(&self, period: ReviewPeriod) -> Result<PeriodReview, ReviewError> {
        let name = period.display_name(self.year);

        if !self.force
            && let Some(cached) = self.db.get_summary(self.year, period)?
        {
            debug!(period = %name, "Using cached summary");
            return Ok(PeriodReview {
                period,
                name,
                commit_count: cached.commit_hashes.len(),
                outcome: PeriodOutcome::Cached(cached),
            });
        }

        let mut commits = periods::commits_for(self.db, &self.repos, self.year, period)?;
        if let Some(ref author) = self.author {
            commits.retain(|c| author.matches(&c.author_name, &c.author_email));
        }
        info!(period = %name, commits = commits.len(), "Reviewing period");

        if commits.is_empty() {
            return Ok(PeriodReview {
                period,
                name,
                commit_count: 0,
                outcome: PeriodOutcome::NoActivity,
            });
        }

        let prompt = build_prompt(&name, &commits);
        let outcome = match self.summarizer.summarize(&prompt) {
            Ok(text) => {
                let record = SummaryRecord::new(
                    self.year,
                    period,
                    text,
                    commits.iter().map(|c| c.hash.clone()).collect(),
                );
                self.db.put_summary(&record)?;
                PeriodOutcome::Generated(record)
            }
            Err(e) => {
                warn!(period = %name, error = %e, "Summarizer failed");
                PeriodOutcome::Failed(e.to_string())
            }
        };

        Ok(PeriodReview {
            period,
            name,
            commit_count: commits.len(),
            outcome,
        })
    }
}
