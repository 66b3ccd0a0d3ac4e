// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fetch pipeline
//!
//! Extracts authored commits from the configured repositories and merges
//! them into the commit store.
//!
//! Identities and cursors are resolved up front on the calling thread.
//! Extraction then runs across repositories in parallel, each worker opening
//! its own repository handle. Store writes happen back on the calling thread,
//! one merge transaction per repository followed by the cursor advance.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use self_review::db::Database;
//! use self_review::ingest::{FetchOptions, Ingestor};
//! use self_review_git::{AuthorFilter, AuthorMatchMode};
//!
//! let mut db = Database::in_memory().expect("create db");
//! db.initialize().expect("init");
//! let author = AuthorFilter::new("jane", AuthorMatchMode::Token).expect("author");
//! let mut ingestor = Ingestor::new(db, author);
//!
//! let report = ingestor
//!     .fetch(&[PathBuf::from("/path/to/repo")], &FetchOptions::default())
//!     .expect("fetch");
//! println!("{} new commits", report.total_new());
//! ```

use std::cmp::Reverse;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use self_review_git::{
    AuthorFilter, Commit, Cursor, GitError, GitRepo, RepoIdentity, WalkOptions, checkout_preference,
};

use crate::db::{Database, DbError};

// ============================================================================
// Error Types
// ============================================================================

/// Fetch errors that abort the whole run
#[derive(Debug, Error)]
pub enum IngestError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Git error
    #[error("Git error: {0}")]
    Git(#[from] GitError),
}

// ============================================================================
// Progress Reporting
// ============================================================================

/// Progress callback signature
pub type ProgressCallback = Box<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Progress event during a fetch
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Extraction is about to start
    Started {
        /// Number of distinct repositories to fetch
        total_repos: usize,
    },
    /// One repository has been merged
    Progress {
        /// Repository identity
        repo: String,
        /// Repositories processed so far
        processed: usize,
        /// Total repositories
        total: usize,
    },
    /// A repository failed; the run continues
    Warning {
        /// Repository path
        path: PathBuf,
        /// Description of the failure
        message: String,
    },
    /// Fetch completed
    Completed {
        /// Total commits inserted
        inserted: usize,
        /// Repositories that failed
        failures: usize,
    },
}

// ============================================================================
// Options and Report
// ============================================================================

/// Options for a fetch
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Extract repositories one at a time instead of in parallel
    pub sequential: bool,
    /// Recompute every cursor from stored commits before fetching
    pub reconcile: bool,
}

impl FetchOptions {
    /// Extract one repository at a time
    #[must_use]
    pub fn sequential(mut self) -> Self {
        self.sequential = true;
        self
    }

    /// Reconcile cursors before fetching
    #[must_use]
    pub fn with_reconcile(mut self) -> Self {
        self.reconcile = true;
        self
    }
}

/// Result of fetching one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFetch {
    /// Path the repository was read from
    pub path: PathBuf,
    /// Resolved identity, if the repository could be opened
    pub identity: Option<RepoIdentity>,
    /// Matching commits newer than the cursor
    pub found: usize,
    /// Commits that were not yet stored
    pub inserted: usize,
    /// Failure description, if the repository was skipped
    pub error: Option<String>,
}

impl RepoFetch {
    fn failed(path: &Path, identity: Option<RepoIdentity>, error: impl ToString) -> Self {
        Self {
            path: path.to_path_buf(),
            identity,
            found: 0,
            inserted: 0,
            error: Some(error.to_string()),
        }
    }

    /// Name to show in reports
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.identity {
            Some(identity) => identity.short_name().to_string(),
            None => self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.display().to_string()),
        }
    }
}

/// Outcome of a fetch across all repositories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// One entry per distinct repository, in input order
    pub repos: Vec<RepoFetch>,
    /// Paths skipped because a preferred checkout of the same identity was
    /// also configured
    pub duplicates: Vec<PathBuf>,
    /// Cursors reconciled before fetching
    pub reconciled: usize,
}

impl FetchReport {
    /// Total commits inserted
    #[must_use]
    pub fn total_new(&self) -> usize {
        self.repos.iter().map(|r| r.inserted).sum()
    }

    /// Total matching commits found
    #[must_use]
    pub fn total_found(&self) -> usize {
        self.repos.iter().map(|r| r.found).sum()
    }

    /// Repositories that failed
    pub fn failures(&self) -> impl Iterator<Item = &RepoFetch> {
        self.repos.iter().filter(|r| r.error.is_some())
    }
}

/// A configured checkout whose identity has been resolved
#[derive(Debug, Clone)]
struct Checkout {
    path: PathBuf,
    identity: RepoIdentity,
    remote: Option<String>,
    is_worktree: bool,
    checkout_time: Option<DateTime<Utc>>,
}

impl Checkout {
    fn preference(&self) -> (bool, Reverse<Option<DateTime<Utc>>>, &Path) {
        checkout_preference(self.is_worktree, self.checkout_time, &self.path)
    }
}

/// A repository ready for extraction
#[derive(Debug, Clone)]
struct FetchPlan {
    path: PathBuf,
    identity: RepoIdentity,
    remote: Option<String>,
    cursor: Option<Cursor>,
}

// ============================================================================
// Ingestor
// ============================================================================

/// Incremental commit fetcher
pub struct Ingestor {
    db: Database,
    author: AuthorFilter,
    progress: Option<ProgressCallback>,
}

impl Ingestor {
    /// Create a new ingestor for `author` over the given database
    #[must_use]
    pub fn new(db: Database, author: AuthorFilter) -> Self {
        Self {
            db,
            author,
            progress: None,
        }
    }

    /// Set a progress callback
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    fn report(&self, event: ProgressEvent) {
        if let Some(ref callback) = self.progress {
            callback(&event);
        }
    }

    /// Get reference to the database
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Get mutable reference to the database
    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    /// Fetch new commits from every repository path
    ///
    /// Repositories that cannot be opened, walked or stored are reported in
    /// the result and do not stop the run. A repository's cursor only moves
    /// after its merge has committed.
    ///
    /// # Errors
    ///
    /// Returns an error only if cursor reconciliation or lookup fails.
    pub fn fetch(
        &mut self,
        paths: &[PathBuf],
        options: &FetchOptions,
    ) -> Result<FetchReport, IngestError> {
        let mut report = FetchReport::default();

        if options.reconcile {
            report.reconciled = self.db.reconcile_all(&self.author)?;
            info!(repos = report.reconciled, "Reconciled fetch cursors");
        }

        let (plans, failures, duplicates) = self.plan(paths)?;
        report.duplicates = duplicates;
        for failure in failures {
            self.report(ProgressEvent::Warning {
                path: failure.path.clone(),
                message: failure.error.clone().unwrap_or_default(),
            });
            report.repos.push(failure);
        }

        self.report(ProgressEvent::Started {
            total_repos: plans.len(),
        });
        info!(
            repos = plans.len(),
            sequential = options.sequential,
            "Extracting commits"
        );

        let author = &self.author;
        let extracted: Vec<Result<Vec<Commit>, GitError>> = if options.sequential {
            plans.iter().map(|plan| extract(plan, author)).collect()
        } else {
            plans.par_iter().map(|plan| extract(plan, author)).collect()
        };

        let total = plans.len();
        for (idx, (plan, result)) in plans.into_iter().zip(extracted).enumerate() {
            let entry = match result {
                Ok(commits) => self.store(&plan, &commits),
                Err(e) => {
                    warn!(path = %plan.path.display(), error = %e, "Extraction failed");
                    RepoFetch::failed(&plan.path, Some(plan.identity.clone()), e)
                }
            };

            if let Some(ref message) = entry.error {
                self.report(ProgressEvent::Warning {
                    path: entry.path.clone(),
                    message: message.clone(),
                });
            }
            self.report(ProgressEvent::Progress {
                repo: plan.identity.to_string(),
                processed: idx + 1,
                total,
            });
            report.repos.push(entry);
        }

        let failures = report.failures().count();
        info!(
            inserted = report.total_new(),
            found = report.total_found(),
            failures,
            "Fetch complete"
        );
        self.report(ProgressEvent::Completed {
            inserted: report.total_new(),
            failures,
        });

        Ok(report)
    }

    /// Resolve identities and cursors, keeping one checkout per identity
    ///
    /// Checkouts sharing an identity collapse to the one preferred by
    /// [`checkout_preference`]. Plans follow the order in which each
    /// identity first appears in `paths`.
    fn plan(
        &self,
        paths: &[PathBuf],
    ) -> Result<(Vec<FetchPlan>, Vec<RepoFetch>, Vec<PathBuf>), IngestError> {
        let mut failures = Vec::new();
        let mut order: Vec<RepoIdentity> = Vec::new();
        let mut groups: HashMap<RepoIdentity, Vec<Checkout>> = HashMap::new();

        for path in paths {
            let repo = match GitRepo::open(path) {
                Ok(repo) => repo,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable repository");
                    failures.push(RepoFetch::failed(path, None, e));
                    continue;
                }
            };
            let identity = match repo.resolve_identity() {
                Ok(identity) => identity,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unidentifiable repository");
                    failures.push(RepoFetch::failed(path, None, e));
                    continue;
                }
            };

            let checkout = Checkout {
                path: path.clone(),
                remote: repo.remote_url(),
                is_worktree: repo.is_worktree(),
                checkout_time: repo.checkout_time(),
                identity: identity.clone(),
            };
            let group = groups.entry(identity).or_default();
            if group.is_empty() {
                order.push(checkout.identity.clone());
            }
            group.push(checkout);
        }

        let mut plans = Vec::with_capacity(order.len());
        let mut duplicates = Vec::new();
        for identity in order {
            let Some(mut group) = groups.remove(&identity) else {
                continue;
            };
            group.sort_by(|a, b| a.preference().cmp(&b.preference()));
            let mut group = group.into_iter();
            let Some(chosen) = group.next() else {
                continue;
            };
            for skipped in group {
                info!(
                    path = %skipped.path.display(),
                    chosen = %chosen.path.display(),
                    repo = %identity,
                    "Skipping duplicate checkout"
                );
                duplicates.push(skipped.path);
            }

            let cursor = self.db.cursor_for(&identity, &self.author)?;
            debug!(
                path = %chosen.path.display(),
                repo = %identity,
                worktree = chosen.is_worktree,
                cursor = cursor.as_ref().map(|c| c.hash.as_str()),
                "Planned fetch"
            );
            plans.push(FetchPlan {
                path: chosen.path,
                remote: chosen.remote,
                identity,
                cursor,
            });
        }

        Ok((plans, failures, duplicates))
    }

    /// Merge one repository's commits, then advance its cursor
    fn store(&mut self, plan: &FetchPlan, commits: &[Commit]) -> RepoFetch {
        let path = plan.path.as_path();
        let identity = &plan.identity;

        if let Err(e) = self
            .db
            .upsert_repository(identity, path, plan.remote.as_deref())
        {
            warn!(repo = %identity, error = %e, "Failed to record repository");
            return RepoFetch::failed(path, Some(identity.clone()), e);
        }

        let stats = match self.db.merge(identity, &self.author, commits) {
            Ok(stats) => stats,
            Err(e) => {
                warn!(repo = %identity, error = %e, "Merge failed, cursor left unchanged");
                return RepoFetch::failed(path, Some(identity.clone()), e);
            }
        };

        if let Some(newest) = Cursor::newest(commits)
            && let Err(e) = self.db.advance_cursor(identity, &self.author, &newest)
        {
            warn!(repo = %identity, error = %e, "Failed to advance cursor");
            return RepoFetch {
                path: path.to_path_buf(),
                identity: Some(identity.clone()),
                found: commits.len(),
                inserted: stats.inserted,
                error: Some(e.to_string()),
            };
        }

        info!(
            repo = %identity,
            found = commits.len(),
            inserted = stats.inserted,
            "Fetched repository"
        );
        RepoFetch {
            path: path.to_path_buf(),
            identity: Some(identity.clone()),
            found: commits.len(),
            inserted: stats.inserted,
            error: None,
        }
    }
}

/// Extract matching commits newer than the plan's cursor
fn extract(plan: &FetchPlan, author: &AuthorFilter) -> Result<Vec<Commit>, GitError> {
    let repo = GitRepo::open(&plan.path)?;
    let options = WalkOptions::default()
        .by(author.clone())
        .after(plan.cursor.clone());
    repo.commits(&options)?.collect()
}

// ============================================================================
// Tests
// ============================================================================
