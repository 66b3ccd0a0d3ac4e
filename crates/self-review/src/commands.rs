// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Command handlers
//!
//! Each subcommand is a function that takes the parsed configuration and
//! writes its report to `out`. Per-repository and per-period failures are
//! reported in the output. Configuration and database failures return an
//! error, as does a fetch that has no repository left to read.

use std::io::Write;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use self_review_git::{AuthorFilter, AuthorMatchMode, GitError, GitRepo, LocatedRepo, Locator};

use crate::config::{Command, Config, ConfigError};
use crate::db::{Database, DbError};
use crate::export::{self, ExportError};
use crate::ingest::{FetchOptions, FetchReport, IngestError, Ingestor};
use crate::periods::{PeriodError, Quarter, ReviewPeriod};
use crate::review::{
    CommandSummarizer, PeriodOutcome, PeriodReview, ReviewError, Reviewer, Summarizer,
    SummarizerError,
};
use crate::settings::{self, Settings, SettingsError};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that abort a command
#[derive(Debug, Error)]
pub enum CommandError {
    /// Command-line configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Settings file error
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Git error
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// Fetch error
    #[error("Fetch failed: {0}")]
    Ingest(#[from] IngestError),

    /// Review error
    #[error("Review failed: {0}")]
    Review(#[from] ReviewError),

    /// Summarizer could not be configured
    #[error(transparent)]
    Summarizer(#[from] SummarizerError),

    /// Export error
    #[error("Export failed: {0}")]
    Export(#[from] ExportError),

    /// Period error
    #[error(transparent)]
    Period(#[from] PeriodError),

    /// The settings list no repositories
    #[error("No repositories configured in {path}; run `self-review discover --update` or edit the file")]
    NoRepositories {
        /// Settings file that was read
        path: PathBuf,
    },

    /// Every configured repository failed to fetch
    #[error("All {failed} configured repositories failed to fetch")]
    AllRepositoriesFailed {
        /// Number of repositories that failed
        failed: usize,
    },

    /// Writing the report failed
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Dispatch
// ============================================================================

/// Run the configured subcommand
///
/// # Errors
///
/// Returns an error if the command cannot run at all.
pub fn run(config: &Config, out: &mut dyn Write) -> Result<(), CommandError> {
    let Some(command) = &config.command else {
        return Ok(());
    };
    let settings_path = config.settings_path();

    match command {
        Command::Init { force } => init(&settings_path, *force, out),
        Command::Discover {
            path,
            author,
            org,
            year,
            max_depth,
            substring,
            update,
        } => {
            let mode = if *substring {
                AuthorMatchMode::Substring
            } else {
                AuthorMatchMode::Token
            };
            let request = DiscoverRequest {
                root: settings::expand_tilde(path),
                author: author.clone(),
                mode,
                org: org.clone(),
                year: year.unwrap_or_else(settings::current_year),
                max_depth: *max_depth,
            };
            let found = discover(&request, out)?;
            if *update {
                update_settings(&settings_path, &request, &found, out)?;
            } else if !found.is_empty() {
                writeln!(
                    out,
                    "\nRun with --update to write these into {}",
                    settings_path.display()
                )?;
            }
            Ok(())
        }
        Command::Fetch {
            reset,
            reconcile,
            sequential,
        } => {
            let settings = Settings::load_valid(&settings_path)?;
            let options = FetchOptions {
                sequential: *sequential,
                reconcile: *reconcile,
            };
            fetch(config, &settings, *reset, &options, out).map(|_| ())
        }
        Command::Review {
            quarter,
            all,
            force,
        } => {
            let settings = Settings::load_valid(&settings_path)?;
            let summarizer = CommandSummarizer::new(&settings.summarizer.command)?;
            let db = open_database(config)?;
            let periods = selected_periods(*quarter, *all);
            review_with(&db, &settings, summarizer, &periods, *force, out).map(|_| ())
        }
        Command::Export { output } => {
            let db = open_database(config)?;
            let count = export::write_export(&db, output)?;
            writeln!(out, "Exported {count} commits to {}", output.display())?;
            Ok(())
        }
    }
}

/// Open the configured database, creating and migrating it as needed
///
/// # Errors
///
/// Returns an error if the path is unusable or the schema cannot be applied.
pub fn open_database(config: &Config) -> Result<Database, CommandError> {
    config.validate()?;
    let path = config.database_path();
    let mut db = Database::open(&path)?;
    db.initialize()?;
    debug!(
        path = %path.display(),
        schema = db.schema_version()?,
        "Database ready"
    );
    Ok(db)
}

// ============================================================================
// init
// ============================================================================

/// Write the settings template
///
/// # Errors
///
/// Returns an error if the file exists and `force` is not set, or the write
/// fails.
pub fn init(settings_path: &Path, force: bool, out: &mut dyn Write) -> Result<(), CommandError> {
    settings::write_template(settings_path, force)?;
    info!(path = %settings_path.display(), "Wrote settings template");
    writeln!(out, "Created {}", settings_path.display())?;
    writeln!(
        out,
        "Edit it to set your author and repositories, or run `self-review discover --update`."
    )?;
    Ok(())
}

// ============================================================================
// discover
// ============================================================================

/// Parameters for a discovery scan
#[derive(Debug, Clone)]
pub struct DiscoverRequest {
    /// Directory to scan
    pub root: PathBuf,
    /// Author to look for
    pub author: String,
    /// How the author is matched
    pub mode: AuthorMatchMode,
    /// Organisation filter
    pub org: Option<String>,
    /// Year that must contain at least one matching commit
    pub year: i32,
    /// Maximum scan depth
    pub max_depth: usize,
}

/// Find repositories under `request.root` with commits by the author in the year
///
/// Repositories that cannot be read are logged and left out.
///
/// # Errors
///
/// Returns an error for an empty author, an unrepresentable year or an
/// unreadable scan root.
pub fn discover(
    request: &DiscoverRequest,
    out: &mut dyn Write,
) -> Result<Vec<LocatedRepo>, CommandError> {
    let author =
        AuthorFilter::new(&request.author, request.mode).ok_or(SettingsError::EmptyAuthor)?;
    let (since, until) = ReviewPeriod::All.bounds(request.year)?;

    writeln!(out, "Scanning {}...", request.root.display())?;
    let discovery = Locator::new(&request.root)
        .max_depth(request.max_depth)
        .org(request.org.as_deref())
        .locate()?;
    for skipped in &discovery.skipped {
        debug!(path = %skipped.path.display(), reason = %skipped.reason, "Skipped during scan");
    }

    let found: Vec<LocatedRepo> = discovery
        .repos
        .into_par_iter()
        .filter(|located| {
            let result = GitRepo::open(&located.path)
                .and_then(|repo| repo.has_commits_by(&author, since, until));
            match result {
                Ok(has) => has,
                Err(e) => {
                    warn!(path = %located.path.display(), error = %e, "Skipping unreadable repository");
                    false
                }
            }
        })
        .collect();

    if found.is_empty() {
        writeln!(
            out,
            "No repositories found with commits by '{}' in {}",
            request.author, request.year
        )?;
        return Ok(found);
    }

    writeln!(
        out,
        "\nFound {} repositories with commits by '{}' in {}:",
        found.len(),
        request.author,
        request.year
    )?;
    let width = found
        .iter()
        .map(|r| r.identity.as_str().len())
        .max()
        .unwrap_or(0);
    for located in &found {
        write!(
            out,
            "  {:<width$}  {}",
            located.identity.as_str(),
            located.path.display()
        )?;
        if !located.duplicates.is_empty() {
            write!(out, "  (+{} other checkouts)", located.duplicates.len())?;
        }
        writeln!(out)?;
    }
    Ok(found)
}

fn update_settings(
    settings_path: &Path,
    request: &DiscoverRequest,
    found: &[LocatedRepo],
    out: &mut dyn Write,
) -> Result<(), CommandError> {
    let mut settings = match Settings::load(settings_path) {
        Ok(existing) => existing,
        Err(SettingsError::NotFound(_)) => Settings::new(request.author.clone(), request.year),
        Err(e) => return Err(e.into()),
    };
    settings.author = request.author.clone();
    settings.year = request.year;
    settings.author_match = request.mode;
    settings.repos = found.iter().map(|r| r.path.clone()).collect();
    settings.validate()?;
    settings.save(settings_path)?;

    info!(path = %settings_path.display(), repos = found.len(), "Updated settings");
    writeln!(
        out,
        "\nUpdated {} with {} repositories",
        settings_path.display(),
        found.len()
    )?;
    Ok(())
}

// ============================================================================
// fetch
// ============================================================================

/// Fetch new commits from the configured repositories and print a report
///
/// # Errors
///
/// Returns an error if the database cannot be opened or reset, if no
/// repositories are configured, or if every repository failed.
pub fn fetch(
    config: &Config,
    settings: &Settings,
    reset: bool,
    options: &FetchOptions,
    out: &mut dyn Write,
) -> Result<FetchReport, CommandError> {
    let author = settings.author_filter()?;
    let paths = settings.repo_paths();
    if paths.is_empty() {
        return Err(CommandError::NoRepositories {
            path: config.settings_path(),
        });
    }
    let mut db = open_database(config)?;

    if reset {
        let stats = db.reset()?;
        writeln!(
            out,
            "Cleared {} cached commits and {} cursors",
            stats.commits, stats.cursors
        )?;
    }

    writeln!(
        out,
        "Fetching commits by '{}' from {} repositories...",
        settings.author,
        paths.len()
    )?;
    let mut ingestor = Ingestor::new(db, author);
    let report = ingestor.fetch(&paths, options)?;
    write_fetch_report(&report, out)?;

    let failed = report.failures().count();
    if failed == report.repos.len() {
        return Err(CommandError::AllRepositoriesFailed { failed });
    }
    Ok(report)
}

fn write_fetch_report(report: &FetchReport, out: &mut dyn Write) -> Result<(), CommandError> {
    if report.reconciled > 0 {
        writeln!(out, "Reconciled {} cursors", report.reconciled)?;
    }
    for repo in &report.repos {
        match &repo.error {
            Some(error) => writeln!(out, "  {}: failed: {error}", repo.display_name())?,
            None => writeln!(
                out,
                "  {}: found {}, {} new",
                repo.display_name(),
                repo.found,
                repo.inserted
            )?,
        }
    }
    for path in &report.duplicates {
        writeln!(out, "  {}: same repository as another path, skipped", path.display())?;
    }

    let failures = report.failures().count();
    write!(out, "Total: {} new commits", report.total_new())?;
    if failures > 0 {
        write!(out, " ({failures} repositories failed)")?;
    }
    writeln!(out)?;
    Ok(())
}

// ============================================================================
// review
// ============================================================================

/// Periods selected by the review flags
#[must_use]
pub fn selected_periods(quarter: Option<Quarter>, all: bool) -> Vec<ReviewPeriod> {
    match (quarter, all) {
        (Some(q), _) => vec![ReviewPeriod::Quarter(q)],
        (None, true) => vec![ReviewPeriod::All],
        (None, false) => ReviewPeriod::quarters(),
    }
}

/// Review `periods` of the configured year with the given summarizer
///
/// # Errors
///
/// Returns an error if the database cannot be read or written.
pub fn review_with<S: Summarizer>(
    db: &Database,
    settings: &Settings,
    summarizer: S,
    periods: &[ReviewPeriod],
    force: bool,
    out: &mut dyn Write,
) -> Result<Vec<PeriodReview>, CommandError> {
    let repos = db.identities_for_paths(&settings.repo_paths())?;
    if repos.is_empty() {
        warn!("None of the configured repositories have been fetched yet");
    }

    let reviewer = Reviewer::new(db, summarizer, settings.year, repos)
        .by(settings.author_filter()?)
        .force(force);
    let mut reviews = Vec::with_capacity(periods.len());
    for period in periods {
        let review = reviewer.review(*period)?;
        write_period_review(&review, out)?;
        reviews.push(review);
    }

    let failed = reviews.iter().filter(|r| r.is_failure()).count();
    if failed > 0 {
        writeln!(out, "{failed} periods could not be summarized")?;
    }
    Ok(reviews)
}

fn write_period_review(review: &PeriodReview, out: &mut dyn Write) -> Result<(), CommandError> {
    writeln!(out, "\n=== {} ===", review.name)?;
    match &review.outcome {
        PeriodOutcome::Cached(summary) => {
            writeln!(
                out,
                "(cached, generated {})\n",
                summary.generated_at.format("%Y-%m-%d %H:%M UTC")
            )?;
            writeln!(out, "{}", summary.content)?;
        }
        PeriodOutcome::Generated(summary) => {
            writeln!(out, "({} commits)\n", review.commit_count)?;
            writeln!(out, "{}", summary.content)?;
        }
        PeriodOutcome::NoActivity => writeln!(out, "No activity found")?,
        PeriodOutcome::Failed(error) => writeln!(out, "Summary failed: {error}")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_selected_periods() {
        assert_eq!(selected_periods(None, false), ReviewPeriod::quarters());
        assert_eq!(selected_periods(None, true), vec![ReviewPeriod::All]);
        assert_eq!(
            selected_periods(Some(Quarter::Q3), false),
            vec![ReviewPeriod::Quarter(Quarter::Q3)]
        );
    }

    #[test]
    fn test_fetch_report_output() {
        let report = FetchReport {
            repos: vec![
                crate::ingest::RepoFetch {
                    path: PathBuf::from("/repos/api"),
                    identity: Some(self_review_git::RepoIdentity::from_stored(
                        "github.com/acme/api",
                    )),
                    found: 4,
                    inserted: 3,
                    error: None,
                },
                crate::ingest::RepoFetch {
                    path: PathBuf::from("/repos/broken"),
                    identity: None,
                    found: 0,
                    inserted: 0,
                    error: Some("not a repository".to_string()),
                },
            ],
            duplicates: vec![],
            reconciled: 0,
        };

        let mut out = Vec::new();
        write_fetch_report(&report, &mut out).expect("write");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "  api: found 4, 3 new\n  broken: failed: not a repository\nTotal: 3 new commits (1 repositories failed)\n"
        );
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let dir = std::env::temp_dir().join(format!("self-review-init-{}", std::process::id()));
        let path = dir.join("config.toml");
        let _ = std::fs::remove_dir_all(&dir);

        let mut out = Vec::new();
        init(&path, false, &mut out).expect("first init");
        assert!(path.exists());
        assert!(matches!(
            init(&path, false, &mut out),
            Err(CommandError::Settings(SettingsError::AlreadyExists(_)))
        ));
        init(&path, true, &mut out).expect("forced init");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
