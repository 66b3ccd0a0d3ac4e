// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Commit store
//!
//! Persistent, keyed storage of extracted commits and per-repository fetch
//! cursors. Commits are keyed by `(repo_identity, hash)` and are never
//! overwritten. Cursors only move forward.
//!
//! A fetch writes in two steps: [`Database::merge`] inserts the new commits
//! in one transaction, then [`Database::advance_cursor`] moves the cursor.
//! Both record the key of the author filter the fetch ran under. A cursor
//! only applies to the filter that advanced it, so changing the configured
//! author makes the next fetch walk the full history again.
//! A crash between the two leaves the cursor behind the stored commits,
//! which is safe: the next fetch re-extracts those commits and the merge
//! skips them. [`Database::reconcile_cursor`] repairs the gap explicitly.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params, params_from_iter};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use self_review_git::{AuthorFilter, Commit, Cursor, RepoIdentity};

use crate::db::{Database, DbError, format_timestamp, parse_timestamp};

const COMMIT_COLUMNS: &str =
    "repo_identity, hash, author_name, author_email, timestamp, message, files_json";

/// A commit as stored in the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Canonical identity of the repository the commit belongs to
    pub repo_identity: RepoIdentity,
    /// Commit SHA
    pub hash: String,
    /// Author name
    pub author_name: String,
    /// Author email
    pub author_email: String,
    /// Commit timestamp (UTC)
    pub timestamp: DateTime<Utc>,
    /// Full commit message
    pub message: String,
    /// Paths touched, in diff order
    pub files_changed: Vec<String>,
}

impl CommitRecord {
    /// The `"Name <email>"` form of the author
    #[must_use]
    pub fn author(&self) -> String {
        if self.author_email.is_empty() {
            self.author_name.clone()
        } else {
            format!("{} <{}>", self.author_name, self.author_email)
        }
    }

    /// Calendar date of the commit as `YYYY-MM-DD`
    #[must_use]
    pub fn date(&self) -> String {
        self.timestamp.format("%Y-%m-%d").to_string()
    }

    /// Cursor pointing at this commit
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.hash.clone(), self.timestamp)
    }

    fn from_row(row: &Row<'_>) -> Result<Self, DbError> {
        let timestamp: String = row.get(4)?;
        let files_json: String = row.get(6)?;
        Ok(Self {
            repo_identity: RepoIdentity::from_stored(row.get::<_, String>(0)?),
            hash: row.get(1)?,
            author_name: row.get(2)?,
            author_email: row.get(3)?,
            timestamp: parse_timestamp("commits", &timestamp)?,
            message: row.get(5)?,
            files_changed: serde_json::from_str(&files_json)?,
        })
    }
}

/// Outcome of a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Rows inserted
    pub inserted: usize,
    /// Rows already present
    pub skipped: usize,
}

/// Rows removed by a cache reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetStats {
    /// Commits deleted
    pub commits: usize,
    /// Cursors deleted
    pub cursors: usize,
}

/// A repository recorded by fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRecord {
    /// Canonical identity
    pub identity: RepoIdentity,
    /// Checkout path the repository was last fetched from
    pub path: PathBuf,
    /// Remote URL, if any
    pub remote: Option<String>,
}

impl Database {
    // ========================================================================
    // Commits
    // ========================================================================

    /// Insert the commits that are not yet stored for a repository
    ///
    /// Runs in one transaction. Existing rows are left untouched, so merging
    /// the same commits twice inserts nothing the second time. New rows are
    /// tagged with the key of `author`.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is written in that case.
    pub fn merge(
        &mut self,
        identity: &RepoIdentity,
        author: &AuthorFilter,
        commits: &[Commit],
    ) -> Result<MergeStats, DbError> {
        let fetched_at = format_timestamp(Utc::now());
        let fetched_by = author.key();
        let mut stats = MergeStats::default();

        let tx = self.connection_mut().transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO commits
                 (repo_identity, hash, author_name, author_email, timestamp, message, files_json, fetched_at, fetched_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for commit in commits {
                let files_json = serde_json::to_string(&commit.files_changed)?;
                let changed = stmt.execute(params![
                    identity.as_str(),
                    commit.hash,
                    commit.author_name,
                    commit.author_email,
                    format_timestamp(commit.timestamp),
                    commit.message,
                    files_json,
                    fetched_at,
                    fetched_by,
                ])?;
                if changed == 1 {
                    stats.inserted += 1;
                } else {
                    stats.skipped += 1;
                }
            }
        }
        tx.commit()?;

        debug!(
            repo = %identity,
            inserted = stats.inserted,
            skipped = stats.skipped,
            "Merged commits"
        );
        Ok(stats)
    }

    /// Commits in `[start, end)` for the given repositories
    ///
    /// Results are ordered by timestamp, then hash. An empty identity list
    /// yields no commits.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is corrupt.
    pub fn query(
        &self,
        identities: &[RepoIdentity],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CommitRecord>, DbError> {
        if identities.is_empty() || start >= end {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; identities.len()].join(", ");
        let sql = format!(
            "SELECT {COMMIT_COLUMNS} FROM commits
             WHERE repo_identity IN ({placeholders}) AND timestamp >= ? AND timestamp < ?
             ORDER BY timestamp, hash, repo_identity"
        );

        let mut values: Vec<String> = identities.iter().map(|i| i.as_str().to_string()).collect();
        values.push(format_timestamp(start));
        values.push(format_timestamp(end));

        self.collect_commits(&sql, params_from_iter(values))
    }

    /// Every cached commit, ordered by timestamp, then hash
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is corrupt.
    pub fn export_all(&self) -> Result<Vec<CommitRecord>, DbError> {
        let sql =
            format!("SELECT {COMMIT_COLUMNS} FROM commits ORDER BY timestamp, hash, repo_identity");
        self.collect_commits(&sql, [])
    }

    /// Number of commits stored for a repository
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn commit_count(&self, identity: &RepoIdentity) -> Result<usize, DbError> {
        let count: i64 = self.connection().query_row(
            "SELECT COUNT(*) FROM commits WHERE repo_identity = ?1",
            [identity.as_str()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn collect_commits<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<CommitRecord>, DbError> {
        let mut stmt = self.connection().prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(CommitRecord::from_row(row)?);
        }
        Ok(records)
    }

    // ========================================================================
    // Cursors
    // ========================================================================

    /// Fetch cursor of a repository for the given author filter
    ///
    /// A cursor advanced under a different filter does not apply and yields
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored cursor is corrupt.
    pub fn cursor_for(
        &self,
        identity: &RepoIdentity,
        author: &AuthorFilter,
    ) -> Result<Option<Cursor>, DbError> {
        let row: Option<(String, String, String)> = self
            .connection()
            .query_row(
                "SELECT hash, timestamp, author_filter FROM fetch_cursors WHERE repo_identity = ?1",
                [identity.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match row {
            Some((_, _, filter)) if filter != author.key() => {
                debug!(
                    repo = %identity,
                    stored = %filter,
                    current = %author.key(),
                    "Ignoring cursor advanced under another author filter"
                );
                Ok(None)
            }
            Some((hash, ts, _)) => Ok(Some(Cursor::new(
                hash,
                parse_timestamp("fetch_cursors", &ts)?,
            ))),
            None => Ok(None),
        }
    }

    /// Move a repository's cursor forward
    ///
    /// Call only after the merge that stored `cursor`'s commit has committed.
    /// Under one author filter the cursor never moves to an earlier
    /// `(timestamp, hash)`. A cursor left by another filter is replaced.
    /// Returns whether the cursor changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn advance_cursor(
        &self,
        identity: &RepoIdentity,
        author: &AuthorFilter,
        cursor: &Cursor,
    ) -> Result<bool, DbError> {
        let changed = self.connection().execute(
            "INSERT INTO fetch_cursors (repo_identity, hash, timestamp, author_filter, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(repo_identity) DO UPDATE SET
                 hash = excluded.hash,
                 timestamp = excluded.timestamp,
                 author_filter = excluded.author_filter,
                 updated_at = excluded.updated_at
             WHERE excluded.author_filter <> fetch_cursors.author_filter
                OR excluded.timestamp > fetch_cursors.timestamp
                OR (excluded.timestamp = fetch_cursors.timestamp
                    AND excluded.hash > fetch_cursors.hash)",
            params![
                identity.as_str(),
                cursor.hash,
                format_timestamp(cursor.timestamp),
                author.key(),
                format_timestamp(Utc::now()),
            ],
        )?;

        if changed > 0 {
            debug!(repo = %identity, hash = %cursor.hash, "Advanced fetch cursor");
        }
        Ok(changed > 0)
    }

    /// Bring a repository's cursor up to its newest commit fetched by `author`
    ///
    /// Recovers from a merge whose cursor advance never ran. Only commits
    /// first stored under the same filter count. Returns the resulting
    /// cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or write fails.
    pub fn reconcile_cursor(
        &self,
        identity: &RepoIdentity,
        author: &AuthorFilter,
    ) -> Result<Option<Cursor>, DbError> {
        let newest: Option<(String, String)> = self
            .connection()
            .query_row(
                "SELECT hash, timestamp FROM commits WHERE repo_identity = ?1 AND fetched_by = ?2
                 ORDER BY timestamp DESC, hash DESC LIMIT 1",
                params![identity.as_str(), author.key()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((hash, ts)) = newest {
            let cursor = Cursor::new(hash, parse_timestamp("commits", &ts)?);
            if self.advance_cursor(identity, author, &cursor)? {
                info!(repo = %identity, hash = %cursor.hash, "Reconciled fetch cursor");
            }
        }
        self.cursor_for(identity, author)
    }

    /// Reconcile the cursor of every repository with stored commits
    ///
    /// # Errors
    ///
    /// Returns an error if any reconciliation fails.
    pub fn reconcile_all(&self, author: &AuthorFilter) -> Result<usize, DbError> {
        let identities = self.stored_identities()?;
        for identity in &identities {
            self.reconcile_cursor(identity, author)?;
        }
        Ok(identities.len())
    }

    /// Identities that have at least one stored commit
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn stored_identities(&self) -> Result<Vec<RepoIdentity>, DbError> {
        let mut stmt = self
            .connection()
            .prepare("SELECT DISTINCT repo_identity FROM commits ORDER BY repo_identity")?;
        let identities = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|r| r.map(RepoIdentity::from_stored))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(identities)
    }

    /// Delete every cached commit and cursor
    ///
    /// # Errors
    ///
    /// Returns an error if the deletes fail; nothing is removed in that case.
    pub fn reset(&mut self) -> Result<ResetStats, DbError> {
        let tx = self.connection_mut().transaction()?;
        let commits = tx.execute("DELETE FROM commits", [])?;
        let cursors = tx.execute("DELETE FROM fetch_cursors", [])?;
        tx.commit()?;

        info!(commits, cursors, "Reset commit cache");
        Ok(ResetStats { commits, cursors })
    }

    // ========================================================================
    // Repositories
    // ========================================================================

    /// Record the checkout a repository was fetched from
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn upsert_repository(
        &self,
        identity: &RepoIdentity,
        path: &Path,
        remote: Option<&str>,
    ) -> Result<(), DbError> {
        self.connection().execute(
            "INSERT INTO repositories (identity, path, remote, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(identity) DO UPDATE SET
                 path = excluded.path,
                 remote = excluded.remote,
                 updated_at = excluded.updated_at",
            params![
                identity.as_str(),
                path.to_string_lossy(),
                remote,
                format_timestamp(Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// All recorded repositories, ordered by identity
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn repositories(&self) -> Result<Vec<RepositoryRecord>, DbError> {
        let mut stmt = self
            .connection()
            .prepare("SELECT identity, path, remote FROM repositories ORDER BY identity")?;
        let records = stmt
            .query_map([], |row| {
                Ok(RepositoryRecord {
                    identity: RepoIdentity::from_stored(row.get::<_, String>(0)?),
                    path: PathBuf::from(row.get::<_, String>(1)?),
                    remote: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Identities recorded for the given checkout paths
    ///
    /// Paths are compared after canonicalization when possible. Unknown
    /// paths are ignored; the result is sorted and free of duplicates.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn identities_for_paths(&self, paths: &[PathBuf]) -> Result<Vec<RepoIdentity>, DbError> {
        let wanted: Vec<PathBuf> = paths.iter().map(|p| canonical(p)).collect();
        let mut identities: Vec<RepoIdentity> = self
            .repositories()?
            .into_iter()
            .filter(|r| wanted.contains(&canonical(&r.path)))
            .map(|r| r.identity)
            .collect();
        identities.sort();
        identities.dedup();
        Ok(identities)
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
