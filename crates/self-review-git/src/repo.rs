// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Read-only repository access
//!
//! This module wraps a `git2::Repository` and provides the operations the
//! ingestion pipeline needs: identity resolution, author matching within a
//! time window, and cursor-bounded commit extraction.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use git2::{ErrorCode, Oid, Repository, Revwalk, Sort};
use tracing::{debug, warn};

use crate::author::AuthorFilter;
use crate::commit::{Commit, Cursor};
use crate::error::GitError;
use crate::identity::RepoIdentity;

/// Configuration for walking commits
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Maximum number of commits to yield
    pub limit: Option<usize>,
    /// Only yield commits by this author
    pub author: Option<AuthorFilter>,
    /// Only yield commits strictly newer than this cursor
    pub after: Option<Cursor>,
    /// Only include commits at or after this instant
    pub since: Option<DateTime<Utc>>,
    /// Only include commits strictly before this instant
    pub until: Option<DateTime<Utc>>,
    /// Compute the changed-file list for each commit
    pub include_files: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            limit: None,
            author: None,
            after: None,
            since: None,
            until: None,
            include_files: true,
        }
    }
}

impl WalkOptions {
    /// Options for the N oldest matching commits
    #[must_use]
    pub fn first(n: usize) -> Self {
        Self {
            limit: Some(n),
            ..Default::default()
        }
    }

    /// Restrict to commits by an author
    #[must_use]
    pub fn by(mut self, author: AuthorFilter) -> Self {
        self.author = Some(author);
        self
    }

    /// Only commits strictly newer than a cursor
    #[must_use]
    pub fn after(mut self, cursor: Option<Cursor>) -> Self {
        self.after = cursor;
        self
    }

    /// Filter commits since a date (inclusive)
    #[must_use]
    pub fn since(mut self, date: DateTime<Utc>) -> Self {
        self.since = Some(date);
        self
    }

    /// Filter commits until a date (exclusive)
    #[must_use]
    pub fn until(mut self, date: DateTime<Utc>) -> Self {
        self.until = Some(date);
        self
    }

    /// Skip changed-file extraction
    #[must_use]
    pub fn without_files(mut self) -> Self {
        self.include_files = false;
        self
    }
}

/// A git repository wrapper
pub struct GitRepo {
    repo: Repository,
}

impl GitRepo {
    /// Open a git repository at the given path
    ///
    /// # Errors
    ///
    /// Returns `GitError::RepositoryNotFound` if the path is not a git
    /// repository, or `GitError::Git2` if its metadata cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GitError> {
        let path = path.as_ref();
        let repo = Repository::open(path).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                GitError::RepositoryNotFound {
                    path: path.display().to_string(),
                }
            } else {
                GitError::Git2(e)
            }
        })?;
        Ok(Self { repo })
    }

    /// Check if this checkout is a linked worktree
    #[must_use]
    pub fn is_worktree(&self) -> bool {
        self.repo.is_worktree()
    }

    /// Working directory of the primary checkout a linked worktree belongs to
    ///
    /// Returns `None` for primary checkouts and for worktrees of bare
    /// repositories.
    #[must_use]
    pub fn primary_workdir(&self) -> Option<PathBuf> {
        if !self.repo.is_worktree() {
            return None;
        }
        let common = self.repo.commondir();
        if common.file_name().is_some_and(|n| n == ".git") {
            common.parent().map(Path::to_path_buf)
        } else {
            None
        }
    }

    /// URL of the `origin` remote, or of the first remote with a URL
    #[must_use]
    pub fn remote_url(&self) -> Option<String> {
        if let Ok(origin) = self.repo.find_remote("origin")
            && let Some(url) = origin.url()
        {
            return Some(url.to_string());
        }

        let names = self.repo.remotes().ok()?;
        let mut names: Vec<&str> = names.iter().flatten().collect();
        names.sort_unstable();
        names.into_iter().find_map(|name| {
            self.repo
                .find_remote(name)
                .ok()
                .and_then(|r| r.url().map(str::to_string))
        })
    }

    /// Lowest-sorting parentless commit reachable from any tip
    ///
    /// # Errors
    ///
    /// Returns `GitError` if history cannot be walked.
    pub fn root_commit(&self) -> Result<Option<String>, GitError> {
        let tips = self.tips()?;
        if tips.is_empty() {
            return Ok(None);
        }

        let mut walk = self.repo.revwalk()?;
        for tip in &tips {
            walk.push(*tip)?;
        }

        let mut root: Option<String> = None;
        for oid in walk {
            let oid = oid?;
            let commit = self.repo.find_commit(oid)?;
            if commit.parent_count() == 0 {
                let sha = oid.to_string();
                if root.as_ref().is_none_or(|r| sha < *r) {
                    root = Some(sha);
                }
            }
        }
        Ok(root)
    }

    /// Resolve the canonical identity of this repository
    ///
    /// Linked worktrees resolve through their primary checkout when it is
    /// still present. Otherwise the remote URL is preferred, with the root
    /// commit hash as fallback.
    ///
    /// # Errors
    ///
    /// Returns `GitError::Unidentifiable` if there is neither a remote nor any
    /// commit.
    pub fn resolve_identity(&self) -> Result<RepoIdentity, GitError> {
        if let Some(primary) = self.primary_workdir()
            && let Ok(primary_repo) = GitRepo::open(&primary)
        {
            debug!(
                worktree = %self.display_path().display(),
                primary = %primary.display(),
                "Resolving worktree through primary checkout"
            );
            return primary_repo.resolve_own_identity();
        }
        self.resolve_own_identity()
    }

    fn resolve_own_identity(&self) -> Result<RepoIdentity, GitError> {
        if let Some(url) = self.remote_url() {
            return Ok(RepoIdentity::from_remote(&url));
        }
        match self.root_commit()? {
            Some(sha) => Ok(RepoIdentity::from_root_commit(&sha)),
            None => Err(GitError::Unidentifiable {
                path: self.display_path().display().to_string(),
            }),
        }
    }

    /// Last time this checkout's HEAD was written
    #[must_use]
    pub fn checkout_time(&self) -> Option<DateTime<Utc>> {
        std::fs::metadata(self.repo.path().join("HEAD"))
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }

    /// Check whether any commit by `author` falls within `[since, until)`
    ///
    /// Every commit reachable from a tip is considered, so a commit whose
    /// parent carries a skewed committer clock is still found.
    ///
    /// # Errors
    ///
    /// Returns `GitError` if history cannot be walked.
    pub fn has_commits_by(
        &self,
        author: &AuthorFilter,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<bool, GitError> {
        let options = WalkOptions::first(1)
            .by(author.clone())
            .since(since)
            .until(until)
            .without_files();
        let first = self.commits(&options)?.next().transpose()?;
        Ok(first.is_some())
    }

    /// Iterate commits oldest-to-newest according to the given options
    ///
    /// When `options.after` names a commit that is still reachable, that
    /// commit and all of its ancestors are excluded. When it is not (history
    /// was rewritten) extraction degrades to timestamp filtering.
    ///
    /// # Errors
    ///
    /// Returns `GitError` if the walk cannot be set up.
    pub fn commits(&self, options: &WalkOptions) -> Result<CommitIter<'_>, GitError> {
        let mut walk = self.repo.revwalk()?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME | Sort::REVERSE)?;

        let tips = self.tips()?;
        for tip in &tips {
            walk.push(*tip)?;
        }

        let mut since = options.since;
        let mut exclude = None;

        if let Some(ref cursor) = options.after {
            match self.reachable(&cursor.hash, &tips) {
                Some(oid) => walk.hide(oid)?,
                None => {
                    warn!(
                        repo = %self.display_path().display(),
                        cursor = %cursor.hash,
                        "Cursor commit is unreachable, falling back to timestamp filtering"
                    );
                    since = Some(since.map_or(cursor.timestamp, |s| s.max(cursor.timestamp)));
                    exclude = Oid::from_str(&cursor.hash).ok();
                }
            }
        }

        Ok(CommitIter {
            repo: &self.repo,
            walk,
            author: options.author.clone(),
            since,
            until: options.until,
            exclude,
            include_files: options.include_files,
            remaining: options.limit.unwrap_or(usize::MAX),
        })
    }

    fn display_path(&self) -> &Path {
        self.repo.workdir().unwrap_or_else(|| self.repo.path())
    }

    /// Commits reachable from HEAD, local branches and remote-tracking branches
    fn tips(&self) -> Result<Vec<Oid>, GitError> {
        let mut tips = Vec::new();

        match self.repo.head() {
            Ok(head) => {
                if let Ok(commit) = head.peel_to_commit() {
                    tips.push(commit.id());
                }
            }
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        for glob in ["refs/heads/*", "refs/remotes/*"] {
            for reference in self.repo.references_glob(glob)? {
                let Ok(reference) = reference else { continue };
                if let Ok(commit) = reference.peel_to_commit() {
                    tips.push(commit.id());
                }
            }
        }

        tips.sort();
        tips.dedup();
        Ok(tips)
    }

    /// Resolve `sha` to a commit that is an ancestor of (or equal to) a tip
    fn reachable(&self, sha: &str, tips: &[Oid]) -> Option<Oid> {
        let oid = Oid::from_str(sha).ok()?;
        self.repo.find_commit(oid).ok()?;
        tips.iter()
            .any(|tip| {
                *tip == oid
                    || self
                        .repo
                        .graph_descendant_of(*tip, oid)
                        .unwrap_or(false)
            })
            .then_some(oid)
    }
}

/// Lazy iterator over extracted commits
///
/// The iterator is finite and borrows the repository read-only; calling
/// [`GitRepo::commits`] again restarts extraction from scratch.
pub struct CommitIter<'repo> {
    repo: &'repo Repository,
    walk: Revwalk<'repo>,
    author: Option<AuthorFilter>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    exclude: Option<Oid>,
    include_files: bool,
    remaining: usize,
}

impl Iterator for CommitIter<'_> {
    type Item = Result<Commit, GitError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        loop {
            let oid = match self.walk.next()? {
                Ok(oid) => oid,
                Err(e) => {
                    self.remaining = 0;
                    return Some(Err(e.into()));
                }
            };

            if self.exclude == Some(oid) {
                continue;
            }

            let git_commit = match self.repo.find_commit(oid) {
                Ok(c) => c,
                Err(e) => return Some(Err(e.into())),
            };

            let timestamp = commit_time(&git_commit);
            if self.since.is_some_and(|since| timestamp < since) {
                continue;
            }
            if self.until.is_some_and(|until| timestamp >= until) {
                continue;
            }

            if let Some(ref author) = self.author {
                let signature = git_commit.author();
                if !author.matches(
                    signature.name().unwrap_or(""),
                    signature.email().unwrap_or(""),
                ) {
                    continue;
                }
            }

            self.remaining -= 1;
            return Some(extract_commit(self.repo, &git_commit, self.include_files));
        }
    }
}

/// Committer time of a commit, normalized to UTC
fn commit_time(git_commit: &git2::Commit<'_>) -> DateTime<Utc> {
    DateTime::from_timestamp(git_commit.time().seconds(), 0).unwrap_or_default()
}

/// Extract commit metadata from a git2 commit
fn extract_commit(
    repo: &Repository,
    git_commit: &git2::Commit<'_>,
    include_files: bool,
) -> Result<Commit, GitError> {
    let author = git_commit.author();
    let files_changed = if include_files {
        changed_paths(repo, git_commit)?
    } else {
        Vec::new()
    };

    Ok(Commit {
        hash: git_commit.id().to_string(),
        author_name: author.name().unwrap_or("Unknown").to_string(),
        author_email: author.email().unwrap_or("").to_string(),
        timestamp: commit_time(git_commit),
        message: git_commit.message().unwrap_or("").trim_end().to_string(),
        files_changed,
        parents: git_commit.parent_ids().map(|id| id.to_string()).collect(),
    })
}

/// Paths touched by a commit relative to its first parent
///
/// Merge commits therefore report their net diff against the first parent.
fn changed_paths(repo: &Repository, git_commit: &git2::Commit<'_>) -> Result<Vec<String>, GitError> {
    let tree = git_commit.tree()?;
    let parent_tree = if git_commit.parent_count() > 0 {
        Some(git_commit.parent(0)?.tree()?)
    } else {
        None
    };

    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;

    Ok(diff
        .deltas()
        .filter_map(|delta| {
            delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().into_owned())
        })
        .collect())
}
