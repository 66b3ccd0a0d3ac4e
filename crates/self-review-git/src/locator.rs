// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Repository discovery
//!
//! Walks a directory tree, opens every repository root it finds, resolves
//! each to a [`RepoIdentity`] and keeps a single representative path per
//! identity.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::GitError;
use crate::identity::{RepoIdentity, remote_in_org};
use crate::repo::GitRepo;

/// Default traversal depth below the scan root
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// A repository selected by discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedRepo {
    /// Canonical identity
    pub identity: RepoIdentity,
    /// Representative checkout path
    pub path: PathBuf,
    /// Remote URL, if configured
    pub remote: Option<String>,
    /// Whether the representative is a linked worktree
    pub is_worktree: bool,
    /// Other checkouts sharing the identity that were not selected
    pub duplicates: Vec<PathBuf>,
}

/// A repository root that could not be inspected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRepo {
    /// Path of the directory
    pub path: PathBuf,
    /// Why it was skipped
    pub reason: String,
}

/// Result of a discovery pass
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Selected repositories, sorted by path
    pub repos: Vec<LocatedRepo>,
    /// Repository roots that failed to open or resolve
    pub skipped: Vec<SkippedRepo>,
}

/// One checkout found during the walk
#[derive(Debug, Clone)]
struct Candidate {
    identity: RepoIdentity,
    path: PathBuf,
    remote: Option<String>,
    is_worktree: bool,
    checkout_time: Option<DateTime<Utc>>,
}

/// Filesystem walker that finds repositories
#[derive(Debug, Clone)]
pub struct Locator {
    root: PathBuf,
    max_depth: usize,
    org: Option<String>,
}

impl Locator {
    /// Create a locator rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_depth: DEFAULT_MAX_DEPTH,
            org: None,
        }
    }

    /// Limit how many directory levels below the root are visited
    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Keep only repositories whose remote belongs to `org`
    #[must_use]
    pub fn org(mut self, org: Option<&str>) -> Self {
        self.org = org.map(str::to_string).filter(|o| !o.trim().is_empty());
        self
    }

    /// Walk the tree and return one representative per repository identity
    ///
    /// # Errors
    ///
    /// Returns `GitError::InvalidRoot` if the root is not a directory. Errors
    /// on individual repositories are collected in [`Discovery::skipped`].
    pub fn locate(&self) -> Result<Discovery, GitError> {
        if !self.root.is_dir() {
            return Err(GitError::InvalidRoot {
                path: self.root.display().to_string(),
            });
        }
        let root = self.root.canonicalize()?;

        info!(root = %root.display(), depth = self.max_depth, "Scanning for repositories");

        let mut candidates = Vec::new();
        let mut skipped = Vec::new();

        let mut walker = WalkDir::new(&root)
            .max_depth(self.max_depth)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory");
                    if let Some(path) = e.path() {
                        skipped.push(SkippedRepo {
                            path: path.to_path_buf(),
                            reason: e.to_string(),
                        });
                    }
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }
            if entry.file_name() == ".git" {
                walker.skip_current_dir();
                continue;
            }
            if !entry.path().join(".git").exists() {
                continue;
            }

            // Repository root: never descend into it
            walker.skip_current_dir();

            match inspect(entry.path()) {
                Ok(candidate) => {
                    if self.retain(&candidate) {
                        candidates.push(candidate);
                    }
                }
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Skipping repository");
                    skipped.push(SkippedRepo {
                        path: entry.path().to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let repos = select_representatives(candidates);
        info!(
            found = repos.len(),
            skipped = skipped.len(),
            "Repository scan complete"
        );

        Ok(Discovery { repos, skipped })
    }

    fn retain(&self, candidate: &Candidate) -> bool {
        let Some(ref org) = self.org else {
            return true;
        };
        let keep = candidate
            .remote
            .as_deref()
            .is_some_and(|url| remote_in_org(url, org));
        if !keep {
            debug!(path = %candidate.path.display(), org, "Excluded by org filter");
        }
        keep
    }
}

fn inspect(path: &Path) -> Result<Candidate, GitError> {
    let repo = GitRepo::open(path)?;
    let identity = repo.resolve_identity()?;
    let path = path.canonicalize()?;

    debug!(path = %path.display(), identity = %identity, worktree = repo.is_worktree(), "Found repository");

    Ok(Candidate {
        identity,
        remote: repo.remote_url(),
        is_worktree: repo.is_worktree(),
        checkout_time: repo.checkout_time(),
        path,
    })
}

/// Ordering key for choosing among checkouts of one repository
///
/// The smallest key wins: primary checkouts before linked worktrees, then
/// the most recently checked-out path, then the lexicographically smallest.
#[must_use]
pub fn checkout_preference(
    is_worktree: bool,
    checkout_time: Option<DateTime<Utc>>,
    path: &Path,
) -> (bool, Reverse<Option<DateTime<Utc>>>, &Path) {
    (is_worktree, Reverse(checkout_time), path)
}

impl Candidate {
    fn preference(&self) -> (bool, Reverse<Option<DateTime<Utc>>>, &Path) {
        checkout_preference(self.is_worktree, self.checkout_time, &self.path)
    }
}

/// Keep one checkout per identity, chosen by [`checkout_preference`]
fn select_representatives(candidates: Vec<Candidate>) -> Vec<LocatedRepo> {
    let mut groups: BTreeMap<RepoIdentity, Vec<Candidate>> = BTreeMap::new();
    for candidate in candidates {
        groups
            .entry(candidate.identity.clone())
            .or_default()
            .push(candidate);
    }

    let mut repos: Vec<LocatedRepo> = groups
        .into_values()
        .filter_map(|mut group| {
            group.sort_by(|a, b| a.preference().cmp(&b.preference()));
            let mut rest = group.into_iter();
            let chosen = rest.next()?;
            let duplicates: Vec<PathBuf> = rest.map(|c| c.path).collect();
            if !duplicates.is_empty() {
                debug!(
                    identity = %chosen.identity,
                    chosen = %chosen.path.display(),
                    duplicates = duplicates.len(),
                    "Collapsed duplicate checkouts"
                );
            }
            Some(LocatedRepo {
                identity: chosen.identity,
                path: chosen.path,
                remote: chosen.remote,
                is_worktree: chosen.is_worktree,
                duplicates,
            })
        })
        .collect();

    repos.sort_by(|a, b| a.path.cmp(&b.path));
    repos
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candidate(identity: &str, path: &str, worktree: bool, secs: i64) -> Candidate {
        Candidate {
            identity: RepoIdentity::from_stored(identity),
            path: PathBuf::from(path),
            remote: None,
            is_worktree: worktree,
            checkout_time: Utc.timestamp_opt(secs, 0).single(),
        }
    }

    #[test]
    fn test_primary_checkout_preferred_over_newer_worktree() {
        let repos = select_representatives(vec![
            candidate("id", "/r/wt-new", true, 300),
            candidate("id", "/r/main", false, 100),
            candidate("id", "/r/wt-old", true, 200),
        ]);
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].path, PathBuf::from("/r/main"));
        assert_eq!(repos[0].duplicates.len(), 2);
    }

    #[test]
    fn test_checkout_preference_order() {
        let t = Utc.timestamp_opt(100, 0).single();
        let later = Utc.timestamp_opt(200, 0).single();
        let primary = checkout_preference(false, t, Path::new("/r/z"));
        let newer_worktree = checkout_preference(true, later, Path::new("/r/a"));
        let older_worktree = checkout_preference(true, t, Path::new("/r/a"));
        let unknown_time = checkout_preference(true, None, Path::new("/r/a"));

        assert!(primary < newer_worktree);
        assert!(newer_worktree < older_worktree);
        assert!(older_worktree < unknown_time);
    }

    #[test]
    fn test_worktrees_only_pick_most_recent() {
        let repos = select_representatives(vec![
            candidate("id", "/r/a", true, 100),
            candidate("id", "/r/b", true, 200),
        ]);
        assert_eq!(repos[0].path, PathBuf::from("/r/b"));
        assert!(repos[0].is_worktree);
    }

    #[test]
    fn test_ties_break_on_path() {
        let repos = select_representatives(vec![
            candidate("id", "/r/b", true, 100),
            candidate("id", "/r/a", true, 100),
        ]);
        assert_eq!(repos[0].path, PathBuf::from("/r/a"));
    }

    #[test]
    fn test_output_sorted_by_path() {
        let repos = select_representatives(vec![
            candidate("z-id", "/r/alpha", false, 0),
            candidate("a-id", "/r/beta", false, 0),
        ]);
        let paths: Vec<_> = repos.iter().map(|r| r.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("/r/alpha"), PathBuf::from("/r/beta")]);
    }

    #[test]
    fn test_invalid_root() {
        let result = Locator::new("/nonexistent/scan/root/12345").locate();
        assert!(matches!(result, Err(GitError::InvalidRoot { .. })));
    }
}
