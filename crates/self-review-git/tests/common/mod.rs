// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Repository fixtures for self-review-git integration tests
//!
//! Repositories are built with `git2` directly so that commit timestamps and
//! authors are fully controlled.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use git2::{Oid, Repository, ResetType, Signature, Time};

static TEST_DIR_COUNTER: AtomicU32 = AtomicU32::new(0);

/// A temporary directory removed on drop
pub struct TempTestDir {
    path: PathBuf,
}

impl TempTestDir {
    pub fn new(test_name: &str) -> Self {
        let counter = TEST_DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "self-review-git-{}-{}-{}",
            test_name,
            std::process::id(),
            counter
        ));
        fs::create_dir_all(&path).expect("Failed to create temp test directory");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, relative: &str) -> PathBuf {
        self.path.join(relative)
    }
}

impl Drop for TempTestDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// UTC midnight of a calendar date
pub fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

/// Builder for repositories with dated commits
pub struct RepoBuilder {
    repo: Repository,
    path: PathBuf,
}

impl RepoBuilder {
    /// Initialize a new repository at `path`
    pub fn init(path: &Path) -> Self {
        fs::create_dir_all(path).expect("create repo dir");
        let repo = Repository::init(path).expect("git init");
        Self {
            repo,
            path: path.to_path_buf(),
        }
    }

    /// Open an existing checkout (for example a linked worktree)
    pub fn open(path: &Path) -> Self {
        let repo = Repository::open(path).expect("open repo");
        Self {
            repo,
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Write a file, stage it, and commit on HEAD
    pub fn commit_at(
        &self,
        file: &str,
        content: &str,
        message: &str,
        author: (&str, &str),
        when: DateTime<Utc>,
    ) -> Oid {
        let parents: Vec<git2::Commit<'_>> = self
            .repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        self.commit_with_parents(file, content, message, author, when, &parents)
    }

    /// Commit as Jane Doe
    pub fn jane(&self, file: &str, message: &str, when: DateTime<Utc>) -> Oid {
        self.commit_at(file, message, message, ("Jane Doe", "jane@co.com"), when)
    }

    /// Create a merge commit on HEAD whose second parent is `other`
    pub fn merge_at(
        &self,
        file: &str,
        content: &str,
        message: &str,
        other: Oid,
        when: DateTime<Utc>,
    ) -> Oid {
        let head = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .expect("head commit");
        let other = self.repo.find_commit(other).expect("other commit");
        self.commit_with_parents(
            file,
            content,
            message,
            ("Jane Doe", "jane@co.com"),
            when,
            &[head, other],
        )
    }

    fn commit_with_parents(
        &self,
        file: &str,
        content: &str,
        message: &str,
        author: (&str, &str),
        when: DateTime<Utc>,
        parents: &[git2::Commit<'_>],
    ) -> Oid {
        let file_path = self.path.join(file);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&file_path, content).expect("write file");

        let mut index = self.repo.index().expect("index");
        index.add_path(Path::new(file)).expect("add path");
        index.write().expect("write index");
        let tree_id = index.write_tree().expect("write tree");
        let tree = self.repo.find_tree(tree_id).expect("find tree");

        let sig = Signature::new(author.0, author.1, &Time::new(when.timestamp(), 0))
            .expect("signature");
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .expect("commit")
    }

    /// Create a branch pointing at `target`
    pub fn branch(&self, name: &str, target: Oid) {
        let commit = self.repo.find_commit(target).expect("find commit");
        self.repo.branch(name, &commit, true).expect("create branch");
    }

    /// Move HEAD and the working tree to `target`
    pub fn reset_hard(&self, target: Oid) {
        let obj = self.repo.find_object(target, None).expect("find object");
        self.repo
            .reset(&obj, ResetType::Hard, None)
            .expect("reset --hard");
    }

    /// Add an `origin` remote
    pub fn set_origin(&self, url: &str) {
        self.repo.remote("origin", url).expect("add remote");
    }

    /// Add a linked worktree at `path`
    pub fn add_worktree(&self, name: &str, path: &Path) -> PathBuf {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create worktree parent");
        }
        self.repo.worktree(name, path, None).expect("add worktree");
        path.to_path_buf()
    }
}
