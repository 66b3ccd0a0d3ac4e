// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! self-review-git: repository discovery and commit extraction
//!
//! This library crate finds the repositories a user has contributed to,
//! resolves worktrees and clones to a single canonical identity, and
//! extracts authored commits incrementally for the self-review store.

#![warn(missing_docs)]

//! # Example
//!
//! ```no_run
//! use self_review_git::{AuthorFilter, AuthorMatchMode, GitRepo, Locator, WalkOptions};
//!
//! let discovery = Locator::new("/home/me/repos").locate().expect("scan");
//! let author = AuthorFilter::new("jane", AuthorMatchMode::Token).expect("author");
//!
//! for located in &discovery.repos {
//!     let repo = GitRepo::open(&located.path).expect("open repo");
//!     for commit in repo.commits(&WalkOptions::default().by(author.clone())).expect("walk") {
//!         let commit = commit.expect("commit");
//!         println!("{} {} - {}", located.identity, commit.short_sha(), commit.subject());
//!     }
//! }
//! ```

pub mod author;
pub mod commit;
pub mod error;
pub mod identity;
pub mod locator;
pub mod repo;

pub use author::{AuthorFilter, AuthorMatchMode};
pub use commit::{Commit, Cursor};
pub use error::GitError;
pub use identity::RepoIdentity;
pub use locator::{Discovery, LocatedRepo, Locator, SkippedRepo, checkout_preference};
pub use repo::{CommitIter, GitRepo, WalkOptions};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::author::{AuthorFilter, AuthorMatchMode};
    pub use crate::commit::{Commit, Cursor};
    pub use crate::error::GitError;
    pub use crate::identity::RepoIdentity;
    pub use crate::locator::{Discovery, Locator};
    pub use crate::repo::{GitRepo, WalkOptions};
}
