// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for self-review-git

use thiserror::Error;

/// Errors that can occur during git operations
#[derive(Debug, Error)]
pub enum GitError {
    /// Error from git2 library
    #[error("Git error: {0}")]
    Git2(#[from] git2::Error),

    /// Repository not found at the specified path
    #[error("Repository not found: {path}")]
    RepositoryNotFound {
        /// The path that was searched for a repository
        path: String,
    },

    /// Repository has neither a remote nor a root commit to identify it by
    #[error("Repository has no remote and no commits: {path}")]
    Unidentifiable {
        /// Path of the repository
        path: String,
    },

    /// Discovery root does not exist or is not a directory
    #[error("Scan root is not a readable directory: {path}")]
    InvalidRoot {
        /// The root that was requested
        path: String,
    },

    /// Filesystem traversal error
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// I/O error while reading repository metadata
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
