// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Git commit types and operations

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents one authored commit as extracted from a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// The commit SHA (40 hex characters)
    pub hash: String,
    /// Author name
    pub author_name: String,
    /// Author email
    pub author_email: String,
    /// Commit timestamp, normalized to UTC
    pub timestamp: DateTime<Utc>,
    /// Full commit message
    pub message: String,
    /// Paths touched relative to the first parent, in diff order
    pub files_changed: Vec<String>,
    /// Parent commit SHAs
    pub parents: Vec<String>,
}

impl Commit {
    /// Get the short SHA (first 7 characters)
    #[must_use]
    pub fn short_sha(&self) -> &str {
        self.hash.get(..7).unwrap_or(&self.hash)
    }

    /// Get the first line of the commit message (subject)
    #[must_use]
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    /// Cursor pointing at this commit
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        Cursor {
            hash: self.hash.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// A position in a repository's history: the newest commit already seen
///
/// Cursors order by timestamp first and hash second, which gives a total
/// order even when several commits share the same second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Commit SHA the cursor points at
    pub hash: String,
    /// Timestamp of that commit
    pub timestamp: DateTime<Utc>,
}

impl Cursor {
    /// Create a cursor from its parts
    #[must_use]
    pub fn new(hash: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            hash: hash.into(),
            timestamp,
        }
    }

    /// Pick the newest cursor of a set of commits
    pub fn newest<'a>(commits: impl IntoIterator<Item = &'a Commit>) -> Option<Cursor> {
        commits.into_iter().map(Commit::cursor).max()
    }
}

impl Ord for Cursor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.hash.cmp(&other.hash))
    }
}

impl PartialOrd for Cursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
