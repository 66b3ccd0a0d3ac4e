// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! JSON export of the commit cache

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::db::{Database, DbError};
use crate::store::CommitRecord;

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Output file could not be written
    #[error("Failed to write {path}: {source}")]
    Io {
        /// Output path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

/// One exported commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedCommit {
    /// Commit SHA
    pub hash: String,
    /// Repository identity
    pub repo: String,
    /// `"Name <email>"`
    pub author: String,
    /// UTC timestamp, ISO-8601
    pub timestamp: DateTime<Utc>,
    /// Full commit message
    pub message: String,
    /// Paths touched
    pub files_changed: Vec<String>,
}

impl From<CommitRecord> for ExportedCommit {
    fn from(record: CommitRecord) -> Self {
        Self {
            author: record.author(),
            repo: record.repo_identity.as_str().to_string(),
            hash: record.hash,
            timestamp: record.timestamp,
            message: record.message,
            files_changed: record.files_changed,
        }
    }
}

/// Every cached commit in export form
///
/// # Errors
///
/// Returns an error if the commits cannot be read.
pub fn export_commits(db: &Database) -> Result<Vec<ExportedCommit>, ExportError> {
    Ok(db
        .export_all()?
        .into_iter()
        .map(ExportedCommit::from)
        .collect())
}

/// Write every cached commit to `path` as pretty-printed JSON
///
/// Returns the number of commits written.
///
/// # Errors
///
/// Returns an error if the commits cannot be read or the file written.
pub fn write_export(db: &Database, path: &Path) -> Result<usize, ExportError> {
    let commits = export_commits(db)?;
    let json = serde_json::to_string_pretty(&commits)?;
    fs::write(path, json).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), commits = commits.len(), "Exported commits");
    Ok(commits.len())
}
