// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Settings file
//!
//! The settings file is a small TOML document naming the author, the review
//! year and the repositories to fetch from:
//!
//! ```toml
//! author = "jane"
//! year = 2025
//! repos = ["~/repos/api", "~/repos/web"]
//! author_match = "token"
//!
//! [summarizer]
//! command = ["claude", "-p"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use self_review_git::{AuthorFilter, AuthorMatchMode};

/// Earliest year accepted in settings
pub const MIN_YEAR: i32 = 1970;
/// Latest year accepted in settings
pub const MAX_YEAR: i32 = 9998;

/// Settings errors
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Settings file does not exist
    #[error("Settings file not found: {0} (run `self-review init` to create one)")]
    NotFound(PathBuf),

    /// Settings file already exists
    #[error("Settings file already exists: {0} (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    /// I/O error reading or writing the file
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid TOML or has the wrong shape
    #[error("Invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Settings could not be serialized
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Author is missing or has no alphanumeric content
    #[error("Author must not be empty")]
    EmptyAuthor,

    /// Year outside the supported range
    #[error("Year {0} is out of range (1970..=9998)")]
    InvalidYear(i32),

    /// Summarizer command is empty
    #[error("Summarizer command must name a program")]
    EmptySummarizer,
}

/// External summarizer invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizerSettings {
    /// Program and leading arguments; the prompt is appended last
    #[serde(default = "default_summarizer_command")]
    pub command: Vec<String>,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            command: default_summarizer_command(),
        }
    }
}

fn default_summarizer_command() -> Vec<String> {
    vec!["claude".to_string(), "-p".to_string()]
}

/// The current calendar year in UTC
#[must_use]
pub fn current_year() -> i32 {
    Utc::now().year()
}

/// Contents of the settings file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Partial author name or email
    #[serde(default)]
    pub author: String,

    /// Calendar year under review
    #[serde(default = "current_year")]
    pub year: i32,

    /// Repository checkouts to fetch from; `~` is expanded
    #[serde(default)]
    pub repos: Vec<PathBuf>,

    /// Author matching policy
    #[serde(default)]
    pub author_match: AuthorMatchMode,

    /// Summarizer command
    #[serde(default)]
    pub summarizer: SummarizerSettings,
}

impl Settings {
    /// Create settings for an author and year with no repositories
    #[must_use]
    pub fn new(author: impl Into<String>, year: i32) -> Self {
        Self {
            author: author.into(),
            year,
            repos: Vec::new(),
            author_match: AuthorMatchMode::default(),
            summarizer: SummarizerSettings::default(),
        }
    }

    /// Parse settings from TOML text
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Parse` if the text is not valid settings TOML.
    pub fn from_toml(text: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(text)?)
    }

    /// Load settings from a file without validating them
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::NotFound` if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SettingsError::NotFound(path.to_path_buf())
            } else {
                SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        debug!(path = %path.display(), "Loaded settings");
        Self::from_toml(&text)
    }

    /// Load and validate settings
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, malformed or invalid.
    pub fn load_valid(path: &Path) -> Result<Self, SettingsError> {
        let settings = Self::load(path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check that the settings are usable
    ///
    /// # Errors
    ///
    /// Returns an error for an empty author, an out-of-range year or an
    /// empty summarizer command.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.author_filter()?;
        if !(MIN_YEAR..=MAX_YEAR).contains(&self.year) {
            return Err(SettingsError::InvalidYear(self.year));
        }
        if self
            .summarizer
            .command
            .first()
            .is_none_or(|p| p.trim().is_empty())
        {
            return Err(SettingsError::EmptySummarizer);
        }
        Ok(())
    }

    /// Build the author filter described by these settings
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::EmptyAuthor` if the author has no usable text.
    pub fn author_filter(&self) -> Result<AuthorFilter, SettingsError> {
        AuthorFilter::new(&self.author, self.author_match).ok_or(SettingsError::EmptyAuthor)
    }

    /// Repository paths with `~` expanded
    #[must_use]
    pub fn repo_paths(&self) -> Vec<PathBuf> {
        self.repos.iter().map(|p| expand_tilde(p)).collect()
    }

    /// Write the settings to a file as TOML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let text = toml::to_string_pretty(self)?;
        write_file(path, &text)
    }
}

/// Commented template written by `self-review init`
#[must_use]
pub fn template(year: i32) -> String {
    format!(
        r#"# Self-review configuration

# Your git author name or email (partial match supported)
author = "your-name"

# Year to review
year = {year}

# How the author is matched: "token" (whole words) or "substring"
author_match = "token"

# Git repositories to include
# Use `self-review discover --update` to populate this list
repos = [
    "~/repos/project-1",
    "~/repos/project-2",
]

[summarizer]
# Program and arguments used to generate summaries; the prompt is appended
command = ["claude", "-p"]
"#
    )
}

/// Write the settings template, refusing to overwrite unless `force` is set
///
/// # Errors
///
/// Returns `SettingsError::AlreadyExists` if the file exists and `force` is
/// false.
pub fn write_template(path: &Path, force: bool) -> Result<(), SettingsError> {
    if path.exists() && !force {
        return Err(SettingsError::AlreadyExists(path.to_path_buf()));
    }
    write_file(path, &template(current_year()))
}

/// Expand a leading `~` to the home directory
#[must_use]
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

fn write_file(path: &Path, text: &str) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, text).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })
}
