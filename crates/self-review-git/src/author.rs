// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Author matching
//!
//! A filter is a partial author string such as `jane`, `jane doe` or
//! `jane@co.com`. It is compared case-insensitively against the commit
//! author's name and email.
//!
//! Two policies are available:
//!
//! - [`AuthorMatchMode::Token`] (default): the filter's alphanumeric tokens
//!   must appear as a contiguous run of tokens in the author name or email.
//!   `jane` matches `Jane Doe <jane@co.com>` but not `janet@co.com`.
//! - [`AuthorMatchMode::Substring`]: plain case-insensitive substring, the
//!   behaviour of `git log --author`.

use serde::{Deserialize, Serialize};

/// How a partial author string is compared to commit authors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorMatchMode {
    /// Whole-token match
    #[default]
    Token,
    /// Case-insensitive substring match
    Substring,
}

/// A normalized author filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorFilter {
    raw: String,
    needle: String,
    tokens: Vec<String>,
    mode: AuthorMatchMode,
}

impl AuthorFilter {
    /// Build a filter from a partial author string
    ///
    /// Returns `None` when the string has no alphanumeric content, since such
    /// a filter would either match nothing or everything.
    #[must_use]
    pub fn new(raw: &str, mode: AuthorMatchMode) -> Option<Self> {
        let tokens = tokenize(raw);
        if tokens.is_empty() {
            return None;
        }
        Some(Self {
            raw: raw.trim().to_string(),
            needle: raw.trim().to_lowercase(),
            tokens,
            mode,
        })
    }

    /// The filter as the user wrote it
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Matching policy in effect
    #[must_use]
    pub fn mode(&self) -> AuthorMatchMode {
        self.mode
    }

    /// Stable key identifying what this filter matches
    ///
    /// Two filters with the same key match exactly the same authors.
    #[must_use]
    pub fn key(&self) -> String {
        match self.mode {
            AuthorMatchMode::Token => format!("token:{}", self.tokens.join(" ")),
            AuthorMatchMode::Substring => format!("substring:{}", self.needle),
        }
    }

    /// Check an author name and email against the filter
    #[must_use]
    pub fn matches(&self, name: &str, email: &str) -> bool {
        match self.mode {
            AuthorMatchMode::Substring => {
                name.to_lowercase().contains(&self.needle)
                    || email.to_lowercase().contains(&self.needle)
            }
            AuthorMatchMode::Token => {
                contains_run(&tokenize(name), &self.tokens)
                    || contains_run(&tokenize(email), &self.tokens)
            }
        }
    }
}

/// Lowercased alphanumeric runs of a string
fn tokenize(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn contains_run(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty()
        && haystack.len() >= needle.len()
        && haystack.windows(needle.len()).any(|w| w == needle)
}
