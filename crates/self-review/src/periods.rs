// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Review periods
//!
//! A review covers one calendar quarter or the whole year. Periods are
//! half-open UTC ranges `[start, end)`; the four quarters of a year tile it
//! without gaps or overlap.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

use self_review_git::RepoIdentity;

use crate::db::{Database, DbError};
use crate::store::CommitRecord;

/// Period errors
#[derive(Debug, Error)]
pub enum PeriodError {
    /// Label is not Q1..Q4 or ALL
    #[error("Invalid period: {0} (use Q1, Q2, Q3, Q4 or ALL)")]
    InvalidLabel(String),

    /// Year cannot be represented
    #[error("Year out of range: {0}")]
    InvalidYear(i32),

    /// Database error while reading commits
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

/// A calendar quarter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quarter {
    /// January to March
    Q1,
    /// April to June
    Q2,
    /// July to September
    Q3,
    /// October to December
    Q4,
}

impl Quarter {
    /// All quarters in calendar order
    pub const ALL: [Quarter; 4] = [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4];

    /// Month the quarter starts in
    #[must_use]
    pub fn start_month(self) -> u32 {
        match self {
            Quarter::Q1 => 1,
            Quarter::Q2 => 4,
            Quarter::Q3 => 7,
            Quarter::Q4 => 10,
        }
    }

    /// Short label such as `Q1`
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Quarter::Q1 => "Q1",
            Quarter::Q2 => "Q2",
            Quarter::Q3 => "Q3",
            Quarter::Q4 => "Q4",
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Quarter {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "Q1" => Ok(Quarter::Q1),
            "Q2" => Ok(Quarter::Q2),
            "Q3" => Ok(Quarter::Q3),
            "Q4" => Ok(Quarter::Q4),
            _ => Err(PeriodError::InvalidLabel(s.to_string())),
        }
    }
}

/// The span a review covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReviewPeriod {
    /// A single quarter
    Quarter(Quarter),
    /// The full year
    All,
}

impl ReviewPeriod {
    /// The four quarters in order
    #[must_use]
    pub fn quarters() -> Vec<ReviewPeriod> {
        Quarter::ALL.into_iter().map(ReviewPeriod::Quarter).collect()
    }

    /// Label used as the summary cache key: `Q1`..`Q4` or `ALL`
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ReviewPeriod::Quarter(q) => q.label(),
            ReviewPeriod::All => "ALL",
        }
    }

    /// Human-readable name for a year, e.g. `2025-Q1` or `2025`
    #[must_use]
    pub fn display_name(self, year: i32) -> String {
        match self {
            ReviewPeriod::Quarter(q) => format!("{year}-{q}"),
            ReviewPeriod::All => year.to_string(),
        }
    }

    /// Half-open UTC range `[start, end)` of this period in `year`
    ///
    /// # Errors
    ///
    /// Returns `PeriodError::InvalidYear` if the dates cannot be represented.
    pub fn bounds(self, year: i32) -> Result<(DateTime<Utc>, DateTime<Utc>), PeriodError> {
        let start = first_of(year, self.start_month(), year)?;
        let end = match self {
            ReviewPeriod::Quarter(Quarter::Q4) | ReviewPeriod::All => {
                let next = year.checked_add(1).ok_or(PeriodError::InvalidYear(year))?;
                first_of(next, 1, year)?
            }
            ReviewPeriod::Quarter(q) => first_of(year, q.start_month() + 3, year)?,
        };
        Ok((start, end))
    }

    fn start_month(self) -> u32 {
        match self {
            ReviewPeriod::Quarter(q) => q.start_month(),
            ReviewPeriod::All => 1,
        }
    }
}

impl fmt::Display for ReviewPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ReviewPeriod {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(ReviewPeriod::All)
        } else {
            s.parse().map(ReviewPeriod::Quarter)
        }
    }
}

fn first_of(year: i32, month: u32, requested: i32) -> Result<DateTime<Utc>, PeriodError> {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .ok_or(PeriodError::InvalidYear(requested))
}

/// Half-open UTC range of a period
///
/// # Errors
///
/// Returns `PeriodError::InvalidYear` if the dates cannot be represented.
pub fn bounds(
    year: i32,
    period: ReviewPeriod,
) -> Result<(DateTime<Utc>, DateTime<Utc>), PeriodError> {
    period.bounds(year)
}

/// Cached commits of the given repositories that fall inside a period
///
/// # Errors
///
/// Returns an error if the bounds are invalid or the query fails.
pub fn commits_for(
    db: &Database,
    repos: &[RepoIdentity],
    year: i32,
    period: ReviewPeriod,
) -> Result<Vec<CommitRecord>, PeriodError> {
    let (start, end) = period.bounds(year)?;
    Ok(db.query(repos, start, end)?)
}
