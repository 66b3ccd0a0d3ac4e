// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Summary cache
//!
//! Generated narratives keyed by `(year, period)`.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use crate::db::{Database, DbError, format_timestamp, parse_timestamp};
use crate::periods::ReviewPeriod;

/// A generated summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRecord {
    /// Year reviewed
    pub year: i32,
    /// Period within the year
    pub period: ReviewPeriod,
    /// Summary text
    pub content: String,
    /// When the summary was generated
    pub generated_at: DateTime<Utc>,
    /// Hashes of the commits the summary covered
    pub commit_hashes: Vec<String>,
}

impl SummaryRecord {
    /// Create a record stamped with the current time
    #[must_use]
    pub fn new(
        year: i32,
        period: ReviewPeriod,
        content: impl Into<String>,
        commit_hashes: Vec<String>,
    ) -> Self {
        Self {
            year,
            period,
            content: content.into(),
            generated_at: Utc::now(),
            commit_hashes,
        }
    }
}

impl Database {
    /// Look up a cached summary
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is corrupt.
    pub fn get_summary(
        &self,
        year: i32,
        period: ReviewPeriod,
    ) -> Result<Option<SummaryRecord>, DbError> {
        let row: Option<(String, String, String)> = self
            .connection()
            .query_row(
                "SELECT content, generated_at, commit_hashes_json FROM summaries
                 WHERE year = ?1 AND period = ?2",
                params![year, period.label()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((content, generated_at, hashes_json)) = row else {
            return Ok(None);
        };

        Ok(Some(SummaryRecord {
            year,
            period,
            content,
            generated_at: parse_timestamp("summaries", &generated_at)?,
            commit_hashes: serde_json::from_str(&hashes_json)?,
        }))
    }

    /// Store a summary, replacing any previous one for the same period
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn put_summary(&self, record: &SummaryRecord) -> Result<(), DbError> {
        self.connection().execute(
            "INSERT INTO summaries (year, period, content, commit_hashes_json, generated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(year, period) DO UPDATE SET
                 content = excluded.content,
                 commit_hashes_json = excluded.commit_hashes_json,
                 generated_at = excluded.generated_at",
            params![
                record.year,
                record.period.label(),
                record.content,
                serde_json::to_string(&record.commit_hashes)?,
                format_timestamp(record.generated_at),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::periods::Quarter;
    use chrono::TimeZone;
    use similar_asserts::assert_eq;

    fn db() -> Database {
        let mut db = Database::in_memory().expect("create db");
        db.initialize().expect("init");
        db
    }

    fn record(period: ReviewPeriod, content: &str) -> SummaryRecord {
        SummaryRecord {
            year: 2025,
            period,
            content: content.to_string(),
            generated_at: Utc.with_ymd_and_hms(2025, 12, 1, 9, 30, 0).unwrap(),
            commit_hashes: vec!["a".repeat(40), "b".repeat(40)],
        }
    }

    #[test]
    fn test_get_missing() {
        let db = db();
        assert!(db.get_summary(2025, ReviewPeriod::All).expect("get").is_none());
    }

    #[test]
    fn test_put_then_get() {
        let db = db();
        let q1 = record(ReviewPeriod::Quarter(Quarter::Q1), "Shipped the API");
        db.put_summary(&q1).expect("put");

        assert_eq!(
            db.get_summary(2025, ReviewPeriod::Quarter(Quarter::Q1))
                .expect("get"),
            Some(q1)
        );
        assert!(
            db.get_summary(2025, ReviewPeriod::Quarter(Quarter::Q2))
                .expect("get")
                .is_none()
        );
        assert!(
            db.get_summary(2024, ReviewPeriod::Quarter(Quarter::Q1))
                .expect("get")
                .is_none()
        );
    }

    #[test]
    fn test_put_overwrites() {
        let db = db();
        db.put_summary(&record(ReviewPeriod::All, "first")).expect("put");
        let mut second = record(ReviewPeriod::All, "second");
        second.commit_hashes.clear();
        db.put_summary(&second).expect("put again");

        let stored = db
            .get_summary(2025, ReviewPeriod::All)
            .expect("get")
            .expect("present");
        assert_eq!(stored.content, "second");
        assert!(stored.commit_hashes.is_empty());
        assert_eq!(db.count("summaries").expect("count"), 1);
    }
}
