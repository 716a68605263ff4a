use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Success,
    Failed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Success => "success",
            SessionStatus::Failed => "failed",
        }
    }
}

/// Audit entry for one target's scrape attempt. Written whatever the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeSessionRecord {
    pub target_name: String,
    pub url: String,
    pub status: SessionStatus,
    pub jobs_found: usize,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
}

impl ScrapeSessionRecord {
    pub fn succeeded(
        target_name: &str,
        url: &str,
        jobs_found: usize,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self::finish(target_name, url, SessionStatus::Success, jobs_found, None, started_at)
    }

    pub fn failed(target_name: &str, url: &str, error: String, started_at: DateTime<Utc>) -> Self {
        Self::finish(target_name, url, SessionStatus::Failed, 0, Some(error), started_at)
    }

    fn finish(
        target_name: &str,
        url: &str,
        status: SessionStatus,
        jobs_found: usize,
        error: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let finished_at = Utc::now();
        let duration_seconds = (finished_at - started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        ScrapeSessionRecord {
            target_name: target_name.to_string(),
            url: url.to_string(),
            status,
            jobs_found,
            error,
            started_at,
            finished_at,
            duration_seconds,
        }
    }

    pub async fn insert(pool: &PgPool, session: &ScrapeSessionRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO scrape_logs (company, url, status, jobs_found, error_message, started_at, completed_at, duration_seconds)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&session.target_name)
        .bind(&session.url)
        .bind(session.status.as_str())
        .bind(i32::try_from(session.jobs_found).unwrap_or(i32::MAX))
        .bind(&session.error)
        .bind(session.started_at)
        .bind(session.finished_at)
        .bind(session.duration_seconds)
        .execute(pool)
        .await?;
        Ok(())
    }
}
