use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::error::StoreError;

/// A normalized job posting extracted from a career page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub url: String,
    pub posted_date: DateTime<Utc>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub employment_type: Option<String>,
    pub requirements: Option<Vec<String>>,
    pub benefits: Option<Vec<String>>,
    pub scraped_at: DateTime<Utc>,
}

/// Stable identifier for a posting: `<target slug>_<digest>`, where the digest
/// covers title and location. Re-scraping an unchanged posting yields the
/// same id, which keeps saves idempotent.
pub fn job_id(target_name: &str, title: &str, location: &str) -> String {
    let slug = target_name.trim().to_lowercase().replace(' ', "_");
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    // Unit separator keeps ("ab", "c") and ("a", "bc") apart.
    hasher.update([0x1f]);
    hasher.update(location.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{slug}_{}", &digest[..16])
}

impl JobRecord {
    /// Insert or refresh a job keyed by id. Returns true when the row is new.
    pub async fn upsert(pool: &PgPool, job: &JobRecord) -> Result<bool, StoreError> {
        let (inserted,): (bool,) = sqlx::query_as(
            "INSERT INTO jobs (id, title, company, location, description, url, posted_date, salary_min, salary_max, employment_type, requirements, benefits, scraped_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             ON CONFLICT (id) DO UPDATE SET
                 title = EXCLUDED.title,
                 company = EXCLUDED.company,
                 location = EXCLUDED.location,
                 description = EXCLUDED.description,
                 url = EXCLUDED.url,
                 salary_min = EXCLUDED.salary_min,
                 salary_max = EXCLUDED.salary_max,
                 employment_type = EXCLUDED.employment_type,
                 requirements = EXCLUDED.requirements,
                 benefits = EXCLUDED.benefits,
                 scraped_at = EXCLUDED.scraped_at,
                 updated_at = NOW()
             RETURNING (xmax = 0)",
        )
        .bind(&job.id)
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.description)
        .bind(&job.url)
        .bind(job.posted_date)
        .bind(job.salary_min)
        .bind(job.salary_max)
        .bind(&job.employment_type)
        .bind(&job.requirements)
        .bind(&job.benefits)
        .bind(job.scraped_at)
        .fetch_one(pool)
        .await?;
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_deterministic() {
        let a = job_id("Acme Corp", "Backend Engineer", "Berlin");
        let b = job_id("Acme Corp", "Backend Engineer", "Berlin");
        assert_eq!(a, b);
        assert!(a.starts_with("acme_corp_"));
        assert_eq!(a.len(), "acme_corp_".len() + 16);
    }

    #[test]
    fn id_depends_on_title_and_location() {
        let base = job_id("Acme", "Engineer", "Remote");
        assert_ne!(base, job_id("Acme", "Engineer", "Berlin"));
        assert_ne!(base, job_id("Acme", "Manager", "Remote"));
        assert_ne!(job_id("Acme", "ab", "c"), job_id("Acme", "a", "bc"));
    }
}
