use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::{JobRecord, ScrapeSessionRecord};
use crate::store::JobStore;

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn save_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        let inserted = JobRecord::upsert(&self.pool, job).await?;
        tracing::debug!(job_id = %job.id, inserted, "Saved job");
        Ok(())
    }

    async fn log_session(&self, session: &ScrapeSessionRecord) -> Result<(), StoreError> {
        ScrapeSessionRecord::insert(&self.pool, session).await
    }
}
