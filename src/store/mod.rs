// Persistence collaborator: where extracted jobs and session records go.

mod memory;
mod postgres;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{JobRecord, ScrapeSessionRecord};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage used by the orchestrator. Failures are logged by the caller and
/// never abort a batch.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Idempotent upsert keyed by `JobRecord::id`.
    async fn save_job(&self, job: &JobRecord) -> Result<(), StoreError>;

    async fn log_session(&self, session: &ScrapeSessionRecord) -> Result<(), StoreError>;
}
