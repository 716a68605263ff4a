use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::error::StoreError;
use crate::models::{JobRecord, ScrapeSessionRecord};
use crate::store::JobStore;

#[derive(Debug, Default)]
struct MemoryState {
    jobs: IndexMap<String, JobRecord>,
    sessions: Vec<ScrapeSessionRecord>,
}

/// Process-local store. Used when no database is configured, and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored jobs in first-insertion order.
    pub fn jobs(&self) -> Vec<JobRecord> {
        self.lock().jobs.values().cloned().collect()
    }

    pub fn sessions(&self) -> Vec<ScrapeSessionRecord> {
        self.lock().sessions.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn save_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        self.lock().jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn log_session(&self, session: &ScrapeSessionRecord) -> Result<(), StoreError> {
        self.lock().sessions.push(session.clone());
        Ok(())
    }
}
