use crate::types::SandboxJob;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persistence for sandbox job status records.
///
/// Records are advisory: the engine writes them for observability and
/// never reads them back to make scheduling decisions.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn save(&self, job: &SandboxJob) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<SandboxJob>, StoreError>;

    /// All jobs recorded for a submission, newest first
    async fn list_for_submission(&self, submission_id: i64) -> Result<Vec<SandboxJob>, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<Uuid, SandboxJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn save(&self, job: &SandboxJob) -> Result<(), StoreError> {
        self.jobs.lock().insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<SandboxJob>, StoreError> {
        Ok(self.jobs.lock().get(&id).cloned())
    }

    async fn list_for_submission(&self, submission_id: i64) -> Result<Vec<SandboxJob>, StoreError> {
        let mut jobs: Vec<SandboxJob> = self
            .jobs
            .lock()
            .values()
            .filter(|job| job.submission_id == submission_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }
}
