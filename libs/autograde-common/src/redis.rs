use crate::store::{JobStore, StoreError};
use crate::types::SandboxJob;
use async_trait::async_trait;
use redis::AsyncCommands;
use uuid::Uuid;

/// Redis key semantics for sandbox job records.
/// Keys are deterministic so the API and any external reader never drift.
/// Redis holds status records only; nothing here behaves like a queue.

pub const JOB_PREFIX: &str = "autograde:job";
pub const SUBMISSION_PREFIX: &str = "autograde:submission";

/// Records expire after 24 hours
pub const RECORD_TTL_SECONDS: u64 = 86400;

/// Generate the key holding one job record
pub fn job_key(job_id: &Uuid) -> String {
    format!("{}:{}", JOB_PREFIX, job_id)
}

/// Generate the key of the set of job ids for a submission
pub fn submission_jobs_key(submission_id: i64) -> String {
    format!("{}:{}:jobs", SUBMISSION_PREFIX, submission_id)
}

/// Store a job record and index it under its submission
pub async fn store_job(
    conn: &mut redis::aio::ConnectionManager,
    job: &SandboxJob,
) -> Result<(), StoreError> {
    let payload = serde_json::to_string(job)?;

    let _: () = conn.set_ex(job_key(&job.id), payload, RECORD_TTL_SECONDS as _).await?;

    let index_key = submission_jobs_key(job.submission_id);
    let _: () = conn.sadd(&index_key, job.id.to_string()).await?;
    let _: () = conn.expire(&index_key, RECORD_TTL_SECONDS as _).await?;

    Ok(())
}

/// Retrieve a job record
pub async fn get_job(
    conn: &mut redis::aio::ConnectionManager,
    job_id: &Uuid,
) -> Result<Option<SandboxJob>, StoreError> {
    let payload: Option<String> = conn.get(job_key(job_id)).await?;

    match payload {
        Some(data) => Ok(Some(serde_json::from_str(&data)?)),
        None => Ok(None),
    }
}

/// Redis-backed job store, cheap to clone
#[derive(Clone)]
pub struct RedisJobStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisJobStore {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn save(&self, job: &SandboxJob) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        store_job(&mut conn, job).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<SandboxJob>, StoreError> {
        let mut conn = self.conn.clone();
        get_job(&mut conn, &id).await
    }

    async fn list_for_submission(&self, submission_id: i64) -> Result<Vec<SandboxJob>, StoreError> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.smembers(submission_jobs_key(submission_id)).await?;

        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            // Index entries can outlive expired records
            let Ok(id) = Uuid::parse_str(&id) else { continue };
            if let Some(job) = get_job(&mut conn, &id).await? {
                jobs.push(job);
            }
        }
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_key_deterministic() {
        let id = Uuid::new_v4();
        let key1 = job_key(&id);
        let key2 = job_key(&id);
        assert_eq!(key1, key2);
        assert!(key1.starts_with("autograde:job:"));
        assert!(key1.contains(&id.to_string()));
    }

    #[test]
    fn test_submission_jobs_key_format() {
        assert_eq!(submission_jobs_key(42), "autograde:submission:42:jobs");
    }
}
