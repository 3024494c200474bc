// Sandbox job tracking around a grading run.
//
// The job record is observability data: queued -> running -> completed | errored.
// Nothing here retries or requeues, and a store outage never fails grading.

use crate::executor::GradingAggregator;
use autograde_common::store::{JobStore, StoreError};
use autograde_common::types::{GradingSummary, SandboxJob, SubmissionGrade, TestCase};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// What the caller needs to transition the submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingOutcome {
    pub job: SandboxJob,
    pub summary: Option<GradingSummary>,
    pub submission_status: SubmissionGrade,
}

impl GradingOutcome {
    pub fn is_graded(&self) -> bool {
        self.submission_status == SubmissionGrade::Graded
    }
}

#[derive(Clone)]
pub struct JobTracker {
    aggregator: GradingAggregator,
    store: Arc<dyn JobStore>,
}

impl JobTracker {
    pub fn new(aggregator: GradingAggregator, store: Arc<dyn JobStore>) -> Self {
        Self { aggregator, store }
    }

    /// New `queued` job carrying the engine's default limits
    pub async fn create_job(&self, submission_id: i64) -> SandboxJob {
        let config = self.aggregator.config();
        let job = SandboxJob::new(submission_id, config.default_timeout_secs, config.memory_limit_mb);
        self.persist(&job).await;
        job
    }

    pub async fn grade(
        &self,
        submission_id: i64,
        code: &str,
        language: &str,
        test_cases: &[TestCase],
    ) -> GradingOutcome {
        let mut job = self.create_job(submission_id).await;

        if let Err(e) = job.mark_running() {
            warn!(job_id = %job.id, error = %e, "Unexpected job state");
        }
        self.persist(&job).await;

        info!(
            job_id = %job.id,
            submission_id = submission_id,
            language = language,
            "Sandbox job running"
        );

        match self.aggregator.run_all(code, language, test_cases).await {
            Ok(summary) => {
                if let Err(e) = job.mark_completed(&summary) {
                    warn!(job_id = %job.id, error = %e, "Unexpected job state");
                }
                self.persist(&job).await;
                info!(
                    job_id = %job.id,
                    score = summary.score,
                    duration_ms = job.duration_ms().unwrap_or_default(),
                    "Sandbox job completed"
                );
                GradingOutcome {
                    job,
                    summary: Some(summary),
                    submission_status: SubmissionGrade::Graded,
                }
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!(job_id = %job.id, error = %message, "Sandbox job errored");
                if let Err(e) = job.mark_errored(message) {
                    warn!(job_id = %job.id, error = %e, "Unexpected job state");
                }
                self.persist(&job).await;
                GradingOutcome {
                    job,
                    summary: None,
                    submission_status: SubmissionGrade::Error,
                }
            }
        }
    }

    pub async fn get_job(&self, id: Uuid) -> Result<Option<SandboxJob>, StoreError> {
        self.store.get(id).await
    }

    /// Newest first
    pub async fn jobs_for_submission(&self, submission_id: i64) -> Result<Vec<SandboxJob>, StoreError> {
        self.store.list_for_submission(submission_id).await
    }

    async fn persist(&self, job: &SandboxJob) {
        if let Err(e) = self.store.save(job).await {
            warn!(job_id = %job.id, status = %job.status, error = %e, "Failed to persist sandbox job");
        }
    }
}
