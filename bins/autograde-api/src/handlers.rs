// HTTP route handlers for the Autograde API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use autograde_common::types::TestCase;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::language_config::supported_languages;
use crate::metrics;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    pub language: String,
    #[serde(default)]
    pub stdin: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    pub submission_id: i64,
    pub code: String,
    pub language: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /languages - Supported-language table
pub async fn list_languages() -> impl IntoResponse {
    Json(supported_languages())
}

/// POST /execute - Run code once, no grading
pub async fn execute(State(state): State<Arc<AppState>>, Json(payload): Json<ExecuteRequest>) -> Response {
    if payload.timeout_ms == Some(0) {
        return error_response(StatusCode::BAD_REQUEST, "timeout_ms must be positive");
    }
    let timeout_ms = payload
        .timeout_ms
        .unwrap_or_else(|| state.config.default_timeout_ms());

    let outcome = state
        .router
        .run_source(&payload.code, &payload.language, &payload.stdin, timeout_ms)
        .await;

    info!(
        language = %payload.language,
        outcome = outcome.kind.as_str(),
        runtime_ms = outcome.runtime_ms,
        "Ad-hoc execution finished"
    );
    (StatusCode::OK, Json(outcome)).into_response()
}

/// POST /grade - Grade a submission against its test cases
pub async fn grade(State(state): State<Arc<AppState>>, Json(payload): Json<GradeRequest>) -> Response {
    if let Some(message) = payload.test_cases.iter().find_map(|tc| tc.validate().err()) {
        warn!(submission_id = payload.submission_id, error = %message, "Rejected grading request");
        return error_response(StatusCode::BAD_REQUEST, message);
    }

    let started = Instant::now();
    let outcome = state
        .tracker
        .grade(payload.submission_id, &payload.code, &payload.language, &payload.test_cases)
        .await;
    metrics::record_grading(&outcome, started.elapsed());

    let status = if outcome.is_graded() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(outcome)).into_response()
}

/// GET /jobs/{job_id} - Sandbox job record
pub async fn get_job(State(state): State<Arc<AppState>>, Path(job_id): Path<String>) -> Response {
    let job_uuid = match Uuid::parse_str(&job_id) {
        Ok(id) => id,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid job ID format"),
    };

    match state.tracker.get_job(job_uuid).await {
        Ok(Some(job)) => (StatusCode::OK, Json(job)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("Job {} not found", job_id)),
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Failed to fetch job");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to query job: {}", e))
        }
    }
}

/// GET /submissions/{submission_id}/jobs - Jobs for a submission, newest first
pub async fn submission_jobs(State(state): State<Arc<AppState>>, Path(submission_id): Path<i64>) -> Response {
    match state.tracker.jobs_for_submission(submission_id).await {
        Ok(jobs) => (StatusCode::OK, Json(jobs)).into_response(),
        Err(e) => {
            error!(submission_id = submission_id, error = %e, "Failed to list jobs");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to list jobs: {}", e))
        }
    }
}

/// GET /metrics - Prometheus exposition
pub async fn export_metrics() -> Response {
    match metrics::render() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to encode metrics: {}", e)),
    }
}
