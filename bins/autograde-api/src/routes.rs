use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(handlers::health_check))
        .route("/languages", get(handlers::list_languages))
        .route("/execute", post(handlers::execute))
        .route("/grade", post(handlers::grade))
        .route("/jobs/:job_id", get(handlers::get_job))
        .route("/submissions/:submission_id/jobs", get(handlers::submission_jobs))
        .route("/metrics", get(handlers::export_metrics))
}
