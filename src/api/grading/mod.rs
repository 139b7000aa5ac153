mod handlers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/submissions/:submission_id", post(handlers::grade_submission))
        .route("/assignments/:assignment_id/batch", post(handlers::start_batch))
        .route("/jobs/:job_id", get(handlers::get_job))
        .route("/answers", post(handlers::grade_answer))
}
