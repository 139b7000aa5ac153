use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::grading::{BatchJobAccepted, GradeAnswerRequest, GradeSubmissionResponse};
use crate::services::quiz_grading::AnswerGrade;
use crate::tasks::grading::BatchJob;

pub(super) async fn grade_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
) -> Result<Json<GradeSubmissionResponse>, ApiError> {
    let graded = state.grading().grade_submission_by_id(&submission_id).await?;
    Ok(Json(graded.into()))
}

/// Accepts the batch and returns immediately; progress is read from the job.
pub(super) async fn start_batch(
    State(state): State<AppState>,
    Path(assignment_id): Path<String>,
) -> Result<(StatusCode, Json<BatchJobAccepted>), ApiError> {
    state.grading().ensure_assignment(&assignment_id).await?;

    let job_id = state.jobs().spawn(&assignment_id).await;
    let status_url = format!("{}/grading/jobs/{job_id}", state.settings().api().api_v1_str);
    Ok((StatusCode::ACCEPTED, Json(BatchJobAccepted { job_id, assignment_id, status_url })))
}

pub(super) async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<BatchJob>, ApiError> {
    state
        .jobs()
        .get(&job_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("job {job_id} not found")))
}

pub(super) async fn grade_answer(
    State(state): State<AppState>,
    Json(payload): Json<GradeAnswerRequest>,
) -> Result<Json<AnswerGrade>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let (question, answer) = payload.into_parts();
    Ok(Json(state.grading().grade_answer(&question, &answer).await))
}
