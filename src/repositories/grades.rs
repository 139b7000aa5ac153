use std::collections::BTreeMap;

use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{CriterionScore, Grade};

pub(crate) const COLUMNS: &str = "\
    id, submission_id, score, feedback, rubric_scores, ai_response, graded_by, created_at, \
    updated_at";

pub(crate) struct CreateGrade<'a> {
    pub(crate) id: &'a str,
    pub(crate) submission_id: &'a str,
    pub(crate) score: f64,
    pub(crate) feedback: Option<&'a str>,
    pub(crate) rubric_scores: &'a BTreeMap<String, CriterionScore>,
    pub(crate) ai_response: &'a serde_json::Value,
    pub(crate) graded_by: Option<&'a str>,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn exists_for_submission(
    pool: &PgPool,
    submission_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM grades WHERE submission_id = $1)")
        .bind(submission_id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn insert(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateGrade<'_>,
) -> Result<Grade, sqlx::Error> {
    sqlx::query_as::<_, Grade>(&format!(
        "INSERT INTO grades (
            id, submission_id, score, feedback, rubric_scores, ai_response, graded_by,
            created_at, updated_at
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.submission_id)
    .bind(params.score)
    .bind(params.feedback)
    .bind(Json(params.rubric_scores))
    .bind(Json(params.ai_response))
    .bind(params.graded_by)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}
