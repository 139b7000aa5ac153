use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::Answer;

pub(crate) const COLUMNS: &str = "\
    id, submission_id, question_id, response, is_correct, points_earned, feedback, graded_at";

pub(crate) struct GradedAnswer<'a> {
    pub(crate) submission_id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) response: &'a str,
    pub(crate) is_correct: bool,
    pub(crate) points_earned: f64,
    pub(crate) feedback: &'a str,
    pub(crate) graded_at: PrimitiveDateTime,
}

pub(crate) async fn list_by_submission(
    pool: &PgPool,
    submission_id: &str,
) -> Result<Vec<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "SELECT {COLUMNS} FROM answers WHERE submission_id = $1"
    ))
    .bind(submission_id)
    .fetch_all(pool)
    .await
}

/// One row per (submission, question); a second write updates in place.
pub(crate) async fn upsert_graded(
    executor: impl sqlx::PgExecutor<'_>,
    params: GradedAnswer<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO answers (
            id, submission_id, question_id, response, is_correct, points_earned, feedback,
            graded_at, created_at, updated_at
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $8)
         ON CONFLICT (submission_id, question_id) DO UPDATE
             SET response = EXCLUDED.response,
                 is_correct = EXCLUDED.is_correct,
                 points_earned = EXCLUDED.points_earned,
                 feedback = EXCLUDED.feedback,
                 graded_at = EXCLUDED.graded_at,
                 updated_at = EXCLUDED.updated_at",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(params.submission_id)
    .bind(params.question_id)
    .bind(params.response)
    .bind(params.is_correct)
    .bind(params.points_earned)
    .bind(params.feedback)
    .bind(params.graded_at)
    .execute(executor)
    .await?;

    Ok(())
}
