use time::PrimitiveDateTime;

use crate::db::types::SubmissionStatus;

/// Moves a submission into `grading` only from a status that allows it and
/// only while no grade exists. Returns false when the claim lost.
pub(crate) async fn claim_for_grading(
    executor: impl sqlx::PgExecutor<'_>,
    submission_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE submissions SET status = $1, updated_at = $2
         WHERE id = $3
           AND status IN ($4, $5, $6, $7)
           AND NOT EXISTS (SELECT 1 FROM grades g WHERE g.submission_id = $3)",
    )
    .bind(SubmissionStatus::Grading)
    .bind(now)
    .bind(submission_id)
    .bind(SubmissionStatus::Pending)
    .bind(SubmissionStatus::Submitted)
    .bind(SubmissionStatus::Failed)
    .bind(SubmissionStatus::Grading)
    .execute(executor)
    .await?;

    Ok(updated.rows_affected() > 0)
}

/// Never overwrites `graded` or a submission that already has a grade.
pub(crate) async fn mark_failed(
    executor: impl sqlx::PgExecutor<'_>,
    submission_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE submissions SET status = $1, updated_at = $2
         WHERE id = $3
           AND status IN ($4, $5, $6)
           AND NOT EXISTS (SELECT 1 FROM grades g WHERE g.submission_id = $3)",
    )
    .bind(SubmissionStatus::Failed)
    .bind(now)
    .bind(submission_id)
    .bind(SubmissionStatus::Pending)
    .bind(SubmissionStatus::Submitted)
    .bind(SubmissionStatus::Grading)
    .execute(executor)
    .await?;

    Ok(updated.rows_affected() > 0)
}

/// Runs inside the grade transaction, after the grade insert succeeded.
pub(crate) async fn mark_graded(
    executor: impl sqlx::PgExecutor<'_>,
    submission_id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE submissions SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(SubmissionStatus::Graded)
        .bind(now)
        .bind(submission_id)
        .execute(executor)
        .await?;

    Ok(())
}

pub(crate) async fn update_content(
    executor: impl sqlx::PgExecutor<'_>,
    submission_id: &str,
    content: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE submissions SET content = $1, updated_at = $2 WHERE id = $3")
        .bind(content)
        .bind(now)
        .bind(submission_id)
        .execute(executor)
        .await?;

    Ok(())
}
