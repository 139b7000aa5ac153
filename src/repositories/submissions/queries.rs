use sqlx::PgPool;

use crate::db::models::Submission;
use crate::db::types::SubmissionStatus;

use super::COLUMNS;

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!("SELECT {COLUMNS} FROM submissions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Oldest first, so earlier submitters are graded first.
pub(crate) async fn list_awaiting_grading(
    pool: &PgPool,
    assignment_id: &str,
) -> Result<Vec<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS}
         FROM submissions s
         WHERE s.assignment_id = $1
           AND s.status IN ($2, $3)
           AND NOT EXISTS (SELECT 1 FROM grades g WHERE g.submission_id = s.id)
         ORDER BY s.submitted_at ASC, s.id ASC"
    ))
    .bind(assignment_id)
    .bind(SubmissionStatus::Pending)
    .bind(SubmissionStatus::Submitted)
    .fetch_all(pool)
    .await
}
