use sqlx::PgPool;

use crate::db::models::QuestionRow;

pub(crate) const COLUMNS: &str = "\
    id, assignment_id, position, question_type, prompt, points, options, correct_answers, \
    reference_answer";

pub(crate) async fn list_by_assignment(
    pool: &PgPool,
    assignment_id: &str,
) -> Result<Vec<QuestionRow>, sqlx::Error> {
    sqlx::query_as::<_, QuestionRow>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE assignment_id = $1 ORDER BY position, id"
    ))
    .bind(assignment_id)
    .fetch_all(pool)
    .await
}
