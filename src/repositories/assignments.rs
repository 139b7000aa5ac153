use sqlx::PgPool;

use crate::db::models::{Assignment, Rubric};

pub(crate) const COLUMNS: &str = "\
    id, title, kind, description, reference_answer, reference_pdf_text, total_points, \
    created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!("SELECT {COLUMNS} FROM assignments WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_rubric(
    pool: &PgPool,
    assignment_id: &str,
) -> Result<Option<Rubric>, sqlx::Error> {
    sqlx::query_as::<_, Rubric>(
        "SELECT id, assignment_id, criteria FROM rubrics WHERE assignment_id = $1",
    )
    .bind(assignment_id)
    .fetch_optional(pool)
    .await
}
