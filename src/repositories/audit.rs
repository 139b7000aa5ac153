use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

pub(crate) struct CreateAuditEvent<'a> {
    pub(crate) id: &'a str,
    pub(crate) action: &'a str,
    pub(crate) entity_type: &'a str,
    pub(crate) entity_id: &'a str,
    pub(crate) details: &'a serde_json::Value,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn insert(pool: &PgPool, event: CreateAuditEvent<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_events (id, action, entity_type, entity_id, details, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(event.id)
    .bind(event.action)
    .bind(event.entity_type)
    .bind(event.entity_id)
    .bind(Json(event.details))
    .bind(event.created_at)
    .execute(pool)
    .await?;

    Ok(())
}
