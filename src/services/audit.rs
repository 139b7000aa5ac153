use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::repositories;

pub(crate) const GRADING_COMPLETED: &str = "grading.completed";
pub(crate) const GRADING_FAILED: &str = "grading.failed";
pub(crate) const BATCH_COMPLETED: &str = "batch.completed";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AuditEvent {
    pub(crate) action: &'static str,
    pub(crate) entity_type: &'static str,
    pub(crate) entity_id: String,
    pub(crate) details: Value,
}

impl AuditEvent {
    pub(crate) fn submission(action: &'static str, submission_id: &str, details: Value) -> Self {
        Self { action, entity_type: "submission", entity_id: submission_id.to_string(), details }
    }

    pub(crate) fn assignment(action: &'static str, assignment_id: &str, details: Value) -> Self {
        Self { action, entity_type: "assignment", entity_id: assignment_id.to_string(), details }
    }
}

/// Fire-and-forget sink. `record` must not block the caller and must not
/// surface failures to it.
pub(crate) trait AuditLog: Send + Sync {
    fn record(&self, event: AuditEvent);
}

#[derive(Clone)]
pub(crate) struct PgAuditLog {
    pool: PgPool,
}

impl PgAuditLog {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl AuditLog for PgAuditLog {
    fn record(&self, event: AuditEvent) {
        let pool = self.pool.clone();
        tokio::spawn(async move {
            let id = Uuid::new_v4().to_string();
            let result = repositories::audit::insert(
                &pool,
                repositories::audit::CreateAuditEvent {
                    id: &id,
                    action: event.action,
                    entity_type: event.entity_type,
                    entity_id: &event.entity_id,
                    details: &event.details,
                    created_at: primitive_now_utc(),
                },
            )
            .await;

            if let Err(err) = result {
                tracing::warn!(
                    action = event.action,
                    entity_id = %event.entity_id,
                    error = %err,
                    "Failed to write audit event"
                );
            }
        });
    }
}
