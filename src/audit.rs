use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use sea_orm::ActiveValue::NotSet;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    context::Actor,
    db::DbPool,
    entity::audit_logs::ActiveModel as AuditActive,
    error::AppResult,
};

/// One append-only audit row.
#[derive(Debug, Clone)]
pub struct AuditEntry<'a> {
    pub actor: Actor,
    pub action: &'a str,
    pub entity_type: &'a str,
    pub entity_id: Option<String>,
    pub changes: Option<Value>,
}

/// Write the entry on `conn`, typically an open transaction, so the audit
/// row commits or rolls back together with the change it describes.
pub async fn record_audit<C: ConnectionTrait>(conn: &C, entry: AuditEntry<'_>) -> AppResult<()> {
    AuditActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(entry.actor.audit_id()),
        action: Set(entry.action.to_string()),
        entity_type: Set(entry.entity_type.to_string()),
        entity_id: Set(entry.entity_id),
        changes: Set(entry.changes),
        created_at: NotSet,
    }
    .insert(conn)
    .await?;
    Ok(())
}

/// Standalone audit write for changes that are already committed.
pub async fn log_audit(pool: &DbPool, entry: AuditEntry<'_>) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, entity_type, entity_id, changes)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry.actor.audit_id())
    .bind(entry.action)
    .bind(entry.entity_type)
    .bind(entry.entity_id)
    .bind(entry.changes)
    .execute(pool)
    .await?;

    Ok(())
}

/// [`log_audit`] for call sites where a failed audit write must not fail the
/// request.
pub async fn log_audit_or_warn(pool: &DbPool, entry: AuditEntry<'_>) {
    let action = entry.action.to_string();
    if let Err(err) = log_audit(pool, entry).await {
        tracing::warn!(error = %err, action = %action, "audit log failed");
    }
}
