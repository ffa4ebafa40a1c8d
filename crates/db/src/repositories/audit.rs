use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::Row;

use mailquote_core::audit::AuditEvent;
use mailquote_core::domain::email::EmailId;

use super::{AuditEventRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAuditEventRepository {
    pool: DbPool,
}

impl SqlAuditEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn label_of<T: Serialize>(value: &T) -> Result<String, RepositoryError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(label)) => Ok(label),
        Ok(other) => Err(RepositoryError::Decode(format!("expected a unit variant, got {other}"))),
        Err(error) => Err(RepositoryError::Decode(error.to_string())),
    }
}

fn parse_label<T: DeserializeOwned>(label: String) -> Result<T, RepositoryError> {
    serde_json::from_value(serde_json::Value::String(label))
        .map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<AuditEvent, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
    let event_id: String = row.try_get("event_id").map_err(decode)?;
    let email_id: Option<String> = row.try_get("email_id").map_err(decode)?;
    let correlation_id: String = row.try_get("correlation_id").map_err(decode)?;
    let event_type: String = row.try_get("event_type").map_err(decode)?;
    let category: String = row.try_get("category").map_err(decode)?;
    let actor: String = row.try_get("actor").map_err(decode)?;
    let outcome: String = row.try_get("outcome").map_err(decode)?;
    let metadata_json: String = row.try_get("metadata_json").map_err(decode)?;
    let occurred_at: String = row.try_get("occurred_at").map_err(decode)?;

    let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata_json)
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let occurred_at = DateTime::parse_from_rfc3339(&occurred_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(AuditEvent {
        event_id,
        email_id: email_id.map(EmailId),
        correlation_id,
        event_type,
        category: parse_label(category)?,
        actor,
        outcome: parse_label(outcome)?,
        metadata,
        occurred_at,
    })
}

#[async_trait::async_trait]
impl AuditEventRepository for SqlAuditEventRepository {
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError> {
        let metadata_json = serde_json::to_string(&event.metadata)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        sqlx::query(
            "INSERT INTO validation_audit
                (event_id, email_id, correlation_id, event_type, category, actor, outcome,
                 metadata_json, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(event_id) DO NOTHING",
        )
        .bind(&event.event_id)
        .bind(event.email_id.as_ref().map(|id| id.0.as_str()))
        .bind(&event.correlation_id)
        .bind(&event.event_type)
        .bind(label_of(&event.category)?)
        .bind(&event.actor)
        .bind(label_of(&event.outcome)?)
        .bind(&metadata_json)
        .bind(event.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_email(&self, id: &EmailId) -> Result<Vec<AuditEvent>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT event_id, email_id, correlation_id, event_type, category, actor, outcome,
                    metadata_json, occurred_at
             FROM validation_audit
             WHERE email_id = ?
             ORDER BY occurred_at ASC, rowid ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_event).collect()
    }
}
