use shared::{MessageLog, MessageTemplate};
use uuid::Uuid;

use super::{Database, MessageLogRow, NewMessageLog, TemplateRow};
use crate::error::{AppError, Result};

fn duplicate_name(name: &str) -> String {
    format!("A template named '{}' already exists", name)
}

impl Database {
    // Message templates
    pub async fn list_templates(&self) -> Result<Vec<MessageTemplate>> {
        let rows = sqlx::query_as::<_, TemplateRow>(
            "SELECT id, name, body, created_at, updated_at FROM message_templates ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MessageTemplate::from).collect())
    }

    pub async fn get_template(&self, id: &str) -> Result<Option<MessageTemplate>> {
        let row = sqlx::query_as::<_, TemplateRow>(
            "SELECT id, name, body, created_at, updated_at FROM message_templates WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(MessageTemplate::from))
    }

    pub async fn create_template(&self, name: &str, body: &str) -> Result<MessageTemplate> {
        let row = sqlx::query_as::<_, TemplateRow>(
            r#"
            INSERT INTO message_templates (id, name, body) VALUES (?, ?, ?)
            RETURNING id, name, body, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(body)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, duplicate_name(name)))?;
        Ok(row.into())
    }

    pub async fn update_template(&self, id: &str, name: &str, body: &str) -> Result<Option<MessageTemplate>> {
        let row = sqlx::query_as::<_, TemplateRow>(
            r#"
            UPDATE message_templates SET name = ?, body = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            RETURNING id, name, body, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(body)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, duplicate_name(name)))?;
        Ok(row.map(MessageTemplate::from))
    }

    pub async fn delete_template(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM message_templates WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // Message logs are append-only
    pub async fn insert_message_log(&self, log: &NewMessageLog) -> Result<MessageLog> {
        let row = sqlx::query_as::<_, MessageLogRow>(
            r#"
            INSERT INTO message_logs (id, guest_id, recipient, body, status, provider_message_id, error)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, guest_id, recipient, body, status, provider_message_id, error, created_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&log.guest_id)
        .bind(&log.recipient)
        .bind(&log.body)
        .bind(&log.status)
        .bind(&log.provider_message_id)
        .bind(&log.error)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    /// Newest first, optionally for a single guest
    pub async fn list_message_logs(&self, guest_id: Option<&str>) -> Result<Vec<MessageLog>> {
        let rows = match guest_id {
            Some(guest_id) => {
                sqlx::query_as::<_, MessageLogRow>(
                    "SELECT id, guest_id, recipient, body, status, provider_message_id, error, created_at \
                     FROM message_logs WHERE guest_id = ? ORDER BY created_at DESC, rowid DESC",
                )
                .bind(guest_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, MessageLogRow>(
                    "SELECT id, guest_id, recipient, body, status, provider_message_id, error, created_at \
                     FROM message_logs ORDER BY created_at DESC, rowid DESC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.into_iter().map(MessageLog::from).collect())
    }
}
