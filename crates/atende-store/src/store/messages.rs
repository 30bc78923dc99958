//! Message log — append-only, with provider-id dedup and bounded history
//! replay.

use super::Store;
use atende_core::error::AtendeError;
use uuid::Uuid;

/// A logged message as replayed into LLM context.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredMessage {
    pub sender: String,
    pub content: String,
}

impl Store {
    /// Whether this provider message id was already logged in the
    /// conversation. Gateways redeliver webhooks; the same id in a
    /// different conversation is a different message.
    pub async fn is_duplicate(
        &self,
        conversation_id: &str,
        external_id: &str,
    ) -> Result<bool, AtendeError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM messages WHERE conversation_id = ? AND external_id = ?",
        )
        .bind(conversation_id)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("query failed: {e}")))?;

        Ok(row.is_some())
    }

    /// Append a message and bump the conversation counter.
    pub async fn log_message(
        &self,
        conversation_id: &str,
        sender: &str,
        content: &str,
        intent: Option<&str>,
        external_id: Option<&str>,
    ) -> Result<(), AtendeError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, sender, content, intent, external_id) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(conversation_id)
        .bind(sender)
        .bind(content)
        .bind(intent)
        .bind(external_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("insert failed: {e}")))?;

        sqlx::query(
            "UPDATE conversations SET messages_count = messages_count + 1, \
             updated_at = datetime('now') WHERE id = ?",
        )
        .bind(conversation_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("update failed: {e}")))?;

        Ok(())
    }

    /// The most recent messages of a conversation, oldest first.
    pub async fn recent_history(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<StoredMessage>, AtendeError> {
        let rows: Vec<StoredMessage> = sqlx::query_as(
            "SELECT sender, content FROM ( \
                SELECT rowid AS r, sender, content FROM messages \
                WHERE conversation_id = ? \
                ORDER BY r DESC LIMIT ? \
             ) ORDER BY r ASC",
        )
        .bind(conversation_id)
        .bind(self.max_history_messages as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("query failed: {e}")))?;

        Ok(rows)
    }
}
