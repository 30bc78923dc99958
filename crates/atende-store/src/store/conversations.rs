//! Conversation lifecycle — one row per (instance, phone), created lazily
//! on first contact and reused forever after.

use super::Store;
use atende_core::error::AtendeError;
use uuid::Uuid;

/// A conversation row as the orchestrator needs it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Conversation {
    pub id: String,
    pub status: String,
    pub messages_count: i64,
}

impl Conversation {
    /// A human operator took over; the secretary stays silent.
    pub fn is_transferred(&self) -> bool {
        self.status == "transferred"
    }
}

impl Store {
    /// Get or create the conversation for this instance + phone.
    ///
    /// The contact name is refreshed on every call since WhatsApp profiles
    /// change; status and counters are left alone.
    pub async fn find_or_create_conversation(
        &self,
        instance_name: &str,
        phone: &str,
        contact_name: Option<&str>,
    ) -> Result<Conversation, AtendeError> {
        let existing: Option<Conversation> = sqlx::query_as(
            "SELECT id, status, messages_count FROM conversations \
             WHERE instance_name = ? AND phone = ?",
        )
        .bind(instance_name)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("query failed: {e}")))?;

        if let Some(conversation) = existing {
            if let Some(name) = contact_name {
                sqlx::query(
                    "UPDATE conversations SET contact_name = ?, updated_at = datetime('now') \
                     WHERE id = ?",
                )
                .bind(name)
                .bind(&conversation.id)
                .execute(&self.pool)
                .await
                .map_err(|e| AtendeError::Store(format!("update failed: {e}")))?;
            }
            return Ok(conversation);
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO conversations (id, instance_name, phone, contact_name) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(instance_name)
        .bind(phone)
        .bind(contact_name)
        .execute(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("insert failed: {e}")))?;

        Ok(Conversation {
            id,
            status: "active".to_string(),
            messages_count: 0,
        })
    }

    /// Mark a conversation as transferred to a human.
    pub async fn mark_transferred(&self, conversation_id: &str) -> Result<(), AtendeError> {
        sqlx::query(
            "UPDATE conversations SET status = 'transferred', updated_at = datetime('now') \
             WHERE id = ?",
        )
        .bind(conversation_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("update failed: {e}")))?;

        Ok(())
    }
}
