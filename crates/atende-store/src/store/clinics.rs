//! Instance registry — which clinic owns a WhatsApp line, its secretary
//! settings and behavior flags, and the per-instance blocklist.

use super::Store;
use atende_core::clinic::{BehaviorFlags, ClinicConfig, ClinicSettings};
use atende_core::error::AtendeError;

impl Store {
    /// Resolve the clinic configuration for a messaging instance.
    ///
    /// Settings and behavior are stored as JSON columns edited elsewhere;
    /// both fall back to defaults if a column holds malformed JSON, so a
    /// bad admin edit degrades the secretary instead of silencing it.
    pub async fn clinic_for_instance(
        &self,
        instance_name: &str,
    ) -> Result<Option<ClinicConfig>, AtendeError> {
        let row: Option<(String, String, String, String)> = sqlx::query_as(
            "SELECT clinic_id, display_name, settings, behavior \
             FROM clinic_instances WHERE instance_name = ?",
        )
        .bind(instance_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("query failed: {e}")))?;

        let Some((clinic_id, display_name, settings_json, behavior_json)) = row else {
            return Ok(None);
        };

        let settings: ClinicSettings = serde_json::from_str(&settings_json).unwrap_or_default();
        let behavior: BehaviorFlags = serde_json::from_str(&behavior_json).unwrap_or_default();

        Ok(Some(ClinicConfig {
            clinic_id,
            display_name,
            settings,
            behavior,
        }))
    }

    /// Register or update a messaging instance.
    pub async fn upsert_instance(
        &self,
        instance_name: &str,
        clinic_id: &str,
        display_name: &str,
        settings_json: &str,
        behavior_json: &str,
    ) -> Result<(), AtendeError> {
        sqlx::query(
            "INSERT INTO clinic_instances (instance_name, clinic_id, display_name, settings, behavior) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(instance_name) DO UPDATE SET \
               clinic_id = excluded.clinic_id, \
               display_name = excluded.display_name, \
               settings = excluded.settings, \
               behavior = excluded.behavior, \
               updated_at = datetime('now')",
        )
        .bind(instance_name)
        .bind(clinic_id)
        .bind(display_name)
        .bind(settings_json)
        .bind(behavior_json)
        .execute(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("upsert failed: {e}")))?;

        Ok(())
    }

    /// Number of registered messaging instances.
    pub async fn instance_count(&self) -> Result<i64, AtendeError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM clinic_instances")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AtendeError::Store(format!("query failed: {e}")))?;
        Ok(count)
    }

    /// Whether this phone is blocked for the instance.
    pub async fn is_phone_blocked(
        &self,
        instance_name: &str,
        phone: &str,
    ) -> Result<bool, AtendeError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT phone FROM blocked_phones WHERE instance_name = ? AND phone = ?",
        )
        .bind(instance_name)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("query failed: {e}")))?;

        Ok(row.is_some())
    }

    /// Add a phone to the instance blocklist.
    pub async fn block_phone(
        &self,
        instance_name: &str,
        phone: &str,
        reason: Option<&str>,
    ) -> Result<(), AtendeError> {
        sqlx::query(
            "INSERT OR IGNORE INTO blocked_phones (instance_name, phone, reason) VALUES (?, ?, ?)",
        )
        .bind(instance_name)
        .bind(phone)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("insert failed: {e}")))?;

        Ok(())
    }
}
