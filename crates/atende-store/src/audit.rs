//! Audit log — records every webhook turn, answered or skipped.

use atende_core::error::AtendeError;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

/// An entry to write to the audit log.
pub struct AuditEntry {
    pub instance_name: String,
    pub phone: String,
    pub contact_name: Option<String>,
    pub input_text: String,
    pub output_text: Option<String>,
    pub intent: Option<String>,
    pub tools_used: Vec<String>,
    pub processing_ms: Option<i64>,
    pub status: AuditStatus,
    pub skip_reason: Option<String>,
}

/// Outcome of an audited turn.
pub enum AuditStatus {
    Replied,
    Skipped,
    Error,
}

impl AuditStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Replied => "replied",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }
}

/// Audit logger backed by SQLite.
pub struct AuditLogger {
    pool: SqlitePool,
}

impl AuditLogger {
    /// Create a new audit logger sharing the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Write an entry to the audit log.
    pub async fn log(&self, entry: &AuditEntry) -> Result<(), AtendeError> {
        let id = Uuid::new_v4().to_string();
        let tools = if entry.tools_used.is_empty() {
            None
        } else {
            Some(entry.tools_used.join(","))
        };

        sqlx::query(
            "INSERT INTO audit_log \
             (id, instance_name, phone, contact_name, input_text, output_text, \
              intent, tools_used, processing_ms, status, skip_reason) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&entry.instance_name)
        .bind(&entry.phone)
        .bind(&entry.contact_name)
        .bind(&entry.input_text)
        .bind(&entry.output_text)
        .bind(&entry.intent)
        .bind(&tools)
        .bind(entry.processing_ms)
        .bind(entry.status.as_str())
        .bind(&entry.skip_reason)
        .execute(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("audit log write failed: {e}")))?;

        debug!(
            "audit: {} {} [{}] {}",
            entry.instance_name,
            entry.phone,
            entry.status.as_str(),
            truncate(&entry.input_text, 80)
        );

        Ok(())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
