//! SQLite persistence for the orchestrator: clinic instance registry,
//! conversations and messages, the scheduling domain behind the tool
//! registry, and the audit log.

pub mod audit;
pub mod store;

pub use audit::{AuditEntry, AuditLogger, AuditStatus};
pub use store::{Conversation, Store, StoredMessage};
