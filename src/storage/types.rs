use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a stored chat session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    /// Unique identifier assigned by the store
    pub id: i64,
    /// User-visible name
    pub name: String,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When a message was last appended or the session was renamed
    pub updated_at: DateTime<Utc>,
    /// Context file paths recorded when the session was created
    pub context: Vec<String>,
    /// Number of messages in the session
    pub message_count: usize,
}

/// Serialized form of the creation-time context snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct ContextSnapshot {
    #[serde(default)]
    pub files: Vec<String>,
}
