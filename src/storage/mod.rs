use crate::config::StorageConfig;
use crate::error::{Result, StickllmError};
use crate::providers::{Message, Role};
use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

pub mod types;
pub use types::StoredSession;
use types::ContextSnapshot;

/// Fixed-width UTC timestamp format; lexical order equals time order
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Default name for a session created at `now`
///
/// # Examples
///
/// ```
/// use chrono::{Local, TimeZone};
/// use stickllm::storage::default_session_name;
///
/// let now = Local.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
/// assert_eq!(default_session_name(&now), "Session 2024-01-01 10:00");
/// ```
pub fn default_session_name(now: &DateTime<Local>) -> String {
    format!("Session {}", now.format("%Y-%m-%d %H:%M"))
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            tracing::warn!("Unparseable timestamp in database: {}", raw);
            DateTime::<Utc>::default()
        })
}

/// Durable storage for sessions and their messages
///
/// Every operation opens its own connection; no transaction spans more
/// than one logical operation.
pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Create a storage instance in the user's data directory
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("io", "stickllm", "stickllm")
            .ok_or_else(|| StickllmError::Storage("Could not determine data directory".into()))?;

        Self::new_with_path(proj_dirs.data_dir().join("sessions.db"))
    }

    /// Create a storage instance honoring an explicit path from configuration
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match &config.db_path {
            Some(path) => Self::new_with_path(path),
            None => Self::new(),
        }
    }

    /// Create a storage instance that uses the specified database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use stickllm::storage::SqliteStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(dir.path().join("sessions.db")).unwrap();
    /// assert!(storage.list_sessions().unwrap().is_empty());
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create parent directory for database")
                    .map_err(|e| StickllmError::Storage(format!("{:#}", e)))?;
            }
        }

        let storage = Self { db_path };
        storage.init()?;
        tracing::debug!("Session store ready at {}", storage.db_path.display());
        Ok(storage)
    }

    /// Location of the database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| StickllmError::Storage(format!("{:#}", e)))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(StickllmError::from)?;
        Ok(conn)
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.connect()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                context TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL REFERENCES sessions (id),
                role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_session
                ON messages (session_id, timestamp, id);",
        )
        .context("Failed to create tables")
        .map_err(|e| StickllmError::Storage(format!("{:#}", e)))?;

        Ok(())
    }

    /// Create a new session and return its id
    ///
    /// `name` falls back to [`default_session_name`]; `context_files` is
    /// recorded as an informational snapshot.
    pub fn create_session(&self, name: Option<&str>, context_files: &[String]) -> Result<i64> {
        let name = match name {
            Some(n) if !n.trim().is_empty() => n.to_string(),
            _ => default_session_name(&Local::now()),
        };
        let context = serde_json::to_string(&ContextSnapshot {
            files: context_files.to_vec(),
        })?;
        let now = format_timestamp(&Utc::now());

        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO sessions (name, created_at, updated_at, context) VALUES (?1, ?2, ?2, ?3)",
            params![name, now, context],
        )
        .context("Failed to insert session")
        .map_err(|e| StickllmError::Storage(format!("{:#}", e)))?;

        let id = conn.last_insert_rowid();
        tracing::info!(session_id = id, "Created session '{}'", name);
        Ok(id)
    }

    /// Load all messages of a session in conversation order
    ///
    /// # Errors
    ///
    /// Returns [`StickllmError::SessionNotFound`] if the session does not
    /// exist; an existing session without messages yields an empty vector.
    pub fn load_messages(&self, id: i64) -> Result<Vec<Message>> {
        let conn = self.connect()?;
        if !session_exists(&conn, id)? {
            return Err(StickllmError::SessionNotFound(id).into());
        }

        let mut stmt = conn
            .prepare(
                "SELECT role, content FROM messages
                WHERE session_id = ?1
                ORDER BY timestamp ASC, id ASC",
            )
            .map_err(StickllmError::from)?;

        let rows = stmt
            .query_map(params![id], |row| {
                let role: String = row.get(0)?;
                let content: String = row.get(1)?;
                Ok((role, content))
            })
            .map_err(StickllmError::from)?;

        let mut messages = Vec::new();
        for row in rows {
            let (role, content) = row.map_err(StickllmError::from)?;
            messages.push(Message {
                role: role.parse::<Role>()?,
                content,
            });
        }

        tracing::debug!(session_id = id, "Loaded {} messages", messages.len());
        Ok(messages)
    }

    /// Append a message and bump the session's `updated_at`
    ///
    /// # Errors
    ///
    /// Returns [`StickllmError::Storage`] if the session does not exist, the
    /// content is an empty assistant reply, or the database is unwritable.
    pub fn append_message(&self, id: i64, role: Role, content: &str) -> Result<()> {
        if role == Role::Assistant && content.is_empty() {
            return Err(StickllmError::Storage(
                "Refusing to store an empty assistant message".to_string(),
            )
            .into());
        }

        let mut conn = self.connect()?;
        let tx = conn.transaction().map_err(StickllmError::from)?;

        if !session_exists(&tx, id)? {
            return Err(StickllmError::Storage(format!("Session {} does not exist", id)).into());
        }

        // Keep timestamps non-decreasing within the session even if the
        // wall clock steps backwards.
        let last: Option<String> = tx
            .query_row(
                "SELECT MAX(timestamp) FROM messages WHERE session_id = ?1",
                params![id],
                |row| row.get(0),
            )
            .map_err(StickllmError::from)?;
        let now = format_timestamp(&Utc::now());
        let timestamp = match last {
            Some(last) if last > now => last,
            _ => now,
        };

        tx.execute(
            "INSERT INTO messages (session_id, role, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![id, role.as_str(), content, timestamp],
        )
        .context("Failed to insert message")
        .map_err(|e| StickllmError::Storage(format!("{:#}", e)))?;

        tx.execute(
            "UPDATE sessions SET updated_at = MAX(updated_at, ?1) WHERE id = ?2",
            params![timestamp, id],
        )
        .map_err(StickllmError::from)?;

        tx.commit()
            .context("Failed to commit message")
            .map_err(|e| StickllmError::Storage(format!("{:#}", e)))?;

        tracing::debug!(session_id = id, role = %role, "Appended message");
        Ok(())
    }

    /// Rename a session and bump its `updated_at`
    ///
    /// # Errors
    ///
    /// Returns [`StickllmError::SessionNotFound`] if the session does not exist
    pub fn rename_session(&self, id: i64, new_name: &str) -> Result<()> {
        let conn = self.connect()?;
        let now = format_timestamp(&Utc::now());
        let changed = conn
            .execute(
                "UPDATE sessions SET name = ?1, updated_at = MAX(updated_at, ?2) WHERE id = ?3",
                params![new_name, now, id],
            )
            .map_err(StickllmError::from)?;

        if changed == 0 {
            return Err(StickllmError::SessionNotFound(id).into());
        }

        tracing::info!(session_id = id, "Renamed session to '{}'", new_name);
        Ok(())
    }

    /// Fetch a single session's metadata
    ///
    /// # Errors
    ///
    /// Returns [`StickllmError::SessionNotFound`] if the session does not exist
    pub fn get_session(&self, id: i64) -> Result<StoredSession> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT s.id, s.name, s.created_at, s.updated_at, s.context,
                (SELECT COUNT(*) FROM messages m WHERE m.session_id = s.id)
            FROM sessions s WHERE s.id = ?1",
            params![id],
            session_from_row,
        )
        .optional()
        .map_err(StickllmError::from)?
        .ok_or_else(|| StickllmError::SessionNotFound(id).into())
    }

    /// List all sessions, most recently active first
    pub fn list_sessions(&self) -> Result<Vec<StoredSession>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT s.id, s.name, s.created_at, s.updated_at, s.context,
                    (SELECT COUNT(*) FROM messages m WHERE m.session_id = s.id)
                FROM sessions s
                ORDER BY s.updated_at DESC, s.id DESC",
            )
            .context("Failed to prepare statement")
            .map_err(|e| StickllmError::Storage(format!("{:#}", e)))?;

        let sessions = stmt
            .query_map([], session_from_row)
            .context("Failed to query sessions")
            .map_err(|e| StickllmError::Storage(format!("{:#}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StickllmError::from)?;

        Ok(sessions)
    }
}

fn session_exists(conn: &Connection, id: i64) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM sessions WHERE id = ?1", params![id], |_| {
            Ok(())
        })
        .optional()
        .map_err(StickllmError::from)?;
    Ok(found.is_some())
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<StoredSession> {
    let created_at: String = row.get(2)?;
    let updated_at: String = row.get(3)?;
    let context: String = row.get(4)?;
    let message_count: i64 = row.get(5)?;

    let snapshot: ContextSnapshot = serde_json::from_str(&context).unwrap_or_default();

    Ok(StoredSession {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
        context: snapshot.files,
        message_count: usize::try_from(message_count).unwrap_or_default(),
    })
}
