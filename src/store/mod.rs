// Session store - durable, ordered conversation log
//
// SQLite-backed storage for users, sessions and messages:
// - WAL mode, foreign keys on (cascade delete session -> messages)
// - messages are append-only and totally ordered by (created_at, id)
// - single engine instance accesses the store sequentially; the
//   connection still sits behind a mutex so handlers can share it

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::constants::DEFAULT_MODEL;

/// Errors surfaced by the session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare database at {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{what} not found (id {id})")]
    NotFound { what: &'static str, id: i64 },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The single local user row holding agent configuration.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub gemini_api_key: Option<String>,
    pub selected_model: Option<String>,
    pub is_configured: bool,
}

impl UserRow {
    /// True once both an API key and a model have been saved.
    pub fn is_setup_complete(&self) -> bool {
        self.is_configured && self.gemini_api_key.is_some() && self.selected_model.is_some()
    }

    /// API key with all but the last 4 characters masked.
    pub fn masked_api_key(&self) -> String {
        match self.gemini_api_key.as_deref() {
            None | Some("") => "(not set)".to_string(),
            Some(key) if key.len() <= 4 => "*".repeat(key.len()),
            Some(key) => {
                let visible = &key[key.len() - 4..];
                format!("{}{}", "*".repeat(key.len() - 4), visible)
            }
        }
    }

    /// Model to use for new sessions.
    pub fn model(&self) -> &str {
        self.selected_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// One conversation session.
#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: i64,
    pub user_id: i64,
    pub title: Option<String>,
    pub model: String,
    pub active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One immutable turn within a session.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub session_id: i64,
    pub role: String,
    pub content: String,
    pub metadata: Option<Value>,
    pub created_at: i64,
}

/// Row counts and size information reported by `/clean stats`.
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub users: i64,
    pub sessions: i64,
    pub messages: i64,
    pub db_size_bytes: u64,
    pub path: Option<PathBuf>,
}

/// SQLite-backed session store.
pub struct SessionStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SessionStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(&conn)?;

        tracing::info!("Session store initialized: {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// In-memory store, used by tests.
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    fn init(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Get the single local user, creating it on first use.
    pub async fn get_or_create_default_user(&self) -> StoreResult<UserRow> {
        let conn = self.conn.lock().await;

        let existing = conn
            .query_row(
                "SELECT id, gemini_api_key, selected_model, is_configured
                 FROM users ORDER BY id ASC LIMIT 1",
                [],
                Self::map_user,
            )
            .optional()?;

        if let Some(user) = existing {
            return Ok(user);
        }

        conn.execute(
            "INSERT INTO users (gemini_api_key, selected_model, is_configured, created_at)
             VALUES (NULL, NULL, 0, ?1)",
            params![Self::now_millis()],
        )?;
        let id = conn.last_insert_rowid();

        Ok(UserRow {
            id,
            gemini_api_key: None,
            selected_model: None,
            is_configured: false,
        })
    }

    /// Save API key and model for the default user.
    pub async fn update_user_config(&self, api_key: &str, model: &str) -> StoreResult<UserRow> {
        let user = self.get_or_create_default_user().await?;
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE users SET gemini_api_key = ?1, selected_model = ?2, is_configured = 1
             WHERE id = ?3",
            params![api_key, model, user.id],
        )?;

        Ok(UserRow {
            id: user.id,
            gemini_api_key: Some(api_key.to_string()),
            selected_model: Some(model.to_string()),
            is_configured: true,
        })
    }

    /// Change only the selected model, keeping the stored key.
    pub async fn update_user_model(&self, model: &str) -> StoreResult<UserRow> {
        let user = self.get_or_create_default_user().await?;
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE users SET selected_model = ?1, is_configured = 1 WHERE id = ?2",
            params![model, user.id],
        )?;

        Ok(UserRow {
            selected_model: Some(model.to_string()),
            is_configured: true,
            ..user
        })
    }

    /// Create a new session bound to `user_id`.
    pub async fn create_session(
        &self,
        user_id: i64,
        model: &str,
        title: Option<&str>,
    ) -> StoreResult<SessionRow> {
        let now = Self::now_millis();
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO sessions (user_id, title, model, active, created_at, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?4)",
            params![user_id, title, model, now],
        )?;
        let id = conn.last_insert_rowid();

        tracing::debug!(session_id = id, model, "Created session");

        Ok(SessionRow {
            id,
            user_id,
            title: title.map(String::from),
            model: model.to_string(),
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Look up one session by id.
    pub async fn get_session(&self, id: i64) -> StoreResult<Option<SessionRow>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT id, user_id, title, model, active, created_at, updated_at
                 FROM sessions WHERE id = ?1",
                params![id],
                Self::map_session,
            )
            .optional()?;
        Ok(row)
    }

    /// Recent sessions for a user, newest activity first.
    pub async fn recent_sessions(&self, user_id: i64, limit: usize) -> StoreResult<Vec<SessionRow>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, model, active, created_at, updated_at
             FROM sessions WHERE user_id = ?1
             ORDER BY updated_at DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], Self::map_session)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Append one immutable message to a session's log.
    pub async fn append_message(
        &self,
        session_id: i64,
        role: &str,
        content: &str,
        metadata: Option<&Value>,
    ) -> StoreResult<MessageRow> {
        let now = Self::now_millis();
        let metadata_json = metadata.map(|v| v.to_string());
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO messages (session_id, role, content, metadata_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![session_id, role, content, metadata_json, now],
        )?;
        let id = conn.last_insert_rowid();

        Ok(MessageRow {
            id,
            session_id,
            role: role.to_string(),
            content: content.to_string(),
            metadata: metadata.cloned(),
            created_at: now,
        })
    }

    /// Bump a session's updated_at marker.
    pub async fn touch_session(&self, session_id: i64) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
            params![Self::now_millis(), session_id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                what: "session",
                id: session_id,
            });
        }
        Ok(())
    }

    /// All messages of a session, in creation order.
    pub async fn messages(&self, session_id: i64) -> StoreResult<Vec<MessageRow>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, session_id, role, content, metadata_json, created_at
             FROM messages WHERE session_id = ?1
             ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id], Self::map_message)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Count messages in a session.
    pub async fn message_count(&self, session_id: i64) -> StoreResult<i64> {
        let conn = self.conn.lock().await;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Delete a session and (via cascade) all its messages.
    /// Returns false when the session did not exist.
    pub async fn delete_session(&self, session_id: i64) -> StoreResult<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
        Ok(changed > 0)
    }

    /// Drop every row in every table. The explicit maintenance operation
    /// behind `/clean` - conversation history and settings included.
    pub async fn purge_all(&self) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch(
            "DELETE FROM messages;
             DELETE FROM sessions;
             DELETE FROM users;",
        )?;
        tracing::info!("Session store purged");
        Ok(())
    }

    /// Table counts and on-disk size.
    pub async fn stats(&self) -> StoreResult<StoreStats> {
        let conn = self.conn.lock().await;
        let users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
        let sessions: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?;
        let messages: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))?;

        let db_size_bytes = self
            .path
            .as_deref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(StoreStats {
            users,
            sessions,
            messages,
            db_size_bytes,
            path: self.path.clone(),
        })
    }

    /// Reclaim unused space.
    pub async fn vacuum(&self) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch("VACUUM;")?;
        Ok(())
    }

    fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
        Ok(UserRow {
            id: row.get(0)?,
            gemini_api_key: row.get(1)?,
            selected_model: row.get(2)?,
            is_configured: row.get::<_, i64>(3)? != 0,
        })
    }

    fn map_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
        Ok(SessionRow {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            model: row.get(3)?,
            active: row.get::<_, i64>(4)? != 0,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
        let metadata_json: Option<String> = row.get(4)?;
        let metadata = metadata_json.and_then(|s| serde_json::from_str(&s).ok());
        Ok(MessageRow {
            id: row.get(0)?,
            session_id: row.get(1)?,
            role: row.get(2)?,
            content: row.get(3)?,
            metadata,
            created_at: row.get(5)?,
        })
    }
}
