//! SQLite message store implementation.
//!
//! Implements `MessageStore` from `orbi-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, reads on the reader
//! pool, every mutation in a writer transaction.
//!
//! All timestamps written by this store come from one `MonotonicClock`, so
//! rows inserted later always sort later, and the same clock reading feeds
//! the body hash.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use orbi_core::chat::repository::MessageStore;
use orbi_core::service::hash::{ContentHasher, MonotonicClock, content_address};
use orbi_types::chat::{ChatSession, MessageRole, SessionMessage, preview_text};
use orbi_types::error::RepositoryError;
use orbi_types::message::MessageBody;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::pool::DatabasePool;
use crate::crypto::hash::Sha256ContentHasher;

/// Attempts at finding an unused hash before giving up with `Conflict`.
const MAX_HASH_ATTEMPTS: usize = 5;

/// SQLite-backed implementation of `MessageStore`.
pub struct SqliteMessageStore {
    pool: DatabasePool,
    hasher: Box<dyn ContentHasher>,
    clock: MonotonicClock,
}

impl SqliteMessageStore {
    /// Create a new store backed by the given database pool, hashing with SHA-256.
    pub fn new(pool: DatabasePool) -> Self {
        Self::with_hasher(pool, Box::new(Sha256ContentHasher::new()))
    }

    /// Create a store with a custom hasher (tests use this to force collisions).
    pub fn with_hasher(pool: DatabasePool, hasher: Box<dyn ContentHasher>) -> Self {
        Self {
            pool,
            hasher,
            clock: MonotonicClock::new(),
        }
    }

    /// Next instant as (nanos, formatted timestamp).
    fn tick(&self) -> (i64, String) {
        let nanos = self.clock.now_nanos();
        (nanos, format_datetime(&DateTime::<Utc>::from_timestamp_nanos(nanos)))
    }

    async fn insert_body(
        &self,
        conn: &mut SqliteConnection,
        content: &str,
    ) -> Result<String, RepositoryError> {
        for attempt in 1..=MAX_HASH_ATTEMPTS {
            let (nanos, created_at) = self.tick();
            let hash = content_address(self.hasher.as_ref(), content, nanos);

            let result = sqlx::query(
                "INSERT INTO message_bodies (hash, content, created_at) VALUES (?, ?, ?)",
            )
            .bind(&hash)
            .bind(content)
            .bind(&created_at)
            .execute(&mut *conn)
            .await;

            match result {
                Ok(_) => return Ok(hash),
                Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                    tracing::debug!(%hash, attempt, "message hash collision, retrying");
                }
                Err(e) => return Err(query_err(e)),
            }
        }
        Err(RepositoryError::Conflict(format!(
            "no free message hash after {MAX_HASH_ATTEMPTS} attempts"
        )))
    }

    /// Bump `updated_at` (and the preview for user messages). NotFound if the session is missing.
    async fn touch_session(
        conn: &mut SqliteConnection,
        session_id: i64,
        role: MessageRole,
        content: &str,
        now: &str,
    ) -> Result<(), RepositoryError> {
        let result = match role {
            MessageRole::User => {
                sqlx::query("UPDATE chat_sessions SET preview_text = ?, updated_at = ? WHERE id = ?")
                    .bind(preview_text(content))
                    .bind(now)
                    .bind(session_id)
                    .execute(&mut *conn)
                    .await
            }
            MessageRole::Assistant => {
                sqlx::query("UPDATE chat_sessions SET updated_at = ? WHERE id = ?")
                    .bind(now)
                    .bind(session_id)
                    .execute(&mut *conn)
                    .await
            }
        }
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn insert_message(
        conn: &mut SqliteConnection,
        session_id: i64,
        role: MessageRole,
        content: &str,
        hash: Option<&str>,
        created_at: &str,
    ) -> Result<i64, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO session_messages (session_id, role, content, hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(role.to_string())
        .bind(content)
        .bind(hash)
        .bind(created_at)
        .execute(&mut *conn)
        .await
        .map_err(query_err)?;

        Ok(result.last_insert_rowid())
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct MessageBodyRow {
    hash: String,
    content: String,
    created_at: String,
}

impl MessageBodyRow {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            hash: row.try_get("hash")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_body(self) -> Result<MessageBody, RepositoryError> {
        Ok(MessageBody {
            hash: self.hash,
            content: self.content,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

struct ChatSessionRow {
    id: i64,
    user_id: i64,
    is_active: bool,
    preview_text: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ChatSessionRow {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            is_active: row.try_get("is_active")?,
            preview_text: row.try_get("preview_text")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_session(self) -> Result<ChatSession, RepositoryError> {
        Ok(ChatSession {
            id: self.id,
            user_id: self.user_id,
            is_active: self.is_active,
            preview_text: self.preview_text,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct SessionMessageRow {
    id: i64,
    session_id: i64,
    role: String,
    content: String,
    hash: Option<String>,
    created_at: String,
}

impl SessionMessageRow {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            hash: row.try_get("hash")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<SessionMessage, RepositoryError> {
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(SessionMessage {
            id: self.id,
            session_id: self.session_id,
            role,
            content: self.content,
            hash: self.hash,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width RFC 3339 (nanosecond precision, `Z` suffix) so text order is time order.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Pool and I/O failures are connection errors; everything else is a query error.
fn query_err(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepositoryError::Connection(e.to_string())
        }
        other => RepositoryError::Query(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// MessageStore implementation
// ---------------------------------------------------------------------------

impl MessageStore for SqliteMessageStore {
    async fn create_body(&self, content: &str) -> Result<String, RepositoryError> {
        let mut conn = self.pool.writer.acquire().await.map_err(query_err)?;
        self.insert_body(&mut conn, content).await
    }

    async fn get_body(&self, hash: &str) -> Result<Option<MessageBody>, RepositoryError> {
        let row = sqlx::query("SELECT hash, content, created_at FROM message_bodies WHERE hash = ?")
            .bind(hash)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let body_row = MessageBodyRow::from_row(&row).map_err(query_err)?;
                Ok(Some(body_row.into_body()?))
            }
            None => Ok(None),
        }
    }

    async fn get_active_session(&self, user_id: i64) -> Result<Option<ChatSession>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM chat_sessions WHERE user_id = ? AND is_active = 1 ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_err)?;

        match row {
            Some(row) => {
                let session_row = ChatSessionRow::from_row(&row).map_err(query_err)?;
                Ok(Some(session_row.into_session()?))
            }
            None => Ok(None),
        }
    }

    async fn create_session(&self, user_id: i64) -> Result<ChatSession, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        let (_, now) = self.tick();

        sqlx::query("UPDATE chat_sessions SET is_active = 0 WHERE user_id = ? AND is_active = 1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        let result = sqlx::query(
            "INSERT INTO chat_sessions (user_id, is_active, preview_text, created_at, updated_at) VALUES (?, 1, NULL, ?, ?)",
        )
        .bind(user_id)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                RepositoryError::Conflict(format!("user {user_id} already has an active session"))
            }
            other => query_err(other),
        })?;

        tx.commit().await.map_err(query_err)?;

        let created = parse_datetime(&now)?;
        Ok(ChatSession {
            id: result.last_insert_rowid(),
            user_id,
            is_active: true,
            preview_text: None,
            created_at: created,
            updated_at: created,
        })
    }

    async fn deactivate_sessions(&self, user_id: i64) -> Result<u64, RepositoryError> {
        let result = sqlx::query("UPDATE chat_sessions SET is_active = 0 WHERE user_id = ? AND is_active = 1")
            .bind(user_id)
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        Ok(result.rows_affected())
    }

    async fn append_message(
        &self,
        session_id: i64,
        role: MessageRole,
        content: &str,
        hash: Option<&str>,
    ) -> Result<SessionMessage, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        let (_, now) = self.tick();

        Self::touch_session(&mut tx, session_id, role, content, &now).await?;
        let id = Self::insert_message(&mut tx, session_id, role, content, hash, &now).await?;

        tx.commit().await.map_err(query_err)?;

        Ok(SessionMessage {
            id,
            session_id,
            role,
            content: content.to_string(),
            hash: hash.map(str::to_string),
            created_at: parse_datetime(&now)?,
        })
    }

    async fn record_exchange(
        &self,
        session_id: i64,
        question: &str,
        answer: &str,
    ) -> Result<String, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let (_, asked_at) = self.tick();
        Self::touch_session(&mut tx, session_id, MessageRole::User, question, &asked_at).await?;
        Self::insert_message(&mut tx, session_id, MessageRole::User, question, None, &asked_at).await?;

        let hash = self.insert_body(&mut tx, answer).await?;

        let (_, answered_at) = self.tick();
        Self::touch_session(&mut tx, session_id, MessageRole::Assistant, answer, &answered_at).await?;
        Self::insert_message(
            &mut tx,
            session_id,
            MessageRole::Assistant,
            answer,
            Some(&hash),
            &answered_at,
        )
        .await?;

        tx.commit().await.map_err(query_err)?;
        Ok(hash)
    }

    async fn list_messages(&self, session_id: i64) -> Result<Vec<SessionMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM session_messages WHERE session_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let msg_row = SessionMessageRow::from_row(row).map_err(query_err)?;
            messages.push(msg_row.into_message()?);
        }

        Ok(messages)
    }

    async fn list_sessions_for_user(&self, user_id: i64) -> Result<Vec<ChatSession>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM chat_sessions WHERE user_id = ? ORDER BY updated_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            let session_row = ChatSessionRow::from_row(row).map_err(query_err)?;
            sessions.push(session_row.into_session()?);
        }

        Ok(sessions)
    }

    async fn list_first_user_message_per_session(
        &self,
        user_id: i64,
    ) -> Result<Vec<MessageBody>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT b.hash, b.content, b.created_at
               FROM chat_sessions s
               JOIN session_messages a ON a.id = (
                   SELECT m.id FROM session_messages m
                   WHERE m.session_id = s.id AND m.role = 'assistant' AND m.hash IS NOT NULL
                   ORDER BY m.created_at ASC, m.id ASC
                   LIMIT 1
               )
               JOIN message_bodies b ON b.hash = a.hash
               WHERE s.user_id = ?
               ORDER BY s.created_at DESC, s.id DESC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut bodies = Vec::with_capacity(rows.len());
        for row in &rows {
            let body_row = MessageBodyRow::from_row(row).map_err(query_err)?;
            bodies.push(body_row.into_body()?);
        }

        Ok(bodies)
    }

    async fn purge_bodies_older_than(&self, age: Duration) -> Result<u64, RepositoryError> {
        let age = chrono::Duration::from_std(age)
            .map_err(|e| RepositoryError::Query(format!("invalid retention: {e}")))?;
        // An age reaching past the earliest representable instant covers no body.
        let Some(cutoff) = Utc::now().checked_sub_signed(age) else {
            tracing::debug!(?age, "retention reaches before the earliest timestamp, nothing to purge");
            return Ok(0);
        };
        let cutoff = format_datetime(&cutoff);

        let result = sqlx::query("DELETE FROM message_bodies WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        Ok(result.rows_affected())
    }
}
