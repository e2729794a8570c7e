use crate::error::{AppError, AppResult};
use crate::models::{ChatSession, Feedback, FeedbackStatus};
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub type DbConnection = Arc<Mutex<Connection>>;

/// Upper bound on the page size accepted by list queries.
pub const MAX_PAGE_SIZE: u64 = 100;

pub struct Database {
    connection: DbConnection,
}

impl Database {
    pub fn new(db_path: &Path) -> AppResult<Self> {
        // Ensure the database directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        let database = Database {
            connection: Arc::new(Mutex::new(conn)),
        };

        database.run_migrations()?;

        Ok(database)
    }

    fn run_migrations(&self) -> AppResult<()> {
        let conn = self.lock_connection()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS feedback (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                message TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'read', 'responded')),
                email_sent INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_feedback_status ON feedback(status)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_feedback_created_at ON feedback(created_at)",
            [],
        )?;

        // Messages and survey feedback are stored as JSON text; sessions are
        // immutable after creation so there is nothing to index beyond time.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS chat_sessions (
                id TEXT PRIMARY KEY,
                messages TEXT NOT NULL,
                feedback TEXT,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_chat_sessions_created_at ON chat_sessions(created_at)",
            [],
        )?;

        Ok(())
    }

    fn lock_connection(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|e| AppError::Internal(format!("Failed to acquire database lock: {e}")))
    }

    // Feedback methods

    pub fn create_feedback(&self, feedback: &Feedback) -> AppResult<()> {
        let conn = self.lock_connection()?;

        conn.execute(
            "INSERT INTO feedback (id, name, email, message, status, email_sent, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                feedback.id,
                feedback.name,
                feedback.email,
                feedback.message,
                feedback.status.as_str(),
                feedback.email_sent,
                feedback.created_at,
                feedback.updated_at,
            ],
        )?;

        tracing::info!("Created feedback {} from {}", feedback.id, feedback.email);
        Ok(())
    }

    pub fn get_feedback_by_id(&self, id: &str) -> AppResult<Feedback> {
        let conn = self.lock_connection()?;

        let mut stmt = conn.prepare(
            "SELECT id, name, email, message, status, email_sent, created_at, updated_at
             FROM feedback WHERE id = ?",
        )?;

        let feedback = stmt.query_row([id], row_to_feedback).map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::NotFound("Feedback not found".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(feedback)
    }

    /// Returns one page of feedback, newest first, plus the total matching
    /// count. The status filter accepts any string; a value outside the
    /// enumeration simply matches nothing.
    pub fn list_feedback(
        &self,
        status: Option<&str>,
        page: u64,
        limit: u64,
    ) -> AppResult<(Vec<Feedback>, u64)> {
        let conn = self.lock_connection()?;

        let page = page.max(1);
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        // Saturate and bound so absurd page numbers come back as an empty
        // page instead of overflowing or failing the i64 conversion inside
        // the driver.
        let offset = page
            .saturating_sub(1)
            .saturating_mul(limit)
            .min(i64::MAX as u64);

        let (rows, total) = match status {
            Some(status) => {
                let mut stmt = conn.prepare(
                    "SELECT id, name, email, message, status, email_sent, created_at, updated_at
                     FROM feedback WHERE status = ?
                     ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
                )?;
                let rows = stmt
                    .query_map(params![status, limit, offset], row_to_feedback)?
                    .collect::<Result<Vec<_>, _>>()?;

                let total: u64 = conn.query_row(
                    "SELECT COUNT(*) FROM feedback WHERE status = ?",
                    [status],
                    |row| row.get(0),
                )?;
                (rows, total)
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, name, email, message, status, email_sent, created_at, updated_at
                     FROM feedback ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
                )?;
                let rows = stmt
                    .query_map(params![limit, offset], row_to_feedback)?
                    .collect::<Result<Vec<_>, _>>()?;

                let total: u64 =
                    conn.query_row("SELECT COUNT(*) FROM feedback", [], |row| row.get(0))?;
                (rows, total)
            }
        };

        Ok((rows, total))
    }

    pub fn update_feedback_status(
        &self,
        id: &str,
        status: FeedbackStatus,
    ) -> AppResult<Feedback> {
        {
            let conn = self.lock_connection()?;

            let rows_affected = conn.execute(
                "UPDATE feedback SET status = ?, updated_at = ? WHERE id = ?",
                params![status.as_str(), Utc::now().timestamp(), id],
            )?;

            if rows_affected == 0 {
                return Err(AppError::NotFound("Feedback not found".to_string()));
            }
        }

        let updated = self.get_feedback_by_id(id)?;
        // Re-run the field validators on the stored record, as writes do.
        crate::models::validate_feedback_fields(&updated)?;

        tracing::info!("Updated feedback {} to status {}", id, status.as_str());
        Ok(updated)
    }

    /// Flips the notification flag after a successful send. The transition is
    /// one-way; there is no path back to false.
    pub fn mark_email_sent(&self, id: &str) -> AppResult<()> {
        let conn = self.lock_connection()?;

        let rows_affected = conn.execute(
            "UPDATE feedback SET email_sent = 1, updated_at = ? WHERE id = ?",
            params![Utc::now().timestamp(), id],
        )?;

        if rows_affected == 0 {
            return Err(AppError::NotFound("Feedback not found".to_string()));
        }

        Ok(())
    }

    pub fn delete_feedback(&self, id: &str) -> AppResult<()> {
        let conn = self.lock_connection()?;

        let rows_affected = conn.execute("DELETE FROM feedback WHERE id = ?", [id])?;

        if rows_affected == 0 {
            return Err(AppError::NotFound("Feedback not found".to_string()));
        }

        tracing::info!("Deleted feedback {}", id);
        Ok(())
    }

    // Chat session methods

    pub fn create_chat_session(&self, session: &ChatSession) -> AppResult<()> {
        let conn = self.lock_connection()?;

        let messages = serde_json::to_string(&session.messages)?;
        let feedback = session
            .feedback
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        conn.execute(
            "INSERT INTO chat_sessions (id, messages, feedback, created_at)
             VALUES (?, ?, ?, ?)",
            params![session.id, messages, feedback, session.created_at],
        )?;

        tracing::info!(
            "Saved chat session {} with {} messages",
            session.id,
            session.messages.len()
        );
        Ok(())
    }

    pub fn get_all_chat_sessions(&self) -> AppResult<Vec<ChatSession>> {
        let conn = self.lock_connection()?;

        let mut stmt = conn.prepare(
            "SELECT id, messages, feedback, created_at
             FROM chat_sessions ORDER BY created_at DESC, rowid DESC",
        )?;

        let sessions = stmt
            .query_map([], row_to_chat_session)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sessions)
    }
}

fn row_to_feedback(row: &Row) -> rusqlite::Result<Feedback> {
    let status_raw: String = row.get(4)?;
    let status = FeedbackStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown feedback status: {status_raw}").into(),
        )
    })?;

    Ok(Feedback {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        message: row.get(3)?,
        status,
        email_sent: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn row_to_chat_session(row: &Row) -> rusqlite::Result<ChatSession> {
    let messages_raw: String = row.get(1)?;
    let messages = serde_json::from_str(&messages_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let feedback_raw: Option<String> = row.get(2)?;
    let feedback = match feedback_raw {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };

    Ok(ChatSession {
        id: row.get(0)?,
        messages,
        feedback,
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, Sender, SessionFeedback, YesNo};
    use tempfile::TempDir;

    fn test_db() -> (Database, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let db = Database::new(&dir.path().join("test.db")).expect("open database");
        (db, dir)
    }

    fn sample_feedback() -> Feedback {
        Feedback::new("Amina", "a@example.com", "Great!").unwrap()
    }

    #[test]
    fn create_and_get_feedback_roundtrip() {
        let (db, _dir) = test_db();
        let feedback = sample_feedback();
        db.create_feedback(&feedback).unwrap();

        let first = db.get_feedback_by_id(&feedback.id).unwrap();
        assert_eq!(first.name, "Amina");
        assert_eq!(first.status, FeedbackStatus::Pending);
        assert!(!first.email_sent);

        // Reads are idempotent absent intervening writes.
        let second = db.get_feedback_by_id(&feedback.id).unwrap();
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }

    #[test]
    fn get_missing_feedback_is_not_found() {
        let (db, _dir) = test_db();
        match db.get_feedback_by_id("no-such-id") {
            Err(AppError::NotFound(msg)) => assert_eq!(msg, "Feedback not found"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn list_feedback_paginates_newest_first() {
        let (db, _dir) = test_db();
        for i in 0..15i64 {
            let mut feedback =
                Feedback::new(&format!("User {i}"), "u@example.com", "hello").unwrap();
            // Distinct timestamps so ordering is deterministic.
            feedback.created_at = 1_000 + i;
            db.create_feedback(&feedback).unwrap();
        }

        let (page_one, total) = db.list_feedback(None, 1, 10).unwrap();
        assert_eq!(total, 15);
        assert_eq!(page_one.len(), 10);
        assert_eq!(page_one[0].name, "User 14");

        let (page_two, _) = db.list_feedback(None, 2, 10).unwrap();
        assert_eq!(page_two.len(), 5);
        assert_eq!(page_two[4].name, "User 0");
    }

    #[test]
    fn list_feedback_tolerates_extreme_page_and_limit() {
        let (db, _dir) = test_db();
        db.create_feedback(&sample_feedback()).unwrap();

        // A page far past the data yields an empty page, not an overflow.
        let (rows, total) = db.list_feedback(None, u64::MAX, 10).unwrap();
        assert!(rows.is_empty());
        assert_eq!(total, 1);

        let (rows, total) = db.list_feedback(None, u64::MAX, u64::MAX).unwrap();
        assert!(rows.is_empty());
        assert_eq!(total, 1);

        // An oversized limit is capped, and the first page still resolves.
        let (rows, total) = db.list_feedback(None, 1, u64::MAX).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(total, 1);
    }

    #[test]
    fn list_feedback_filters_by_status() {
        let (db, _dir) = test_db();
        let a = sample_feedback();
        let b = sample_feedback();
        db.create_feedback(&a).unwrap();
        db.create_feedback(&b).unwrap();
        db.update_feedback_status(&a.id, FeedbackStatus::Read)
            .unwrap();

        let (read, total) = db.list_feedback(Some("read"), 1, 10).unwrap();
        assert_eq!(total, 1);
        assert_eq!(read[0].id, a.id);

        // An unrecognized status matches nothing rather than erroring.
        let (none, total) = db.list_feedback(Some("archived"), 1, 10).unwrap();
        assert!(none.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn update_status_persists_and_missing_id_fails() {
        let (db, _dir) = test_db();
        let feedback = sample_feedback();
        db.create_feedback(&feedback).unwrap();

        let updated = db
            .update_feedback_status(&feedback.id, FeedbackStatus::Responded)
            .unwrap();
        assert_eq!(updated.status, FeedbackStatus::Responded);

        assert!(matches!(
            db.update_feedback_status("missing", FeedbackStatus::Read),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn mark_email_sent_transitions_once() {
        let (db, _dir) = test_db();
        let feedback = sample_feedback();
        db.create_feedback(&feedback).unwrap();

        db.mark_email_sent(&feedback.id).unwrap();
        assert!(db.get_feedback_by_id(&feedback.id).unwrap().email_sent);

        // Marking again is a no-op, never a reversal.
        db.mark_email_sent(&feedback.id).unwrap();
        assert!(db.get_feedback_by_id(&feedback.id).unwrap().email_sent);
    }

    #[test]
    fn delete_feedback_removes_row() {
        let (db, _dir) = test_db();
        let feedback = sample_feedback();
        db.create_feedback(&feedback).unwrap();

        db.delete_feedback(&feedback.id).unwrap();
        assert!(matches!(
            db.get_feedback_by_id(&feedback.id),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            db.delete_feedback(&feedback.id),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn chat_session_roundtrip_preserves_order_and_feedback() {
        let (db, _dir) = test_db();
        let session = ChatSession::new(
            vec![
                ChatMessage {
                    sender: Sender::User,
                    text: "hi".to_string(),
                    timestamp: 1,
                },
                ChatMessage {
                    sender: Sender::Bot,
                    text: "hello".to_string(),
                    timestamp: 2,
                },
            ],
            Some(SessionFeedback {
                is_accurate: Some(YesNo::Yes),
                is_fast: None,
                would_use_again: Some(YesNo::No),
                rating: Some(4),
                comments: Some("ok".to_string()),
            }),
        );
        db.create_chat_session(&session).unwrap();

        let sessions = db.get_all_chat_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        let stored = &sessions[0];
        assert_eq!(stored.id, session.id);
        assert_eq!(stored.messages.len(), 2);
        assert_eq!(stored.messages[0].sender, Sender::User);
        assert_eq!(stored.messages[1].text, "hello");
        let feedback = stored.feedback.as_ref().unwrap();
        assert_eq!(feedback.rating, Some(4));
        assert_eq!(feedback.is_fast, None);
    }

    #[test]
    fn chat_sessions_listed_newest_first() {
        let (db, _dir) = test_db();
        let mut older = ChatSession::new(
            vec![ChatMessage {
                sender: Sender::User,
                text: "first".to_string(),
                timestamp: 1,
            }],
            None,
        );
        older.created_at = 100;
        let mut newer = ChatSession::new(
            vec![ChatMessage {
                sender: Sender::User,
                text: "second".to_string(),
                timestamp: 2,
            }],
            None,
        );
        newer.created_at = 200;

        db.create_chat_session(&older).unwrap();
        db.create_chat_session(&newer).unwrap();

        let sessions = db.get_all_chat_sessions().unwrap();
        assert_eq!(sessions[0].id, newer.id);
        assert_eq!(sessions[1].id, older.id);
    }
}
