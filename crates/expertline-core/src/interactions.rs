//! Interaction log — best-effort local history of completed turns (SQLite).
//!
//! One row per question/answer exchange. The log is advisory: a turn never
//! waits on it and never fails because of it.

use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One completed exchange, distilled for the log.
#[derive(Debug, Clone)]
pub struct InteractionRecord {
    pub session_id: String,
    pub user_question: String,
    pub expert_answer: String,
    pub expert_name: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct InteractionRow {
    pub id: i64,
    pub session_id: String,
    pub user_question: String,
    pub expert_answer: String,
    pub expert_name: Option<String>,
    pub user_name: Option<String>,
    pub created_at_ms: i64,
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[derive(Clone)]
pub struct InteractionLog {
    db_path: PathBuf,
}

impl InteractionLog {
    pub fn new(db_path: PathBuf) -> Result<Self, rusqlite::Error> {
        let this = Self { db_path };
        this.init()?;
        Ok(this)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection, rusqlite::Error> {
        Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
    }

    fn init(&self) -> Result<(), rusqlite::Error> {
        if let Some(parent) = self.db_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = self.open()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS interactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                user_question TEXT NOT NULL,
                expert_answer TEXT NOT NULL,
                expert_name TEXT NULL,
                user_name TEXT NULL,
                created_at_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_interactions_session ON interactions(session_id);
            CREATE INDEX IF NOT EXISTS idx_interactions_created_at ON interactions(created_at_ms);
            "#,
        )?;
        Ok(())
    }

    pub fn save(&self, record: &InteractionRecord) -> Result<(), rusqlite::Error> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO interactions (session_id, user_question, expert_answer, expert_name, user_name, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.session_id,
                record.user_question,
                record.expert_answer,
                record.expert_name,
                record.user_name,
                now_ms(),
            ],
        )?;
        Ok(())
    }

    /// Most recent interactions, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<InteractionRow>, rusqlite::Error> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, session_id, user_question, expert_answer, expert_name, user_name, created_at_ms
             FROM interactions ORDER BY created_at_ms DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(InteractionRow {
                id: row.get(0)?,
                session_id: row.get(1)?,
                user_question: row.get(2)?,
                expert_answer: row.get(3)?,
                expert_name: row.get(4)?,
                user_name: row.get(5)?,
                created_at_ms: row.get(6)?,
            })
        })?;
        rows.collect()
    }

    /// Detached save: the turn is already complete when this runs, and a
    /// failure is observable only in the logs.
    pub fn save_detached(self: &Arc<Self>, record: InteractionRecord) {
        let log = Arc::clone(self);
        tokio::spawn(async move {
            let session_id = record.session_id.clone();
            match tokio::task::spawn_blocking(move || log.save(&record)).await {
                Ok(Ok(())) => {
                    tracing::debug!(
                        target: "expertline::interactions",
                        session = %session_id,
                        "interaction saved"
                    );
                }
                Ok(Err(e)) => {
                    tracing::error!(
                        target: "expertline::interactions",
                        session = %session_id,
                        "failed to save interaction: {e}"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        target: "expertline::interactions",
                        session = %session_id,
                        "interaction save task failed: {e}"
                    );
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(session: &str, question: &str) -> InteractionRecord {
        InteractionRecord {
            session_id: session.to_string(),
            user_question: question.to_string(),
            expert_answer: "an answer".to_string(),
            expert_name: Some("Grace Hopper".to_string()),
            user_name: None,
        }
    }

    #[test]
    fn save_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = InteractionLog::new(dir.path().join("interactions.db")).unwrap();

        log.save(&record("call-1", "first question")).unwrap();
        log.save(&record("call-1", "second question")).unwrap();

        let rows = log.recent(10).unwrap();
        assert_eq!(rows.len(), 2);
        // Newest first.
        assert_eq!(rows[0].user_question, "second question");
        assert_eq!(rows[1].user_question, "first question");
        assert_eq!(rows[0].expert_name.as_deref(), Some("Grace Hopper"));
    }

    #[test]
    fn recent_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        let log = InteractionLog::new(dir.path().join("interactions.db")).unwrap();
        for i in 0..5 {
            log.save(&record("call-1", &format!("q{i}"))).unwrap();
        }
        assert_eq!(log.recent(3).unwrap().len(), 3);
    }

    #[test]
    fn init_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deep/nested/interactions.db");
        let log = InteractionLog::new(nested.clone()).unwrap();
        assert_eq!(log.path(), nested.as_path());
        log.save(&record("call-1", "q")).unwrap();
    }

    #[tokio::test]
    async fn detached_save_lands_eventually() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(InteractionLog::new(dir.path().join("interactions.db")).unwrap());
        log.save_detached(record("call-9", "fire and forget"));

        // Poll briefly; the write happens on a background task.
        for _ in 0..50 {
            if !log.recent(1).unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(log.recent(1).unwrap()[0].session_id, "call-9");
    }
}
