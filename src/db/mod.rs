pub mod models;

use models::{Document, DocumentChunk, Message, SessionRecord};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub struct Database {
    conn: Mutex<Connection>,
}

const SESSION_COLUMNS: &str = "tenant_identity, session_id, last_interaction";

fn session_from_row(row: &Row<'_>) -> Result<SessionRecord> {
    Ok(SessionRecord {
        tenant_identity: row.get(0)?,
        session_id: row.get(1)?,
        last_interaction: row.get(2)?,
    })
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA foreign_keys=ON;

            CREATE TABLE IF NOT EXISTS sessions (
                tenant_identity TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                last_interaction INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_key TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                content TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages (conversation_key, id);

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                source TEXT NOT NULL,
                file_type TEXT NOT NULL,
                file_size INTEGER,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id TEXT NOT NULL,
                content TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            );
            ",
        )?;
        Ok(())
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let conn = self.conn();
        conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![name],
            |row| row.get(0),
        )
    }

    /// Raw schema changes for tests that need a damaged database.
    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn().execute_batch(sql)
    }

    // ── Sessions ──

    pub fn get_session(&self, tenant_identity: &str) -> Result<Option<SessionRecord>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE tenant_identity = ?1"),
            params![tenant_identity],
            session_from_row,
        )
        .optional()
    }

    /// Inserts a session unless one already exists, then returns the stored row.
    pub fn insert_session(
        &self,
        tenant_identity: &str,
        session_id: &str,
        now: i64,
    ) -> Result<SessionRecord> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sessions (tenant_identity, session_id, last_interaction)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (tenant_identity) DO NOTHING",
            params![tenant_identity, session_id, now],
        )?;
        conn.query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE tenant_identity = ?1"),
            params![tenant_identity],
            session_from_row,
        )
    }

    /// Moves `last_interaction` forward. `None` when no row matched.
    pub fn touch_session(&self, tenant_identity: &str, now: i64) -> Result<Option<SessionRecord>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "UPDATE sessions SET last_interaction = ?2
                 WHERE tenant_identity = ?1 AND last_interaction <= ?2
                 RETURNING {SESSION_COLUMNS}"
            ),
            params![tenant_identity, now],
            session_from_row,
        )
        .optional()
    }

    /// Replaces the session id while the row is still idle. `None` when no row matched.
    pub fn rotate_session(
        &self,
        tenant_identity: &str,
        session_id: &str,
        now: i64,
        idle_secs: i64,
    ) -> Result<Option<SessionRecord>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "UPDATE sessions SET session_id = ?2, last_interaction = ?3
                 WHERE tenant_identity = ?1 AND ?3 - last_interaction >= ?4
                 RETURNING {SESSION_COLUMNS}"
            ),
            params![tenant_identity, session_id, now, idle_secs],
            session_from_row,
        )
        .optional()
    }

    // ── Messages ──

    /// Appends a question and its answer as two rows in one transaction.
    pub fn add_exchange(&self, conversation_key: &str, question: &str, answer: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO messages (conversation_key, role, content) VALUES (?1, 'user', ?2)",
            params![conversation_key, question],
        )?;
        tx.execute(
            "INSERT INTO messages (conversation_key, role, content) VALUES (?1, 'assistant', ?2)",
            params![conversation_key, answer],
        )?;
        tx.commit()
    }

    pub fn get_messages(&self, conversation_key: &str) -> Result<Vec<Message>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, conversation_key, role, content, created_at FROM messages
             WHERE conversation_key = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![conversation_key], |row| {
            Ok(Message {
                id: row.get(0)?,
                conversation_key: row.get(1)?,
                role: row.get(2)?,
                content: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        rows.collect()
    }

    // ── Documents & chunks ──

    /// Stores a document and its embedded chunks in one transaction.
    pub fn insert_document(
        &self,
        filename: &str,
        source: &str,
        file_type: &str,
        file_size: Option<i64>,
        chunks: &[(String, Vec<u8>)],
    ) -> Result<Document> {
        let mut conn = self.conn();
        let id = uuid::Uuid::new_v4().to_string();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO documents (id, filename, source, file_type, file_size)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, filename, source, file_type, file_size],
        )?;
        for (i, (content, embedding)) in chunks.iter().enumerate() {
            tx.execute(
                "INSERT INTO chunks (document_id, content, chunk_index, embedding)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, content, i as i64, embedding],
            )?;
        }
        let doc = tx.query_row(
            "SELECT id, filename, source, file_type, file_size, created_at
             FROM documents WHERE id = ?1",
            params![id],
            |row| {
                Ok(Document {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                    source: row.get(2)?,
                    file_type: row.get(3)?,
                    file_size: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )?;
        tx.commit()?;
        Ok(doc)
    }

    /// Every chunk with its raw embedding bytes, in insertion order.
    pub fn load_chunks(&self) -> Result<Vec<(DocumentChunk, Vec<u8>)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT c.content, d.source, c.embedding
             FROM chunks c JOIN documents d ON d.id = c.document_id
             ORDER BY c.id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                DocumentChunk {
                    text: row.get(0)?,
                    source: row.get(1)?,
                },
                row.get(2)?,
            ))
        })?;
        rows.collect()
    }
}
