//! Session store adapters.
//!
//! A session binds one identity to one assistants thread.  Rows live in a
//! single relational table (legacy name `chatbot_english_db`) with the
//! columns `StudentID`, `ThreadID` and `AssistantID`.  `StudentID` carries a
//! unique constraint and inserts are conflict-tolerant, so concurrent
//! first-contact requests can never store two threads for one identity.
//!
//! Every operation checks a connection out of the pool for its own scope;
//! the connection goes back to the pool when the scope ends, whichever way
//! it ends.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;

use tl_domain::config::StoreConfig;
use tl_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Record & trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A persisted identity → thread binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub identity: String,
    pub thread_id: String,
    pub assistant_id: String,
}

/// Minimal persistence operations needed by the session resolver.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Return `thread_id` if the row `(identity, thread_id)` exists.
    async fn find_thread(&self, identity: &str, thread_id: &str) -> Result<Option<String>>;

    /// Return the session stored for `identity`, if any.
    async fn find_by_identity(&self, identity: &str) -> Result<Option<SessionRecord>>;

    /// Insert `record` unless the identity already has a session.
    /// Returns `true` when this call stored the row.
    async fn insert_if_absent(&self, record: &SessionRecord) -> Result<bool>;

    /// Number of rows stored for `identity`.
    async fn count_for_identity(&self, identity: &str) -> Result<u64>;
}

/// Open the store selected by the URL scheme (`sqlite:` or `mysql:`) and
/// make sure the table exists.
pub async fn connect(cfg: &StoreConfig) -> Result<Arc<dyn SessionStore>> {
    let url = cfg.effective_url();
    check_table_name(&cfg.table)?;

    if url.starts_with("sqlite:") {
        let store = SqliteSessionStore::connect(&url, &cfg.table, cfg.max_connections).await?;
        Ok(Arc::new(store))
    } else if url.starts_with("mysql:") {
        let store = MySqlSessionStore::connect(&url, &cfg.table, cfg.max_connections).await?;
        Ok(Arc::new(store))
    } else {
        Err(Error::Config(
            "store.url must start with 'sqlite:' or 'mysql:'".into(),
        ))
    }
}

fn check_table_name(table: &str) -> Result<()> {
    if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::Config(format!("invalid store table name '{table}'")));
    }
    Ok(())
}

fn from_sqlx(e: sqlx::Error) -> Error {
    Error::StoreUnavailable(e.to_string())
}

fn sqlite_record(row: &SqliteRow) -> Result<SessionRecord> {
    Ok(SessionRecord {
        identity: row.try_get("StudentID").map_err(from_sqlx)?,
        thread_id: row.try_get("ThreadID").map_err(from_sqlx)?,
        assistant_id: row.try_get("AssistantID").map_err(from_sqlx)?,
    })
}

fn mysql_record(row: &MySqlRow) -> Result<SessionRecord> {
    Ok(SessionRecord {
        identity: row.try_get("StudentID").map_err(from_sqlx)?,
        thread_id: row.try_get("ThreadID").map_err(from_sqlx)?,
        assistant_id: row.try_get("AssistantID").map_err(from_sqlx)?,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SQLite
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SqliteSessionStore {
    pool: SqlitePool,
    table: String,
}

impl SqliteSessionStore {
    pub async fn connect(url: &str, table: &str, max_connections: u32) -> Result<Self> {
        check_table_name(table)?;
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| Error::Config(format!("invalid SQLite url: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(from_sqlx)?;

        let store = Self {
            pool,
            table: table.to_owned(),
        };
        store.migrate().await?;

        tracing::info!(table = %store.table, "sqlite session store ready");
        Ok(store)
    }

    /// Private in-memory database on a single pinned connection.
    pub async fn in_memory(table: &str) -> Result<Self> {
        check_table_name(table)?;
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| Error::Config(format!("invalid SQLite url: {e}")))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(from_sqlx)?;

        let store = Self {
            pool,
            table: table.to_owned(),
        };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                StudentID TEXT NOT NULL UNIQUE,
                ThreadID TEXT NOT NULL,
                AssistantID TEXT NOT NULL,
                CreatedAt TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            self.table
        );
        let mut conn = self.pool.acquire().await.map_err(from_sqlx)?;
        sqlx::query(&sql).execute(&mut *conn).await.map_err(from_sqlx)?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn find_thread(&self, identity: &str, thread_id: &str) -> Result<Option<String>> {
        let sql = format!(
            "SELECT ThreadID FROM {} WHERE StudentID = ? AND ThreadID = ? LIMIT 1",
            self.table
        );
        let mut conn = self.pool.acquire().await.map_err(from_sqlx)?;
        let row = sqlx::query(&sql)
            .bind(identity)
            .bind(thread_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(from_sqlx)?;
        row.map(|r| r.try_get::<String, _>("ThreadID").map_err(from_sqlx))
            .transpose()
    }

    async fn find_by_identity(&self, identity: &str) -> Result<Option<SessionRecord>> {
        let sql = format!(
            "SELECT StudentID, ThreadID, AssistantID FROM {} WHERE StudentID = ? LIMIT 1",
            self.table
        );
        let mut conn = self.pool.acquire().await.map_err(from_sqlx)?;
        let row = sqlx::query(&sql)
            .bind(identity)
            .fetch_optional(&mut *conn)
            .await
            .map_err(from_sqlx)?;
        row.as_ref().map(sqlite_record).transpose()
    }

    async fn insert_if_absent(&self, record: &SessionRecord) -> Result<bool> {
        let sql = format!(
            "INSERT OR IGNORE INTO {} (StudentID, ThreadID, AssistantID) VALUES (?, ?, ?)",
            self.table
        );
        let mut conn = self.pool.acquire().await.map_err(from_sqlx)?;
        let result = sqlx::query(&sql)
            .bind(&record.identity)
            .bind(&record.thread_id)
            .bind(&record.assistant_id)
            .execute(&mut *conn)
            .await
            .map_err(from_sqlx)?;
        Ok(result.rows_affected() == 1)
    }

    async fn count_for_identity(&self, identity: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE StudentID = ?", self.table);
        let mut conn = self.pool.acquire().await.map_err(from_sqlx)?;
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(identity)
            .fetch_one(&mut *conn)
            .await
            .map_err(from_sqlx)?;
        Ok(count.max(0) as u64)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MySQL
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// MySQL adapter for deployments sharing the portal's database.
///
/// A pre-existing table without a unique key on `StudentID` keeps working,
/// but then only the in-process lock in the resolver guards against
/// duplicate rows.
pub struct MySqlSessionStore {
    pool: MySqlPool,
    table: String,
}

impl MySqlSessionStore {
    pub async fn connect(url: &str, table: &str, max_connections: u32) -> Result<Self> {
        check_table_name(table)?;
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await
            .map_err(from_sqlx)?;

        let store = Self {
            pool,
            table: table.to_owned(),
        };
        store.migrate().await?;

        tracing::info!(table = %store.table, "mysql session store ready");
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                StudentID VARCHAR(255) NOT NULL,
                ThreadID VARCHAR(255) NOT NULL,
                AssistantID VARCHAR(255) NOT NULL,
                CreatedAt TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE KEY uq_student (StudentID)
            )",
            self.table
        );
        let mut conn = self.pool.acquire().await.map_err(from_sqlx)?;
        sqlx::query(&sql).execute(&mut *conn).await.map_err(from_sqlx)?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MySqlSessionStore {
    async fn find_thread(&self, identity: &str, thread_id: &str) -> Result<Option<String>> {
        let sql = format!(
            "SELECT ThreadID FROM {} WHERE StudentID = ? AND ThreadID = ? LIMIT 1",
            self.table
        );
        let mut conn = self.pool.acquire().await.map_err(from_sqlx)?;
        let row = sqlx::query(&sql)
            .bind(identity)
            .bind(thread_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(from_sqlx)?;
        row.map(|r| r.try_get::<String, _>("ThreadID").map_err(from_sqlx))
            .transpose()
    }

    async fn find_by_identity(&self, identity: &str) -> Result<Option<SessionRecord>> {
        let sql = format!(
            "SELECT StudentID, ThreadID, AssistantID FROM {} WHERE StudentID = ? LIMIT 1",
            self.table
        );
        let mut conn = self.pool.acquire().await.map_err(from_sqlx)?;
        let row = sqlx::query(&sql)
            .bind(identity)
            .fetch_optional(&mut *conn)
            .await
            .map_err(from_sqlx)?;
        row.as_ref().map(mysql_record).transpose()
    }

    async fn insert_if_absent(&self, record: &SessionRecord) -> Result<bool> {
        let sql = format!(
            "INSERT IGNORE INTO {} (StudentID, ThreadID, AssistantID) VALUES (?, ?, ?)",
            self.table
        );
        let mut conn = self.pool.acquire().await.map_err(from_sqlx)?;
        let result = sqlx::query(&sql)
            .bind(&record.identity)
            .bind(&record.thread_id)
            .bind(&record.assistant_id)
            .execute(&mut *conn)
            .await
            .map_err(from_sqlx)?;
        Ok(result.rows_affected() == 1)
    }

    async fn count_for_identity(&self, identity: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE StudentID = ?", self.table);
        let mut conn = self.pool.acquire().await.map_err(from_sqlx)?;
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(identity)
            .fetch_one(&mut *conn)
            .await
            .map_err(from_sqlx)?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(identity: &str, thread_id: &str) -> SessionRecord {
        SessionRecord {
            identity: identity.into(),
            thread_id: thread_id.into(),
            assistant_id: "asst_1".into(),
        }
    }

    #[tokio::test]
    async fn insert_then_lookup() {
        let store = SqliteSessionStore::in_memory("chatbot_english_db").await.unwrap();
        assert!(store.find_by_identity("s1").await.unwrap().is_none());

        assert!(store.insert_if_absent(&record("s1", "thread_a")).await.unwrap());

        let found = store.find_by_identity("s1").await.unwrap().unwrap();
        assert_eq!(found, record("s1", "thread_a"));
        assert_eq!(
            store.find_thread("s1", "thread_a").await.unwrap().as_deref(),
            Some("thread_a")
        );
        assert!(store.find_thread("s1", "thread_b").await.unwrap().is_none());
        assert!(store.find_thread("s2", "thread_a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_insert_for_identity_is_ignored() {
        let store = SqliteSessionStore::in_memory("sessions").await.unwrap();
        assert!(store.insert_if_absent(&record("s1", "thread_a")).await.unwrap());
        assert!(!store.insert_if_absent(&record("s1", "thread_b")).await.unwrap());

        assert_eq!(store.count_for_identity("s1").await.unwrap(), 1);
        let found = store.find_by_identity("s1").await.unwrap().unwrap();
        assert_eq!(found.thread_id, "thread_a");
    }

    #[tokio::test]
    async fn file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("tutor.db").display());

        {
            let store = SqliteSessionStore::connect(&url, "sessions", 2).await.unwrap();
            store.insert_if_absent(&record("s1", "thread_a")).await.unwrap();
        }

        let reopened = SqliteSessionStore::connect(&url, "sessions", 2).await.unwrap();
        let found = reopened.find_by_identity("s1").await.unwrap().unwrap();
        assert_eq!(found.thread_id, "thread_a");
    }

    #[tokio::test]
    async fn rejects_unsafe_table_name() {
        let err = SqliteSessionStore::in_memory("x; DROP TABLE y").await.err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn connect_rejects_unknown_scheme() {
        let cfg = StoreConfig {
            url: "postgres://localhost/db".into(),
            url_env: "TL_TEST_UNSET_DATABASE_URL".into(),
            ..Default::default()
        };
        let err = connect(&cfg).await.err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
