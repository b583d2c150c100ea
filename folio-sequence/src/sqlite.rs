use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use crate::{Counter, CounterStore, DocumentType, ScopeKey, StoreError, StoreResult};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// Uniqueness is split across two partial indexes: rows without a fiscal year
// would otherwise all compare equal on NULL.
const COUNTER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS counters (
    document_type TEXT NOT NULL,
    fiscal_year TEXT,
    sequence_value INTEGER NOT NULL CHECK (sequence_value >= 0)
);
CREATE UNIQUE INDEX IF NOT EXISTS counters_uq_type_year
    ON counters(document_type, fiscal_year) WHERE fiscal_year IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS counters_uq_type_lifetime
    ON counters(document_type) WHERE fiscal_year IS NULL;
"#;

const INCREMENT_YEARLY: &str = "INSERT INTO counters (document_type, fiscal_year, sequence_value)
     VALUES (?1, ?2, 1)
     ON CONFLICT(document_type, fiscal_year) WHERE fiscal_year IS NOT NULL
     DO UPDATE SET sequence_value = sequence_value + 1
     RETURNING sequence_value";

const INCREMENT_LIFETIME: &str = "INSERT INTO counters (document_type, fiscal_year, sequence_value)
     VALUES (?1, NULL, 1)
     ON CONFLICT(document_type) WHERE fiscal_year IS NULL
     DO UPDATE SET sequence_value = sequence_value + 1
     RETURNING sequence_value";

/// SQLite-backed counter store shared by every process pointing at the same file.
#[derive(Clone, Debug)]
pub struct SqliteCounterStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteCounterStore {
    pub fn new(path: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open the store, waiting up to `busy_timeout` for competing writers.
    pub fn with_busy_timeout(path: impl Into<PathBuf>, busy_timeout: Duration) -> StoreResult<Self> {
        let store = Self {
            path: path.into(),
            busy_timeout,
        };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the counter for `scope` so its next allocation restarts at 1.
    ///
    /// Administrative maintenance only; the allocator never calls this.
    pub async fn reset(&self, scope: &ScopeKey) -> StoreResult<bool> {
        let store = self.clone();
        let scope = scope.clone();
        tokio::task::spawn_blocking(move || -> StoreResult<bool> {
            let conn = store.connect()?;
            let removed = conn.execute(
                "DELETE FROM counters WHERE document_type = ?1 AND fiscal_year IS ?2",
                params![scope.document_type.as_str(), scope.fiscal_year],
            )?;
            Ok(removed > 0)
        })
        .await?
    }

    fn initialize_schema(&self) -> StoreResult<()> {
        let conn = self.connect()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch(COUNTER_SCHEMA)?;
        Ok(())
    }

    fn connect(&self) -> StoreResult<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        Ok(conn)
    }

    fn increment_blocking(&self, scope: &ScopeKey) -> StoreResult<u64> {
        let mut conn = self.connect()?;
        // Take the write lock up front so the busy timeout covers lock contention.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value: i64 = match &scope.fiscal_year {
            Some(year) => tx.query_row(
                INCREMENT_YEARLY,
                params![scope.document_type.as_str(), year],
                |row| row.get(0),
            )?,
            None => tx.query_row(
                INCREMENT_LIFETIME,
                params![scope.document_type.as_str()],
                |row| row.get(0),
            )?,
        };
        tx.commit()?;
        debug!(%scope, value, "sqlite counter incremented");
        to_sequence(value)
    }

    fn current_blocking(&self, scope: &ScopeKey) -> StoreResult<Option<u64>> {
        let conn = self.connect()?;
        let value: Option<i64> = conn
            .query_row(
                "SELECT sequence_value FROM counters
                 WHERE document_type = ?1 AND fiscal_year IS ?2",
                params![scope.document_type.as_str(), scope.fiscal_year],
                |row| row.get(0),
            )
            .optional()?;
        value.map(to_sequence).transpose()
    }

    fn counters_blocking(&self) -> StoreResult<Vec<Counter>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT document_type, fiscal_year, sequence_value FROM counters")?;
        let mut rows = stmt.query([])?;
        let mut counters = Vec::new();
        while let Some(row) = rows.next()? {
            counters.push(row_to_counter(row)?);
        }
        counters.sort_by(|a, b| a.scope.cmp(&b.scope));
        Ok(counters)
    }
}

#[async_trait]
impl CounterStore for SqliteCounterStore {
    async fn increment(&self, scope: &ScopeKey) -> StoreResult<u64> {
        let store = self.clone();
        let scope = scope.clone();
        tokio::task::spawn_blocking(move || store.increment_blocking(&scope)).await?
    }

    async fn current(&self, scope: &ScopeKey) -> StoreResult<Option<u64>> {
        let store = self.clone();
        let scope = scope.clone();
        tokio::task::spawn_blocking(move || store.current_blocking(&scope)).await?
    }

    async fn counters(&self) -> StoreResult<Vec<Counter>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.counters_blocking()).await?
    }
}

fn to_sequence(value: i64) -> StoreResult<u64> {
    u64::try_from(value)
        .map_err(|_| StoreError::Serialization(format!("negative sequence value {value}")))
}

fn row_to_counter(row: &rusqlite::Row<'_>) -> StoreResult<Counter> {
    let type_str: String = row.get(0)?;
    let fiscal_year: Option<String> = row.get(1)?;
    let value: i64 = row.get(2)?;
    let document_type = DocumentType::from_str(&type_str)
        .map_err(|err| StoreError::Serialization(format!("invalid counter row: {err}")))?;
    Ok(Counter {
        scope: ScopeKey {
            document_type,
            fiscal_year,
        },
        sequence_value: to_sequence(value)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn upsert_creates_then_increments() {
        let dir = tempdir().unwrap();
        let store = SqliteCounterStore::new(dir.path().join("counters.db")).unwrap();
        let scope = ScopeKey::yearly(DocumentType::Invoice, "2024-25");
        assert_eq!(store.current(&scope).await.unwrap(), None);
        assert_eq!(store.increment(&scope).await.unwrap(), 1);
        assert_eq!(store.increment(&scope).await.unwrap(), 2);
        assert_eq!(store.current(&scope).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn lifetime_counters_do_not_collide_on_missing_year() {
        let dir = tempdir().unwrap();
        let store = SqliteCounterStore::new(dir.path().join("counters.db")).unwrap();
        let product = ScopeKey::lifetime(DocumentType::Product);
        let kit = ScopeKey::lifetime(DocumentType::Kit);
        assert_eq!(store.increment(&product).await.unwrap(), 1);
        assert_eq!(store.increment(&kit).await.unwrap(), 1);
        assert_eq!(store.increment(&product).await.unwrap(), 2);
        assert_eq!(store.counters().await.unwrap().len(), 2);
    }

    #[test]
    fn partial_indexes_reject_duplicate_rows() {
        let dir = tempdir().unwrap();
        let store = SqliteCounterStore::new(dir.path().join("counters.db")).unwrap();
        let conn = store.connect().unwrap();
        let insert = "INSERT INTO counters (document_type, fiscal_year, sequence_value) VALUES (?1, ?2, 1)";
        conn.execute(insert, params!["product", Option::<String>::None])
            .unwrap();
        conn.execute(insert, params!["kit", Option::<String>::None])
            .unwrap();
        conn.execute(insert, params!["invoice", Some("2024-25")])
            .unwrap();
        conn.execute(insert, params!["invoice", Some("2025-26")])
            .unwrap();

        let dup_lifetime: StoreError = conn
            .execute(insert, params!["product", Option::<String>::None])
            .unwrap_err()
            .into();
        assert!(dup_lifetime.is_conflict());
        let dup_yearly: StoreError = conn
            .execute(insert, params!["invoice", Some("2024-25")])
            .unwrap_err()
            .into();
        assert!(dup_yearly.is_conflict());
    }

    #[tokio::test]
    async fn reset_removes_only_the_named_scope() {
        let dir = tempdir().unwrap();
        let store = SqliteCounterStore::new(dir.path().join("counters.db")).unwrap();
        let fy24 = ScopeKey::yearly(DocumentType::Bill, "2024-25");
        let fy25 = ScopeKey::yearly(DocumentType::Bill, "2025-26");
        store.increment(&fy24).await.unwrap();
        store.increment(&fy25).await.unwrap();

        assert!(store.reset(&fy24).await.unwrap());
        assert!(!store.reset(&fy24).await.unwrap());
        assert_eq!(store.current(&fy24).await.unwrap(), None);
        assert_eq!(store.current(&fy25).await.unwrap(), Some(1));
        assert_eq!(store.increment(&fy24).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn counters_survive_reopening_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("counters.db");
        let scope = ScopeKey::lifetime(DocumentType::Kit);
        {
            let store = SqliteCounterStore::new(&path).unwrap();
            for _ in 0..3 {
                store.increment(&scope).await.unwrap();
            }
        }
        let store = SqliteCounterStore::new(&path).unwrap();
        assert_eq!(store.increment(&scope).await.unwrap(), 4);
    }
}
