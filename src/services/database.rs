use rusqlite::{params, Connection, Row, Transaction};
use std::path::{Path, PathBuf};

use crate::config::BackendKind;
use crate::models::PersistedMetric;
use crate::services::storage::{validate_dataset_name, MetricStore, StorageError};

const METRIC_COLUMNS_DDL: &str = "
                id INTEGER PRIMARY KEY,
                model_name TEXT NOT NULL,
                task_type TEXT NOT NULL,
                input_tokens INTEGER NOT NULL,
                output_tokens INTEGER NOT NULL,
                latency_ms REAL NOT NULL,
                accuracy_score REAL NOT NULL,
                timestamp TEXT NOT NULL,
                user_rating INTEGER NOT NULL,
                cost_usd REAL NOT NULL";

/// Relational backend: one SQLite table per dataset.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pub path: PathBuf,
    pub table: String,
}

impl SqliteStore {
    pub fn new(path: &Path, table: &str) -> Result<Self, StorageError> {
        validate_dataset_name(table)?;

        Ok(Self {
            path: path.to_path_buf(),
            table: table.to_string(),
        })
    }

    /// Opens a fresh connection; it is closed when the returned value drops.
    pub fn connect(&self) -> Result<Connection, StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Sqlite(e.to_string()))?;
        }

        let conn = Connection::open(&self.path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        Ok(conn)
    }

    pub fn table_exists(&self) -> Result<bool, StorageError> {
        let conn = self.connect()?;
        Self::table_exists_on(&conn, &self.table)
    }

    fn table_exists_on(conn: &Connection, table: &str) -> Result<bool, StorageError> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
            [table],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    fn create_table_sql(&self) -> String {
        format!("CREATE TABLE IF NOT EXISTS {} ({}\n            )", self.table, METRIC_COLUMNS_DDL)
    }

    fn insert_all(&self, tx: &Transaction<'_>, records: &[PersistedMetric]) -> Result<(), StorageError> {
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.table,
            PersistedMetric::COLUMNS.join(", ")
        );

        let mut stmt = tx.prepare(&sql)?;
        for record in records {
            stmt.execute(params![
                record.id,
                record.model_name,
                record.task_type,
                record.input_tokens,
                record.output_tokens,
                record.latency_ms,
                record.accuracy_score,
                record.timestamp,
                record.user_rating,
                record.cost_usd,
            ])?;
        }

        Ok(())
    }

    fn map_row(row: &Row) -> rusqlite::Result<PersistedMetric> {
        Ok(PersistedMetric {
            id: row.get::<_, i64>(0)?,
            model_name: row.get::<_, String>(1)?,
            task_type: row.get::<_, String>(2)?,
            input_tokens: row.get::<_, i64>(3)?,
            output_tokens: row.get::<_, i64>(4)?,
            latency_ms: row.get::<_, f64>(5)?,
            accuracy_score: row.get::<_, f64>(6)?,
            timestamp: row.get::<_, String>(7)?,
            user_rating: row.get::<_, i64>(8)?,
            cost_usd: row.get::<_, f64>(9)?,
        })
    }
}

impl MetricStore for SqliteStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn dataset(&self) -> &str {
        &self.table
    }

    fn ensure_schema(&self) -> Result<(), StorageError> {
        let conn = self.connect()?;
        conn.execute(&self.create_table_sql(), [])?;
        Ok(())
    }

    fn upsert(&self, records: &[PersistedMetric]) -> Result<(), StorageError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        tx.execute(&self.create_table_sql(), [])?;
        self.insert_all(&tx, records)?;

        tx.commit()?;
        Ok(())
    }

    fn replace_all(&self, records: &[PersistedMetric]) -> Result<(), StorageError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        tx.execute(&format!("DROP TABLE IF EXISTS {}", self.table), [])?;
        tx.execute(&self.create_table_sql(), [])?;
        self.insert_all(&tx, records)?;

        tx.commit()?;
        Ok(())
    }

    fn fetch_recent(&self, limit: usize) -> Result<Vec<PersistedMetric>, StorageError> {
        let conn = self.connect()?;
        if !Self::table_exists_on(&conn, &self.table)? {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM {} ORDER BY id DESC LIMIT ?",
            PersistedMetric::COLUMNS.join(", "),
            self.table
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([limit as i64], Self::map_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::test_support::metric;
    use tempfile::TempDir;

    fn create_store() -> (TempDir, SqliteStore) {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let store = SqliteStore::new(&temp_dir.path().join("ai_data.db"), "ai_metrics").expect("Failed to create store");
        (temp_dir, store)
    }

    mod creation {
        use super::*;

        #[test]
        fn test_new_store_does_not_touch_disk() {
            let (temp_dir, _store) = create_store();
            assert!(!temp_dir.path().join("ai_data.db").exists());
        }

        #[test]
        fn test_new_store_rejects_invalid_table_name() {
            let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
            let result = SqliteStore::new(&temp_dir.path().join("ai_data.db"), "1metrics");
            assert!(matches!(result, Err(StorageError::InvalidName(_))));
        }

        #[test]
        fn test_ensure_schema_creates_table() {
            let (_temp_dir, store) = create_store();
            assert!(!store.table_exists().expect("Failed to check table"));

            store.ensure_schema().expect("Failed to create table");
            store.ensure_schema().expect("Second call should be a no-op");

            assert!(store.table_exists().expect("Failed to check table"));
        }

        #[test]
        fn test_ensure_schema_creates_missing_parent_directories() {
            let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
            let store =
                SqliteStore::new(&temp_dir.path().join("nested/dir/ai_data.db"), "ai_metrics").expect("Failed to create store");

            store.ensure_schema().expect("Failed to create table");
            assert!(temp_dir.path().join("nested/dir/ai_data.db").exists());
        }

        #[test]
        fn test_schema_has_ten_columns() {
            let (_temp_dir, store) = create_store();
            store.ensure_schema().expect("Failed to create table");

            let conn = store.connect().expect("Failed to connect");
            let mut stmt = conn.prepare("PRAGMA table_info(ai_metrics)").expect("Failed to prepare query");
            let columns: Vec<String> = stmt
                .query_map([], |row| row.get::<_, String>(1))
                .expect("Failed to query columns")
                .collect::<Result<Vec<_>, _>>()
                .expect("Failed to collect columns");

            assert_eq!(columns, PersistedMetric::COLUMNS.to_vec());
        }
    }

    mod upsert {
        use super::*;

        #[test]
        fn test_upsert_same_id_keeps_one_row_with_latest_values() {
            let (_temp_dir, store) = create_store();

            store.upsert(&[metric(42, "GPT-4")]).expect("Failed to upsert");
            store.upsert(&[metric(42, "Claude")]).expect("Failed to upsert");

            let conn = store.connect().expect("Failed to connect");
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM ai_metrics WHERE id = 42", [], |row| row.get(0))
                .expect("Failed to count rows");
            assert_eq!(count, 1);

            let stored = store.fetch_recent(10).expect("Failed to fetch");
            assert_eq!(stored, vec![metric(42, "Claude")]);
        }

        #[test]
        fn test_upsert_keeps_existing_rows() {
            let (_temp_dir, store) = create_store();

            store.upsert(&[metric(1, "GPT-4")]).expect("Failed to upsert");
            store.upsert(&[metric(2, "Gemini")]).expect("Failed to upsert");

            assert_eq!(store.fetch_recent(10).expect("Failed to fetch").len(), 2);
        }

        #[test]
        fn test_upsert_empty_batch_creates_table() {
            let (_temp_dir, store) = create_store();
            store.upsert(&[]).expect("Failed to upsert");
            assert!(store.table_exists().expect("Failed to check table"));
        }
    }

    mod full_refresh {
        use super::*;

        #[test]
        fn test_replace_all_drops_previous_rows() {
            let (_temp_dir, store) = create_store();

            store.upsert(&[metric(1, "GPT-4"), metric(2, "GPT-4")]).expect("Failed to upsert");
            store.replace_all(&[metric(7, "PaLM")]).expect("Failed to replace");

            assert_eq!(store.fetch_recent(10).expect("Failed to fetch"), vec![metric(7, "PaLM")]);
        }

        #[test]
        fn test_replace_all_recreates_drifted_schema() {
            let (_temp_dir, store) = create_store();

            {
                let conn = store.connect().expect("Failed to connect");
                conn.execute("CREATE TABLE ai_metrics (id INTEGER, legacy TEXT)", [])
                    .expect("Failed to create legacy table");
            }

            store.replace_all(&[metric(3, "LLaMA")]).expect("Failed to replace");
            assert_eq!(store.fetch_recent(10).expect("Failed to fetch"), vec![metric(3, "LLaMA")]);
        }
    }

    mod queries {
        use super::*;

        #[test]
        fn test_fetch_recent_orders_by_id_descending() {
            let (_temp_dir, store) = create_store();

            store
                .upsert(&[metric(5, "a"), metric(1, "b"), metric(9, "c"), metric(3, "d")])
                .expect("Failed to upsert");

            let ids: Vec<i64> = store
                .fetch_recent(4)
                .expect("Failed to fetch")
                .iter()
                .map(|m| m.id)
                .collect();
            assert_eq!(ids, vec![9, 5, 3, 1]);
        }

        #[test]
        fn test_fetch_recent_respects_limit() {
            let (_temp_dir, store) = create_store();
            store
                .upsert(&[metric(5, "a"), metric(1, "b"), metric(9, "c")])
                .expect("Failed to upsert");

            let ids: Vec<i64> = store
                .fetch_recent(2)
                .expect("Failed to fetch")
                .iter()
                .map(|m| m.id)
                .collect();
            assert_eq!(ids, vec![9, 5]);
        }

        #[test]
        fn test_fetch_recent_without_table_is_empty() {
            let (_temp_dir, store) = create_store();
            assert!(store.fetch_recent(100).expect("Failed to fetch").is_empty());
        }
    }
}
