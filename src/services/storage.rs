use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{BackendKind, StorageConfig};
use crate::error::AppError;
use crate::models::PersistedMetric;
use crate::services::database::SqliteStore;
use crate::services::document::DocumentStore;

pub const RETRIEVAL_LIMIT: usize = 100;

#[derive(Debug)]
pub enum StorageError {
    Sqlite(String),
    Document(String),
    Serialization(String),
    InvalidName(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Sqlite(msg) => write!(f, "SQLite error: {}", msg),
            StorageError::Document(msg) => write!(f, "Document store error: {}", msg),
            StorageError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            StorageError::InvalidName(msg) => write!(f, "Invalid dataset name: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Sqlite(err.to_string())
    }
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Document(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err.to_string())
    }
}

/// How a batch is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistPolicy {
    /// Insert, replacing rows that share an id.
    Merge,
    /// Drop the dataset and write the batch as its only content.
    FullRefresh,
}

impl fmt::Display for PersistPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistPolicy::Merge => write!(f, "merge"),
            PersistPolicy::FullRefresh => write!(f, "full_refresh"),
        }
    }
}

/// Storage capability shared by the relational and document backends. The
/// sqlite backend opens a connection per call; the document backend keeps
/// one database handle for its lifetime.
pub trait MetricStore: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn dataset(&self) -> &str;

    fn ensure_schema(&self) -> Result<(), StorageError>;

    fn upsert(&self, records: &[PersistedMetric]) -> Result<(), StorageError>;

    fn replace_all(&self, records: &[PersistedMetric]) -> Result<(), StorageError>;

    /// Highest ids first, at most `limit` rows.
    fn fetch_recent(&self, limit: usize) -> Result<Vec<PersistedMetric>, StorageError>;

    fn persist(&self, records: &[PersistedMetric], policy: PersistPolicy) -> Result<(), StorageError> {
        match policy {
            PersistPolicy::Merge => self.upsert(records)?,
            PersistPolicy::FullRefresh => self.replace_all(records)?,
        }

        tracing::info!(
            backend = %self.kind(),
            dataset = self.dataset(),
            %policy,
            rows = records.len(),
            "persisted metric records"
        );

        Ok(())
    }
}

/// Picks the backend once, at configuration time. The sqlite backend touches
/// nothing until first use; the document backend opens its database here.
pub fn open_store(config: &StorageConfig) -> Result<Box<dyn MetricStore>, StorageError> {
    validate_dataset_name(&config.dataset)?;

    let path = config.resolved_path();
    let store: Box<dyn MetricStore> = match config.backend {
        BackendKind::Sqlite => Box::new(SqliteStore::new(&path, &config.dataset)?),
        BackendKind::Document => Box::new(DocumentStore::new(&path, &config.dataset)?),
    };

    Ok(store)
}

pub fn validate_dataset_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name.len() > 64 {
        return Err(StorageError::InvalidName(
            "Dataset name must be between 1-64 characters".to_string(),
        ));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StorageError::InvalidName(format!(
            "Dataset name can only contain alphanumeric characters and underscores for {}",
            name
        )));
    }

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(StorageError::InvalidName(
            "Dataset name cannot start with a number".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::PersistedMetric;

    pub fn metric(id: i64, model_name: &str) -> PersistedMetric {
        PersistedMetric {
            id,
            model_name: model_name.to_string(),
            task_type: "qa".to_string(),
            input_tokens: 120,
            output_tokens: 40,
            latency_ms: 350.25,
            accuracy_score: 0.912,
            timestamp: "2024-03-01T12:00:00Z".to_string(),
            user_rating: 4,
            cost_usd: 0.0042,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::metric;
    use super::*;

    fn config(backend: BackendKind, dir: &std::path::Path) -> StorageConfig {
        StorageConfig {
            backend,
            path: Some(dir.join(match backend {
                BackendKind::Sqlite => "metrics.db",
                BackendKind::Document => "metrics.sled",
            })),
            dataset: "ai_metrics".to_string(),
        }
    }

    mod naming {
        use super::*;

        #[test]
        fn test_validate_dataset_name() {
            assert!(validate_dataset_name("ai_metrics").is_ok());
            assert!(validate_dataset_name("123metrics").is_err());
            assert!(validate_dataset_name("metrics; DROP TABLE x").is_err());
            assert!(validate_dataset_name("").is_err());
            assert!(validate_dataset_name(&"m".repeat(65)).is_err());
        }

        #[test]
        fn test_open_store_rejects_bad_name() {
            let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
            let mut config = config(BackendKind::Sqlite, temp_dir.path());
            config.dataset = "bad-name".to_string();

            assert!(matches!(open_store(&config), Err(StorageError::InvalidName(_))));
        }
    }

    mod polymorphism {
        use super::*;

        #[test]
        fn test_both_backends_order_by_id_descending() {
            for backend in [BackendKind::Sqlite, BackendKind::Document] {
                let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
                let store = open_store(&config(backend, temp_dir.path())).expect("Failed to open store");
                assert_eq!(store.kind(), backend);

                let records: Vec<_> = [5, 1, 9, 3].iter().map(|id| metric(*id, "Claude")).collect();
                store.persist(&records, PersistPolicy::Merge).expect("Failed to persist");

                let ids: Vec<i64> = store
                    .fetch_recent(4)
                    .expect("Failed to fetch")
                    .iter()
                    .map(|m| m.id)
                    .collect();
                assert_eq!(ids, vec![9, 5, 3, 1], "backend {}", backend);
            }
        }

        #[test]
        fn test_both_backends_full_refresh_discards_previous_rows() {
            for backend in [BackendKind::Sqlite, BackendKind::Document] {
                let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
                let store = open_store(&config(backend, temp_dir.path())).expect("Failed to open store");

                store
                    .persist(&[metric(1, "GPT-4"), metric(2, "GPT-4")], PersistPolicy::Merge)
                    .expect("Failed to persist");
                store
                    .persist(&[metric(3, "PaLM")], PersistPolicy::FullRefresh)
                    .expect("Failed to persist");

                let stored = store.fetch_recent(RETRIEVAL_LIMIT).expect("Failed to fetch");
                assert_eq!(stored, vec![metric(3, "PaLM")], "backend {}", backend);
            }
        }

        #[test]
        fn test_both_backends_cap_to_limit() {
            for backend in [BackendKind::Sqlite, BackendKind::Document] {
                let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
                let store = open_store(&config(backend, temp_dir.path())).expect("Failed to open store");

                let records: Vec<_> = (1..=120).map(|id| metric(id, "LLaMA")).collect();
                store.persist(&records, PersistPolicy::Merge).expect("Failed to persist");

                let stored = store.fetch_recent(RETRIEVAL_LIMIT).expect("Failed to fetch");
                assert_eq!(stored.len(), 100);
                assert_eq!(stored[0].id, 120);
                assert_eq!(stored[99].id, 21);
            }
        }
    }
}
