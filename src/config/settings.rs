use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AppError, AppResult};
use crate::services::storage::PersistPolicy;
use crate::services::validation::ValidationPolicy;

pub const API_KEY_ENV: &str = "SYNTHDATA_API_KEY";
pub const LEGACY_API_KEY_ENV: &str = "NVIDIA_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub completion: CompletionConfig,
    pub storage: StorageConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://integrate.api.nvidia.com/v1".to_string(),
            model: "meta/llama-3.1-8b-instruct".to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[serde(alias = "sql", alias = "relational")]
    Sqlite,
    #[serde(alias = "sled", alias = "mongo")]
    Document,
}

impl FromStr for BackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "sql" | "relational" => Ok(BackendKind::Sqlite),
            "document" | "sled" | "mongo" => Ok(BackendKind::Document),
            other => Err(AppError::Config(format!("unknown storage backend: {}", other))),
        }
    }
}

impl BackendKind {
    pub fn default_path(&self) -> PathBuf {
        match self {
            BackendKind::Sqlite => PathBuf::from("ai_data.db"),
            BackendKind::Document => PathBuf::from("ai_data.sled"),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Sqlite => write!(f, "sqlite"),
            BackendKind::Document => write!(f, "document"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    /// Database file (sqlite) or directory (document). Unset means the
    /// backend's own default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub dataset: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Sqlite,
            path: None,
            dataset: "ai_metrics".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| self.backend.default_path())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Policy for rows recovered from the remote model.
    pub remote_policy: PersistPolicy,
    /// Policy for rows produced by the offline synthesizer.
    pub offline_policy: PersistPolicy,
    pub validation: ValidationPolicy,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            remote_policy: PersistPolicy::Merge,
            offline_policy: PersistPolicy::FullRefresh,
            validation: ValidationPolicy::Lenient,
        }
    }
}

impl AppConfig {
    /// Defaults, then the optional TOML file, then the process environment.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> AppResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).or_else(|| lookup(LEGACY_API_KEY_ENV)) {
            self.completion.api_key = Some(key);
        }
        if let Some(base_url) = lookup("SYNTHDATA_BASE_URL") {
            self.completion.base_url = base_url;
        }
        if let Some(model) = lookup("SYNTHDATA_MODEL") {
            self.completion.model = model;
        }
        if let Some(backend) = lookup("SYNTHDATA_BACKEND") {
            self.storage.backend = backend.parse()?;
        }
        if let Some(path) = lookup("SYNTHDATA_STORE_PATH") {
            self.storage.path = Some(PathBuf::from(path));
        }
        if let Some(dataset) = lookup("SYNTHDATA_DATASET") {
            self.storage.dataset = dataset;
        }

        Ok(())
    }
}
