pub mod settings;

pub use settings::{AppConfig, BackendKind, CompletionConfig, GenerationConfig, StorageConfig};
