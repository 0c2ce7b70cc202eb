pub mod completion;
pub mod database;
pub mod document;
pub mod generation;
pub mod normalizer;
pub mod prompt;
pub mod storage;
pub mod synthesizer;
pub mod validation;

pub use completion::{CompletionClient, CompletionError};
pub use database::SqliteStore;
pub use document::DocumentStore;
pub use generation::GenerationService;
pub use normalizer::{normalize, normalize_with_strategy, Normalized, RecoveryStrategy};
pub use prompt::PromptBuilder;
pub use storage::{open_store, MetricStore, PersistPolicy, StorageError, RETRIEVAL_LIMIT};
pub use synthesizer::{IdentifierPool, RecordSynthesizer, SynthesisError};
pub use validation::{validate_records, ValidationPolicy};
