pub mod record;
pub mod response;

pub use record::{ColumnSpec, GenerationRequest, PersistedMetric, Record, TypeHint, DEFAULT_ROW_COUNT};
pub use response::{ApiResponse, ResponseStatus};
