pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use services::GenerationService;

/// Builds the service graph from a resolved configuration. The storage
/// backend is chosen here, once.
pub fn build_service(config: &AppConfig) -> AppResult<GenerationService> {
    GenerationService::from_config(config)
}
