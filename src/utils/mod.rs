pub mod logging;
pub mod prompt_template;

pub use logging::init_logging;
pub use prompt_template::{FREE_COLUMNS_TEMPLATE, NAMED_COLUMNS_TEMPLATE, TABLE_PROMPT_TEMPLATE};
