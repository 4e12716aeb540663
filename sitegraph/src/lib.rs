// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    AnalyzeOptions, find_run, init_database, load_config, load_rules, load_snapshot,
    parse_format, resolve_db_path, run_analysis,
};
