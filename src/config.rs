use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "qrepair";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default agent endpoint (local Ollama instance).
pub const DEFAULT_AGENT_URL: &str = "http://localhost:11434";

/// Default model used for both extraction and review.
pub const DEFAULT_MODEL: &str = "gemma3:12b";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "qrepair=info,warn"
}

/// Get the application data directory.
/// Falls back to the working directory when the platform has no data dir.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the question database.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("questions.db")
}
