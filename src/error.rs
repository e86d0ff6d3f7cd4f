use thiserror::Error;

/// Errors raised by the lifecycle engine and its collaborators.
///
/// Configuration problems inside individual rules never show up here; they
/// degrade to a rule that does not fire. Everything else is fatal to the
/// current run.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Record store error: {0}")]
    Store(String),

    #[error("Record not found: {entity_type}/{id}")]
    RecordNotFound { entity_type: String, id: String },

    #[error("Deadline calculation failed for {id}: {message}")]
    Deadline { id: String, message: String },

    #[error("Event delivery failed: {0}")]
    Event(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
