use thiserror::Error;

pub type Result<T> = std::result::Result<T, BoardError>;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Persisting task {task_id} failed: {reason}")]
    PersistenceFailed { task_id: String, reason: String },

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Task already on board: {0}")]
    DuplicateTask(String),

    #[error("Invalid board configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    External(#[from] anyhow::Error),
}

impl BoardError {
    /// True for errors raised synchronously by the board itself, which
    /// always leave the board unchanged.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::UnknownColumn(_)
                | Self::TaskNotFound(_)
                | Self::InvalidTask(_)
                | Self::DuplicateTask(_)
        )
    }
}
