//! Session configuration, read from TOML.
//!
//! ```toml
//! project_id = "website-redesign"
//! event_buffer = 64
//!
//! [board]
//! name = "Project Tasks"
//!
//! [[board.columns]]
//! name = "To Do"
//! status = "todo"
//! ```
//!
//! `event_buffer` and `[board]` are optional; a `[board]` table must list a
//! column for every status.

use crate::{
    domain::BoardConfig,
    error::{BoardError, Result},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default capacity of the board event channel
pub const DEFAULT_EVENT_BUFFER: usize = 64;

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

/// Everything a [`BoardSession`](crate::session::BoardSession) needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub project_id: String,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default)]
    pub board: BoardConfig,
}

impl SessionConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            event_buffer: DEFAULT_EVENT_BUFFER,
            board: BoardConfig::default(),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML config file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(BoardError::InvalidConfig(
                "project_id must not be empty".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(BoardError::InvalidConfig(
                "event_buffer must be greater than zero".to_string(),
            ));
        }
        self.board.validate()
    }
}
