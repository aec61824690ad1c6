//! # Taskboard Core
//!
//! Task board ordering and status-transition model for TASKIT project
//! boards.
//!
//! This crate owns the ordered, column-grouped view of a project's tasks
//! during an editing session, turns drag-and-drop gestures into explicit
//! `(status, index)` moves, and forwards changes to an external task store
//! without waiting on it. It has no dependency on any UI toolkit or
//! particular storage backend.

pub mod config;
pub mod directory;
pub mod domain;
pub mod error;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use config::SessionConfig;
pub use directory::{StaticUserDirectory, UserDirectory};
pub use domain::{
    board::{Board, BoardConfig, BoardSnapshot, Column, MoveOutcome},
    drop_target::{DropCommand, DropTarget},
    gesture::DragSession,
    task::{Assignee, NewTask, Priority, Task, TaskId, TaskPatch, TaskStatus},
};
pub use error::{BoardError, Result};
pub use session::{BoardEvent, BoardSession, PersistOp, PersistRequest, PersistenceFailure};
pub use storage::{InMemoryTaskStore, TaskStore};
