use crate::{
    domain::{NewTask, Task, TaskId, TaskStatus},
    error::Result,
};
use async_trait::async_trait;

#[cfg(feature = "file-storage")]
pub mod file_storage;
pub mod memory_storage;

#[cfg(feature = "file-storage")]
pub use file_storage::FileTaskStore;
pub use memory_storage::{InMemoryTaskStore, StoreCall};

/// Durable home of task records.
///
/// The board calls into this; it never implements it. Implementations own
/// their retry and timeout policy.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Lists a project's tasks in board order
    async fn list_tasks(&self, project_id: &str) -> Result<Vec<Task>>;

    /// Persists a status change
    async fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<()>;

    /// Creates a task, returning the stored record (which may carry a
    /// store-assigned id)
    async fn create_task(&self, project_id: &str, status: TaskStatus, fields: &NewTask)
        -> Result<Task>;

    /// Persists edited descriptive fields
    async fn update_task(&self, task: &Task) -> Result<()>;

    /// Deletes a task
    async fn delete_task(&self, id: &TaskId) -> Result<()>;
}
