use crate::{
    domain::{NewTask, Task, TaskId, TaskStatus},
    error::{BoardError, Result},
    storage::TaskStore,
};
use async_trait::async_trait;
use std::{
    sync::atomic::{AtomicBool, AtomicU32, Ordering},
    time::Duration,
};
use tokio::sync::Mutex;

/// A call received by [`InMemoryTaskStore`], recorded in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List(String),
    UpdateStatus(TaskId, TaskStatus),
    Create(String, TaskStatus),
    Update(TaskId),
    Delete(TaskId),
}

/// Task store kept in memory, in list order.
///
/// Assigns its own ids (`task-1`, `task-2`, ...) on create. Writes can be
/// made to fail and every call can be delayed.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
    calls: Mutex<Vec<StoreCall>>,
    failing: AtomicBool,
    latency: Option<Duration>,
    next_id: AtomicU32,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with existing records
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Delays every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes subsequent writes fail (reads keep working)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Calls received so far
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().await.clone()
    }

    /// Current record for a task
    pub async fn get(&self, id: &TaskId) -> Option<Task> {
        self.tasks.lock().await.iter().find(|t| &t.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    async fn begin(&self, call: StoreCall, write: bool) -> Result<()> {
        self.calls.lock().await.push(call);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if write && self.failing.load(Ordering::SeqCst) {
            return Err(BoardError::StorageError("task store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn list_tasks(&self, project_id: &str) -> Result<Vec<Task>> {
        self.begin(StoreCall::List(project_id.to_string()), false)
            .await?;
        Ok(self
            .tasks
            .lock()
            .await
            .iter()
            .filter(|t| t.project_id.as_deref() == Some(project_id))
            .cloned()
            .collect())
    }

    async fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<()> {
        self.begin(StoreCall::UpdateStatus(id.clone(), status), true)
            .await?;
        let mut tasks = self.tasks.lock().await;
        let task = tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| BoardError::TaskNotFound(id.to_string()))?;
        task.set_status(status);
        Ok(())
    }

    async fn create_task(
        &self,
        project_id: &str,
        status: TaskStatus,
        fields: &NewTask,
    ) -> Result<Task> {
        self.begin(StoreCall::Create(project_id.to_string(), status), true)
            .await?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let task = Task::from_new(TaskId::from(format!("task-{}", n)), status, fields.clone())
            .with_project(project_id);
        self.tasks.lock().await.push(task.clone());
        Ok(task)
    }

    async fn update_task(&self, task: &Task) -> Result<()> {
        self.begin(StoreCall::Update(task.id.clone()), true).await?;
        let mut tasks = self.tasks.lock().await;
        let stored = tasks
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or_else(|| BoardError::TaskNotFound(task.id.to_string()))?;
        // Status only changes through update_task_status
        let status = stored.status;
        *stored = task.clone();
        stored.status = status;
        Ok(())
    }

    async fn delete_task(&self, id: &TaskId) -> Result<()> {
        self.begin(StoreCall::Delete(id.clone()), true).await?;
        let mut tasks = self.tasks.lock().await;
        let before = tasks.len();
        tasks.retain(|t| &t.id != id);
        if tasks.len() == before {
            return Err(BoardError::TaskNotFound(id.to_string()));
        }
        Ok(())
    }
}
