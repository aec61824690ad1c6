use crate::{
    domain::{NewTask, Task, TaskId, TaskStatus},
    error::{BoardError, Result},
    storage::TaskStore,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::{fs, sync::Mutex};

/// File-based task store: one JSON file per task plus an order index
pub struct FileTaskStore {
    root_path: PathBuf,
    // Serializes read-modify-write of the order index
    order_lock: Mutex<()>,
}

impl FileTaskStore {
    const STORE_DIR: &'static str = ".taskboard";
    const TASKS_DIR: &'static str = "tasks";
    const ORDER_FILE: &'static str = "order.json";

    /// Creates a new FileTaskStore for the given project root
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root_path: project_root.as_ref().join(Self::STORE_DIR),
            order_lock: Mutex::new(()),
        }
    }

    fn tasks_dir(&self) -> PathBuf {
        self.root_path.join(Self::TASKS_DIR)
    }

    fn order_file(&self) -> PathBuf {
        self.root_path.join(Self::ORDER_FILE)
    }

    /// Path of a task's file. Ids that could escape the tasks directory
    /// are rejected.
    fn task_file(&self, id: &TaskId) -> Result<PathBuf> {
        let raw = id.as_str();
        if raw.is_empty() || raw.contains(|c: char| c == '/' || c == '\\') || raw.contains("..") {
            return Err(BoardError::InvalidTask(format!("Invalid task id: {}", raw)));
        }
        Ok(self.tasks_dir().join(format!("{}.json", raw)))
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }

    /// Creates the directory layout and an empty order index
    pub async fn initialize(&self) -> Result<()> {
        self.ensure_directory_exists(&self.tasks_dir()).await?;
        if !self.order_file().exists() {
            self.write_order(&[]).await?;
        }
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        self.root_path.exists() && self.order_file().exists()
    }

    async fn read_order(&self) -> Result<Vec<TaskId>> {
        let path = self.order_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    async fn write_order(&self, order: &[TaskId]) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;
        let json = serde_json::to_string_pretty(order)?;
        fs::write(self.order_file(), json).await?;
        Ok(())
    }

    async fn load_task(&self, id: &TaskId) -> Result<Task> {
        let file_path = self.task_file(id)?;

        if !file_path.exists() {
            return Err(BoardError::TaskNotFound(id.to_string()));
        }

        let contents = fs::read_to_string(&file_path).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    async fn save_task(&self, task: &Task) -> Result<()> {
        self.ensure_directory_exists(&self.tasks_dir()).await?;

        let json = serde_json::to_string_pretty(task)?;
        fs::write(self.task_file(&task.id)?, json).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for FileTaskStore {
    async fn list_tasks(&self, project_id: &str) -> Result<Vec<Task>> {
        let order = self.read_order().await?;
        let mut tasks = Vec::with_capacity(order.len());

        for id in order {
            match self.load_task(&id).await {
                Ok(task) if task.project_id.as_deref() == Some(project_id) => tasks.push(task),
                Ok(_) => {}
                Err(BoardError::TaskNotFound(_)) => {
                    tracing::warn!(task_id = %id, "order index points at a missing task file");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(tasks)
    }

    async fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<()> {
        let mut task = self.load_task(id).await?;
        if task.set_status(status) {
            self.save_task(&task).await?;
        }
        Ok(())
    }

    async fn create_task(
        &self,
        project_id: &str,
        status: TaskStatus,
        fields: &NewTask,
    ) -> Result<Task> {
        fields.validate()?;
        let task =
            Task::from_new(TaskId::generate(), status, fields.clone()).with_project(project_id);
        self.save_task(&task).await?;

        let _guard = self.order_lock.lock().await;
        let mut order = self.read_order().await?;
        order.push(task.id.clone());
        self.write_order(&order).await?;

        Ok(task)
    }

    async fn update_task(&self, task: &Task) -> Result<()> {
        let stored = self.load_task(&task.id).await?;
        let mut updated = task.clone();
        updated.status = stored.status;
        self.save_task(&updated).await
    }

    async fn delete_task(&self, id: &TaskId) -> Result<()> {
        let file_path = self.task_file(id)?;

        if !file_path.exists() {
            return Err(BoardError::TaskNotFound(id.to_string()));
        }

        fs::remove_file(file_path).await?;

        let _guard = self.order_lock.lock().await;
        let mut order = self.read_order().await?;
        order.retain(|existing| existing != id);
        self.write_order(&order).await
    }
}
