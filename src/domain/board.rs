use crate::{
    domain::{
        drop_target::{resolve_drop, DropCommand, DropTarget},
        task::{NewTask, Task, TaskId, TaskPatch, TaskStatus},
    },
    error::{BoardError, Result},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Display configuration for a board column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub status: TaskStatus,
}

impl Column {
    pub fn new(name: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

/// Board configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            name: "Project Tasks".to_string(),
            columns: TaskStatus::ALL
                .iter()
                .map(|status| Column::new(status.to_string(), *status))
                .collect(),
        }
    }
}

impl BoardConfig {
    /// Every status must be shown by exactly one column
    pub fn validate(&self) -> Result<()> {
        for status in TaskStatus::ALL {
            let count = self
                .columns
                .iter()
                .filter(|col| col.status == status)
                .count();
            if count != 1 {
                return Err(BoardError::InvalidConfig(format!(
                    "status '{}' must have exactly one column, found {}",
                    status.as_str(),
                    count
                )));
            }
        }
        Ok(())
    }

    /// Gets the column configuration for a status
    pub fn get_column_for_status(&self, status: &TaskStatus) -> Option<&Column> {
        self.columns.iter().find(|col| &col.status == status)
    }
}

/// Result of a move, describing where the task came from and went to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub task_id: TaskId,
    pub from_status: TaskStatus,
    pub from_index: usize,
    pub to_status: TaskStatus,
    pub to_index: usize,
    pub status_changed: bool,
}

impl MoveOutcome {
    /// True when the task ended where it started
    pub fn is_noop(&self) -> bool {
        self.from_status == self.to_status && self.from_index == self.to_index
    }
}

/// Serializable view of one column for rendering
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSnapshot {
    pub name: String,
    pub status: TaskStatus,
    pub count: usize,
    pub tasks: Vec<Task>,
}

/// Serializable view of the whole board for rendering
#[derive(Debug, Clone, Serialize)]
pub struct BoardSnapshot {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub columns: Vec<ColumnSnapshot>,
}

/// Kanban board state.
///
/// Holds one ordered id sequence per status plus the task records. A task's
/// position is its index in its column's sequence; nothing else reorders
/// these sequences.
#[derive(Debug, Clone)]
pub struct Board {
    config: BoardConfig,
    project_id: Option<String>,
    columns: [Vec<TaskId>; 3],
    tasks: HashMap<TaskId, Task>,
}

impl Board {
    pub fn new(config: BoardConfig) -> Self {
        Self {
            config,
            project_id: None,
            columns: Default::default(),
            tasks: HashMap::new(),
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Builds a board from tasks in store order
    pub fn from_tasks(config: BoardConfig, tasks: impl IntoIterator<Item = Task>) -> Result<Self> {
        config.validate()?;
        let mut board = Self::new(config);
        for task in tasks {
            board.insert_task(task)?;
        }
        Ok(board)
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.tasks.contains_key(task_id)
    }

    pub fn get_task(&self, task_id: &TaskId) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    pub fn column_len(&self, status: TaskStatus) -> usize {
        self.columns[status.index()].len()
    }

    /// Ids of a column in order
    pub fn column_ids(&self, status: TaskStatus) -> &[TaskId] {
        &self.columns[status.index()]
    }

    /// Tasks with the given status, in column order
    pub fn tasks_in_column(&self, status: TaskStatus) -> Vec<&Task> {
        self.columns[status.index()]
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .collect()
    }

    /// All tasks, column by column
    pub fn iter(&self) -> impl Iterator<Item = &Task> + '_ {
        self.columns
            .iter()
            .flat_map(|column| column.iter())
            .filter_map(|id| self.tasks.get(id))
    }

    /// Current column and index of a task
    pub fn position_of(&self, task_id: &TaskId) -> Option<(TaskStatus, usize)> {
        let status = self.tasks.get(task_id)?.status;
        self.columns[status.index()]
            .iter()
            .position(|id| id == task_id)
            .map(|index| (status, index))
    }

    fn require_position(&self, task_id: &TaskId) -> Result<(TaskStatus, usize)> {
        self.position_of(task_id)
            .ok_or_else(|| BoardError::TaskNotFound(task_id.to_string()))
    }

    /// Moves a task to `target_index` within the `target` column.
    ///
    /// The index is clamped to the target column's length after the task
    /// has been taken out of its current column. Relative order of every
    /// other task is preserved.
    pub fn move_task(
        &mut self,
        task_id: &TaskId,
        target: TaskStatus,
        target_index: usize,
    ) -> Result<MoveOutcome> {
        let (from_status, from_index) = self.require_position(task_id)?;

        let mut target_len = self.column_len(target);
        if from_status == target {
            target_len -= 1;
        }
        let to_index = target_index.min(target_len);

        let mut outcome = MoveOutcome {
            task_id: task_id.clone(),
            from_status,
            from_index,
            to_status: target,
            to_index,
            status_changed: false,
        };
        if outcome.is_noop() {
            return Ok(outcome);
        }

        let id = self.columns[from_status.index()].remove(from_index);
        self.columns[target.index()].insert(to_index, id);
        if let Some(task) = self.tasks.get_mut(task_id) {
            outcome.status_changed = task.set_status(target);
        }

        tracing::debug!(
            task_id = %task_id,
            from = from_status.as_str(),
            to = target.as_str(),
            index = to_index,
            "moved task"
        );
        Ok(outcome)
    }

    /// Like [`move_task`](Self::move_task), taking a raw column id
    pub fn move_task_to(
        &mut self,
        task_id: &TaskId,
        column: &str,
        target_index: usize,
    ) -> Result<MoveOutcome> {
        let target = TaskStatus::from_str(column)?;
        self.move_task(task_id, target, target_index)
    }

    /// Moves a task according to where a drag gesture ended
    pub fn drop_task(&mut self, task_id: &TaskId, target: &DropTarget) -> Result<MoveOutcome> {
        let (status, index) = resolve_drop(self, task_id, target)?;
        self.move_task(task_id, status, index)
    }

    /// Applies the command produced by a completed gesture
    pub fn apply_drop(&mut self, command: &DropCommand) -> Result<MoveOutcome> {
        match command {
            DropCommand::Target { task_id, target } => self.drop_task(task_id, target),
            DropCommand::Index {
                task_id,
                status,
                index,
            } => self.move_task(task_id, *status, *index),
        }
    }

    /// Creates a task with a fresh id at the end of the `status` column
    pub fn create_task(&mut self, status: TaskStatus, fields: NewTask) -> Result<Task> {
        fields.validate()?;

        let mut id = TaskId::generate();
        while self.tasks.contains_key(&id) {
            id = TaskId::generate();
        }

        let mut task = Task::from_new(id, status, fields);
        task.project_id = self.project_id.clone();
        self.push_task(task.clone());

        tracing::debug!(task_id = %task.id, status = status.as_str(), "created task");
        Ok(task)
    }

    /// Appends an existing task record at the end of its status column
    pub fn insert_task(&mut self, task: Task) -> Result<()> {
        if self.tasks.contains_key(&task.id) {
            return Err(BoardError::DuplicateTask(task.id.to_string()));
        }
        self.push_task(task);
        Ok(())
    }

    fn push_task(&mut self, task: Task) {
        self.columns[task.status.index()].push(task.id.clone());
        self.tasks.insert(task.id.clone(), task);
    }

    /// Removes a task from whichever column holds it
    pub fn delete_task(&mut self, task_id: &TaskId) -> Result<Task> {
        let (status, index) = self.require_position(task_id)?;
        self.columns[status.index()].remove(index);
        let task = self
            .tasks
            .remove(task_id)
            .ok_or_else(|| BoardError::TaskNotFound(task_id.to_string()))?;

        tracing::debug!(task_id = %task_id, status = status.as_str(), "deleted task");
        Ok(task)
    }

    /// Edits a task's descriptive fields in place
    pub fn update_task(&mut self, task_id: &TaskId, patch: TaskPatch) -> Result<&Task> {
        patch.validate()?;
        let task = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| BoardError::TaskNotFound(task_id.to_string()))?;
        task.apply_patch(patch);
        Ok(&*task)
    }

    /// Replaces a task's record, status and position with an externally
    /// pushed version. Unknown tasks are added. `position` is clamped; `None`
    /// keeps the current index when the column is unchanged and appends
    /// otherwise.
    pub fn apply_remote(&mut self, task: Task, position: Option<usize>) {
        let previous = self.position_of(&task.id);
        if let Some((status, index)) = previous {
            self.columns[status.index()].remove(index);
        }

        let column = &mut self.columns[task.status.index()];
        let index = match (position, previous) {
            (Some(position), _) => position.min(column.len()),
            (None, Some((status, index))) if status == task.status => index,
            (None, _) => column.len(),
        };
        column.insert(index, task.id.clone());

        tracing::debug!(
            task_id = %task.id,
            status = task.status.as_str(),
            index,
            "applied remote task update"
        );
        self.tasks.insert(task.id.clone(), task);
    }

    /// Swaps a provisional task for the store's confirmed record.
    ///
    /// The local status, position and descriptive fields are kept, since
    /// they may have been edited after creation; the id and store-owned
    /// metadata come from `confirmed`.
    pub fn rekey_task(&mut self, provisional: &TaskId, confirmed: Task) -> Result<()> {
        let (status, index) = self.require_position(provisional)?;
        if &confirmed.id != provisional && self.tasks.contains_key(&confirmed.id) {
            return Err(BoardError::DuplicateTask(confirmed.id.to_string()));
        }

        let mut task = self
            .tasks
            .remove(provisional)
            .ok_or_else(|| BoardError::TaskNotFound(provisional.to_string()))?;
        task.id = confirmed.id;
        task.project_id = confirmed.project_id.or(task.project_id);
        task.created_at = confirmed.created_at;

        self.columns[status.index()][index] = task.id.clone();
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Checks that every task sits in exactly one column matching its status
    pub fn is_consistent(&self) -> bool {
        let mut seen = 0;
        for status in TaskStatus::ALL {
            for id in &self.columns[status.index()] {
                match self.tasks.get(id) {
                    Some(task) if task.status == status => seen += 1,
                    _ => return false,
                }
            }
        }
        seen == self.tasks.len()
    }

    /// Builds a render-ready view in configured column order
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            name: self.config.name.clone(),
            project_id: self.project_id.clone(),
            columns: self
                .config
                .columns
                .iter()
                .map(|col| {
                    let tasks: Vec<Task> = self
                        .tasks_in_column(col.status)
                        .into_iter()
                        .cloned()
                        .collect();
                    ColumnSnapshot {
                        name: col.name.clone(),
                        status: col.status,
                        count: tasks.len(),
                        tasks,
                    }
                })
                .collect(),
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new(BoardConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, status: TaskStatus) -> Task {
        Task::new(TaskId::from(id), format!("Task {}", id), status)
    }

    /// todo: [A, B], in_progress: [C], done: []
    fn sample_board() -> Board {
        Board::from_tasks(
            BoardConfig::default(),
            vec![
                task("A", TaskStatus::Todo),
                task("B", TaskStatus::Todo),
                task("C", TaskStatus::InProgress),
            ],
        )
        .unwrap()
    }

    fn ids(board: &Board, status: TaskStatus) -> Vec<&str> {
        board
            .tasks_in_column(status)
            .iter()
            .map(|t| t.id.as_str())
            .collect()
    }

    #[test]
    fn test_board_creation() {
        let board = Board::default();
        assert!(board.is_empty());
        assert_eq!(board.config().columns.len(), 3);
        assert!(board.is_consistent());
    }

    #[test]
    fn test_tasks_in_column_preserves_order() {
        let board = sample_board();
        assert_eq!(ids(&board, TaskStatus::Todo), vec!["A", "B"]);
        assert_eq!(ids(&board, TaskStatus::InProgress), vec!["C"]);
        assert!(ids(&board, TaskStatus::Done).is_empty());
    }

    #[test]
    fn test_move_across_columns() {
        let mut board = sample_board();
        let outcome = board
            .move_task(&TaskId::from("B"), TaskStatus::InProgress, 0)
            .unwrap();

        assert_eq!(ids(&board, TaskStatus::Todo), vec!["A"]);
        assert_eq!(ids(&board, TaskStatus::InProgress), vec!["B", "C"]);
        assert!(ids(&board, TaskStatus::Done).is_empty());
        assert!(outcome.status_changed);
        assert_eq!(
            board.get_task(&TaskId::from("B")).unwrap().status,
            TaskStatus::InProgress
        );
        assert!(board.is_consistent());
    }

    #[test]
    fn test_move_within_column_past_neighbour() {
        let mut board = sample_board();
        let outcome = board
            .move_task(&TaskId::from("A"), TaskStatus::Todo, 1)
            .unwrap();

        assert_eq!(ids(&board, TaskStatus::Todo), vec!["B", "A"]);
        assert!(!outcome.status_changed);
        assert!(!outcome.is_noop());
    }

    #[test]
    fn test_move_to_same_position_is_noop() {
        let mut board = sample_board();
        let before = board.get_task(&TaskId::from("A")).unwrap().updated_at;

        let outcome = board
            .move_task(&TaskId::from("A"), TaskStatus::Todo, 0)
            .unwrap();

        assert!(outcome.is_noop());
        assert_eq!(ids(&board, TaskStatus::Todo), vec!["A", "B"]);
        assert_eq!(board.get_task(&TaskId::from("A")).unwrap().updated_at, before);
    }

    #[test]
    fn test_move_clamps_index() {
        let mut board = sample_board();
        let outcome = board
            .move_task(&TaskId::from("A"), TaskStatus::Todo, 99)
            .unwrap();
        assert_eq!(outcome.to_index, 1);
        assert_eq!(ids(&board, TaskStatus::Todo), vec!["B", "A"]);

        let outcome = board
            .move_task(&TaskId::from("C"), TaskStatus::Done, 5)
            .unwrap();
        assert_eq!(outcome.to_index, 0);
        assert_eq!(ids(&board, TaskStatus::Done), vec!["C"]);
    }

    #[test]
    fn test_move_unknown_task_is_rejected() {
        let mut board = sample_board();
        let err = board
            .move_task(&TaskId::from("nonexistent-id"), TaskStatus::Done, 0)
            .unwrap_err();
        assert!(matches!(err, BoardError::TaskNotFound(_)));
        assert_eq!(ids(&board, TaskStatus::Todo), vec!["A", "B"]);
        assert_eq!(ids(&board, TaskStatus::InProgress), vec!["C"]);
    }

    #[test]
    fn test_move_to_unknown_column_is_rejected() {
        let mut board = sample_board();
        let err = board
            .move_task_to(&TaskId::from("A"), "archived", 0)
            .unwrap_err();
        assert!(matches!(err, BoardError::UnknownColumn(ref c) if c == "archived"));
        assert_eq!(ids(&board, TaskStatus::Todo), vec!["A", "B"]);
    }

    #[test]
    fn test_move_keeps_other_fields() {
        let mut board = sample_board();
        let before = board.get_task(&TaskId::from("C")).unwrap().clone();

        board
            .move_task(&TaskId::from("C"), TaskStatus::Done, 0)
            .unwrap();

        let after = board.get_task(&TaskId::from("C")).unwrap();
        assert_eq!(after.title, before.title);
        assert_eq!(after.description, before.description);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.status, TaskStatus::Done);
    }

    #[test]
    fn test_delete_task() {
        let mut board = sample_board();
        let removed = board.delete_task(&TaskId::from("C")).unwrap();

        assert_eq!(removed.id.as_str(), "C");
        assert!(ids(&board, TaskStatus::InProgress).is_empty());
        assert_eq!(ids(&board, TaskStatus::Todo), vec!["A", "B"]);
        assert!(board.is_consistent());

        let err = board.delete_task(&TaskId::from("C")).unwrap_err();
        assert!(matches!(err, BoardError::TaskNotFound(_)));
    }

    #[test]
    fn test_create_task_appends_to_column() {
        let mut board = sample_board().with_project("p1");
        let created = board
            .create_task(TaskStatus::Done, NewTask::new("Write report"))
            .unwrap();

        assert_eq!(created.status, TaskStatus::Done);
        assert_eq!(created.project_id.as_deref(), Some("p1"));
        assert_eq!(ids(&board, TaskStatus::Done), vec![created.id.as_str()]);

        let second = board
            .create_task(TaskStatus::Todo, NewTask::new("Another"))
            .unwrap();
        assert_eq!(
            ids(&board, TaskStatus::Todo),
            vec!["A", "B", second.id.as_str()]
        );
        assert_ne!(created.id, second.id);
    }

    #[test]
    fn test_create_task_with_empty_title_is_rejected() {
        let mut board = sample_board();
        let err = board
            .create_task(TaskStatus::Todo, NewTask::new(" "))
            .unwrap_err();
        assert!(matches!(err, BoardError::InvalidTask(_)));
        assert_eq!(board.len(), 3);
    }

    #[test]
    fn test_insert_duplicate_is_rejected() {
        let mut board = sample_board();
        let err = board.insert_task(task("A", TaskStatus::Done)).unwrap_err();
        assert!(matches!(err, BoardError::DuplicateTask(_)));
        assert!(ids(&board, TaskStatus::Done).is_empty());
    }

    #[test]
    fn test_update_task_fields() {
        let mut board = sample_board();
        let updated = board
            .update_task(
                &TaskId::from("A"),
                TaskPatch {
                    title: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.status, TaskStatus::Todo);

        let err = board
            .update_task(
                &TaskId::from("A"),
                TaskPatch {
                    title: Some(String::new()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, BoardError::InvalidTask(_)));
    }

    #[test]
    fn test_apply_remote_replaces_position() {
        let mut board = sample_board();
        let mut remote = board.get_task(&TaskId::from("B")).unwrap().clone();
        remote.status = TaskStatus::Done;
        remote.title = "From elsewhere".to_string();

        board.apply_remote(remote, None);

        assert_eq!(ids(&board, TaskStatus::Todo), vec!["A"]);
        assert_eq!(ids(&board, TaskStatus::Done), vec!["B"]);
        assert_eq!(
            board.get_task(&TaskId::from("B")).unwrap().title,
            "From elsewhere"
        );

        // Same column without position keeps the index
        let remote = board.get_task(&TaskId::from("A")).unwrap().clone();
        board.apply_remote(remote, None);
        assert_eq!(ids(&board, TaskStatus::Todo), vec!["A"]);

        // Unknown task with explicit position
        board.apply_remote(task("D", TaskStatus::Todo), Some(0));
        assert_eq!(ids(&board, TaskStatus::Todo), vec!["D", "A"]);
        assert!(board.is_consistent());
    }

    #[test]
    fn test_rekey_task_keeps_position() {
        let mut board = sample_board();
        let provisional = board
            .create_task(TaskStatus::Todo, NewTask::new("Draft"))
            .unwrap();
        board
            .move_task(&provisional.id, TaskStatus::Todo, 0)
            .unwrap();

        let confirmed = Task::new(TaskId::from("server-1"), "Draft", TaskStatus::Todo)
            .with_project("p1");
        board.rekey_task(&provisional.id, confirmed).unwrap();

        assert!(!board.contains(&provisional.id));
        assert_eq!(ids(&board, TaskStatus::Todo), vec!["server-1", "A", "B"]);
        assert_eq!(
            board
                .get_task(&TaskId::from("server-1"))
                .unwrap()
                .project_id
                .as_deref(),
            Some("p1")
        );
        assert!(board.is_consistent());
    }

    #[test]
    fn test_snapshot_counts() {
        let board = sample_board();
        let snapshot = board.snapshot();

        assert_eq!(snapshot.columns.len(), 3);
        assert_eq!(snapshot.columns[0].name, "To Do");
        assert_eq!(snapshot.columns[0].count, 2);
        assert_eq!(snapshot.columns[1].count, 1);
        assert_eq!(snapshot.columns[2].count, 0);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["columns"][1]["status"], "in_progress");
    }

    #[test]
    fn test_config_validation() {
        assert!(BoardConfig::default().validate().is_ok());

        let config = BoardConfig {
            name: "Broken".to_string(),
            columns: vec![
                Column::new("To Do", TaskStatus::Todo),
                Column::new("Also To Do", TaskStatus::Todo),
                Column::new("Done", TaskStatus::Done),
            ],
        };
        assert!(matches!(
            config.validate(),
            Err(BoardError::InvalidConfig(_))
        ));
    }
}
