use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::error::BoardError;

/// Maximum length of a task title, in characters.
pub const MAX_TITLE_LENGTH: usize = 255;

/// Unique identifier for a task, stable across moves
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generates a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a task, one per board column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    /// All statuses in board order
    pub const ALL: [TaskStatus; 3] = [Self::Todo, Self::InProgress, Self::Done];

    /// Column identifier as used by the store and droppable ids
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Self::Todo => 0,
            Self::InProgress => 1,
            Self::Done => 2,
        }
    }
}

impl FromStr for TaskStatus {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(BoardError::UnknownColumn(s.to_string())),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Todo => write!(f, "To Do"),
            Self::InProgress => write!(f, "In Progress"),
            Self::Done => write!(f, "Done"),
        }
    }
}

/// Display classification of a task. Never used for board ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Badge label shown on a task card
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low Priority",
            Self::Medium => "Medium Priority",
            Self::High => "High Priority",
        }
    }
}

/// Weak reference to a user owned by the external user directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Assignee {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            avatar: None,
        }
    }

    /// Initials used when no avatar is available ("Jane Smith" -> "JS")
    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .collect()
    }
}

/// Fields for a task about to be created
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assignee: Option<Assignee>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_assignee(mut self, assignee: Assignee) -> Self {
        self.assignee = Some(assignee);
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Checks the title rules shared with [`TaskPatch`]
    pub fn validate(&self) -> Result<(), BoardError> {
        validate_title(&self.title)
    }
}

impl From<&Task> for NewTask {
    /// Descriptive fields of an existing record
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            assignee: task.assignee.clone(),
            due_date: task.due_date,
            priority: task.priority,
        }
    }
}

/// Partial edit of a task's descriptive fields.
///
/// Status and position are not part of a patch; they only change through
/// board moves. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub assignee: Option<Option<Assignee>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub priority: Option<Option<Priority>>,
}

impl TaskPatch {
    pub fn validate(&self) -> Result<(), BoardError> {
        match &self.title {
            Some(title) => validate_title(title),
            None => Ok(()),
        }
    }
}

fn validate_title(title: &str) -> Result<(), BoardError> {
    if title.trim().is_empty() {
        return Err(BoardError::InvalidTask("Task title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(BoardError::InvalidTask(format!(
            "Title must be less than {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}

/// A unit of work on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<Assignee>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a task with the given ID, title and status
    pub fn new(id: TaskId, title: impl Into<String>, status: TaskStatus) -> Self {
        let now = Utc::now();
        Self {
            id,
            project_id: None,
            title: title.into(),
            description: None,
            status,
            assignee: None,
            due_date: None,
            priority: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builds a task from validated creation fields
    pub fn from_new(id: TaskId, status: TaskStatus, fields: NewTask) -> Self {
        let mut task = Self::new(id, fields.title, status);
        task.description = fields.description;
        task.assignee = fields.assignee;
        task.due_date = fields.due_date;
        task.priority = fields.priority;
        task
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Changes the status. Returns whether anything changed.
    pub fn set_status(&mut self, status: TaskStatus) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        self.updated_at = Utc::now();
        true
    }

    /// Applies a patch. The patch must already be validated.
    pub fn apply_patch(&mut self, patch: TaskPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(assignee) = patch.assignee {
            self.assignee = assignee;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        self.updated_at = Utc::now();
    }

    /// True when the task has a due date before `today` and is not done
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != TaskStatus::Done && self.due_date.map(|d| d < today).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_generate_is_unique() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(TaskStatus::from_str("todo").unwrap(), TaskStatus::Todo);
        assert_eq!(
            TaskStatus::from_str("in_progress").unwrap(),
            TaskStatus::InProgress
        );
        assert_eq!(TaskStatus::from_str("done").unwrap(), TaskStatus::Done);

        let err = TaskStatus::from_str("archived").unwrap_err();
        assert!(matches!(err, BoardError::UnknownColumn(ref c) if c == "archived"));
    }

    #[test]
    fn test_status_round_trips_through_as_str() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn test_priority_ordering_and_label() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert_eq!(Priority::High.label(), "High Priority");
    }

    #[test]
    fn test_assignee_initials() {
        let assignee = Assignee::new("2", "Jane Smith", "jane@company.com");
        assert_eq!(assignee.initials(), "JS");
    }

    #[test]
    fn test_new_task_validation() {
        assert!(NewTask::new("Write report").validate().is_ok());
        assert!(NewTask::new("").validate().is_err());
        assert!(NewTask::new("   ").validate().is_err());
        assert!(NewTask::new("x".repeat(MAX_TITLE_LENGTH)).validate().is_ok());
        assert!(NewTask::new("x".repeat(MAX_TITLE_LENGTH + 1))
            .validate()
            .is_err());
    }

    #[test]
    fn test_new_task_from_existing_record() {
        let mut task = Task::new(TaskId::from("1"), "Ship it", TaskStatus::Done);
        task.description = Some("release notes".to_string());
        task.priority = Some(Priority::High);

        let fields = NewTask::from(&task);
        assert_eq!(fields.title, "Ship it");
        assert_eq!(fields.description.as_deref(), Some("release notes"));
        assert_eq!(fields.priority, Some(Priority::High));
        assert!(fields.assignee.is_none());
    }

    #[test]
    fn test_set_status_reports_change() {
        let mut task = Task::new(TaskId::from("1"), "Test", TaskStatus::Todo);
        assert!(!task.set_status(TaskStatus::Todo));
        assert!(task.set_status(TaskStatus::Done));
        assert_eq!(task.status, TaskStatus::Done);
        // Done can be reopened
        assert!(task.set_status(TaskStatus::Todo));
    }

    #[test]
    fn test_apply_patch_leaves_status_alone() {
        let mut task = Task::new(TaskId::from("1"), "Old", TaskStatus::InProgress);
        task.description = Some("keep?".to_string());

        task.apply_patch(TaskPatch {
            title: Some("New".to_string()),
            description: Some(None),
            priority: Some(Some(Priority::High)),
            ..Default::default()
        });

        assert_eq!(task.title, "New");
        assert!(task.description.is_none());
        assert_eq!(task.priority, Some(Priority::High));
        assert_eq!(task.status, TaskStatus::InProgress);
    }

    #[test]
    fn test_is_overdue() {
        let today = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let mut task = Task::new(TaskId::from("1"), "Test", TaskStatus::Todo);
        assert!(!task.is_overdue(today));

        task.due_date = NaiveDate::from_ymd_opt(2025, 1, 30);
        assert!(task.is_overdue(today));

        task.status = TaskStatus::Done;
        assert!(!task.is_overdue(today));
    }

    #[test]
    fn test_deserialize_minimal_record() {
        let json = r#"{
        "id": "1",
        "title": "Design new homepage layout",
        "status": "todo",
        "created_at": "2025-01-01T00:00:00Z",
        "updated_at": "2025-01-01T00:00:00Z"
    }"#;

        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.id.as_str(), "1");
        assert!(task.assignee.is_none());
        assert!(task.due_date.is_none());
    }

    #[test]
    fn test_serialization_skips_empty_optionals() {
        let task = Task::new(TaskId::from("1"), "Test", TaskStatus::Todo);
        let json = serde_json::to_string(&task).unwrap();
        assert!(!json.contains("assignee"));
        assert!(!json.contains("priority"));
    }
}
