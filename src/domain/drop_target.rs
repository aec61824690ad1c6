use crate::{
    domain::{
        board::Board,
        task::{TaskId, TaskStatus},
    },
    error::{BoardError, Result},
};
use std::str::FromStr;

/// Where a drag gesture ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// The column itself (header or empty area)
    Column(TaskStatus),
    /// Another task card
    Task(TaskId),
}

impl DropTarget {
    /// Interprets a raw droppable id: column ids win over task ids.
    pub fn parse(board: &Board, raw: &str) -> Result<Self> {
        if let Ok(status) = TaskStatus::from_str(raw) {
            return Ok(Self::Column(status));
        }
        let id = TaskId::from(raw);
        if board.contains(&id) {
            Ok(Self::Task(id))
        } else {
            Err(BoardError::TaskNotFound(raw.to_string()))
        }
    }
}

/// A completed gesture, ready to be applied to the board exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropCommand {
    /// Pointer or touch drop over a droppable
    Target { task_id: TaskId, target: DropTarget },
    /// Explicit placement, e.g. from keyboard input
    Index {
        task_id: TaskId,
        status: TaskStatus,
        index: usize,
    },
}

impl DropCommand {
    pub fn task_id(&self) -> &TaskId {
        match self {
            Self::Target { task_id, .. } | Self::Index { task_id, .. } => task_id,
        }
    }
}

/// Resolves a drop into the `(status, index)` pair passed to
/// [`Board::move_task`].
///
/// - column: append at the end of that column
/// - task in the same column: take the other task's current index, which
///   lands after it when dragging down and before it when dragging up
/// - task in another column: adopt that column and take the other task's
///   index, shifting it and its successors down
pub fn resolve_drop(
    board: &Board,
    active: &TaskId,
    target: &DropTarget,
) -> Result<(TaskStatus, usize)> {
    let (from_status, from_index) = board
        .position_of(active)
        .ok_or_else(|| BoardError::TaskNotFound(active.to_string()))?;

    match target {
        DropTarget::Column(status) => {
            let len = board.column_len(*status);
            let end = if *status == from_status { len - 1 } else { len };
            Ok((*status, end))
        }
        DropTarget::Task(over) if over == active => Ok((from_status, from_index)),
        DropTarget::Task(over) => board
            .position_of(over)
            .ok_or_else(|| BoardError::TaskNotFound(over.to_string())),
    }
}
