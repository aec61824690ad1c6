pub mod board;
pub mod drop_target;
pub mod gesture;
pub mod task;

pub use board::{Board, BoardConfig, BoardSnapshot, Column, ColumnSnapshot, MoveOutcome};
pub use drop_target::{resolve_drop, DropCommand, DropTarget};
pub use gesture::{ActivationConstraint, DragSession, DragState};
pub use task::{Assignee, NewTask, Priority, Task, TaskId, TaskPatch, TaskStatus};
