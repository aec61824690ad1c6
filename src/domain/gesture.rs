//! Drag gesture tracking.
//!
//! A [`DragSession`] follows one pointer, touch or keyboard gesture from
//! press to drop and yields at most one [`DropCommand`] per gesture. It never
//! touches the board; the caller applies the command.

use crate::domain::{
    drop_target::{DropCommand, DropTarget},
    task::{TaskId, TaskStatus},
};
use std::time::Duration;

/// When a press turns into a drag
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActivationConstraint {
    /// Mouse: pointer must travel at least this many pixels
    Distance(f32),
    /// Touch: press must be held for `delay` without moving more than
    /// `tolerance` pixels
    Delay { delay: Duration, tolerance: f32 },
}

impl ActivationConstraint {
    pub const MOUSE: Self = Self::Distance(10.0);
    pub const TOUCH: Self = Self::Delay {
        delay: Duration::from_millis(250),
        tolerance: 8.0,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragState {
    Idle,
    Pressed {
        task_id: TaskId,
    },
    Dragging {
        task_id: TaskId,
        over: Option<DropTarget>,
    },
}

#[derive(Debug, Clone)]
pub struct DragSession {
    constraint: ActivationConstraint,
    state: DragState,
}

impl DragSession {
    pub fn new(constraint: ActivationConstraint) -> Self {
        Self {
            constraint,
            state: DragState::Idle,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    /// Task currently being dragged, once activated
    pub fn active_task(&self) -> Option<&TaskId> {
        match &self.state {
            DragState::Dragging { task_id, .. } => Some(task_id),
            _ => None,
        }
    }

    /// Starts a gesture. Ignored while another gesture is in progress.
    pub fn press(&mut self, task_id: TaskId) -> bool {
        if self.state != DragState::Idle {
            return false;
        }
        self.state = DragState::Pressed { task_id };
        true
    }

    /// Keyboard pick-up: activates immediately
    pub fn pick_up(&mut self, task_id: TaskId) -> bool {
        if self.state != DragState::Idle {
            return false;
        }
        self.state = DragState::Dragging {
            task_id,
            over: None,
        };
        true
    }

    /// Reports pointer travel since the press and how long it has been held.
    /// Returns true once the drag is active.
    pub fn pointer_moved(&mut self, distance: f32, held: Duration) -> bool {
        let task_id = match &self.state {
            DragState::Pressed { task_id } => task_id.clone(),
            state => return matches!(state, DragState::Dragging { .. }),
        };

        match self.constraint {
            ActivationConstraint::Distance(min) if distance >= min => {
                self.activate(task_id);
            }
            ActivationConstraint::Delay { delay, tolerance } => {
                if distance > tolerance && held < delay {
                    // Moved too early: treated as a scroll, not a drag
                    self.state = DragState::Idle;
                } else if held >= delay {
                    self.activate(task_id);
                }
            }
            ActivationConstraint::Distance(_) => {}
        }
        matches!(self.state, DragState::Dragging { .. })
    }

    fn activate(&mut self, task_id: TaskId) {
        self.state = DragState::Dragging {
            task_id,
            over: None,
        };
    }

    /// Updates the droppable under the pointer; `None` when over nothing
    pub fn drag_over(&mut self, target: Option<DropTarget>) {
        if let DragState::Dragging { over, .. } = &mut self.state {
            *over = target;
        }
    }

    /// Ends the gesture over the last reported target
    pub fn drop(&mut self) -> Option<DropCommand> {
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Dragging {
                task_id,
                over: Some(target),
            } => Some(DropCommand::Target { task_id, target }),
            _ => None,
        }
    }

    /// Ends a keyboard gesture at an explicit position
    pub fn drop_at(&mut self, status: TaskStatus, index: usize) -> Option<DropCommand> {
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Dragging { task_id, .. } => Some(DropCommand::Index {
                task_id,
                status,
                index,
            }),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}

impl Default for DragSession {
    fn default() -> Self {
        Self::new(ActivationConstraint::MOUSE)
    }
}
