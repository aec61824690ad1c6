//! Board editing session with optimistic persistence.
//!
//! A [`BoardSession`] owns the [`Board`] for one presentation session. Every
//! mutating call applies to the board immediately and then queues a request
//! for the [`TaskStore`]. A single background worker drains the queue in
//! order, so requests for one task reach the store in the order they were
//! issued. Outcomes come back as [`BoardEvent`]s; failures never roll back
//! the local board.

use crate::{
    config::SessionConfig,
    directory::UserDirectory,
    domain::{
        Assignee, Board, DropCommand, DropTarget, MoveOutcome, NewTask, Task, TaskId, TaskPatch,
        TaskStatus,
    },
    error::{BoardError, Result},
    storage::TaskStore,
};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt,
    sync::Arc,
};
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        oneshot,
    },
    task::JoinHandle,
};

/// A write waiting to be sent to the store
#[derive(Debug, Clone, PartialEq)]
pub enum PersistRequest {
    UpdateStatus {
        task_id: TaskId,
        status: TaskStatus,
    },
    Create {
        provisional_id: TaskId,
        project_id: String,
        status: TaskStatus,
        fields: NewTask,
    },
    Update {
        task: Task,
    },
    Delete {
        task_id: TaskId,
    },
}

impl PersistRequest {
    /// The task this request is about, as known locally when issued
    pub fn task_id(&self) -> &TaskId {
        match self {
            Self::UpdateStatus { task_id, .. } | Self::Delete { task_id } => task_id,
            Self::Create { provisional_id, .. } => provisional_id,
            Self::Update { task } => &task.id,
        }
    }

    pub fn op(&self) -> PersistOp {
        match self {
            Self::UpdateStatus { .. } => PersistOp::UpdateStatus,
            Self::Create { .. } => PersistOp::Create,
            Self::Update { .. } => PersistOp::Update,
            Self::Delete { .. } => PersistOp::Delete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOp {
    UpdateStatus,
    Create,
    Update,
    Delete,
}

impl fmt::Display for PersistOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpdateStatus => write!(f, "status update"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// A store write that did not succeed. Hand it to
/// [`BoardSession::retry`] to try again.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistenceFailure {
    pub task_id: TaskId,
    pub request: PersistRequest,
    pub reason: String,
}

impl From<PersistenceFailure> for BoardError {
    fn from(failure: PersistenceFailure) -> Self {
        BoardError::PersistenceFailed {
            task_id: failure.task_id.to_string(),
            reason: failure.reason,
        }
    }
}

/// Outcome of a queued write, for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    /// The store accepted a write
    Persisted { task_id: TaskId, op: PersistOp },
    /// The store created a task; apply with [`BoardSession::apply_event`]
    /// or [`BoardSession::confirm_created`]
    Created { provisional_id: TaskId, task: Task },
    /// The store rejected a write; the local change is kept
    PersistenceFailed(PersistenceFailure),
}

enum WorkItem {
    Request(PersistRequest),
    Flush(oneshot::Sender<()>),
}

/// One user's editing session over a project board
pub struct BoardSession<S: TaskStore + 'static> {
    board: Board,
    store: Arc<S>,
    config: SessionConfig,
    // Provisional id -> store id, from applied creations
    confirmed: HashMap<TaskId, TaskId>,
    queue: mpsc::UnboundedSender<WorkItem>,
    worker: JoinHandle<()>,
}

impl<S: TaskStore + 'static> BoardSession<S> {
    /// Starts a session over an existing board. Must be called inside a
    /// tokio runtime.
    pub fn new(
        board: Board,
        store: Arc<S>,
        config: SessionConfig,
    ) -> (Self, mpsc::Receiver<BoardEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer.max(1));
        let (queue, queue_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(Arc::clone(&store), queue_rx, event_tx));

        let session = Self {
            board,
            store,
            config,
            confirmed: HashMap::new(),
            queue,
            worker,
        };
        (session, event_rx)
    }

    /// Loads the project's tasks from the store and starts a session
    pub async fn load(
        store: Arc<S>,
        config: SessionConfig,
    ) -> Result<(Self, mpsc::Receiver<BoardEvent>)> {
        config.validate()?;
        let board = load_board(store.as_ref(), &config).await?;
        tracing::info!(
            project_id = %config.project_id,
            tasks = board.len(),
            "loaded board"
        );
        Ok(Self::new(board, store, config))
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn tasks_in_column(&self, status: TaskStatus) -> Vec<&Task> {
        self.board.tasks_in_column(status)
    }

    fn enqueue(&self, request: PersistRequest) {
        let task_id = request.task_id().clone();
        if self.queue.send(WorkItem::Request(request)).is_err() {
            tracing::warn!(task_id = %task_id, "persistence worker stopped; write dropped");
        }
    }

    fn persist_move(&self, outcome: &MoveOutcome) {
        // The store keeps no positions, only status.
        if outcome.status_changed {
            self.enqueue(PersistRequest::UpdateStatus {
                task_id: outcome.task_id.clone(),
                status: outcome.to_status,
            });
        }
    }

    /// Moves a task and queues the status write when the column changed
    pub fn move_task(
        &mut self,
        task_id: &TaskId,
        target: TaskStatus,
        target_index: usize,
    ) -> Result<MoveOutcome> {
        let outcome = self.board.move_task(task_id, target, target_index)?;
        self.persist_move(&outcome);
        Ok(outcome)
    }

    /// Like [`move_task`](Self::move_task), taking a raw column id
    pub fn move_task_to(
        &mut self,
        task_id: &TaskId,
        column: &str,
        target_index: usize,
    ) -> Result<MoveOutcome> {
        let outcome = self.board.move_task_to(task_id, column, target_index)?;
        self.persist_move(&outcome);
        Ok(outcome)
    }

    pub fn drop_task(&mut self, task_id: &TaskId, target: &DropTarget) -> Result<MoveOutcome> {
        let outcome = self.board.drop_task(task_id, target)?;
        self.persist_move(&outcome);
        Ok(outcome)
    }

    pub fn apply_drop(&mut self, command: &DropCommand) -> Result<MoveOutcome> {
        let outcome = self.board.apply_drop(command)?;
        self.persist_move(&outcome);
        Ok(outcome)
    }

    /// Adds a provisional task at the end of `status` and queues its creation
    pub fn create_task(&mut self, status: TaskStatus, fields: NewTask) -> Result<Task> {
        let task = self.board.create_task(status, fields.clone())?;
        self.enqueue(PersistRequest::Create {
            provisional_id: task.id.clone(),
            project_id: self.config.project_id.clone(),
            status,
            fields,
        });
        Ok(task)
    }

    pub fn delete_task(&mut self, task_id: &TaskId) -> Result<Task> {
        let task = self.board.delete_task(task_id)?;
        self.enqueue(PersistRequest::Delete {
            task_id: task_id.clone(),
        });
        Ok(task)
    }

    pub fn update_task(&mut self, task_id: &TaskId, patch: TaskPatch) -> Result<Task> {
        let task = self.board.update_task(task_id, patch)?.clone();
        self.enqueue(PersistRequest::Update { task: task.clone() });
        Ok(task)
    }

    /// Replaces a provisional task with the store's record
    pub fn confirm_created(&mut self, provisional_id: &TaskId, task: Task) -> Result<()> {
        let store_id = task.id.clone();
        self.board.rekey_task(provisional_id, task)?;
        self.confirmed.insert(provisional_id.clone(), store_id);
        Ok(())
    }

    /// Folds a worker event back into the board. Only creations change
    /// local state; other events are informational.
    pub fn apply_event(&mut self, event: &BoardEvent) -> Result<()> {
        match event {
            BoardEvent::Created {
                provisional_id,
                task,
            } if self.board.contains(provisional_id) => {
                self.confirm_created(provisional_id, task.clone())
            }
            BoardEvent::Created {
                provisional_id,
                task,
            } => {
                // Deleted locally before the store answered
                tracing::debug!(
                    task_id = %provisional_id,
                    "confirmation for a task no longer on the board"
                );
                self.confirmed.insert(provisional_id.clone(), task.id.clone());
                Ok(())
            }
            BoardEvent::Persisted { .. } | BoardEvent::PersistenceFailed(_) => Ok(()),
        }
    }

    /// Queues a failed write again, rebuilt from the task's current local
    /// record so it cannot overwrite a newer write for the same task.
    ///
    /// Returns false when there is nothing left to write: the task has been
    /// deleted locally, or its creation has since been confirmed.
    pub fn retry(&self, failure: PersistenceFailure) -> bool {
        let op = failure.request.op();
        match self.current_request(failure.request) {
            Some(request) => {
                tracing::debug!(task_id = %request.task_id(), op = %op, "retrying write");
                self.enqueue(request);
                true
            }
            None => {
                tracing::debug!(
                    task_id = %failure.task_id,
                    op = %op,
                    "retry superseded by local state"
                );
                false
            }
        }
    }

    fn current_id(&self, task_id: &TaskId) -> TaskId {
        self.confirmed
            .get(task_id)
            .cloned()
            .unwrap_or_else(|| task_id.clone())
    }

    fn current_request(&self, request: PersistRequest) -> Option<PersistRequest> {
        match request {
            PersistRequest::UpdateStatus { task_id, .. } => {
                let task = self.board.get_task(&self.current_id(&task_id))?;
                Some(PersistRequest::UpdateStatus {
                    task_id: task.id.clone(),
                    status: task.status,
                })
            }
            PersistRequest::Create {
                provisional_id,
                project_id,
                ..
            } => {
                if self.confirmed.contains_key(&provisional_id) {
                    return None;
                }
                let task = self.board.get_task(&provisional_id)?;
                Some(PersistRequest::Create {
                    status: task.status,
                    fields: NewTask::from(task),
                    provisional_id,
                    project_id,
                })
            }
            PersistRequest::Update { task } => {
                let current = self.board.get_task(&self.current_id(&task.id))?;
                Some(PersistRequest::Update {
                    task: current.clone(),
                })
            }
            PersistRequest::Delete { task_id } => {
                let task_id = self.current_id(&task_id);
                if self.board.contains(&task_id) {
                    return None;
                }
                Some(PersistRequest::Delete { task_id })
            }
        }
    }

    /// Accepts an externally pushed task, replacing its status and position
    pub fn apply_remote(&mut self, task: Task, position: Option<usize>) {
        self.board.apply_remote(task, position);
    }

    /// Accepts an externally pushed deletion
    pub fn apply_remote_delete(&mut self, task_id: &TaskId) -> Result<Task> {
        self.board.delete_task(task_id)
    }

    /// Waits until every write queued so far has been handled. Does not wait
    /// for the resulting events to be received.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.queue.send(WorkItem::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Replaces the board with the store's current view, after letting
    /// queued writes land
    pub async fn reload(&mut self) -> Result<()> {
        self.flush().await;
        self.board = load_board(self.store.as_ref(), &self.config).await?;
        tracing::info!(
            project_id = %self.config.project_id,
            tasks = self.board.len(),
            "reloaded board"
        );
        Ok(())
    }

    /// Resolves a task's assignee to current display fields
    pub async fn resolve_assignee<D: UserDirectory + ?Sized>(
        &self,
        directory: &D,
        task_id: &TaskId,
    ) -> Result<Option<Assignee>> {
        let task = self
            .board
            .get_task(task_id)
            .ok_or_else(|| BoardError::TaskNotFound(task_id.to_string()))?;
        let Some(assignee) = &task.assignee else {
            return Ok(None);
        };
        // Fall back to the copy held on the task when the directory has no entry
        let resolved = directory.resolve(&assignee.id).await?;
        Ok(resolved.or_else(|| Some(assignee.clone())))
    }

    /// Stops accepting writes and waits for queued ones to finish
    pub async fn shutdown(self) {
        let Self { queue, worker, .. } = self;
        drop(queue);
        if let Err(err) = worker.await {
            tracing::warn!(error = %err, "persistence worker ended abnormally");
        }
    }
}

async fn load_board<S: TaskStore + ?Sized>(store: &S, config: &SessionConfig) -> Result<Board> {
    let tasks = store.list_tasks(&config.project_id).await?;
    Ok(Board::from_tasks(config.board.clone(), tasks)?.with_project(config.project_id.clone()))
}

async fn run_worker<S: TaskStore + ?Sized>(
    store: Arc<S>,
    mut queue: mpsc::UnboundedReceiver<WorkItem>,
    events: mpsc::Sender<BoardEvent>,
) {
    let mut ids = StoreIds::default();
    let mut outbox = Outbox::default();

    loop {
        tokio::select! {
            biased;
            permit = events.reserve(), if outbox.has_backlog() => match permit {
                Ok(permit) => outbox.send_next(permit),
                Err(_) => outbox.receiver_dropped(),
            },
            item = queue.recv() => match item {
                Some(WorkItem::Request(request)) => {
                    let event = execute(store.as_ref(), &mut ids, request).await;
                    outbox.push(&events, event);
                }
                Some(WorkItem::Flush(done)) => {
                    let _ = done.send(());
                }
                None => break,
            },
        }
    }

    outbox.close(&events);
}

/// Events waiting for room on the bounded event channel.
///
/// The worker never waits on the receiver: `Persisted` events are dropped
/// when the channel is full, other events queue here and go out as the
/// receiver makes room.
struct Outbox {
    backlog: VecDeque<BoardEvent>,
    open: bool,
}

impl Default for Outbox {
    fn default() -> Self {
        Self {
            backlog: VecDeque::new(),
            open: true,
        }
    }
}

impl Outbox {
    fn has_backlog(&self) -> bool {
        self.open && !self.backlog.is_empty()
    }

    fn push(&mut self, events: &mpsc::Sender<BoardEvent>, event: BoardEvent) {
        if !self.open {
            return;
        }
        // Keep arrival order behind anything already waiting
        if !self.backlog.is_empty() {
            if !matches!(event, BoardEvent::Persisted { .. }) {
                self.backlog.push_back(event);
            }
            return;
        }
        match events.try_send(event) {
            Ok(()) | Err(TrySendError::Full(BoardEvent::Persisted { .. })) => {}
            Err(TrySendError::Full(event)) => self.backlog.push_back(event),
            Err(TrySendError::Closed(_)) => self.receiver_dropped(),
        }
    }

    fn send_next(&mut self, permit: mpsc::Permit<'_, BoardEvent>) {
        if let Some(event) = self.backlog.pop_front() {
            permit.send(event);
        }
    }

    fn receiver_dropped(&mut self) {
        tracing::debug!("board event receiver dropped");
        self.open = false;
        self.backlog.clear();
    }

    /// Hands over whatever still fits once the queue has closed
    fn close(mut self, events: &mpsc::Sender<BoardEvent>) {
        while let Some(event) = self.backlog.pop_front() {
            if events.try_send(event).is_err() {
                tracing::warn!(
                    undelivered = self.backlog.len() + 1,
                    "session closed with board events undelivered"
                );
                break;
            }
        }
    }
}

/// Id bookkeeping for tasks created during the session
#[derive(Default)]
struct StoreIds {
    // Provisional id -> store id, learned from completed creates
    aliases: HashMap<TaskId, TaskId>,
    // Provisional ids whose create the store rejected
    uncreated: HashSet<TaskId>,
}

impl StoreIds {
    fn resolve(&self, local_id: &TaskId) -> TaskId {
        self.aliases
            .get(local_id)
            .cloned()
            .unwrap_or_else(|| local_id.clone())
    }
}

fn failed(local_id: TaskId, request: PersistRequest, err: &BoardError) -> BoardEvent {
    tracing::warn!(
        task_id = %local_id,
        op = %request.op(),
        error = %err,
        "task store write failed; local change kept"
    );
    BoardEvent::PersistenceFailed(PersistenceFailure {
        task_id: local_id,
        request,
        reason: err.to_string(),
    })
}

async fn execute<S: TaskStore + ?Sized>(
    store: &S,
    ids: &mut StoreIds,
    request: PersistRequest,
) -> BoardEvent {
    let local_id = request.task_id().clone();

    // The store has never seen this task
    if ids.uncreated.contains(&local_id) {
        match &request {
            PersistRequest::Create { .. } => {}
            PersistRequest::Delete { .. } => {
                ids.uncreated.remove(&local_id);
                return BoardEvent::Persisted {
                    task_id: local_id,
                    op: request.op(),
                };
            }
            _ => {
                let err = BoardError::TaskNotFound(local_id.to_string());
                return failed(local_id, request, &err);
            }
        }
    }

    let store_id = ids.resolve(&local_id);
    let result = match &request {
        PersistRequest::UpdateStatus { status, .. } => store
            .update_task_status(&store_id, *status)
            .await
            .map(|_| None),
        PersistRequest::Create {
            project_id,
            status,
            fields,
            ..
        } => store
            .create_task(project_id, *status, fields)
            .await
            .map(Some),
        PersistRequest::Update { task } => {
            let mut task = task.clone();
            task.id = store_id.clone();
            store.update_task(&task).await.map(|_| None)
        }
        PersistRequest::Delete { .. } => store.delete_task(&store_id).await.map(|_| None),
    };

    match result {
        Ok(Some(created)) => {
            ids.uncreated.remove(&local_id);
            if created.id != local_id {
                ids.aliases.insert(local_id.clone(), created.id.clone());
            }
            tracing::debug!(task_id = %local_id, store_id = %created.id, "task created in store");
            BoardEvent::Created {
                provisional_id: local_id,
                task: created,
            }
        }
        Ok(None) => {
            if matches!(request, PersistRequest::Delete { .. }) {
                ids.aliases.remove(&local_id);
            }
            BoardEvent::Persisted {
                task_id: local_id,
                op: request.op(),
            }
        }
        Err(err) => {
            if matches!(request, PersistRequest::Create { .. }) {
                ids.uncreated.insert(local_id.clone());
            }
            failed(local_id, request, &err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryTaskStore, StoreCall};

    fn create_request(provisional_id: &TaskId) -> PersistRequest {
        PersistRequest::Create {
            provisional_id: provisional_id.clone(),
            project_id: "p1".to_string(),
            status: TaskStatus::Todo,
            fields: NewTask::new("Temp"),
        }
    }

    #[tokio::test]
    async fn test_alias_forgotten_after_delete() {
        let store = InMemoryTaskStore::new();
        let mut ids = StoreIds::default();
        let provisional = TaskId::from("local-1");

        let event = execute(&store, &mut ids, create_request(&provisional)).await;
        assert!(matches!(event, BoardEvent::Created { .. }));
        assert_eq!(ids.resolve(&provisional).as_str(), "task-1");

        let event = execute(
            &store,
            &mut ids,
            PersistRequest::Delete {
                task_id: provisional.clone(),
            },
        )
        .await;
        assert!(matches!(
            event,
            BoardEvent::Persisted {
                op: PersistOp::Delete,
                ..
            }
        ));
        assert!(ids.aliases.is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_writes_for_uncreated_task_skip_the_store() {
        let store = InMemoryTaskStore::new();
        store.set_failing(true);
        let mut ids = StoreIds::default();
        let provisional = TaskId::from("local-1");

        let event = execute(&store, &mut ids, create_request(&provisional)).await;
        assert!(matches!(event, BoardEvent::PersistenceFailed(_)));
        assert!(ids.uncreated.contains(&provisional));
        store.set_failing(false);

        let event = execute(
            &store,
            &mut ids,
            PersistRequest::UpdateStatus {
                task_id: provisional.clone(),
                status: TaskStatus::Done,
            },
        )
        .await;
        let BoardEvent::PersistenceFailed(failure) = event else {
            panic!("expected a failure, got {:?}", event);
        };
        assert_eq!(failure.request.op(), PersistOp::UpdateStatus);

        let event = execute(
            &store,
            &mut ids,
            PersistRequest::Delete {
                task_id: provisional.clone(),
            },
        )
        .await;
        assert!(matches!(event, BoardEvent::Persisted { .. }));
        assert!(ids.uncreated.is_empty());

        // Only the rejected create reached the store
        assert_eq!(
            store.calls().await,
            vec![StoreCall::Create("p1".to_string(), TaskStatus::Todo)]
        );
    }

    #[tokio::test]
    async fn test_outbox_keeps_failures_and_drops_successes_when_full() {
        let (events, mut receiver) = mpsc::channel(1);
        let mut outbox = Outbox::default();
        let failure = |id: &str| {
            BoardEvent::PersistenceFailed(PersistenceFailure {
                task_id: TaskId::from(id),
                request: PersistRequest::Delete {
                    task_id: TaskId::from(id),
                },
                reason: "down".to_string(),
            })
        };

        outbox.push(&events, failure("A"));
        outbox.push(&events, failure("B"));
        outbox.push(
            &events,
            BoardEvent::Persisted {
                task_id: TaskId::from("C"),
                op: PersistOp::Delete,
            },
        );
        assert!(outbox.has_backlog());
        assert_eq!(outbox.backlog.len(), 1);

        assert_eq!(receiver.recv().await, Some(failure("A")));
        let permit = events.reserve().await.unwrap();
        outbox.send_next(permit);
        assert_eq!(receiver.recv().await, Some(failure("B")));
        assert!(!outbox.has_backlog());
    }
}
