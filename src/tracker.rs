//! Live and terminal status of per-slide generation tasks.
//!
//! Tracking is keyed by `(SlideId, TaskKind)`. Starting a task for a key that
//! is already running never blocks; the new task simply takes over tracking,
//! and the superseded task's completion no longer affects the key while its
//! successor runs. Once the key is terminal, whichever task completes last sets
//! the recorded status. Terminal entries are pruned after a grace period unless
//! a newer task touched the key since.
//!
//! A batch wraps several per-slide tasks and adds an aggregate `running` flag,
//! cleared a fixed settle delay after every member reached a terminal state.
//! Batches are tracked by id, so overlapping batches settle independently.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::slide::SlideId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

/// Kind of work tracked for a slide. A slide can have one task of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Content,
    Visual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub slide_id: SlideId,
    pub kind: TaskKind,
}

/// Returned by [`TaskTracker::start`]; hand it back to [`TaskTracker::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTicket {
    pub key: TaskKey,
    stamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    pub status: TaskStatus,
    pub error: Option<String>,
    /// Bumped on every start and every completion of this key.
    stamp: u64,
}

/// Aggregate state of a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRun {
    pub id: Uuid,
    pub kind: TaskKind,
    pub members: Vec<SlideId>,
    pub running: bool,
}

#[derive(Debug, Default)]
struct TrackerState {
    entries: HashMap<TaskKey, TaskEntry>,
    batches: HashMap<Uuid, BatchRun>,
    next_stamp: u64,
}

impl TrackerState {
    fn bump(&mut self) -> u64 {
        self.next_stamp += 1;
        self.next_stamp
    }
}

#[derive(Debug, Clone)]
pub struct TaskTracker {
    state: Arc<Mutex<TrackerState>>,
    status_grace: Duration,
    batch_settle: Duration,
}

impl TaskTracker {
    pub fn new(status_grace: Duration, batch_settle: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackerState::default())),
            status_grace,
            batch_settle,
        }
    }

    /// Mark `(slide_id, kind)` running.
    pub fn start(&self, slide_id: SlideId, kind: TaskKind) -> TaskTicket {
        let key = TaskKey { slide_id, kind };
        let mut state = self.state.lock();
        let stamp = state.bump();
        let previous = state.entries.insert(
            key,
            TaskEntry {
                status: TaskStatus::Running,
                error: None,
                stamp,
            },
        );
        if matches!(previous, Some(TaskEntry { status: TaskStatus::Running, .. })) {
            debug!(slide_id = %slide_id, ?kind, "[GEN] superseding tracking of a running task");
        }
        TaskTicket { key, stamp }
    }

    /// Record the outcome and schedule pruning after the grace period.
    ///
    /// A ticket whose successor is still running is ignored: the key keeps
    /// reporting the successor. Must be called from within a tokio runtime.
    pub fn complete(&self, ticket: TaskTicket, outcome: TaskOutcome) {
        let (status, error) = match outcome {
            TaskOutcome::Succeeded => (TaskStatus::Succeeded, None),
            TaskOutcome::Failed(message) => (TaskStatus::Failed, Some(message)),
        };
        let stamp = {
            let mut state = self.state.lock();
            if state
                .entries
                .get(&ticket.key)
                .is_some_and(|e| e.status == TaskStatus::Running && e.stamp > ticket.stamp)
            {
                debug!(slide_id = %ticket.key.slide_id, kind = ?ticket.key.kind, ?status, "[GEN] superseded task completed while its successor runs, ignoring");
                return;
            }
            let stamp = state.bump();
            state
                .entries
                .insert(ticket.key, TaskEntry { status, error, stamp });
            stamp
        };
        debug!(slide_id = %ticket.key.slide_id, kind = ?ticket.key.kind, ?status, "[GEN] task completed");

        let tracker = self.clone();
        let grace = self.status_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            tracker.prune(ticket.key, stamp);
        });
    }

    fn prune(&self, key: TaskKey, stamp: u64) {
        let mut state = self.state.lock();
        if state.entries.get(&key).is_some_and(|e| e.stamp == stamp) {
            state.entries.remove(&key);
            debug!(slide_id = %key.slide_id, kind = ?key.kind, "[GEN] pruned task status");
        }
    }

    pub fn status(&self, slide_id: &SlideId, kind: TaskKind) -> TaskStatus {
        self.entry(slide_id, kind)
            .map(|e| e.status)
            .unwrap_or(TaskStatus::Idle)
    }

    pub fn entry(&self, slide_id: &SlideId, kind: TaskKind) -> Option<TaskEntry> {
        let key = TaskKey {
            slide_id: *slide_id,
            kind,
        };
        self.state.lock().entries.get(&key).cloned()
    }

    pub fn running_count(&self) -> usize {
        self.state
            .lock()
            .entries
            .values()
            .filter(|e| e.status == TaskStatus::Running)
            .count()
    }

    /// Register a new batch alongside any still in flight.
    pub fn begin_batch(&self, kind: TaskKind, members: &[SlideId]) -> Uuid {
        let run = BatchRun {
            id: Uuid::new_v4(),
            kind,
            members: members.to_vec(),
            running: true,
        };
        let id = run.id;
        info!(batch_id = %id, ?kind, members = members.len(), "[BATCH] started");
        self.state.lock().batches.insert(id, run);
        id
    }

    /// Mark the batch settled and clear it after the settle delay.
    ///
    /// Must be called from within a tokio runtime.
    pub fn finish_batch(&self, batch_id: Uuid) {
        {
            let mut state = self.state.lock();
            match state.batches.get_mut(&batch_id) {
                Some(run) => run.running = false,
                None => return,
            }
        }
        info!(batch_id = %batch_id, "[BATCH] all members settled");

        let tracker = self.clone();
        let settle = self.batch_settle;
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            if tracker.state.lock().batches.remove(&batch_id).is_some() {
                debug!(batch_id = %batch_id, "[BATCH] cleared");
            }
        });
    }

    pub fn batch(&self, batch_id: &Uuid) -> Option<BatchRun> {
        self.state.lock().batches.get(batch_id).cloned()
    }

    /// Every batch not yet cleared, running or settling.
    pub fn batches(&self) -> Vec<BatchRun> {
        self.state.lock().batches.values().cloned().collect()
    }

    /// True while any batch still has members in flight.
    pub fn is_batch_running(&self) -> bool {
        self.state.lock().batches.values().any(|b| b.running)
    }
}
