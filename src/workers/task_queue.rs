//! The deletion task queue.
//!
//! A bounded handoff between many producers (request paths, the cleanup
//! scanner) and exactly one consumer. Tasks are ephemeral: nothing is
//! persisted, and a task lost to a crash or shutdown is simply
//! rediscovered by the scanner's next sweep: every enqueued condition
//! (soft-deleted row, stale pending upload, unconfirmed account) remains
//! visible in the metadata store until handled.

use tokio::sync::mpsc;
use uuid::Uuid;

/// Queue depth. Producers only ever wait when a burst outruns the
/// consumer by this many tasks; a full sweep enqueues at most 600.
const QUEUE_CAPACITY: usize = 1024;

/// What kind of entity a deletion task targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    File,
    Folder,
    User,
}

/// One unit of deletion work.
#[derive(Debug, Clone, Copy)]
pub struct DeletionTask {
    pub target_id: Uuid,
    pub kind: TaskKind,
}

impl DeletionTask {
    pub fn new(target_id: Uuid, kind: TaskKind) -> Self {
        Self { target_id, kind }
    }
}

/// Producer handle. Cheap to clone; order is preserved per producer.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<DeletionTask>,
}

pub type TaskReceiver = mpsc::Receiver<DeletionTask>;

/// Build the queue: one shared producer handle and the single consumer's
/// receiving end.
pub fn deletion_queue() -> (TaskQueue, TaskReceiver) {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    (TaskQueue { tx }, rx)
}

impl TaskQueue {
    /// Hand a task to the consumer. Waits only under backpressure. If the
    /// consumer is gone the task is dropped with a log line; the next
    /// sweep rediscovers the underlying condition.
    pub async fn enqueue(&self, task: DeletionTask) {
        if self.tx.send(task).await.is_err() {
            tracing::warn!(
                target_id = %task.target_id,
                kind = ?task.kind,
                "deletion queue is closed; task dropped until next sweep"
            );
        }
    }
}
