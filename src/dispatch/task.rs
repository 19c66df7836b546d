use std::cmp::Ordering;
use std::fmt;
use std::time::{Duration, Instant};

pub type TaskFn<S> = Box<dyn FnOnce(&mut S) + Send>;

/// A unit of work for the dispatcher thread, with an optional deadline after
/// which it is dropped instead of run late.
pub struct Task<S> {
    func: TaskFn<S>,
    expiration: Option<Instant>,
}

impl<S> Task<S> {
    pub fn new(func: impl FnOnce(&mut S) + Send + 'static) -> Self {
        Self {
            func: Box::new(func),
            expiration: None,
        }
    }

    pub fn expiring(func: impl FnOnce(&mut S) + Send + 'static, timeout: Duration) -> Self {
        Self {
            func: Box::new(func),
            expiration: Some(Instant::now() + timeout),
        }
    }

    pub fn has_expired(&self, now: Instant) -> bool {
        self.expiration.is_some_and(|deadline| now > deadline)
    }

    pub fn run(self, state: &mut S) {
        (self.func)(state)
    }
}

impl<S> fmt::Debug for Task<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

/// Identity of a scheduled task. Zero is never handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u32);

impl TaskId {
    pub const NONE: TaskId = TaskId(0);
}

/// A task waiting in the scheduler for its due time.
#[derive(Debug)]
pub struct TimedTask<S> {
    pub id: TaskId,
    pub due: Instant,
    /// Insertion order; breaks ties between equal due times.
    pub seq: u64,
    pub task: Task<S>,
}

/// Min-heap by due time, then by insertion order.
impl<S> Ord for TimedTask<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<S> PartialOrd for TimedTask<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S> PartialEq for TimedTask<S> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<S> Eq for TimedTask<S> {}
