use crate::dispatch::dispatcher::{DispatchError, DispatcherHandle};
use crate::dispatch::task::{Task, TaskId, TimedTask};
use crate::telemetry::logging;
use std::collections::{BinaryHeap, HashSet};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct Pending<S> {
    heap: BinaryHeap<TimedTask<S>>,
    /// Ids still waiting. A heap entry whose id is missing here was
    /// cancelled and is skipped when it reaches the top.
    active: HashSet<TaskId>,
    next_id: u32,
    next_seq: u64,
    running: bool,
}

impl<S> Pending<S> {
    fn allocate_id(&mut self) -> TaskId {
        loop {
            let id = TaskId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1).max(1);
            if !self.active.contains(&id) {
                return id;
            }
        }
    }

    fn discard_cancelled(&mut self) {
        while let Some(top) = self.heap.peek() {
            if self.active.contains(&top.id) {
                return;
            }
            self.heap.pop();
        }
    }

    /// Pops every live task due at `now`, earliest first.
    fn take_due(&mut self, now: Instant) -> Vec<Task<S>> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|top| top.due <= now) {
            let Some(entry) = self.heap.pop() else {
                break;
            };
            if self.active.remove(&entry.id) {
                due.push(entry.task);
            }
        }
        due
    }
}

struct Shared<S> {
    pending: Mutex<Pending<S>>,
    wakeup: Condvar,
}

/// Thread-safe entry point for scheduling timed work.
pub struct SchedulerHandle<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for SchedulerHandle<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> SchedulerHandle<S> {
    pub fn schedule(
        &self,
        delay: Duration,
        func: impl FnOnce(&mut S) + Send + 'static,
    ) -> Result<TaskId, DispatchError> {
        self.schedule_at(Instant::now() + delay, func)
    }

    pub fn schedule_at(
        &self,
        due: Instant,
        func: impl FnOnce(&mut S) + Send + 'static,
    ) -> Result<TaskId, DispatchError> {
        let mut pending = self
            .shared
            .pending
            .lock()
            .map_err(|_| DispatchError::Closed)?;
        if !pending.running {
            return Err(DispatchError::Closed);
        }
        let id = pending.allocate_id();
        let seq = pending.next_seq;
        pending.next_seq += 1;
        pending.active.insert(id);
        pending.heap.push(TimedTask {
            id,
            due,
            seq,
            task: Task::new(func),
        });
        drop(pending);
        self.shared.wakeup.notify_one();
        Ok(id)
    }

    /// Cancels a task that has not been handed to the dispatcher yet.
    /// Returns false once it is past that point.
    pub fn cancel(&self, id: TaskId) -> bool {
        self.shared
            .pending
            .lock()
            .map_or(false, |mut pending| pending.active.remove(&id))
    }

    /// Tasks scheduled and neither cancelled nor dispatched.
    pub fn pending(&self) -> usize {
        self.shared
            .pending
            .lock()
            .map_or(0, |pending| pending.active.len())
    }

    pub fn is_running(&self) -> bool {
        self.shared
            .pending
            .lock()
            .map_or(false, |pending| pending.running)
    }

    /// Drops everything still pending and refuses new tasks.
    pub fn stop(&self) {
        if let Ok(mut pending) = self.shared.pending.lock() {
            pending.running = false;
            pending.heap.clear();
            pending.active.clear();
        }
        self.shared.wakeup.notify_all();
    }
}

/// The timer thread. It never touches the state itself; due tasks are
/// posted to the dispatcher in due-time order.
pub struct Scheduler<S> {
    handle: SchedulerHandle<S>,
    worker: Option<JoinHandle<()>>,
}

impl<S: 'static> Scheduler<S> {
    pub fn start(dispatcher: DispatcherHandle<S>) -> Result<Self, DispatchError> {
        let shared = Arc::new(Shared {
            pending: Mutex::new(Pending {
                heap: BinaryHeap::new(),
                active: HashSet::new(),
                next_id: 1,
                next_seq: 0,
                running: true,
            }),
            wakeup: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("scheduler".to_string())
            .spawn(move || work(worker_shared, dispatcher))
            .map_err(|source| DispatchError::Spawn {
                name: "scheduler",
                source,
            })?;
        logging::log_game("scheduler started");
        Ok(Self {
            handle: SchedulerHandle { shared },
            worker: Some(worker),
        })
    }
}

impl<S> Scheduler<S> {
    pub fn handle(&self) -> SchedulerHandle<S> {
        self.handle.clone()
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn wait_until_stopped(mut self) -> Result<(), DispatchError> {
        self.handle.stop();
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| DispatchError::WorkerPanicked("scheduler")),
            None => Ok(()),
        }
    }
}

impl<S> Drop for Scheduler<S> {
    fn drop(&mut self) {
        self.handle.stop();
    }
}

/// Blocks until at least one task is due or the scheduler stops.
fn wait_for_due<S>(shared: &Shared<S>) -> Option<Vec<Task<S>>> {
    let mut pending = shared.pending.lock().ok()?;
    loop {
        if !pending.running {
            return None;
        }
        pending.discard_cancelled();
        let now = Instant::now();
        let next_due = pending.heap.peek().map(|top| top.due);
        pending = match next_due {
            None => shared.wakeup.wait(pending).ok()?,
            Some(due) if due <= now => return Some(pending.take_due(now)),
            Some(due) => shared.wakeup.wait_timeout(pending, due - now).ok()?.0,
        };
    }
}

fn work<S>(shared: Arc<Shared<S>>, dispatcher: DispatcherHandle<S>) {
    while let Some(due) = wait_for_due(&shared) {
        for task in due {
            if let Err(err) = dispatcher.post_task(task) {
                logging::log_error(&format!("scheduler lost its dispatcher: {}", err));
                return;
            }
        }
    }
    logging::log_game("scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::dispatcher::{Dispatcher, DispatcherSettings};
    use std::sync::mpsc;

    fn start() -> (Dispatcher<()>, Scheduler<()>) {
        let dispatcher = Dispatcher::start((), DispatcherSettings::default()).expect("dispatcher");
        let scheduler = Scheduler::start(dispatcher.handle()).expect("scheduler");
        (dispatcher, scheduler)
    }

    #[test]
    fn earlier_due_time_runs_first_regardless_of_creation_order() {
        let (dispatcher, scheduler) = start();
        let handle = scheduler.handle();
        let (tx, rx) = mpsc::channel();
        let late = tx.clone();
        handle
            .schedule(Duration::from_millis(300), move |_| {
                late.send(300).expect("send");
            })
            .expect("scheduled");
        handle
            .schedule(Duration::from_millis(100), move |_| {
                tx.send(100).expect("send");
            })
            .expect("scheduled");

        let first = rx.recv_timeout(Duration::from_secs(5)).expect("first task");
        let second = rx.recv_timeout(Duration::from_secs(5)).expect("second task");
        assert_eq!((first, second), (100, 300));

        scheduler.wait_until_stopped().expect("scheduler stopped");
        dispatcher.join().expect("dispatcher joined");
    }

    #[test]
    fn cancelled_tasks_never_run() {
        let (dispatcher, scheduler) = start();
        let handle = scheduler.handle();
        let (tx, rx) = mpsc::channel();
        let cancelled_tx = tx.clone();
        let id = handle
            .schedule(Duration::from_millis(50), move |_| {
                cancelled_tx.send("cancelled").expect("send");
            })
            .expect("scheduled");
        handle
            .schedule(Duration::from_millis(100), move |_| {
                tx.send("kept").expect("send");
            })
            .expect("scheduled");
        assert_ne!(id, TaskId::NONE);
        assert!(handle.cancel(id));
        assert!(!handle.cancel(id));
        assert_eq!(handle.pending(), 1);

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).expect("task"), "kept");
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(handle.pending(), 0);

        scheduler.wait_until_stopped().expect("scheduler stopped");
        dispatcher.join().expect("dispatcher joined");
    }

    #[test]
    fn cancelling_after_dispatch_is_a_no_op() {
        let (dispatcher, scheduler) = start();
        let handle = scheduler.handle();
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        dispatcher
            .handle()
            .post(move |_| {
                gate_rx.recv_timeout(Duration::from_secs(5)).expect("gate opened");
            })
            .expect("posted");

        let (tx, rx) = mpsc::channel();
        let id = handle
            .schedule(Duration::from_millis(20), move |_| {
                tx.send("ran").expect("send");
            })
            .expect("scheduled");
        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.pending() > 0 {
            assert!(Instant::now() < deadline, "task never left the scheduler");
            thread::sleep(Duration::from_millis(5));
        }

        assert!(!handle.cancel(id));
        gate_tx.send(()).expect("open gate");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).expect("task"), "ran");

        scheduler.wait_until_stopped().expect("scheduler stopped");
        dispatcher.join().expect("dispatcher joined");
    }

    #[test]
    fn stopping_drops_pending_work_and_refuses_more() {
        let (dispatcher, scheduler) = start();
        let handle = scheduler.handle();
        let (tx, rx) = mpsc::channel::<()>();
        handle
            .schedule(Duration::from_secs(30), move |_| {
                tx.send(()).expect("send");
            })
            .expect("scheduled");
        scheduler.stop();
        assert!(!handle.is_running());
        assert_eq!(handle.pending(), 0);
        assert!(matches!(
            handle.schedule(Duration::ZERO, |_| {}),
            Err(DispatchError::Closed)
        ));
        scheduler.wait_until_stopped().expect("scheduler stopped");
        dispatcher.join().expect("dispatcher joined");
        assert!(rx.recv_timeout(Duration::from_millis(10)).is_err());
    }
}
