use crate::dispatch::task::Task;
use crate::telemetry::logging;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("task queue is closed")]
    Closed,
    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherSettings {
    /// Deadline given to tasks posted with `post_expiring`.
    pub task_expiration: Option<Duration>,
    /// Tasks running longer than this are reported to the lag log.
    pub slow_task: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            task_expiration: None,
            slow_task: Duration::from_millis(50),
        }
    }
}

struct Queue<S> {
    tasks: VecDeque<Task<S>>,
    open: bool,
}

struct Shared<S> {
    queue: Mutex<Queue<S>>,
    wakeup: Condvar,
    cycle: AtomicU64,
}

/// Thread-safe entry point for posting work to the dispatcher.
pub struct DispatcherHandle<S> {
    shared: Arc<Shared<S>>,
    task_expiration: Option<Duration>,
}

impl<S> Clone for DispatcherHandle<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            task_expiration: self.task_expiration,
        }
    }
}

impl<S> DispatcherHandle<S> {
    pub fn post(&self, func: impl FnOnce(&mut S) + Send + 'static) -> Result<(), DispatchError> {
        self.post_task(Task::new(func))
    }

    /// Posts a task that is dropped if it waits in the queue longer than the
    /// configured expiration.
    pub fn post_expiring(
        &self,
        func: impl FnOnce(&mut S) + Send + 'static,
    ) -> Result<(), DispatchError> {
        match self.task_expiration {
            Some(timeout) => self.post_task(Task::expiring(func, timeout)),
            None => self.post_task(Task::new(func)),
        }
    }

    pub fn post_task(&self, task: Task<S>) -> Result<(), DispatchError> {
        let mut queue = self
            .shared
            .queue
            .lock()
            .map_err(|_| DispatchError::Closed)?;
        if !queue.open {
            return Err(DispatchError::Closed);
        }
        queue.tasks.push_back(task);
        drop(queue);
        self.shared.wakeup.notify_one();
        Ok(())
    }

    /// Number of tasks taken off the queue so far, run or discarded.
    pub fn cycle(&self) -> u64 {
        self.shared.cycle.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.shared.queue.lock().map_or(false, |queue| queue.open)
    }

    fn close(&self) {
        if let Ok(mut queue) = self.shared.queue.lock() {
            queue.open = false;
        }
        self.shared.wakeup.notify_all();
    }
}

/// The single worker thread that owns the state `S` and runs posted tasks
/// against it in FIFO order.
pub struct Dispatcher<S> {
    handle: DispatcherHandle<S>,
    worker: Option<JoinHandle<S>>,
}

impl<S: Send + 'static> Dispatcher<S> {
    pub fn start(state: S, settings: DispatcherSettings) -> Result<Self, DispatchError> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                tasks: VecDeque::new(),
                open: true,
            }),
            wakeup: Condvar::new(),
            cycle: AtomicU64::new(0),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("dispatcher".to_string())
            .spawn(move || work(worker_shared, state, settings.slow_task))
            .map_err(|source| DispatchError::Spawn {
                name: "dispatcher",
                source,
            })?;
        logging::log_game("dispatcher started");
        Ok(Self {
            handle: DispatcherHandle {
                shared,
                task_expiration: settings.task_expiration,
            },
            worker: Some(worker),
        })
    }

    /// Waits for the worker to finish the queued tasks and hands back the
    /// state it owned.
    pub fn join(mut self) -> Result<S, DispatchError> {
        self.shutdown();
        let worker = self
            .worker
            .take()
            .ok_or(DispatchError::WorkerPanicked("dispatcher"))?;
        worker
            .join()
            .map_err(|_| DispatchError::WorkerPanicked("dispatcher"))
    }
}

impl<S> Dispatcher<S> {
    pub fn handle(&self) -> DispatcherHandle<S> {
        self.handle.clone()
    }

    /// Stops accepting tasks. Tasks already queued still run.
    pub fn shutdown(&self) {
        self.handle.close();
    }
}

impl<S> Drop for Dispatcher<S> {
    fn drop(&mut self) {
        self.handle.close();
    }
}

fn next_task<S>(shared: &Shared<S>) -> Option<Task<S>> {
    let mut queue = shared.queue.lock().ok()?;
    loop {
        if let Some(task) = queue.tasks.pop_front() {
            return Some(task);
        }
        if !queue.open {
            return None;
        }
        queue = shared.wakeup.wait(queue).ok()?;
    }
}

fn work<S>(shared: Arc<Shared<S>>, mut state: S, slow_task: Duration) -> S {
    while let Some(task) = next_task(&shared) {
        let started = Instant::now();
        if task.has_expired(started) {
            logging::log_lag("dispatcher dropped an expired task");
        } else {
            task.run(&mut state);
            let elapsed = started.elapsed();
            if elapsed > slow_task {
                logging::log_lag(&format!(
                    "dispatcher task took {} ms",
                    elapsed.as_millis()
                ));
            }
        }
        shared.cycle.fetch_add(1, Ordering::SeqCst);
    }
    logging::log_game("dispatcher stopped");
    state
}
