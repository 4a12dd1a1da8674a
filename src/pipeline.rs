//! Completion pipeline
//!
//! Completed tasks are appended to a FIFO from arbitrary producer threads
//! and drained by one dedicated dispatcher thread, which is the only place
//! completion callbacks execute. That gives each task exactly one completion,
//! in per-producer FIFO order, with callbacks never racing each other.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::error::{EmulatorError, ScsiResult};
use crate::scsi::TaskStatus;

/// How the transport layer resolved a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceResponse {
    /// The command was delivered to a target and interpreted
    TaskComplete,
    /// The command never reached interpretation (unbound target, malformed
    /// transfer setup); no sense data accompanies this
    DeliveryFailure,
}

/// Everything handed back to the submitter when a task completes
#[derive(Debug)]
pub struct TaskCompletion {
    pub task_id: u64,
    pub response: ServiceResponse,
    pub status: TaskStatus,
    /// Realized transfer count in bytes
    pub transferred: u64,
    /// The task's data buffer, travelling back to its owner
    pub data: Vec<u8>,
}

/// Invoked exactly once per task, on the dispatcher thread
pub type CompletionCallback = Box<dyn FnOnce(TaskCompletion) + Send + 'static>;

/// A finished task waiting for its callback to fire
///
/// Owned exclusively by the pipeline from enqueue until dispatch.
pub struct PendingTask {
    completion: TaskCompletion,
    callback: CompletionCallback,
}

impl PendingTask {
    pub fn new(completion: TaskCompletion, callback: CompletionCallback) -> Self {
        PendingTask {
            completion,
            callback,
        }
    }

    fn complete(self) {
        (self.callback)(self.completion);
    }
}

struct State {
    fifo: VecDeque<PendingTask>,
    /// A task has been popped but its callback has not returned yet
    dispatching: bool,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    cond: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// FIFO of finished tasks plus its single consumer thread
///
/// Dropping the pipeline drains the queue before the dispatcher exits, so an
/// enqueued task is never lost.
pub struct CompletionPipeline {
    shared: Arc<Shared>,
    dispatcher: Option<JoinHandle<()>>,
}

impl CompletionPipeline {
    pub fn new() -> ScsiResult<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                fifo: VecDeque::new(),
                dispatching: false,
                shutdown: false,
            }),
            cond: Condvar::new(),
        });

        let dispatcher_shared = Arc::clone(&shared);
        let dispatcher = thread::Builder::new()
            .name("scsi-completion".into())
            .spawn(move || dispatch_loop(&dispatcher_shared))
            .map_err(|e| EmulatorError::Task(format!("failed to spawn dispatcher: {}", e)))?;

        Ok(CompletionPipeline {
            shared,
            dispatcher: Some(dispatcher),
        })
    }

    /// Append a finished task; safe to call from any thread
    pub fn enqueue(&self, task: PendingTask) {
        let mut state = self.shared.lock();
        state.fifo.push_back(task);
        self.shared.cond.notify_all();
    }

    /// Number of tasks waiting to be dispatched
    pub fn pending(&self) -> usize {
        self.shared.lock().fifo.len()
    }

    /// Block until every enqueued task has completed
    pub fn wait_idle(&self) {
        let mut state = self.shared.lock();
        while !state.fifo.is_empty() || state.dispatching {
            state = self
                .shared
                .cond
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Drop for CompletionPipeline {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            state.shutdown = true;
            self.shared.cond.notify_all();
        }
        if let Some(handle) = self.dispatcher.take() {
            if handle.join().is_err() {
                log::error!("completion dispatcher panicked");
            }
        }
    }
}

fn dispatch_loop(shared: &Shared) {
    loop {
        let task = {
            let mut state = shared.lock();
            loop {
                if let Some(task) = state.fifo.pop_front() {
                    state.dispatching = true;
                    break task;
                }
                if state.shutdown {
                    return;
                }
                state = shared
                    .cond
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        // Callback runs outside the lock so producers are never blocked on it
        task.complete();

        let mut state = shared.lock();
        state.dispatching = false;
        shared.cond.notify_all();
    }
}
