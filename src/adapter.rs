//! Host bus adapter emulation
//!
//! The adapter is the submission surface a hosting controller layer would
//! drive: it validates the transfer setup, routes the task to its target,
//! runs interpretation synchronously on the caller's thread and hands the
//! result to the completion pipeline. Tasks that never reach interpretation
//! (unbound target, malformed setup) still produce a completion, as a
//! synthesized delivery failure, rather than being dropped silently.

use crate::error::ScsiResult;
use crate::pipeline::{
    CompletionCallback, CompletionPipeline, PendingTask, ServiceResponse, TaskCompletion,
};
use crate::router::{TargetId, TargetRouter, MAX_TARGET_ID};
use crate::scsi::{CommandInterpreter, TaskStatus, TransferDirection, MAX_CDB_LEN};
use crate::store::{BlockStore, DEFAULT_DISK_SIZE};
use std::sync::PoisonError;

/// One command submission
#[derive(Debug)]
pub struct EmulatorTask {
    /// Caller-assigned identity, echoed back in the completion
    pub task_id: u64,
    pub target: TargetId,
    pub lun: u32,
    pub cdb: Vec<u8>,
    pub direction: TransferDirection,
    /// Data buffer; its length is the maximum transfer length
    pub buffer: Vec<u8>,
}

/// Virtual host bus adapter fronting a set of emulated targets
pub struct EmulatorAdapter {
    router: TargetRouter,
    pipeline: CompletionPipeline,
}

impl EmulatorAdapter {
    /// Create a builder for configuring the adapter
    pub fn builder() -> EmulatorAdapterBuilder {
        EmulatorAdapterBuilder::new()
    }

    /// Submit a task for interpretation
    ///
    /// Interpretation runs synchronously on the calling thread; `done` fires
    /// later, exactly once, on the completion dispatcher thread. Safe to
    /// call concurrently from multiple threads; tasks submitted for the same
    /// target serialize against each other.
    pub fn submit(&self, mut task: EmulatorTask, done: CompletionCallback) {
        if task.cdb.is_empty() || task.cdb.len() > MAX_CDB_LEN {
            log::error!(
                "task {}: rejecting CDB of {} bytes",
                task.task_id,
                task.cdb.len()
            );
            return self.fail_task(task, done);
        }

        if task.buffer.is_empty() && task.direction != TransferDirection::None {
            log::error!(
                "task {}: {:?} transfer requested without a data buffer",
                task.task_id,
                task.direction
            );
            return self.fail_task(task, done);
        }

        let Some(interpreter) = self.router.route(task.target) else {
            log::error!("task {}: no target bound at id {}", task.task_id, task.target);
            return self.fail_task(task, done);
        };

        let (status, transferred) = {
            let mut interpreter = interpreter
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            interpreter.interpret(task.lun, &task.cdb, task.direction, &mut task.buffer)
        };

        // Realized count can never exceed what the buffer could carry
        let transferred = transferred.min(task.buffer.len() as u64);

        self.pipeline.enqueue(PendingTask::new(
            TaskCompletion {
                task_id: task.task_id,
                response: ServiceResponse::TaskComplete,
                status,
                transferred,
                data: task.buffer,
            },
            done,
        ));
    }

    /// Request abort of an in-flight task
    ///
    /// Task management is not supported by this adapter: the request is
    /// accepted and answered with a fixed failure, and in-flight work always
    /// runs to completion.
    pub fn abort_task(&self, target: TargetId, lun: u32, task_id: u64) -> ServiceResponse {
        log::warn!(
            "abort requested for task {} (target {}, lun {}): not supported",
            task_id,
            target,
            lun
        );
        ServiceResponse::DeliveryFailure
    }

    /// Request abort of every task queued for a LUN; same fixed failure
    pub fn abort_task_set(&self, target: TargetId, lun: u32) -> ServiceResponse {
        log::warn!(
            "task set abort requested for target {} lun {}: not supported",
            target,
            lun
        );
        ServiceResponse::DeliveryFailure
    }

    /// Request a reset of one logical unit; same fixed failure
    pub fn reset_lun(&self, target: TargetId, lun: u32) -> ServiceResponse {
        log::warn!(
            "reset requested for target {} lun {}: not supported",
            target,
            lun
        );
        ServiceResponse::DeliveryFailure
    }

    /// Request a reset of a whole target; same fixed failure as aborts
    pub fn reset_target(&self, target: TargetId) -> ServiceResponse {
        log::warn!("reset requested for target {}: not supported", target);
        ServiceResponse::DeliveryFailure
    }

    /// Number of bound targets
    pub fn target_count(&self) -> usize {
        self.router.target_count()
    }

    /// Block until every submitted task has completed
    pub fn wait_idle(&self) {
        self.pipeline.wait_idle();
    }

    fn fail_task(&self, task: EmulatorTask, done: CompletionCallback) {
        self.pipeline.enqueue(PendingTask::new(
            TaskCompletion {
                task_id: task.task_id,
                response: ServiceResponse::DeliveryFailure,
                status: TaskStatus::Good,
                transferred: 0,
                data: task.buffer,
            },
            done,
        ));
    }
}

/// Builder for configuring an adapter
pub struct EmulatorAdapterBuilder {
    target_count: u32,
    disk_size: u64,
}

impl EmulatorAdapterBuilder {
    fn new() -> Self {
        Self {
            target_count: 1,
            disk_size: DEFAULT_DISK_SIZE,
        }
    }

    /// Number of emulated targets, bound at ids 0..count (default: 1)
    pub fn target_count(mut self, count: u32) -> Self {
        self.target_count = count;
        self
    }

    /// Capacity of each target's disk in bytes (default: 20 MiB)
    pub fn disk_size(mut self, bytes: u64) -> Self {
        self.disk_size = bytes;
        self
    }

    /// Build the adapter, creating one interpreter and store per target
    pub fn build(self) -> ScsiResult<EmulatorAdapter> {
        if self.target_count == 0 || self.target_count > MAX_TARGET_ID {
            return Err(crate::error::EmulatorError::Config(format!(
                "target count must be between 1 and {}, got {}",
                MAX_TARGET_ID, self.target_count
            )));
        }

        let mut router = TargetRouter::new();
        for target in 0..self.target_count {
            let store = BlockStore::new(self.disk_size)?;
            router.bind(target, CommandInterpreter::new(store))?;
        }

        log::info!(
            "adapter ready: {} target(s), {} bytes each",
            self.target_count,
            self.disk_size
        );

        Ok(EmulatorAdapter {
            router,
            pipeline: CompletionPipeline::new()?,
        })
    }
}
