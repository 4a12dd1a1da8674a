//! Error types for the SCSI emulator

use thiserror::Error;

/// Emulator errors
///
/// SCSI command failures are deliberately not represented here: a bad command
/// produces a CHECK CONDITION status with sense data, which is a well-formed
/// result. These variants cover the fallible seams around the emulator itself
/// (configuration, store access, task plumbing).
#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("task error: {0}")]
    Task(String),
}

/// Result type for emulator operations
pub type ScsiResult<T> = Result<T, EmulatorError>;
