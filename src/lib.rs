//! An in-memory SCSI target emulator
//!
//! This library emulates a SCSI host bus adapter with virtual direct-access
//! targets behind it: raw command descriptor blocks are interpreted against
//! an in-memory block store, and protocol-correct status and sense data are
//! delivered back through a single-consumer completion pipeline.
//!
//! # Example
//!
//! ```no_run
//! use scsi_emulator::{EmulatorAdapter, EmulatorTask, TransferDirection};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let adapter = EmulatorAdapter::builder()
//!     .target_count(1)
//!     .disk_size(20 * 1024 * 1024)
//!     .build()?;
//!
//! // READ CAPACITY on target 0, LUN 0
//! adapter.submit(
//!     EmulatorTask {
//!         task_id: 1,
//!         target: 0,
//!         lun: 0,
//!         cdb: vec![0x25, 0, 0, 0, 0, 0, 0, 0, 0, 0],
//!         direction: TransferDirection::FromTarget,
//!         buffer: vec![0u8; 8],
//!     },
//!     Box::new(|completion| {
//!         println!("status byte 0x{:02X}", completion.status.status_byte());
//!     }),
//! );
//!
//! adapter.wait_idle();
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod error;
pub mod pipeline;
pub mod router;
pub mod scsi;
pub mod sense;
pub mod store;

pub use adapter::{EmulatorAdapter, EmulatorAdapterBuilder, EmulatorTask};
pub use error::{EmulatorError, ScsiResult};
pub use pipeline::{CompletionCallback, ServiceResponse, TaskCompletion};
pub use scsi::{CommandInterpreter, ScsiCommand, TaskStatus, TransferDirection};
pub use sense::SenseData;
pub use store::{BlockStore, BLOCK_LENGTH};

/// Version of this library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
