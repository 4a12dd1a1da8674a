//! CDB decoding and SCSI command interpretation
//!
//! A raw command descriptor block is decoded into the closed [`ScsiCommand`]
//! enum and dispatched to one handler per variant, so adding an opcode is an
//! exhaustiveness error rather than a silent fall-through. The interpreter
//! emulates a single direct-access block device behind LUN 0.

use byteorder::{BigEndian, ByteOrder};

use crate::sense::{
    scsi_status, SenseData, INQUIRY_PAGE_00, INQUIRY_PAGE_80, INQUIRY_QUALIFIER_NOT_SUPPORTED,
    INQUIRY_TYPE_UNKNOWN_DEVICE, LUN_REPORT, SENSE_BAD_LUN, SENSE_INVALID_CDB_FIELD,
    SENSE_INVALID_COMMAND, STANDARD_INQUIRY,
};
use crate::store::{BlockStore, BLOCK_LENGTH};

/// Number of LUNs backed by a real store (only LUN 0)
pub const NUM_DISK_LUNS: u32 = 1;

/// Largest CDB the emulator accepts
pub const MAX_CDB_LEN: usize = 16;

/// SCSI command opcodes handled by the emulator
pub mod opcodes {
    pub const TEST_UNIT_READY: u8 = 0x00;
    pub const REQUEST_SENSE: u8 = 0x03;
    pub const READ_6: u8 = 0x08;
    pub const WRITE_6: u8 = 0x0A;
    pub const INQUIRY: u8 = 0x12;
    pub const MODE_SENSE_6: u8 = 0x1A;
    pub const START_STOP_UNIT: u8 = 0x1B;
    pub const PREVENT_ALLOW_MEDIUM_REMOVAL: u8 = 0x1E;
    pub const READ_CAPACITY: u8 = 0x25;
    pub const READ_10: u8 = 0x28;
    pub const WRITE_10: u8 = 0x2A;
    pub const VERIFY_10: u8 = 0x2F;
    pub const MODE_SENSE_10: u8 = 0x5A;
    pub const REPORT_LUNS: u8 = 0xA0;
}

/// Direction of the data phase for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferDirection {
    /// No data phase
    #[default]
    None,
    /// Device to host (reads, inquiry data)
    FromTarget,
    /// Host to device (writes)
    ToTarget,
}

/// Outcome of interpreting one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Good,
    CheckCondition(SenseData),
    TaskSetFull,
}

impl TaskStatus {
    /// The SCSI status byte for this outcome
    pub fn status_byte(&self) -> u8 {
        match self {
            TaskStatus::Good => scsi_status::GOOD,
            TaskStatus::CheckCondition(_) => scsi_status::CHECK_CONDITION,
            TaskStatus::TaskSetFull => scsi_status::TASK_SET_FULL,
        }
    }

    /// Sense data attached to a CHECK CONDITION, if any
    pub fn sense(&self) -> Option<&SenseData> {
        match self {
            TaskStatus::CheckCondition(sense) => Some(sense),
            _ => None,
        }
    }

    fn check(sense: SenseData) -> Self {
        TaskStatus::CheckCondition(sense)
    }
}

/// A decoded command descriptor block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScsiCommand {
    TestUnitReady,
    Inquiry {
        cmd_dt: bool,
        evpd: bool,
        page_code: u8,
        allocation_length: u8,
    },
    ReportLuns {
        select_report: u8,
    },
    ReadCapacity,
    Read {
        lba: u32,
        blocks: u32,
    },
    Write {
        lba: u32,
        blocks: u32,
    },
    Verify,
    StartStopUnit,
    PreventAllowMediumRemoval,
    RequestSense,
    ModeSense6,
    ModeSense10,
    Unsupported(u8),
}

impl ScsiCommand {
    /// Decode a raw CDB
    ///
    /// Returns `None` when the CDB is empty or shorter than its opcode's
    /// fixed form requires.
    pub fn decode(cdb: &[u8]) -> Option<Self> {
        let opcode = *cdb.first()?;
        let command = match opcode {
            opcodes::TEST_UNIT_READY => ScsiCommand::TestUnitReady,
            opcodes::INQUIRY => {
                if cdb.len() < 6 {
                    return None;
                }
                ScsiCommand::Inquiry {
                    cmd_dt: cdb[1] & 0x02 != 0,
                    evpd: cdb[1] & 0x01 != 0,
                    page_code: cdb[2],
                    allocation_length: cdb[4],
                }
            }
            opcodes::REPORT_LUNS => {
                if cdb.len() < 12 {
                    return None;
                }
                ScsiCommand::ReportLuns {
                    select_report: cdb[2],
                }
            }
            opcodes::READ_CAPACITY => ScsiCommand::ReadCapacity,
            opcodes::READ_6 | opcodes::WRITE_6 => {
                if cdb.len() < 6 {
                    return None;
                }
                // LBA is the low 21 bits of the first four bytes; a zero
                // length byte means 256 blocks (SBC convention).
                let lba = BigEndian::read_u32(&cdb[0..4]) & 0x001F_FFFF;
                let blocks = match cdb[4] {
                    0 => 256,
                    n => n as u32,
                };
                if opcode == opcodes::READ_6 {
                    ScsiCommand::Read { lba, blocks }
                } else {
                    ScsiCommand::Write { lba, blocks }
                }
            }
            opcodes::READ_10 | opcodes::WRITE_10 => {
                if cdb.len() < 10 {
                    return None;
                }
                let lba = BigEndian::read_u32(&cdb[2..6]);
                let blocks = BigEndian::read_u16(&cdb[7..9]) as u32;
                if opcode == opcodes::READ_10 {
                    ScsiCommand::Read { lba, blocks }
                } else {
                    ScsiCommand::Write { lba, blocks }
                }
            }
            opcodes::VERIFY_10 => ScsiCommand::Verify,
            opcodes::START_STOP_UNIT => ScsiCommand::StartStopUnit,
            opcodes::PREVENT_ALLOW_MEDIUM_REMOVAL => ScsiCommand::PreventAllowMediumRemoval,
            opcodes::REQUEST_SENSE => ScsiCommand::RequestSense,
            opcodes::MODE_SENSE_6 => ScsiCommand::ModeSense6,
            opcodes::MODE_SENSE_10 => ScsiCommand::ModeSense10,
            other => ScsiCommand::Unsupported(other),
        };
        Some(command)
    }
}

/// Emulated SCSI target device
///
/// Interprets commands against its in-memory store and produces status and
/// sense exactly as a physical direct-access device would. Interpretation is
/// synchronous and never blocks; every path returns a well-formed status.
pub struct CommandInterpreter {
    store: BlockStore,
}

impl CommandInterpreter {
    pub fn new(store: BlockStore) -> Self {
        CommandInterpreter { store }
    }

    /// The backing store's capacity in bytes
    pub fn capacity(&self) -> u64 {
        self.store.capacity()
    }

    /// Interpret one command
    ///
    /// `data` is the task's data buffer: the source for host-to-device
    /// transfers and the destination for device-to-host transfers. Its
    /// length bounds the transfer; longer requests are silently clipped.
    /// Returns the task status and the number of bytes transferred.
    pub fn interpret(
        &mut self,
        lun: u32,
        cdb: &[u8],
        direction: TransferDirection,
        data: &mut [u8],
    ) -> (TaskStatus, u64) {
        let Some(&opcode) = cdb.first() else {
            return (TaskStatus::check(SENSE_INVALID_COMMAND), 0);
        };

        // A request beyond the available LUNs answers as "no device", except
        // INQUIRY, which must be served for every addressable LUN.
        if lun >= NUM_DISK_LUNS && opcode != opcodes::INQUIRY {
            return self.no_device_response(cdb, data);
        }

        let Some(command) = ScsiCommand::decode(cdb) else {
            return (TaskStatus::check(SENSE_INVALID_COMMAND), 0);
        };

        log::debug!(
            "interpreting {:?} on lun {} (direction {:?}, buffer {} bytes)",
            command,
            lun,
            direction,
            data.len()
        );

        match command {
            ScsiCommand::TestUnitReady => (TaskStatus::Good, 0),
            ScsiCommand::Inquiry {
                cmd_dt,
                evpd,
                page_code,
                allocation_length,
            } => self.inquiry(cmd_dt, evpd, page_code, allocation_length, data),
            ScsiCommand::ReportLuns { select_report } => self.report_luns(select_report, data),
            ScsiCommand::ReadCapacity => self.read_capacity(data),
            ScsiCommand::Read { lba, blocks } => self.read(lba, blocks, data),
            ScsiCommand::Write { lba, blocks } => self.write(lba, blocks, data),
            ScsiCommand::Verify
            | ScsiCommand::StartStopUnit
            | ScsiCommand::PreventAllowMediumRemoval => (TaskStatus::Good, 0),
            // The sample device deliberately leaves these unimplemented and
            // answers INVALID COMMAND; preserved as-is.
            ScsiCommand::RequestSense | ScsiCommand::ModeSense6 | ScsiCommand::ModeSense10 => {
                (TaskStatus::check(SENSE_INVALID_COMMAND), 0)
            }
            ScsiCommand::Unsupported(op) => {
                log::warn!("unsupported opcode 0x{:02X}", op);
                (TaskStatus::check(SENSE_INVALID_COMMAND), 0)
            }
        }
    }

    /// Minimal "no device here" INQUIRY shape for an unbacked LUN
    fn no_device_response(&self, cdb: &[u8], data: &mut [u8]) -> (TaskStatus, u64) {
        let allocation_length = cdb.get(4).copied().unwrap_or(0) as usize;
        let len = data.len().min(allocation_length);
        if len > 0 {
            data[..len].fill(0);
            data[0] = INQUIRY_QUALIFIER_NOT_SUPPORTED | INQUIRY_TYPE_UNKNOWN_DEVICE;
        }
        (TaskStatus::check(SENSE_BAD_LUN), len as u64)
    }

    fn inquiry(
        &self,
        cmd_dt: bool,
        evpd: bool,
        page_code: u8,
        allocation_length: u8,
        data: &mut [u8],
    ) -> (TaskStatus, u64) {
        if !evpd {
            if cmd_dt {
                // CmdDT set without EVPD is a malformed combination
                return (TaskStatus::check(SENSE_INVALID_CDB_FIELD), 0);
            }
            // Standard page, zero-padded out to the allocation length
            let len = data.len().min(allocation_length as usize);
            data[..len].fill(0);
            let copied = len.min(STANDARD_INQUIRY.len());
            data[..copied].copy_from_slice(&STANDARD_INQUIRY[..copied]);
            return (TaskStatus::Good, len as u64);
        }

        match page_code {
            0x00 => serve_page(&INQUIRY_PAGE_00, data),
            0x80 => serve_page(&INQUIRY_PAGE_80, data),
            _ => (TaskStatus::check(SENSE_INVALID_CDB_FIELD), 0),
        }
    }

    fn report_luns(&self, select_report: u8, data: &mut [u8]) -> (TaskStatus, u64) {
        match select_report {
            // 0: LUN addressing, 1: well-known LUNs only, 2: all LUNs.
            // The static list is the answer to all three.
            0 | 1 | 2 => serve_page(&LUN_REPORT, data),
            _ => (TaskStatus::check(SENSE_INVALID_COMMAND), 0),
        }
    }

    fn read_capacity(&self, data: &mut [u8]) -> (TaskStatus, u64) {
        let mut payload = [0u8; 8];
        BigEndian::write_u32(&mut payload[0..4], self.store.max_lba());
        BigEndian::write_u32(&mut payload[4..8], BLOCK_LENGTH);
        serve_page(&payload, data)
    }

    fn read(&self, lba: u32, blocks: u32, data: &mut [u8]) -> (TaskStatus, u64) {
        let offset = lba as u64 * BLOCK_LENGTH as u64;
        let requested = blocks as u64 * BLOCK_LENGTH as u64;
        if requested == 0 {
            return (TaskStatus::Good, 0);
        }
        let len = requested.min(data.len() as u64) as usize;
        match self.store.read(offset, &mut data[..len]) {
            Ok(()) => (TaskStatus::Good, len as u64),
            Err(err) => {
                log::warn!("read of {} blocks at lba {} rejected: {}", blocks, lba, err);
                (TaskStatus::check(SENSE_INVALID_CDB_FIELD), 0)
            }
        }
    }

    fn write(&mut self, lba: u32, blocks: u32, data: &mut [u8]) -> (TaskStatus, u64) {
        let offset = lba as u64 * BLOCK_LENGTH as u64;
        let requested = blocks as u64 * BLOCK_LENGTH as u64;
        if requested == 0 {
            return (TaskStatus::Good, 0);
        }
        let len = requested.min(data.len() as u64) as usize;
        match self.store.write(offset, &data[..len]) {
            Ok(()) => (TaskStatus::Good, len as u64),
            Err(err) => {
                log::warn!("write of {} blocks at lba {} rejected: {}", blocks, lba, err);
                (TaskStatus::check(SENSE_INVALID_CDB_FIELD), 0)
            }
        }
    }
}

/// Copy a canned payload into the task buffer, clipped to its capacity
fn serve_page(page: &[u8], data: &mut [u8]) -> (TaskStatus, u64) {
    let len = page.len().min(data.len());
    data[..len].copy_from_slice(&page[..len]);
    (TaskStatus::Good, len as u64)
}

// ============================================================================
// Unit Tests
// ============================================================================
