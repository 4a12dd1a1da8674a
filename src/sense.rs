//! Canned sense records and static response payloads
//!
//! Everything in this module is immutable, process-wide constant data: the
//! sense records handed out for the emulator's error paths and the fixed
//! INQUIRY / REPORT LUNS payloads it serves. Nothing here ever mutates at
//! runtime.

/// Fixed-format sense data length in bytes
pub const SENSE_DATA_LEN: usize = 18;

/// SCSI status codes
pub mod scsi_status {
    pub const GOOD: u8 = 0x00;
    pub const CHECK_CONDITION: u8 = 0x02;
    pub const TASK_SET_FULL: u8 = 0x28;
}

/// SCSI sense key codes
pub mod sense_key {
    pub const NO_SENSE: u8 = 0x00;
    pub const ILLEGAL_REQUEST: u8 = 0x05;
}

/// Additional Sense Code (ASC) values
pub mod asc {
    pub const INVALID_COMMAND_OPERATION_CODE: u8 = 0x20;
    pub const INVALID_FIELD_IN_CDB: u8 = 0x24;
    pub const LOGICAL_UNIT_NOT_SUPPORTED: u8 = 0x25;
}

/// Response code byte: valid bit set, current errors, fixed format
pub const SENSE_RESPONSE_CODE: u8 = 0x80 | 0x70;

/// SCSI sense data (fixed format)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenseData {
    pub response_code: u8,
    pub segment_number: u8,
    pub sense_key: u8,
    pub information: [u8; 4],
    pub additional_sense_length: u8,
    pub command_specific: [u8; 4],
    pub asc: u8,
    pub ascq: u8,
    pub fru_code: u8,
    pub sense_key_specific: [u8; 3],
}

impl SenseData {
    /// Build a current-error sense record for the given key/ASC/ASCQ
    pub const fn new(sense_key: u8, asc: u8, ascq: u8) -> Self {
        SenseData {
            response_code: SENSE_RESPONSE_CODE,
            segment_number: 0,
            sense_key,
            information: [0; 4],
            // Bytes remaining after the additional-sense-length field
            additional_sense_length: (SENSE_DATA_LEN - 8) as u8,
            command_specific: [0; 4],
            asc,
            ascq,
            fru_code: 0,
            sense_key_specific: [0; 3],
        }
    }

    /// Serialize to the fixed 18-byte format
    pub fn to_bytes(&self) -> [u8; SENSE_DATA_LEN] {
        let mut data = [0u8; SENSE_DATA_LEN];
        data[0] = self.response_code;
        data[1] = self.segment_number;
        data[2] = self.sense_key & 0x0F;
        data[3..7].copy_from_slice(&self.information);
        data[7] = self.additional_sense_length;
        data[8..12].copy_from_slice(&self.command_specific);
        data[12] = self.asc;
        data[13] = self.ascq;
        data[14] = self.fru_code;
        data[15..18].copy_from_slice(&self.sense_key_specific);
        data
    }
}

/// LUN not present behind this target
pub const SENSE_BAD_LUN: SenseData = SenseData::new(
    sense_key::ILLEGAL_REQUEST,
    asc::LOGICAL_UNIT_NOT_SUPPORTED,
    0x00,
);

/// Opcode not implemented by the emulator
pub const SENSE_INVALID_COMMAND: SenseData = SenseData::new(
    sense_key::ILLEGAL_REQUEST,
    asc::INVALID_COMMAND_OPERATION_CODE,
    0x00,
);

/// A field inside an otherwise-known CDB is malformed
pub const SENSE_INVALID_CDB_FIELD: SenseData = SenseData::new(
    sense_key::ILLEGAL_REQUEST,
    asc::INVALID_FIELD_IN_CDB,
    0x00,
);

/// Peripheral qualifier: target does not support a device at this LUN
pub const INQUIRY_QUALIFIER_NOT_SUPPORTED: u8 = 0x60;

/// Peripheral device type: unknown or no device
pub const INQUIRY_TYPE_UNKNOWN_DEVICE: u8 = 0x1F;

/// Standard INQUIRY data (36 bytes)
///
/// Direct-access block device, SPC-3 (VERSION 5), response data format 2,
/// additional length = payload - 5.
pub const STANDARD_INQUIRY: [u8; 36] = [
    0x00, // Peripheral qualifier/device type: direct access
    0x00, // RMB: not removable
    0x05, // VERSION
    0x02, // RESPONSE DATA FORMAT
    31,   // ADDITIONAL LENGTH
    0x00, 0x00, 0x00, // Flags
    b'A', b'p', b'p', b'l', b'e', b'D', b'T', b'S', // T10 vendor (8 bytes)
    b'S', b'C', b'S', b'I', b' ', b'E', b'm', b'u', // Product id (16 bytes)
    b'l', b'a', b't', b'o', b'r', b' ', b' ', 0x00, //
    b'1', b'.', b'0', 0x00, // Product revision (4 bytes)
];

/// INQUIRY VPD page 0x00: supported pages are 0x00 and 0x80
pub const INQUIRY_PAGE_00: [u8; 6] = [0x00, 0x00, 0x00, 0x02, 0x00, 0x80];

/// Serial number reported by VPD page 0x80, null-padded to 31 bytes
const SERIAL_NUMBER: &[u8] = b"Apple Virtual LUN0";

/// INQUIRY VPD page 0x80: unit serial number
pub const INQUIRY_PAGE_80: [u8; 35] = {
    let mut page = [0u8; 35];
    page[1] = 0x80; // Page code
    page[3] = 31; // Page length
    let mut i = 0;
    while i < SERIAL_NUMBER.len() {
        page[4 + i] = SERIAL_NUMBER[i];
        i += 1;
    }
    page
};

/// REPORT LUNS payload: one real LUN (LUN 0)
///
/// Big-endian 32-bit LUN list length (8 bytes per reported LUN), 4 reserved
/// bytes, then one all-zero 8-byte entry.
pub const LUN_REPORT: [u8; 16] = [
    0x00, 0x00, 0x00, 0x08, // LUN list length
    0x00, 0x00, 0x00, 0x00, // Reserved
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // LUN 0
];

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, ByteOrder};

    #[test]
    fn test_sense_data_serialization() {
        let data = SENSE_INVALID_CDB_FIELD.to_bytes();
        assert_eq!(data.len(), SENSE_DATA_LEN);
        assert_eq!(data[0], 0xF0); // Valid, current errors
        assert_eq!(data[2], sense_key::ILLEGAL_REQUEST);
        assert_eq!(data[7], 10);
        assert_eq!(data[12], asc::INVALID_FIELD_IN_CDB);
        assert_eq!(data[13], 0x00);
    }

    #[test]
    fn test_canned_sense_records() {
        assert_eq!(SENSE_BAD_LUN.asc, 0x25);
        assert_eq!(SENSE_INVALID_COMMAND.asc, 0x20);
        assert_eq!(SENSE_INVALID_CDB_FIELD.asc, 0x24);
        for sense in [&SENSE_BAD_LUN, &SENSE_INVALID_COMMAND, &SENSE_INVALID_CDB_FIELD] {
            assert_eq!(sense.sense_key, sense_key::ILLEGAL_REQUEST);
            assert_eq!(sense.ascq, 0x00);
        }
    }

    #[test]
    fn test_standard_inquiry_layout() {
        assert_eq!(STANDARD_INQUIRY[2], 5); // VERSION
        assert_eq!(STANDARD_INQUIRY[3], 2); // RESPONSE DATA FORMAT
        assert_eq!(STANDARD_INQUIRY[4] as usize, STANDARD_INQUIRY.len() - 5);
        assert_eq!(&STANDARD_INQUIRY[8..16], b"AppleDTS");
        assert_eq!(&STANDARD_INQUIRY[32..35], b"1.0");
    }

    #[test]
    fn test_serial_number_page() {
        assert_eq!(INQUIRY_PAGE_80[1], 0x80);
        assert_eq!(INQUIRY_PAGE_80[3], 31);
        assert_eq!(&INQUIRY_PAGE_80[4..22], b"Apple Virtual LUN0");
        assert!(INQUIRY_PAGE_80[22..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_lun_report_declared_length() {
        let list_len = BigEndian::read_u32(&LUN_REPORT[0..4]);
        let reported_luns = (LUN_REPORT.len() - 8) / 8;
        assert_eq!(list_len as usize, 8 * reported_luns);
    }
}
