// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Symbol tables resolving numeric protocol codes to human text
//!
//! Every table is an ordered static slice searched linearly, first match
//! wins. ASC/ASCQ rows may wildcard the qualifier (`None` matches any
//! qualifier for that code). Unknown values never fail a lookup; they
//! classify by numeric range instead.

/// SCSI status byte values.
pub mod status {
    pub const GOOD: u8 = 0x00;
    pub const CHECK_CONDITION: u8 = 0x02;
    pub const CONDITION_MET: u8 = 0x04;
    pub const BUSY: u8 = 0x08;
    pub const INTERMEDIATE: u8 = 0x10;
    pub const INTERMEDIATE_CONDITION_MET: u8 = 0x14;
    pub const RESERVATION_CONFLICT: u8 = 0x18;
    pub const COMMAND_TERMINATED: u8 = 0x22;
    pub const QUEUE_FULL: u8 = 0x28;
    pub const ACA_ACTIVE: u8 = 0x30;
    pub const TASK_ABORTED: u8 = 0x40;
}

/// Sense key values.
pub mod sense_key {
    pub const NO_SENSE: u8 = 0x0;
    pub const RECOVERED_ERROR: u8 = 0x1;
    pub const NOT_READY: u8 = 0x2;
    pub const MEDIUM_ERROR: u8 = 0x3;
    pub const HARDWARE_ERROR: u8 = 0x4;
    pub const ILLEGAL_REQUEST: u8 = 0x5;
    pub const UNIT_ATTENTION: u8 = 0x6;
    pub const DATA_PROTECT: u8 = 0x7;
    pub const BLANK_CHECK: u8 = 0x8;
    pub const VENDOR_SPECIFIC: u8 = 0x9;
    pub const COPY_ABORTED: u8 = 0xa;
    pub const ABORTED_COMMAND: u8 = 0xb;
    pub const VOLUME_OVERFLOW: u8 = 0xd;
    pub const MISCOMPARE: u8 = 0xe;
}

static STATUS_NAMES: &[(u8, &str)] = &[
    (status::GOOD, "GOOD"),
    (status::CHECK_CONDITION, "CHECK CONDITION"),
    (status::CONDITION_MET, "CONDITION MET"),
    (status::BUSY, "BUSY"),
    (status::INTERMEDIATE, "INTERMEDIATE"),
    (status::INTERMEDIATE_CONDITION_MET, "INTERMEDIATE-CONDITION MET"),
    (status::RESERVATION_CONFLICT, "RESERVATION CONFLICT"),
    (status::COMMAND_TERMINATED, "COMMAND TERMINATED"),
    (status::QUEUE_FULL, "TASK SET FULL"),
    (status::ACA_ACTIVE, "ACA ACTIVE"),
    (status::TASK_ABORTED, "TASK ABORTED"),
];

/// Resolve a SCSI status byte to its name.
pub fn status_name(code: u8) -> &'static str {
    STATUS_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or("Unknown or Reserved")
}

static SENSE_KEY_NAMES: [&str; 16] = [
    "NO SENSE",
    "RECOVERED ERROR",
    "NOT READY",
    "MEDIUM ERROR",
    "HARDWARE ERROR",
    "ILLEGAL REQUEST",
    "UNIT ATTENTION",
    "DATA PROTECT",
    "BLANK CHECK",
    "VENDOR SPECIFIC",
    "COPY ABORTED",
    "ABORTED COMMAND",
    "EQUAL (obsolete)",
    "VOLUME OVERFLOW",
    "MISCOMPARE",
    "RESERVED",
];

/// Resolve a sense key (low 4 bits used) to its name.
pub fn sense_key_name(key: u8) -> &'static str {
    SENSE_KEY_NAMES[usize::from(key & 0x0f)]
}

/// One additional-sense-code row. A `None` qualifier matches any ASCQ.
struct AscEntry {
    asc: u8,
    ascq: Option<u8>,
    text: &'static str,
}

macro_rules! asc {
    ($asc:literal, $ascq:literal, $text:literal) => {
        AscEntry {
            asc: $asc,
            ascq: Some($ascq),
            text: $text,
        }
    };
    ($asc:literal, *, $text:literal) => {
        AscEntry {
            asc: $asc,
            ascq: None,
            text: $text,
        }
    };
}

/// Additional sense code/qualifier messages, ordered by (ASC, ASCQ).
///
/// A condensed rendition of the SPC tables; unlisted combinations fall
/// back to range-based classification in [`sense_code_text`].
static SENSE_CODES: &[AscEntry] = &[
    asc!(0x00, 0x00, "No additional sense information"),
    asc!(0x00, 0x06, "I/O process terminated"),
    asc!(0x00, 0x16, "Operation in progress"),
    asc!(0x00, 0x17, "Cleaning requested"),
    asc!(0x00, 0x1d, "ATA pass through information available"),
    asc!(0x01, 0x00, "No index/sector signal"),
    asc!(0x02, 0x00, "No seek complete"),
    asc!(0x03, 0x00, "Peripheral device write fault"),
    asc!(0x04, 0x00, "Logical unit not ready, cause not reportable"),
    asc!(0x04, 0x01, "Logical unit is in process of becoming ready"),
    asc!(0x04, 0x02, "Logical unit not ready, initializing command required"),
    asc!(0x04, 0x03, "Logical unit not ready, manual intervention required"),
    asc!(0x04, 0x04, "Logical unit not ready, format in progress"),
    asc!(0x04, 0x05, "Logical unit not ready, rebuild in progress"),
    asc!(0x04, 0x06, "Logical unit not ready, recalculation in progress"),
    asc!(0x04, 0x07, "Logical unit not ready, operation in progress"),
    asc!(0x04, 0x08, "Logical unit not ready, long write in progress"),
    asc!(0x04, 0x09, "Logical unit not ready, self-test in progress"),
    asc!(0x04, 0x0a, "Logical unit not accessible, asymmetric access state transition"),
    asc!(0x04, 0x0b, "Logical unit not accessible, target port in standby state"),
    asc!(0x04, 0x0c, "Logical unit not accessible, target port in unavailable state"),
    asc!(0x04, 0x11, "Logical unit not ready, notify (enable spinup) required"),
    asc!(0x04, 0x14, "Logical unit not ready, space allocation in progress"),
    asc!(0x04, 0x1c, "Logical unit not ready, additional power use not yet granted"),
    asc!(0x05, 0x00, "Logical unit does not respond to selection"),
    asc!(0x06, 0x00, "No reference position found"),
    asc!(0x07, 0x00, "Multiple peripheral devices selected"),
    asc!(0x08, 0x00, "Logical unit communication failure"),
    asc!(0x08, 0x01, "Logical unit communication time-out"),
    asc!(0x08, 0x02, "Logical unit communication parity error"),
    asc!(0x09, 0x00, "Track following error"),
    asc!(0x0a, 0x00, "Error log overflow"),
    asc!(0x0b, 0x00, "Warning"),
    asc!(0x0b, 0x01, "Warning - specified temperature exceeded"),
    asc!(0x0c, 0x00, "Write error"),
    asc!(0x0c, 0x02, "Write error - auto reallocation failed"),
    asc!(0x0e, 0x01, "Information unit too short"),
    asc!(0x0e, 0x02, "Information unit too long"),
    asc!(0x10, 0x00, "ID CRC or ECC error"),
    asc!(0x11, 0x00, "Unrecovered read error"),
    asc!(0x11, 0x01, "Read retries exhausted"),
    asc!(0x11, 0x02, "Error too long to correct"),
    asc!(0x11, 0x04, "Unrecovered read error - auto reallocate failed"),
    asc!(0x12, 0x00, "Address mark not found for ID field"),
    asc!(0x13, 0x00, "Address mark not found for DATA field"),
    asc!(0x14, 0x00, "Recorded entity not found"),
    asc!(0x14, 0x01, "Record not found"),
    asc!(0x15, 0x00, "Random positioning error"),
    asc!(0x15, 0x01, "Mechanical positioning error"),
    asc!(0x16, 0x00, "Data synchronization mark error"),
    asc!(0x17, 0x00, "Recovered data with no error correction applied"),
    asc!(0x17, 0x01, "Recovered data with retries"),
    asc!(0x18, 0x00, "Recovered data with error correction applied"),
    asc!(0x1a, 0x00, "Parameter list length error"),
    asc!(0x1b, 0x00, "Synchronous data transfer error"),
    asc!(0x1d, 0x00, "Miscompare during verify operation"),
    asc!(0x20, 0x00, "Invalid command operation code"),
    asc!(0x21, 0x00, "Logical block address out of range"),
    asc!(0x21, 0x01, "Invalid element address"),
    asc!(0x22, 0x00, "Illegal function"),
    asc!(0x24, 0x00, "Invalid field in CDB"),
    asc!(0x24, 0x01, "CDB decryption error"),
    asc!(0x25, 0x00, "Logical unit not supported"),
    asc!(0x26, 0x00, "Invalid field in parameter list"),
    asc!(0x26, 0x01, "Parameter not supported"),
    asc!(0x26, 0x02, "Parameter value invalid"),
    asc!(0x27, 0x00, "Write protected"),
    asc!(0x28, 0x00, "Not ready to ready change, medium may have changed"),
    asc!(0x29, 0x00, "Power on, reset, or bus device reset occurred"),
    asc!(0x29, 0x01, "Power on occurred"),
    asc!(0x29, 0x02, "SCSI bus reset occurred"),
    asc!(0x29, 0x03, "Bus device reset function occurred"),
    asc!(0x29, 0x04, "Device internal reset"),
    asc!(0x29, 0x07, "I_T nexus loss occurred"),
    asc!(0x2a, 0x00, "Parameters changed"),
    asc!(0x2a, 0x01, "Mode parameters changed"),
    asc!(0x2a, 0x02, "Log parameters changed"),
    asc!(0x2a, 0x03, "Reservations preempted"),
    asc!(0x2a, 0x09, "Capacity data has changed"),
    asc!(0x2c, 0x00, "Command sequence error"),
    asc!(0x2e, 0x00, "Insufficient time for operation"),
    asc!(0x2f, 0x00, "Commands cleared by another initiator"),
    asc!(0x30, 0x00, "Incompatible medium installed"),
    asc!(0x31, 0x00, "Medium format corrupted"),
    asc!(0x32, 0x00, "No defect spare location available"),
    asc!(0x35, 0x00, "Enclosure services failure"),
    asc!(0x35, 0x01, "Unsupported enclosure function"),
    asc!(0x35, 0x02, "Enclosure services unavailable"),
    asc!(0x35, 0x03, "Enclosure services transfer failure"),
    asc!(0x35, 0x04, "Enclosure services transfer refused"),
    asc!(0x35, 0x05, "Enclosure services checksum error"),
    asc!(0x37, 0x00, "Rounded parameter"),
    asc!(0x39, 0x00, "Saving parameters not supported"),
    asc!(0x3a, 0x00, "Medium not present"),
    asc!(0x3d, 0x00, "Invalid bits in identify message"),
    asc!(0x3e, 0x00, "Logical unit has not self-configured yet"),
    asc!(0x3e, 0x01, "Logical unit failure"),
    asc!(0x3e, 0x02, "Timeout on logical unit"),
    asc!(0x3f, 0x00, "Target operating conditions have changed"),
    asc!(0x3f, 0x01, "Microcode has been changed"),
    asc!(0x3f, 0x02, "Changed operating definition"),
    asc!(0x3f, 0x03, "Inquiry data has changed"),
    asc!(0x3f, 0x0e, "Reported LUNs data has changed"),
    // Component code is carried in the qualifier
    asc!(0x40, *, "Diagnostic failure on component"),
    asc!(0x43, 0x00, "Message error"),
    asc!(0x44, 0x00, "Internal target failure"),
    asc!(0x45, 0x00, "Select or reselect failure"),
    asc!(0x46, 0x00, "Unsuccessful soft reset"),
    asc!(0x47, 0x00, "SCSI parity error"),
    asc!(0x48, 0x00, "Initiator detected error message received"),
    asc!(0x49, 0x00, "Invalid message error"),
    asc!(0x4a, 0x00, "Command phase error"),
    asc!(0x4b, 0x00, "Data phase error"),
    asc!(0x4c, 0x00, "Logical unit failed self-configuration"),
    // Task tag is carried in the qualifier
    asc!(0x4d, *, "Tagged overlapped commands"),
    asc!(0x4e, 0x00, "Overlapped commands attempted"),
    asc!(0x53, 0x00, "Media load or eject failed"),
    asc!(0x55, 0x00, "System resource failure"),
    asc!(0x55, 0x01, "System buffer full"),
    asc!(0x5a, 0x00, "Operator request or state change input"),
    asc!(0x5d, 0x00, "Failure prediction threshold exceeded"),
    asc!(0x5e, 0x00, "Low power condition on"),
    asc!(0x65, 0x00, "Voltage fault"),
    // Algorithm id is carried in the qualifier
    asc!(0x70, *, "Decompression exception, short algorithm id"),
    asc!(0x74, 0x00, "Security error"),
];

/// First-match lookup of an (ASC, ASCQ) message.
pub fn sense_code_text(asc: u8, ascq: u8) -> Option<&'static str> {
    SENSE_CODES
        .iter()
        .find(|e| e.asc == asc && e.ascq.map(|q| q == ascq).unwrap_or(true))
        .map(|e| e.text)
}

/// Resolve an (ASC, ASCQ) pair, classifying unknown codes by range.
pub fn sense_code_label(asc: u8, ascq: u8) -> String {
    if let Some(text) = sense_code_text(asc, ascq) {
        return text.to_owned();
    }
    if asc >= 0x80 || ascq >= 0x80 {
        format!("Vendor specific sense code ({asc:#04x}, {ascq:#04x})")
    } else {
        format!("Reserved sense code ({asc:#04x}, {ascq:#04x})")
    }
}

/// Linux SCSI midlayer host (HBA) status codes.
pub mod host_status {
    pub const DID_OK: u16 = 0x00;
    pub const DID_NO_CONNECT: u16 = 0x01;
    pub const DID_BUS_BUSY: u16 = 0x02;
    pub const DID_TIME_OUT: u16 = 0x03;
    pub const DID_BAD_TARGET: u16 = 0x04;
    pub const DID_ABORT: u16 = 0x05;
    pub const DID_PARITY: u16 = 0x06;
    pub const DID_ERROR: u16 = 0x07;
    pub const DID_RESET: u16 = 0x08;
    pub const DID_BAD_INTR: u16 = 0x09;
    pub const DID_PASSTHROUGH: u16 = 0x0a;
    pub const DID_SOFT_ERROR: u16 = 0x0b;
    pub const DID_IMM_RETRY: u16 = 0x0c;
    pub const DID_REQUEUE: u16 = 0x0d;
    pub const DID_TRANSPORT_DISRUPTED: u16 = 0x0e;
    pub const DID_TRANSPORT_FAILFAST: u16 = 0x0f;
}

static HOST_STATUS_NAMES: &[(u16, &str)] = &[
    (host_status::DID_OK, "DID_OK"),
    (host_status::DID_NO_CONNECT, "DID_NO_CONNECT"),
    (host_status::DID_BUS_BUSY, "DID_BUS_BUSY"),
    (host_status::DID_TIME_OUT, "DID_TIME_OUT"),
    (host_status::DID_BAD_TARGET, "DID_BAD_TARGET"),
    (host_status::DID_ABORT, "DID_ABORT"),
    (host_status::DID_PARITY, "DID_PARITY"),
    (host_status::DID_ERROR, "DID_ERROR"),
    (host_status::DID_RESET, "DID_RESET"),
    (host_status::DID_BAD_INTR, "DID_BAD_INTR"),
    (host_status::DID_PASSTHROUGH, "DID_PASSTHROUGH"),
    (host_status::DID_SOFT_ERROR, "DID_SOFT_ERROR"),
    (host_status::DID_IMM_RETRY, "DID_IMM_RETRY"),
    (host_status::DID_REQUEUE, "DID_REQUEUE"),
    (host_status::DID_TRANSPORT_DISRUPTED, "DID_TRANSPORT_DISRUPTED"),
    (host_status::DID_TRANSPORT_FAILFAST, "DID_TRANSPORT_FAILFAST"),
];

pub fn host_status_name(code: u16) -> &'static str {
    HOST_STATUS_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or("Unknown host status")
}

static DRIVER_STATUS_NAMES: &[(u16, &str)] = &[
    (0x00, "DRIVER_OK"),
    (0x01, "DRIVER_BUSY"),
    (0x02, "DRIVER_SOFT"),
    (0x03, "DRIVER_MEDIA"),
    (0x04, "DRIVER_ERROR"),
    (0x05, "DRIVER_INVALID"),
    (0x06, "DRIVER_TIMEOUT"),
    (0x07, "DRIVER_HARD"),
    (0x08, "DRIVER_SENSE"),
];

pub fn driver_status_name(code: u16) -> &'static str {
    // The low nibble carries the status; the high nibble carries suggestions
    DRIVER_STATUS_NAMES
        .iter()
        .find(|(c, _)| *c == code & 0x0f)
        .map(|(_, name)| *name)
        .unwrap_or("Unknown driver status")
}
