// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The operation-code registry
//!
//! A static table mapping (opcode, sub-opcode, device type) to per-command
//! defaults: name, data direction, CDB length and how the payload should
//! be interpreted. Sub-opcodes distinguish variants addressed through the
//! same opcode (VPD page codes under INQUIRY, service actions under
//! SERVICE ACTION IN). The table is built once and never mutated.

use crate::cdb::{op, DataDirection};
use crate::DeviceType;

/// Row-level payload interpretation, resolved at table construction.
///
/// This replaces per-row function pointers: callers match on the kind to
/// pick the encode/decode path for the command's data phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// No data phase, or data that is not further interpreted
    Opaque,
    /// Standard Inquiry or VPD page data
    Inquiry,
    /// Sense data returned by REQUEST SENSE
    SenseData,
    /// 8-byte READ CAPACITY(10) parameter data
    ReadCapacity10,
    /// 32-byte READ CAPACITY(16) parameter data
    ReadCapacity16,
    /// An SES diagnostic page
    DiagnosticPage,
    /// Block data addressed by LBA; transfer length counts blocks
    BlockData,
}

/// One immutable registry row.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeEntry {
    pub opcode: u8,
    /// `None` matches any sub-opcode (page code / service action)
    pub sub_opcode: Option<u8>,
    /// Bit-mask of applicable device types ([`DeviceType::mask`])
    pub device_mask: u32,
    pub name: &'static str,
    pub direction: DataDirection,
    /// Fixed CDB length; derived from the group code when absent
    pub cdb_length: Option<usize>,
    /// Transfer length is counted in blocks rather than bytes
    pub default_blocks: bool,
    pub payload: PayloadKind,
}

impl OpcodeEntry {
    /// CDB length for this row, falling back to the group coding.
    pub fn length(&self) -> Option<usize> {
        self.cdb_length.or_else(|| crate::cdb::group_length(self.opcode))
    }
}

/// Applies to every peripheral device type.
pub const ALL_DEVICE_TYPES: u32 = 0xffff_ffff;

/// Direct-access style devices addressed by LBA.
const RANDOM_ACCESS: u32 = 0x0001 | 0x0010 | 0x0080 | 0x4000; // direct, write-once, optical, simplified

macro_rules! entry {
    ($op:expr, $sub:expr, $mask:expr, $name:literal, $dir:expr, $payload:expr, blocks: $blocks:literal) => {
        OpcodeEntry {
            opcode: $op,
            sub_opcode: $sub,
            device_mask: $mask,
            name: $name,
            direction: $dir,
            cdb_length: None,
            default_blocks: $blocks,
            payload: $payload,
        }
    };
    ($op:expr, $sub:expr, $mask:expr, $name:literal, $dir:expr, $payload:expr) => {
        entry!($op, $sub, $mask, $name, $dir, $payload, blocks: false)
    };
}

use crate::cdb::DataDirection::{FromDevice, None as NoData, ToDevice};
use self::PayloadKind::*;

/// The registry. Ordered; lookup is linear and first match wins, so more
/// specific sub-opcode rows precede their wildcard fallback.
static OPCODE_TABLE: &[OpcodeEntry] = &[
    entry!(op::TEST_UNIT_READY, None, ALL_DEVICE_TYPES, "Test Unit Ready", NoData, Opaque),
    entry!(op::REQUEST_SENSE, None, ALL_DEVICE_TYPES, "Request Sense", FromDevice, SenseData),
    entry!(op::INQUIRY, Some(0x00), ALL_DEVICE_TYPES, "Inquiry - Supported Pages", FromDevice, Inquiry),
    entry!(op::INQUIRY, Some(0x80), ALL_DEVICE_TYPES, "Inquiry - Serial Number", FromDevice, Inquiry),
    entry!(op::INQUIRY, Some(0x83), ALL_DEVICE_TYPES, "Inquiry - Device Identification", FromDevice, Inquiry),
    entry!(op::INQUIRY, Some(0x86), ALL_DEVICE_TYPES, "Inquiry - Extended Inquiry Data", FromDevice, Inquiry),
    entry!(op::INQUIRY, Some(0xb0), RANDOM_ACCESS, "Inquiry - Block Limits", FromDevice, Inquiry),
    entry!(op::INQUIRY, Some(0xb2), RANDOM_ACCESS, "Inquiry - Logical Block Provisioning", FromDevice, Inquiry),
    entry!(op::INQUIRY, None, ALL_DEVICE_TYPES, "Inquiry", FromDevice, Inquiry),
    entry!(op::MODE_SENSE_6, None, ALL_DEVICE_TYPES, "Mode Sense(6)", FromDevice, Opaque),
    entry!(op::MODE_SENSE_10, None, ALL_DEVICE_TYPES, "Mode Sense(10)", FromDevice, Opaque),
    entry!(op::RECEIVE_DIAGNOSTIC, None, ALL_DEVICE_TYPES, "Receive Diagnostic", FromDevice, DiagnosticPage),
    entry!(op::SEND_DIAGNOSTIC, None, ALL_DEVICE_TYPES, "Send Diagnostic", ToDevice, DiagnosticPage),
    entry!(op::READ_CAPACITY_10, None, RANDOM_ACCESS, "Read Capacity(10)", FromDevice, ReadCapacity10),
    entry!(op::SERVICE_ACTION_IN_16, Some(0x10), RANDOM_ACCESS, "Read Capacity(16)", FromDevice, ReadCapacity16),
    entry!(op::READ_6, None, RANDOM_ACCESS, "Read(6)", FromDevice, BlockData, blocks: true),
    entry!(op::READ_10, None, RANDOM_ACCESS, "Read(10)", FromDevice, BlockData, blocks: true),
    entry!(op::READ_12, None, RANDOM_ACCESS, "Read(12)", FromDevice, BlockData, blocks: true),
    entry!(op::READ_16, None, RANDOM_ACCESS, "Read(16)", FromDevice, BlockData, blocks: true),
    entry!(op::WRITE_6, None, RANDOM_ACCESS, "Write(6)", ToDevice, BlockData, blocks: true),
    entry!(op::WRITE_10, None, RANDOM_ACCESS, "Write(10)", ToDevice, BlockData, blocks: true),
    entry!(op::WRITE_12, None, RANDOM_ACCESS, "Write(12)", ToDevice, BlockData, blocks: true),
    entry!(op::WRITE_16, None, RANDOM_ACCESS, "Write(16)", ToDevice, BlockData, blocks: true),
    entry!(op::VERIFY_10, None, RANDOM_ACCESS, "Verify(10)", NoData, Opaque, blocks: true),
    entry!(op::SYNCHRONIZE_CACHE_10, None, RANDOM_ACCESS, "Synchronize Cache(10)", NoData, Opaque, blocks: true),
];

/// Look up the registry row for (opcode, sub-opcode) on a device type.
///
/// An exact sub-opcode row is preferred; a wildcard row (sub-opcode
/// `None`) is the fallback. Returns `None` for opcodes the registry does
/// not know, which callers treat as opaque vendor commands, not errors.
pub fn lookup(
    opcode: u8,
    sub_opcode: Option<u8>,
    device_type: DeviceType,
) -> Option<&'static OpcodeEntry> {
    let applicable = |entry: &&OpcodeEntry| {
        entry.opcode == opcode && entry.device_mask & device_type.mask() != 0
    };
    if sub_opcode.is_some() {
        if let Some(entry) = OPCODE_TABLE
            .iter()
            .filter(applicable)
            .find(|e| e.sub_opcode == sub_opcode)
        {
            return Some(entry);
        }
    }
    OPCODE_TABLE
        .iter()
        .filter(applicable)
        .find(|e| e.sub_opcode.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_sub_opcode_preferred() {
        let entry = lookup(op::INQUIRY, Some(0x80), DeviceType::Direct).unwrap();
        assert_eq!(entry.name, "Inquiry - Serial Number");
    }

    #[test]
    fn wildcard_fallback() {
        // No dedicated row for VPD page 0x89; the generic row matches
        let entry = lookup(op::INQUIRY, Some(0x89), DeviceType::Direct).unwrap();
        assert_eq!(entry.name, "Inquiry");
        let entry = lookup(op::INQUIRY, None, DeviceType::Enclosure).unwrap();
        assert_eq!(entry.name, "Inquiry");
    }

    #[test]
    fn device_mask_filters_rows() {
        // Block Limits is a random-access page, not an enclosure one
        assert_eq!(
            lookup(op::INQUIRY, Some(0xb0), DeviceType::Enclosure)
                .unwrap()
                .name,
            "Inquiry"
        );
        assert!(lookup(op::READ_16, None, DeviceType::Enclosure).is_none());
    }

    #[test]
    fn unknown_opcode_is_none() {
        assert!(lookup(0xc1, None, DeviceType::Direct).is_none());
    }

    #[test]
    fn lengths_follow_group_code() {
        let entry = lookup(op::READ_16, None, DeviceType::Direct).unwrap();
        assert_eq!(entry.length(), Some(16));
        let entry = lookup(op::TEST_UNIT_READY, None, DeviceType::Direct).unwrap();
        assert_eq!(entry.length(), Some(6));
    }

    #[test]
    fn block_data_rows_default_to_blocks() {
        assert!(lookup(op::READ_10, None, DeviceType::Direct).unwrap().default_blocks);
        assert!(!lookup(op::INQUIRY, None, DeviceType::Direct).unwrap().default_blocks);
    }
}
