// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Sense data decoding
//!
//! Devices report errors through sense buffers in one of two layouts,
//! discriminated by the error code in byte 0: the legacy fixed format
//! (0x70/0x71) and the descriptor format (0x72/0x73). Decoding never
//! fails: malformed input yields a best-effort record with a `truncated`
//! marker, and bytes that cannot be attributed are kept as an unparsed
//! tail. No walk ever reads past the lesser of the declared and actual
//! buffer lengths.

use log::debug;
use serde::Serialize;

use crate::{codec, tables};

/// Error code values carried in byte 0 (low seven bits).
pub mod error_code {
    pub const CURRENT_FIXED: u8 = 0x70;
    pub const DEFERRED_FIXED: u8 = 0x71;
    pub const CURRENT_DESCRIPTOR: u8 = 0x72;
    pub const DEFERRED_DESCRIPTOR: u8 = 0x73;
    pub const VENDOR_SPECIFIC: u8 = 0x7f;
}

/// The (sense key, ASC, ASCQ) triple extracted from any sense format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SenseErrors {
    pub key: u8,
    pub asc: u8,
    pub ascq: u8,
}

impl SenseErrors {
    /// Human rendering, e.g. `ILLEGAL REQUEST - Invalid field in CDB`.
    pub fn describe(&self) -> String {
        format!(
            "{} - {}",
            tables::sense_key_name(self.key),
            tables::sense_code_label(self.asc, self.ascq)
        )
    }
}

/// Sense-key-specific field interpretation, selected by the sense key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum KeySpecific {
    /// ILLEGAL REQUEST: which CDB/parameter byte (and bit) was at fault
    FieldPointer {
        /// Error is in the CDB (true) or the parameter data (false)
        command_data: bool,
        bit_valid: bool,
        bit: u8,
        field: u16,
    },
    /// Recovered/medium/hardware errors: actual retry count
    ActualRetryCount(u16),
    /// NOT READY / NO SENSE: progress as a fraction of 65536
    ProgressIndication(u16),
    /// COPY ABORTED: segment pointer
    SegmentPointer {
        segment_descriptor: bool,
        bit_valid: bool,
        bit: u8,
        field: u16,
    },
    /// Any other key: raw field bytes
    Raw([u8; 3]),
}

impl KeySpecific {
    /// Interpret the 3 sense-key-specific bytes in the context of `key`.
    /// Returns `None` when the SKSV bit is clear.
    fn decode(key: u8, bytes: [u8; 3]) -> Option<Self> {
        if !codec::bit(bytes[0], 7) {
            return None;
        }
        let field = ((u16::from(bytes[1])) << 8) | u16::from(bytes[2]);
        Some(match key {
            tables::sense_key::ILLEGAL_REQUEST => KeySpecific::FieldPointer {
                command_data: codec::bit(bytes[0], 6),
                bit_valid: codec::bit(bytes[0], 3),
                bit: codec::bits(bytes[0], 0, 3),
                field,
            },
            tables::sense_key::RECOVERED_ERROR
            | tables::sense_key::MEDIUM_ERROR
            | tables::sense_key::HARDWARE_ERROR => KeySpecific::ActualRetryCount(field),
            tables::sense_key::NOT_READY | tables::sense_key::NO_SENSE => {
                KeySpecific::ProgressIndication(field)
            }
            tables::sense_key::COPY_ABORTED => KeySpecific::SegmentPointer {
                segment_descriptor: codec::bit(bytes[0], 5),
                bit_valid: codec::bit(bytes[0], 3),
                bit: codec::bits(bytes[0], 0, 3),
                field,
            },
            _ => KeySpecific::Raw(bytes),
        })
    }
}

/// Fixed-format sense data (error codes 0x70/0x71).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FixedSense {
    /// Deferred error (0x71) rather than current (0x70)
    pub deferred: bool,
    /// The information field holds a valid value
    pub info_valid: bool,
    pub filemark: bool,
    pub end_of_medium: bool,
    pub illegal_length: bool,
    pub sense_key: u8,
    pub information: u32,
    pub command_specific: u32,
    pub asc: u8,
    pub ascq: u8,
    pub fru_code: u8,
    pub key_specific: Option<KeySpecific>,
    /// Additional sense bytes past the standard 18
    pub additional: Vec<u8>,
    /// Buffer ended before the declared additional sense length
    pub truncated: bool,
}

/// One self-delimiting descriptor from descriptor-format sense data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SenseDescriptor {
    /// Type 0x00
    Information { valid: bool, value: u64 },
    /// Type 0x01
    CommandSpecific(u64),
    /// Type 0x02
    SenseKeySpecific(KeySpecific),
    /// Type 0x03
    FieldReplaceableUnit(u8),
    /// Type 0x05
    BlockCommand { illegal_length: bool },
    /// Type 0x09, shared by ATA PASS-THROUGH(12) and (16)
    AtaStatusReturn {
        extend: bool,
        error: u8,
        count: u16,
        lba: u64,
        device: u8,
        status: u8,
    },
    /// Any other type, preserved whole
    Unknown { descriptor_type: u8, data: Vec<u8> },
}

/// Descriptor-format sense data (error codes 0x72/0x73).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DescriptorSense {
    pub deferred: bool,
    pub sense_key: u8,
    pub asc: u8,
    pub ascq: u8,
    pub descriptors: Vec<SenseDescriptor>,
    /// Bytes that could not be consumed as whole descriptors
    pub unparsed: Vec<u8>,
    /// Buffer ended before the declared additional sense length
    pub truncated: bool,
}

/// A decoded sense buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SenseRecord {
    Fixed(FixedSense),
    Descriptor(DescriptorSense),
    /// Error code 0x7f
    VendorSpecific { data: Vec<u8> },
    /// Unrecognized error code or an empty buffer
    Raw { data: Vec<u8> },
}

impl Default for SenseRecord {
    fn default() -> Self {
        SenseRecord::Raw { data: Vec::new() }
    }
}

impl SenseRecord {
    /// Extract the (sense key, ASC, ASCQ) triple; zeroes where absent.
    pub fn classify(&self) -> SenseErrors {
        match self {
            SenseRecord::Fixed(f) => SenseErrors {
                key: f.sense_key,
                asc: f.asc,
                ascq: f.ascq,
            },
            SenseRecord::Descriptor(d) => SenseErrors {
                key: d.sense_key,
                asc: d.asc,
                ascq: d.ascq,
            },
            SenseRecord::VendorSpecific { .. } | SenseRecord::Raw { .. } => SenseErrors::default(),
        }
    }

    /// True when the record carries no error indication at all.
    pub fn is_empty(&self) -> bool {
        match self {
            SenseRecord::Raw { data } => data.iter().all(|b| *b == 0),
            _ => {
                let e = self.classify();
                e.key == 0 && e.asc == 0 && e.ascq == 0
            }
        }
    }
}

/// Decode a sense buffer into a [`SenseRecord`]. Total; never panics.
pub fn decode(buf: &[u8]) -> SenseRecord {
    let Some(&byte0) = buf.first() else {
        return SenseRecord::Raw { data: Vec::new() };
    };
    match codec::bits(byte0, 0, 7) {
        error_code::CURRENT_FIXED => SenseRecord::Fixed(decode_fixed(buf, false)),
        error_code::DEFERRED_FIXED => SenseRecord::Fixed(decode_fixed(buf, true)),
        error_code::CURRENT_DESCRIPTOR => SenseRecord::Descriptor(decode_descriptor(buf, false)),
        error_code::DEFERRED_DESCRIPTOR => SenseRecord::Descriptor(decode_descriptor(buf, true)),
        error_code::VENDOR_SPECIFIC => SenseRecord::VendorSpecific { data: buf.to_vec() },
        code => {
            debug!("unrecognized sense error code {code:#04x}");
            SenseRecord::Raw { data: buf.to_vec() }
        }
    }
}

fn byte_at(buf: &[u8], index: usize, truncated: &mut bool) -> u8 {
    match buf.get(index) {
        Some(b) => *b,
        None => {
            *truncated = true;
            0
        }
    }
}

fn u32_at(buf: &[u8], index: usize, truncated: &mut bool) -> u32 {
    match codec::read_be_at(buf, index, 4) {
        Ok(v) => v as u32,
        Err(_) => {
            *truncated = true;
            0
        }
    }
}

fn decode_fixed(buf: &[u8], deferred: bool) -> FixedSense {
    let mut truncated = false;
    let byte0 = byte_at(buf, 0, &mut truncated);
    let byte2 = byte_at(buf, 2, &mut truncated);

    let sense_key = codec::bits(byte2, 0, 4);
    let declared = usize::from(byte_at(buf, 7, &mut truncated));
    // Total length is 8 + additional sense length, capped by the buffer
    let total = (8 + declared).min(buf.len());
    if 8 + declared > buf.len() {
        truncated = true;
    }

    // Sense-key-specific bytes exist only when the declared length
    // reaches them
    let key_specific = if total >= 18 {
        let bytes = [buf[15], buf[16], buf[17]];
        KeySpecific::decode(sense_key, bytes)
    } else {
        None
    };

    FixedSense {
        deferred,
        info_valid: codec::bit(byte0, 7),
        filemark: codec::bit(byte2, 7),
        end_of_medium: codec::bit(byte2, 6),
        illegal_length: codec::bit(byte2, 5),
        sense_key,
        information: u32_at(buf, 3, &mut truncated),
        command_specific: u32_at(buf, 8, &mut truncated),
        asc: byte_at(buf, 12, &mut truncated),
        ascq: byte_at(buf, 13, &mut truncated),
        fru_code: byte_at(buf, 14, &mut truncated),
        key_specific,
        additional: buf.get(18..total).map(<[u8]>::to_vec).unwrap_or_default(),
        truncated,
    }
}

fn decode_descriptor(buf: &[u8], deferred: bool) -> DescriptorSense {
    let mut truncated = false;
    let sense_key = codec::bits(byte_at(buf, 1, &mut truncated), 0, 4);
    let asc = byte_at(buf, 2, &mut truncated);
    let ascq = byte_at(buf, 3, &mut truncated);
    let declared = usize::from(byte_at(buf, 7, &mut truncated));
    // Descriptors start at byte 8 and span the additional sense length
    let total = (8 + declared).min(buf.len());
    if 8 + declared > buf.len() {
        truncated = true;
    }

    let mut descriptors = Vec::new();
    let mut unparsed = Vec::new();
    let mut offset = 8;
    while offset < total {
        if offset + 2 > total {
            // A lone type byte cannot form a descriptor header
            unparsed.extend_from_slice(&buf[offset..total]);
            truncated = true;
            break;
        }
        let descriptor_type = buf[offset];
        let length = usize::from(buf[offset + 1]);
        let end = offset + 2 + length;
        if end > total {
            // Declared length runs past the walkable region; keep the tail
            unparsed.extend_from_slice(&buf[offset..total]);
            truncated = true;
            break;
        }
        let payload = &buf[offset + 2..end];
        descriptors.push(decode_one_descriptor(
            sense_key,
            descriptor_type,
            payload,
        ));
        offset = end;
    }

    DescriptorSense {
        deferred,
        sense_key,
        asc,
        ascq,
        descriptors,
        unparsed,
        truncated,
    }
}

fn decode_one_descriptor(sense_key: u8, descriptor_type: u8, payload: &[u8]) -> SenseDescriptor {
    let keep_raw = || SenseDescriptor::Unknown {
        descriptor_type,
        data: payload.to_vec(),
    };
    match descriptor_type {
        0x00 if payload.len() >= 10 => SenseDescriptor::Information {
            valid: codec::bit(payload[0], 7),
            value: codec::read_be_at(payload, 2, 8).unwrap_or_default(),
        },
        0x01 if payload.len() >= 10 => SenseDescriptor::CommandSpecific(
            codec::read_be_at(payload, 2, 8).unwrap_or_default(),
        ),
        0x02 if payload.len() >= 5 => {
            let bytes = [payload[2], payload[3], payload[4]];
            match KeySpecific::decode(sense_key, bytes) {
                Some(ks) => SenseDescriptor::SenseKeySpecific(ks),
                None => keep_raw(),
            }
        }
        0x03 if payload.len() >= 2 => SenseDescriptor::FieldReplaceableUnit(payload[1]),
        0x05 if payload.len() >= 2 => SenseDescriptor::BlockCommand {
            illegal_length: codec::bit(payload[1], 5),
        },
        0x09 if payload.len() >= 12 => SenseDescriptor::AtaStatusReturn {
            extend: codec::bit(payload[0], 0),
            error: payload[1],
            count: ((u16::from(payload[2])) << 8) | u16::from(payload[3]),
            lba: codec::read_be_at(payload, 4, 6).unwrap_or_default(),
            device: payload[10],
            status: payload[11],
        },
        _ => keep_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn illegal_request_scenario() {
        // ILLEGAL REQUEST with Invalid field in CDB
        let buf = [
            0x70, 0x00, 0x05, 0, 0, 0, 0, 0x0a, 0, 0, 0, 0, 0x24, 0x00, 0, 0, 0, 0,
        ];
        let record = decode(&buf);
        let SenseRecord::Fixed(ref fixed) = record else {
            panic!("expected fixed format, got {record:?}");
        };
        assert!(!fixed.deferred);
        assert!(!fixed.truncated);
        let errors = record.classify();
        assert_eq!(errors.key, 0x5);
        assert_eq!((errors.asc, errors.ascq), (0x24, 0x00));
        assert_eq!(
            crate::tables::sense_code_text(errors.asc, errors.ascq),
            Some("Invalid field in CDB")
        );
    }

    #[test]
    fn short_buffer_marks_truncated() {
        // Declared additional length of 10 but only 12 bytes supplied
        let buf = [0x70, 0x00, 0x03, 0, 0, 0, 0, 0x0a, 0, 0, 0, 0];
        let SenseRecord::Fixed(fixed) = decode(&buf) else {
            panic!("expected fixed format");
        };
        assert!(fixed.truncated);
        assert_eq!(fixed.sense_key, 0x3);
        // asc/ascq were beyond the buffer and read as zero
        assert_eq!((fixed.asc, fixed.ascq), (0, 0));
    }

    #[test]
    fn fixed_key_specific_field_pointer() {
        let mut buf = [0u8; 18];
        buf[0] = 0x70;
        buf[2] = 0x05;
        buf[7] = 0x0a;
        buf[12] = 0x24;
        buf[15] = 0xc0; // SKSV + C/D
        buf[16] = 0x00;
        buf[17] = 0x04; // field pointer = CDB byte 4
        let SenseRecord::Fixed(fixed) = decode(&buf) else {
            panic!("expected fixed format");
        };
        assert_eq!(
            fixed.key_specific,
            Some(KeySpecific::FieldPointer {
                command_data: true,
                bit_valid: false,
                bit: 0,
                field: 4,
            })
        );
    }

    #[test]
    fn progress_indication_for_not_ready() {
        let mut buf = [0u8; 18];
        buf[0] = 0x70;
        buf[2] = 0x02; // NOT READY
        buf[7] = 0x0a;
        buf[12] = 0x04;
        buf[13] = 0x04; // format in progress
        buf[15] = 0x80; // SKSV
        buf[16] = 0x40;
        buf[17] = 0x00; // 25%
        let SenseRecord::Fixed(fixed) = decode(&buf) else {
            panic!("expected fixed format");
        };
        assert_eq!(
            fixed.key_specific,
            Some(KeySpecific::ProgressIndication(0x4000))
        );
    }

    fn push_descriptor(buf: &mut Vec<u8>, descriptor_type: u8, payload: &[u8]) {
        buf.push(descriptor_type);
        buf.push(payload.len() as u8);
        buf.extend_from_slice(payload);
    }

    #[test]
    fn descriptor_walk_extracts_all_known_types() {
        // One of each known descriptor type, in an arbitrary order
        let mut buf = vec![0x72, 0x03, 0x11, 0x00, 0, 0, 0, 0];
        push_descriptor(&mut buf, 0x03, &[0x00, 0x42]); // FRU
        push_descriptor(
            &mut buf,
            0x00,
            &[0x80, 0, 0, 0, 0, 0, 0, 0, 0x12, 0x34], // information
        );
        push_descriptor(&mut buf, 0x05, &[0x00, 0x20]); // block command, ILI
        push_descriptor(
            &mut buf,
            0x01,
            &[0, 0, 0, 0, 0, 0, 0, 0, 0xab, 0xcd], // command specific
        );
        push_descriptor(&mut buf, 0x02, &[0, 0, 0x80, 0x00, 0x10]); // SKS
        buf[7] = (buf.len() - 8) as u8;

        let SenseRecord::Descriptor(sense) = decode(&buf) else {
            panic!("expected descriptor format");
        };
        assert!(!sense.truncated);
        assert!(sense.unparsed.is_empty());
        assert_eq!(sense.descriptors.len(), 5);
        assert_eq!(sense.descriptors[0], SenseDescriptor::FieldReplaceableUnit(0x42));
        assert_eq!(
            sense.descriptors[1],
            SenseDescriptor::Information {
                valid: true,
                value: 0x1234
            }
        );
        assert_eq!(
            sense.descriptors[2],
            SenseDescriptor::BlockCommand {
                illegal_length: true
            }
        );
        assert_eq!(
            sense.descriptors[3],
            SenseDescriptor::CommandSpecific(0xabcd)
        );
        // MEDIUM ERROR interprets SKS as an actual retry count
        assert_eq!(
            sense.descriptors[4],
            SenseDescriptor::SenseKeySpecific(KeySpecific::ActualRetryCount(0x10))
        );
    }

    #[test]
    fn unknown_descriptor_skipped_by_length() {
        let mut buf = vec![0x72, 0x04, 0x44, 0x00, 0, 0, 0, 0];
        push_descriptor(&mut buf, 0x7e, &[1, 2, 3]); // vendor descriptor
        push_descriptor(&mut buf, 0x03, &[0x00, 0x07]);
        buf[7] = (buf.len() - 8) as u8;

        let SenseRecord::Descriptor(sense) = decode(&buf) else {
            panic!("expected descriptor format");
        };
        assert_eq!(sense.descriptors.len(), 2);
        assert_eq!(
            sense.descriptors[0],
            SenseDescriptor::Unknown {
                descriptor_type: 0x7e,
                data: vec![1, 2, 3]
            }
        );
        assert_eq!(sense.descriptors[1], SenseDescriptor::FieldReplaceableUnit(0x07));
    }

    #[test]
    fn overlong_descriptor_truncates_walk() {
        let mut buf = vec![0x72, 0x0b, 0x00, 0x00, 0, 0, 0, 0];
        push_descriptor(&mut buf, 0x03, &[0x00, 0x01]);
        // Descriptor claiming 0x40 payload bytes that are not there
        buf.extend_from_slice(&[0x00, 0x40, 0xde, 0xad]);
        buf[7] = (buf.len() - 8) as u8;

        let SenseRecord::Descriptor(sense) = decode(&buf) else {
            panic!("expected descriptor format");
        };
        assert!(sense.truncated);
        assert_eq!(sense.descriptors.len(), 1);
        assert_eq!(sense.unparsed, vec![0x00, 0x40, 0xde, 0xad]);
    }

    #[test]
    fn vendor_and_empty_records() {
        assert!(matches!(
            decode(&[0x7f, 1, 2, 3]),
            SenseRecord::VendorSpecific { .. }
        ));
        assert!(decode(&[]).is_empty());
        assert!(decode(&[0u8; 18]).is_empty());
    }

    #[test]
    fn classify_is_total() {
        assert_eq!(decode(&[0x7f, 9, 9]).classify(), SenseErrors::default());
    }
}
