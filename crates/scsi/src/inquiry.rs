// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Standard Inquiry and Vital Product Data decoding

use serde::Serialize;
use zerocopy::FromBytes;

use crate::{codec, DeviceType, Error};

/// Standard Inquiry data, fixed leading 36 bytes (as on the wire).
#[derive(Debug, FromBytes)]
#[repr(C)]
struct RawInquiry {
    peripheral: u8,
    removable: u8,
    version: u8,
    response_format: u8,
    additional_length: u8,
    flags_byte5: u8,
    flags_byte6: u8,
    flags_byte7: u8,
    vendor_id: [u8; 8],
    product_id: [u8; 16],
    revision: [u8; 4],
}

/// Decoded standard Inquiry data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inquiry {
    /// 3-bit peripheral qualifier (0 = device connected)
    pub qualifier: u8,
    pub device_type: DeviceType,
    pub removable: bool,
    /// Claimed SPC version level
    pub version: u8,
    pub response_format: u8,
    /// Bytes that follow byte 4, as declared by the device
    pub additional_length: u8,
    /// Enclosure services available through this logical unit
    pub enclosure_services: bool,
    pub multi_port: bool,
    pub command_queueing: bool,
    pub vendor: String,
    pub product: String,
    pub revision: String,
    /// Anything past the fixed 36 bytes (vendor-specific, version
    /// descriptors)
    pub extra: Vec<u8>,
}

/// ASCII identification fields are space padded; trim and lossily convert.
fn ascii_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_owned()
}

impl Inquiry {
    /// Decode standard Inquiry data. At least the fixed 36 bytes must be
    /// present.
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        let (raw, extra) =
            RawInquiry::read_from_prefix(buf).map_err(|_| Error::BufferTooShort {
                needed: std::mem::size_of::<RawInquiry>(),
                actual: buf.len(),
            })?;
        Ok(Inquiry {
            qualifier: codec::bits(raw.peripheral, 5, 3),
            device_type: DeviceType::from_code(codec::bits(raw.peripheral, 0, 5)),
            removable: codec::bit(raw.removable, 7),
            version: raw.version,
            response_format: codec::bits(raw.response_format, 0, 4),
            additional_length: raw.additional_length,
            enclosure_services: codec::bit(raw.flags_byte6, 6),
            multi_port: codec::bit(raw.flags_byte6, 4),
            command_queueing: codec::bit(raw.flags_byte7, 1),
            vendor: ascii_field(&raw.vendor_id),
            product: ascii_field(&raw.product_id),
            revision: ascii_field(&raw.revision),
            extra: extra.to_vec(),
        })
    }
}

/// Well-known VPD page codes.
pub mod vpd {
    pub const SUPPORTED_PAGES: u8 = 0x00;
    pub const SERIAL_NUMBER: u8 = 0x80;
    pub const DEVICE_IDENTIFICATION: u8 = 0x83;
}

/// Split a VPD page into (page code, payload past the 4-byte header).
///
/// The payload is capped at the declared page length.
pub fn vpd_payload(buf: &[u8]) -> Result<(u8, &[u8]), Error> {
    if buf.len() < 4 {
        return Err(Error::BufferTooShort {
            needed: 4,
            actual: buf.len(),
        });
    }
    let page_code = buf[1];
    let declared = codec::read_be_at(buf, 2, 2)? as usize;
    let end = (4 + declared).min(buf.len());
    Ok((page_code, &buf[4..end]))
}

/// Decode the Supported VPD Pages page (0x00) into its page-code list.
pub fn decode_supported_pages(buf: &[u8]) -> Result<Vec<u8>, Error> {
    let (_, payload) = vpd_payload(buf)?;
    Ok(payload.to_vec())
}

/// Decode the Unit Serial Number page (0x80).
pub fn decode_serial_number(buf: &[u8]) -> Result<String, Error> {
    let (_, payload) = vpd_payload(buf)?;
    Ok(ascii_field(payload))
}

/// One designation descriptor from the Device Identification page (0x83).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Designator {
    pub protocol: u8,
    /// 1 = binary, 2 = ASCII, 3 = UTF-8
    pub code_set: u8,
    /// 0 = logical unit, 1 = target port, 2 = target device
    pub association: u8,
    /// 1 = T10 vendor id, 2 = EUI-64, 3 = NAA, 8 = SCSI name string, ...
    pub designator_type: u8,
    pub data: Vec<u8>,
}

impl Designator {
    /// Render the identifier: text for ASCII/UTF-8 code sets, hex
    /// otherwise.
    pub fn display(&self) -> String {
        match self.code_set {
            2 | 3 => ascii_field(&self.data),
            _ => self.data.iter().map(|b| format!("{b:02x}")).collect(),
        }
    }
}

/// Decode the Device Identification page (0x83) designator list.
///
/// Designators are self-delimiting; one running past the page truncates
/// the walk, and what was decoded so far is returned.
pub fn decode_device_identification(buf: &[u8]) -> Result<Vec<Designator>, Error> {
    let (_, payload) = vpd_payload(buf)?;
    let mut designators = Vec::new();
    let mut offset = 0;
    while offset + 4 <= payload.len() {
        let length = usize::from(payload[offset + 3]);
        let end = offset + 4 + length;
        if end > payload.len() {
            log::debug!("designator at offset {offset} overruns the page");
            break;
        }
        designators.push(Designator {
            protocol: codec::bits(payload[offset], 4, 4),
            code_set: codec::bits(payload[offset], 0, 4),
            association: codec::bits(payload[offset + 1], 4, 2),
            designator_type: codec::bits(payload[offset + 1], 0, 4),
            data: payload[offset + 4..end].to_vec(),
        });
        offset = end;
    }
    Ok(designators)
}
