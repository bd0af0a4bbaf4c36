// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The Download Microcode status page (0x0E, read direction)
//!
//! One 16-byte status descriptor per subenclosure reporting the progress
//! of a firmware download. This page does not depend on the Configuration
//! page; subenclosures identify themselves inline.

use log::warn;
use serde::Serialize;

use scsi::codec;

use crate::{page_code, Error};

/// One subenclosure's download status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MicrocodeStatus {
    pub subenclosure_id: u8,
    pub status: u8,
    pub additional_status: u8,
    /// Largest microcode image the subenclosure accepts, in bytes
    pub maximum_size: u32,
    pub expected_buffer_id: u8,
    pub expected_offset: u32,
}

impl MicrocodeStatus {
    /// Human reading of the status code.
    pub fn status_name(&self) -> &'static str {
        match self.status {
            0x00 => "No download microcode operation in progress",
            0x01 => "Download in progress, awaiting more data",
            0x02 => "Download complete, updating storage",
            0x03 => "Updating storage with deferred microcode",
            0x10 => "Complete, no error, starting now",
            0x11 => "Complete, no error, start after hard reset or power cycle",
            0x12 => "Complete, no error, start after power cycle",
            0x13 => "Complete, no error, start after activation",
            0x80 => "Error, discarded, see additional status",
            0x81 => "Error, discarded, image error",
            0x82 => "Timeout, discarded",
            0x83 => "Internal error, new image needed before reset",
            0x84 => "Internal error, hard reset and power cycle safe",
            0x85 => "Processed, deferred activation pending",
            c if c >= 0xf0 => "Vendor specific",
            _ => "Reserved",
        }
    }
}

/// The decoded Download Microcode status page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadMicrocodePage {
    pub generation: u32,
    pub subenclosures: Vec<MicrocodeStatus>,
    pub truncated: bool,
}

/// Decode a Download Microcode status page.
pub fn decode(buf: &[u8]) -> Result<DownloadMicrocodePage, Error> {
    let (header, body) = crate::parse_header(page_code::DOWNLOAD_MICROCODE, buf)?;
    let count = 1 + usize::from(header.byte1);

    let mut subenclosures = Vec::with_capacity(count);
    let mut truncated = header.truncated;
    for index in 0..count {
        let offset = index * 16;
        let Some(descriptor) = body.get(offset..offset + 16) else {
            warn!("download microcode page ends after {index} of {count} descriptors");
            truncated = true;
            break;
        };
        subenclosures.push(MicrocodeStatus {
            subenclosure_id: descriptor[1],
            status: descriptor[2],
            additional_status: descriptor[3],
            maximum_size: codec::read_be_at(descriptor, 4, 4).unwrap_or_default() as u32,
            expected_buffer_id: descriptor[11],
            expected_offset: codec::read_be_at(descriptor, 12, 4).unwrap_or_default() as u32,
        });
    }

    Ok(DownloadMicrocodePage {
        generation: header.generation,
        subenclosures,
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_descriptor() {
        let mut descriptor = [0u8; 16];
        descriptor[1] = 0; // primary subenclosure
        descriptor[2] = 0x01;
        descriptor[4..8].copy_from_slice(&0x0010_0000u32.to_be_bytes());
        descriptor[11] = 2;
        descriptor[12..16].copy_from_slice(&0x8000u32.to_be_bytes());

        let mut page = vec![page_code::DOWNLOAD_MICROCODE, 0x00, 0x00, 0x14];
        page.extend_from_slice(&9u32.to_be_bytes());
        page.extend_from_slice(&descriptor);

        let decoded = decode(&page).unwrap();
        assert_eq!(decoded.generation, 9);
        assert_eq!(decoded.subenclosures.len(), 1);
        let status = &decoded.subenclosures[0];
        assert_eq!(status.status, 0x01);
        assert_eq!(status.status_name(), "Download in progress, awaiting more data");
        assert_eq!(status.maximum_size, 0x0010_0000);
        assert_eq!(status.expected_buffer_id, 2);
        assert_eq!(status.expected_offset, 0x8000);
    }

    #[test]
    fn missing_descriptor_marks_truncated() {
        let mut page = vec![page_code::DOWNLOAD_MICROCODE, 0x01, 0x00, 0x14];
        page.extend_from_slice(&1u32.to_be_bytes());
        page.extend_from_slice(&[0u8; 16]);
        let decoded = decode(&page).unwrap();
        assert!(decoded.truncated);
        assert_eq!(decoded.subenclosures.len(), 1);
    }
}
