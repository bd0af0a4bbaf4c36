// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The Configuration diagnostic page (0x01)
//!
//! Enumerates the enclosure layout: one enclosure descriptor per
//! subenclosure, followed by the type descriptor headers of every
//! subenclosure in order, followed by one optional text block per type
//! descriptor, consumed in the same order. The generation number changes
//! whenever the topology changes and gates every dependent page decode.

use serde::Serialize;

use scsi::codec;

use crate::element::ElementType;
use crate::{page_code, Error};

/// One subenclosure's identity block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnclosureDescriptor {
    /// Number of enclosure services processes (byte 0, bits 0-2)
    pub process_count: u8,
    /// Relative enclosure services process id (byte 0, bits 4-6)
    pub process_id: u8,
    pub subenclosure_id: u8,
    /// Count of type descriptor headers belonging to this subenclosure
    pub type_descriptor_count: u8,
    pub logical_id: u64,
    pub vendor: String,
    pub product: String,
    pub revision: String,
    pub vendor_data: Vec<u8>,
}

/// One type descriptor header plus its text block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDescriptor {
    pub element_type: ElementType,
    /// Number of possible individual elements of this type
    pub count: u8,
    pub subenclosure_id: u8,
    pub text: Option<String>,
}

/// The decoded Configuration page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigurationPage {
    pub generation: u32,
    pub subenclosures: Vec<EnclosureDescriptor>,
    /// Type descriptors in declared order; this ordering attributes the
    /// records of every dependent page
    pub type_descriptors: Vec<TypeDescriptor>,
}

impl ConfigurationPage {
    /// Total records a Status/Control page carries: one overall record
    /// plus `count` individual records per type descriptor.
    pub fn total_records(&self) -> usize {
        self.type_descriptors
            .iter()
            .map(|t| 1 + usize::from(t.count))
            .sum()
    }

    /// Total individual elements, excluding the overall records.
    pub fn total_elements(&self) -> usize {
        self.type_descriptors
            .iter()
            .map(|t| usize::from(t.count))
            .sum()
    }
}

fn take<'a>(buf: &'a [u8], offset: &mut usize, len: usize) -> Result<&'a [u8], Error> {
    let end = *offset + len;
    let slice = buf.get(*offset..end).ok_or(scsi::Error::BufferTooShort {
        needed: end,
        actual: buf.len(),
    })?;
    *offset = end;
    Ok(slice)
}

/// Decode a Configuration page buffer.
pub fn decode(buf: &[u8]) -> Result<ConfigurationPage, Error> {
    let (header, body) = crate::parse_header(page_code::CONFIGURATION, buf)?;
    // Byte 1 counts *secondary* subenclosures; the primary is always there
    let subenclosure_count = 1 + usize::from(header.byte1);
    let generation = header.generation;

    let mut offset = 0;
    let mut subenclosures = Vec::with_capacity(subenclosure_count);
    for _ in 0..subenclosure_count {
        let head = take(body, &mut offset, 4)?;
        let descriptor_length = usize::from(head[3]);
        let rest = take(body, &mut offset, descriptor_length)?;
        // Identity fields are fixed-position; shorter vendor descriptors
        // simply omit the tail
        let field = |range: std::ops::Range<usize>| rest.get(range).unwrap_or_default();
        subenclosures.push(EnclosureDescriptor {
            process_count: codec::bits(head[0], 0, 3),
            process_id: codec::bits(head[0], 4, 3),
            subenclosure_id: head[1],
            type_descriptor_count: head[2],
            logical_id: codec::read_be_at(rest, 0, 8).unwrap_or_default(),
            vendor: String::from_utf8_lossy(field(8..16)).trim().to_owned(),
            product: String::from_utf8_lossy(field(16..32)).trim().to_owned(),
            revision: String::from_utf8_lossy(field(32..36)).trim().to_owned(),
            vendor_data: rest.get(36..).unwrap_or_default().to_vec(),
        });
    }

    // All type descriptor headers, across subenclosures in order
    let total_types: usize = subenclosures
        .iter()
        .map(|s| usize::from(s.type_descriptor_count))
        .sum();
    let mut type_descriptors = Vec::with_capacity(total_types);
    let mut text_lengths = Vec::with_capacity(total_types);
    for _ in 0..total_types {
        let head = take(body, &mut offset, 4)?;
        type_descriptors.push(TypeDescriptor {
            element_type: ElementType::from_code(head[0]),
            count: head[1],
            subenclosure_id: head[2],
            text: None,
        });
        text_lengths.push(usize::from(head[3]));
    }

    // One text block per type descriptor, in the same order
    for (descriptor, text_length) in type_descriptors.iter_mut().zip(text_lengths) {
        if text_length == 0 {
            continue;
        }
        let text = take(body, &mut offset, text_length)?;
        descriptor.text = Some(String::from_utf8_lossy(text).trim_end().to_owned());
    }

    Ok(ConfigurationPage {
        generation,
        subenclosures,
        type_descriptors,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a configuration page for the given (type, count, text) list.
    pub(crate) fn build_page(generation: u32, types: &[(ElementType, u8, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        // Enclosure descriptor: fixed 36-byte identity block
        body.extend_from_slice(&[0x11, 0x00, types.len() as u8, 36]);
        body.extend_from_slice(&0x5000_ccab_0000_0001u64.to_be_bytes());
        body.extend_from_slice(b"HGST    ");
        body.extend_from_slice(b"4U60G2_STOR_ENCL");
        body.extend_from_slice(b"3.04");
        for (element_type, count, text) in types {
            body.extend_from_slice(&[
                element_type.code(),
                *count,
                0x00,
                text.len() as u8,
            ]);
        }
        for (_, _, text) in types {
            body.extend_from_slice(text.as_bytes());
        }

        let mut page = vec![page_code::CONFIGURATION, 0x00];
        page.extend_from_slice(&((body.len() + 4) as u16).to_be_bytes());
        page.extend_from_slice(&generation.to_be_bytes());
        page.extend_from_slice(&body);
        page
    }

    #[test]
    fn decodes_single_subenclosure() {
        let buf = build_page(
            7,
            &[
                (ElementType::ArrayDeviceSlot, 60, "Drive Slots"),
                (ElementType::PowerSupply, 2, ""),
                (ElementType::Cooling, 4, "Fans"),
            ],
        );
        let page = decode(&buf).unwrap();
        assert_eq!(page.generation, 7);
        assert_eq!(page.subenclosures.len(), 1);

        let enclosure = &page.subenclosures[0];
        assert_eq!(enclosure.process_count, 1);
        assert_eq!(enclosure.type_descriptor_count, 3);
        assert_eq!(enclosure.vendor, "HGST");
        assert_eq!(enclosure.product, "4U60G2_STOR_ENCL");
        assert_eq!(enclosure.logical_id, 0x5000_ccab_0000_0001);

        assert_eq!(page.type_descriptors.len(), 3);
        assert_eq!(
            page.type_descriptors[0].element_type,
            ElementType::ArrayDeviceSlot
        );
        assert_eq!(page.type_descriptors[0].count, 60);
        assert_eq!(page.type_descriptors[0].text.as_deref(), Some("Drive Slots"));
        assert_eq!(page.type_descriptors[1].text, None);
        assert_eq!(page.type_descriptors[2].text.as_deref(), Some("Fans"));

        assert_eq!(page.total_elements(), 66);
        assert_eq!(page.total_records(), 69);
    }

    #[test]
    fn truncated_page_is_an_error() {
        let mut buf = build_page(1, &[(ElementType::PowerSupply, 2, "")]);
        buf.truncate(20);
        // The declared page length now overruns the buffer and the walk
        // stops at the enclosure descriptor
        assert!(matches!(
            decode(&buf),
            Err(Error::Scsi(scsi::Error::BufferTooShort { .. }))
        ));
    }

    #[test]
    fn wrong_page_code_rejected() {
        let mut buf = build_page(1, &[(ElementType::PowerSupply, 2, "")]);
        buf[0] = 0x02;
        assert!(matches!(decode(&buf), Err(Error::UnexpectedPage { .. })));
    }
}
