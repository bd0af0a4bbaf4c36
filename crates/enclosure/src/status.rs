// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The Enclosure Status diagnostic page (0x02, read direction)
//!
//! A flat run of 4-byte records: for each type descriptor of the
//! Configuration page, one overall record followed by one record per
//! individual element, in declared order. Without that ordering the
//! records cannot be attributed, so decoding takes the Configuration
//! page and refuses a generation mismatch.

use log::{debug, warn};
use serde::Serialize;

use scsi::codec;

use crate::element::{ElementType, StatusElement};
use crate::{check_generation, page_code, ConfigurationPage, Error};

/// The decoded Enclosure Status page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusPage {
    pub generation: u32,
    /// Summary bits from byte 1
    pub invop: bool,
    pub info: bool,
    pub non_critical: bool,
    pub critical: bool,
    pub unrecoverable: bool,
    /// Records in configuration order, overall records included
    pub elements: Vec<StatusElement>,
    /// The record run ended before the configuration said it should
    pub truncated: bool,
}

impl StatusPage {
    /// Find the status record for element `index` of `element_type`.
    /// Index 0 is the first individual element, not the overall record.
    pub fn element(&self, element_type: ElementType, index: usize) -> Option<&StatusElement> {
        self.elements
            .iter()
            .filter(|e| e.element_type == element_type && !e.overall)
            .nth(index)
    }

    /// The overall record for a type group.
    pub fn overall(&self, element_type: ElementType) -> Option<&StatusElement> {
        self.elements
            .iter()
            .find(|e| e.element_type == element_type && e.overall)
    }
}

/// Decode an Enclosure Status page against its Configuration page.
pub fn decode(buf: &[u8], config: &ConfigurationPage) -> Result<StatusPage, Error> {
    let (header, body) = crate::parse_header(page_code::ENCLOSURE_CONTROL_STATUS, buf)?;
    check_generation(config, header.generation)?;

    let mut elements = Vec::with_capacity(config.total_records());
    let mut truncated = header.truncated;
    let mut offset = 0;
    'types: for descriptor in &config.type_descriptors {
        for position in 0..=usize::from(descriptor.count) {
            let Some(raw) = body.get(offset..offset + 4) else {
                warn!(
                    "status page ends inside the {} group ({} of {} records)",
                    descriptor.element_type,
                    elements.len(),
                    config.total_records()
                );
                truncated = true;
                break 'types;
            };
            elements.push(StatusElement::decode(
                descriptor.element_type,
                position == 0,
                [raw[0], raw[1], raw[2], raw[3]],
            ));
            offset += 4;
        }
    }
    if offset < body.len() {
        debug!(
            "status page carries {} bytes past the configured element count",
            body.len() - offset
        );
    }

    Ok(StatusPage {
        generation: header.generation,
        invop: codec::bit(header.byte1, 4),
        info: codec::bit(header.byte1, 3),
        non_critical: codec::bit(header.byte1, 2),
        critical: codec::bit(header.byte1, 1),
        unrecoverable: codec::bit(header.byte1, 0),
        elements,
        truncated,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::tests::build_page;
    use test_log::test;
    use crate::element::ElementStatusCode;

    /// Build a status page from raw 4-byte records.
    pub(crate) fn build_status(generation: u32, records: &[[u8; 4]]) -> Vec<u8> {
        let mut page = vec![page_code::ENCLOSURE_CONTROL_STATUS, 0x00];
        page.extend_from_slice(&((records.len() * 4 + 4) as u16).to_be_bytes());
        page.extend_from_slice(&generation.to_be_bytes());
        for record in records {
            page.extend_from_slice(record);
        }
        page
    }

    #[test]
    fn attributes_records_per_configuration() {
        // One type: Power Supply, two elements, no text
        let config =
            crate::config::decode(&build_page(3, &[(ElementType::PowerSupply, 2, "")])).unwrap();
        let buf = build_status(
            3,
            &[
                [0x01, 0x00, 0x00, 0x00],
                [0x01, 0x00, 0x00, 0x00],
                [0x02, 0x00, 0x00, 0x41],
            ],
        );
        let page = decode(&buf, &config).unwrap();
        assert!(!page.truncated);
        assert_eq!(page.elements.len(), 3);
        assert!(page
            .elements
            .iter()
            .all(|e| e.element_type == ElementType::PowerSupply));
        assert!(page.elements[0].overall);
        assert!(!page.elements[1].overall);
        assert_eq!(
            page.element(ElementType::PowerSupply, 1).map(|e| e.common.code),
            Some(ElementStatusCode::Critical)
        );
        assert_eq!(
            page.overall(ElementType::PowerSupply).map(|e| e.common.code),
            Some(ElementStatusCode::Ok)
        );
    }

    #[test]
    fn multi_type_ordering() {
        let config = crate::config::decode(&build_page(
            9,
            &[
                (ElementType::ArrayDeviceSlot, 2, ""),
                (ElementType::Cooling, 1, ""),
            ],
        ))
        .unwrap();
        // 3 slot records then 2 cooling records
        let records = vec![[0x01, 0, 0, 0]; 5];
        let page = decode(&build_status(9, &records), &config).unwrap();
        let types: Vec<_> = page.elements.iter().map(|e| e.element_type).collect();
        assert_eq!(
            types,
            vec![
                ElementType::ArrayDeviceSlot,
                ElementType::ArrayDeviceSlot,
                ElementType::ArrayDeviceSlot,
                ElementType::Cooling,
                ElementType::Cooling,
            ]
        );
        let overalls: Vec<_> = page.elements.iter().map(|e| e.overall).collect();
        assert_eq!(overalls, vec![true, false, false, true, false]);
    }

    #[test]
    fn stale_configuration_rejected() {
        let config =
            crate::config::decode(&build_page(3, &[(ElementType::PowerSupply, 1, "")])).unwrap();
        let buf = build_status(4, &[[0x01, 0, 0, 0]; 2]);
        assert_eq!(
            decode(&buf, &config),
            Err(Error::StaleConfiguration { have: 3, expect: 4 })
        );
    }

    #[test]
    fn short_record_run_marks_truncated() {
        let config =
            crate::config::decode(&build_page(5, &[(ElementType::Cooling, 3, "")])).unwrap();
        let buf = build_status(5, &[[0x01, 0, 0, 0]; 2]);
        let page = decode(&buf, &config).unwrap();
        assert!(page.truncated);
        assert_eq!(page.elements.len(), 2);
    }
}
