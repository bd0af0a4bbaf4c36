// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The Element Descriptor diagnostic page (0x07)
//!
//! Variable-length text descriptors, one per record slot of the Status
//! page (overall records included), in configuration order. Each record
//! declares its own length, which advances the cursor.

use log::warn;
use serde::Serialize;

use scsi::codec;

use crate::element::ElementType;
use crate::{check_generation, page_code, ConfigurationPage, Error};

/// One element's descriptive text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementText {
    pub element_type: ElementType,
    pub overall: bool,
    pub text: String,
}

/// The decoded Element Descriptor page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementDescriptorPage {
    pub generation: u32,
    pub descriptors: Vec<ElementText>,
    pub truncated: bool,
}

impl ElementDescriptorPage {
    /// Text for element `index` of `element_type` (individual elements
    /// only).
    pub fn element(&self, element_type: ElementType, index: usize) -> Option<&str> {
        self.descriptors
            .iter()
            .filter(|d| d.element_type == element_type && !d.overall)
            .nth(index)
            .map(|d| d.text.as_str())
    }
}

/// Decode an Element Descriptor page against its Configuration page.
pub fn decode(buf: &[u8], config: &ConfigurationPage) -> Result<ElementDescriptorPage, Error> {
    let (header, body) = crate::parse_header(page_code::ELEMENT_DESCRIPTOR, buf)?;
    check_generation(config, header.generation)?;

    let mut descriptors = Vec::with_capacity(config.total_records());
    let mut truncated = header.truncated;
    let mut offset = 0;
    'types: for type_descriptor in &config.type_descriptors {
        for position in 0..=usize::from(type_descriptor.count) {
            // Record: 2 reserved bytes, 2-byte length, then the text
            let Ok(length) = codec::read_be_at(body, offset + 2, 2) else {
                warn!(
                    "element descriptor page ends inside the {} group",
                    type_descriptor.element_type
                );
                truncated = true;
                break 'types;
            };
            let end = offset + 4 + length as usize;
            let Some(text) = body.get(offset + 4..end) else {
                warn!(
                    "element descriptor at offset {offset} declares {length} bytes past the page"
                );
                truncated = true;
                break 'types;
            };
            descriptors.push(ElementText {
                element_type: type_descriptor.element_type,
                overall: position == 0,
                text: String::from_utf8_lossy(text).trim_end().to_owned(),
            });
            offset = end;
        }
    }

    Ok(ElementDescriptorPage {
        generation: header.generation,
        descriptors,
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::build_page;

    fn build_descriptor_page(generation: u32, texts: &[&str]) -> Vec<u8> {
        let mut body = Vec::new();
        for text in texts {
            body.extend_from_slice(&[0, 0]);
            body.extend_from_slice(&(text.len() as u16).to_be_bytes());
            body.extend_from_slice(text.as_bytes());
        }
        let mut page = vec![page_code::ELEMENT_DESCRIPTOR, 0x00];
        page.extend_from_slice(&((body.len() + 4) as u16).to_be_bytes());
        page.extend_from_slice(&generation.to_be_bytes());
        page.extend_from_slice(&body);
        page
    }

    #[test]
    fn variable_length_walk() {
        let config =
            crate::config::decode(&build_page(6, &[(ElementType::Cooling, 2, "")])).unwrap();
        let buf = build_descriptor_page(6, &["Fan Group", "Fan Left", "Fan Right"]);
        let page = decode(&buf, &config).unwrap();
        assert!(!page.truncated);
        assert_eq!(page.descriptors.len(), 3);
        assert_eq!(page.descriptors[0].text, "Fan Group");
        assert!(page.descriptors[0].overall);
        assert_eq!(page.element(ElementType::Cooling, 0), Some("Fan Left"));
        assert_eq!(page.element(ElementType::Cooling, 1), Some("Fan Right"));
    }

    #[test]
    fn empty_texts_are_valid() {
        let config =
            crate::config::decode(&build_page(1, &[(ElementType::Door, 1, "")])).unwrap();
        let buf = build_descriptor_page(1, &["", ""]);
        let page = decode(&buf, &config).unwrap();
        assert_eq!(page.descriptors.len(), 2);
        assert_eq!(page.element(ElementType::Door, 0), Some(""));
    }

    #[test]
    fn overlong_record_truncates() {
        let config =
            crate::config::decode(&build_page(1, &[(ElementType::Door, 1, "")])).unwrap();
        let mut buf = build_descriptor_page(1, &["ok"]);
        // Append a record whose length runs past the page
        buf.extend_from_slice(&[0, 0, 0x01, 0x00, b'x']);
        let declared = (buf.len() - 4) as u16;
        buf[2..4].copy_from_slice(&declared.to_be_bytes());
        let page = decode(&buf, &config).unwrap();
        assert!(page.truncated);
        assert_eq!(page.descriptors.len(), 1);
    }

    #[test]
    fn generation_must_match() {
        let config =
            crate::config::decode(&build_page(1, &[(ElementType::Door, 1, "")])).unwrap();
        let buf = build_descriptor_page(2, &["", ""]);
        assert!(matches!(
            decode(&buf, &config),
            Err(Error::StaleConfiguration { .. })
        ));
    }
}
