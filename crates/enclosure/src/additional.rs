// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The Additional Element Status diagnostic page (0x0A)
//!
//! Variable-length, protocol-specific descriptors for element types that
//! carry port information (device slots, expanders, SCSI ports, ESCE).
//! Each descriptor declares its own length; unknown protocols are kept
//! raw and skipped by length alone. When EIP is set the descriptor names
//! its element by index, otherwise attribution is positional over the
//! eligible element types of the Configuration page.

use log::{debug, warn};
use serde::Serialize;

use scsi::codec;

use crate::element::ElementType;
use crate::{check_generation, page_code, ConfigurationPage, Error};

/// Protocol identifier values seen in descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Protocol {
    FibreChannel,
    Sas,
    Pcie,
    Other(u8),
}

impl Protocol {
    fn from_code(code: u8) -> Self {
        match code {
            0x0 => Protocol::FibreChannel,
            0x6 => Protocol::Sas,
            0xb => Protocol::Pcie,
            c => Protocol::Other(c),
        }
    }
}

/// One phy of a SAS device-slot descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SasPhy {
    pub device_type: u8,
    pub attached_sas_address: u64,
    pub sas_address: u64,
    pub phy_identifier: u8,
}

/// Protocol-specific payload of one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProtocolInfo {
    /// SAS descriptor type 0 (device slot / array device slot)
    SasDeviceSlot {
        not_all_phys: bool,
        device_slot_number: u8,
        phys: Vec<SasPhy>,
    },
    /// Anything else, preserved whole
    Raw(Vec<u8>),
}

/// One Additional Element Status descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdditionalElementDescriptor {
    /// The descriptor does not apply to a present element
    pub invalid: bool,
    pub protocol: Protocol,
    /// Element index as named by the descriptor (EIP set)
    pub element_index: Option<u8>,
    /// Element type attributed via the Configuration page
    pub element_type: ElementType,
    pub info: ProtocolInfo,
}

/// The decoded Additional Element Status page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdditionalElementStatusPage {
    pub generation: u32,
    pub descriptors: Vec<AdditionalElementDescriptor>,
    pub truncated: bool,
}

/// Element types that carry additional (protocol) status.
fn eligible(element_type: ElementType) -> bool {
    matches!(
        element_type,
        ElementType::DeviceSlot
            | ElementType::ArrayDeviceSlot
            | ElementType::Esce
            | ElementType::ScsiTargetPort
            | ElementType::ScsiInitiatorPort
            | ElementType::SasExpander
    )
}

fn decode_sas_phys(payload: &[u8]) -> ProtocolInfo {
    // [0] phy count, [1] descriptor type (b6:7) + not-all-phys (b0),
    // [3] device slot number, then 28-byte phy descriptors
    if payload.len() < 4 || codec::bits(payload[1], 6, 2) != 0 {
        return ProtocolInfo::Raw(payload.to_vec());
    }
    let phy_count = usize::from(payload[0]);
    let mut phys = Vec::with_capacity(phy_count);
    let mut offset = 4;
    for _ in 0..phy_count {
        let Some(descriptor) = payload.get(offset..offset + 28) else {
            debug!("sas phy list ends early at offset {offset}");
            break;
        };
        phys.push(SasPhy {
            device_type: codec::bits(descriptor[0], 4, 3),
            attached_sas_address: codec::read_be_at(descriptor, 4, 8).unwrap_or_default(),
            sas_address: codec::read_be_at(descriptor, 12, 8).unwrap_or_default(),
            phy_identifier: descriptor[20],
        });
        offset += 28;
    }
    ProtocolInfo::SasDeviceSlot {
        not_all_phys: codec::bit(payload[1], 0),
        device_slot_number: payload[3],
        phys,
    }
}

/// Decode an Additional Element Status page against its Configuration.
pub fn decode(buf: &[u8], config: &ConfigurationPage) -> Result<AdditionalElementStatusPage, Error> {
    let (header, body) = crate::parse_header(page_code::ADDITIONAL_ELEMENT_STATUS, buf)?;
    check_generation(config, header.generation)?;

    // Individual elements in configuration order, for attribution
    let flattened: Vec<ElementType> = config
        .type_descriptors
        .iter()
        .flat_map(|t| std::iter::repeat(t.element_type).take(usize::from(t.count)))
        .collect();
    let mut positional = flattened.iter().copied().filter(|t| eligible(*t));

    let mut descriptors = Vec::new();
    let mut truncated = header.truncated;
    let mut offset = 0;
    while offset + 2 <= body.len() {
        let byte0 = body[offset];
        let length = usize::from(body[offset + 1]);
        let end = offset + 2 + length;
        let Some(rest) = body.get(offset + 2..end) else {
            warn!("additional element status descriptor at offset {offset} overruns the page");
            truncated = true;
            break;
        };
        let eip = codec::bit(byte0, 4);
        let (element_index, payload) = if eip && rest.len() >= 2 {
            (Some(rest[1]), &rest[2..])
        } else {
            (None, rest)
        };
        let element_type = match element_index {
            Some(index) => flattened
                .get(usize::from(index))
                .copied()
                .unwrap_or(ElementType::Unspecified),
            None => positional.next().unwrap_or(ElementType::Unspecified),
        };
        let protocol = Protocol::from_code(codec::bits(byte0, 0, 4));
        let info = match (protocol, element_type) {
            (Protocol::Sas, ElementType::DeviceSlot | ElementType::ArrayDeviceSlot) => {
                decode_sas_phys(payload)
            }
            _ => ProtocolInfo::Raw(payload.to_vec()),
        };
        descriptors.push(AdditionalElementDescriptor {
            invalid: codec::bit(byte0, 7),
            protocol,
            element_index,
            element_type,
            info,
        });
        offset = end;
    }

    Ok(AdditionalElementStatusPage {
        generation: header.generation,
        descriptors,
        truncated,
    })
}
