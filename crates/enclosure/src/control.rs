// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Enclosure Control page construction (0x02, write direction)
//!
//! Control records reuse the Status page layout, so building one is
//! read-modify-write: take the current status records, clear the
//! status-only bits through the per-type control mask, set the desired
//! action bits plus SELECT on the targeted elements, and send the page
//! back. Records without SELECT are ignored by the enclosure.

use serde::Serialize;

use crate::element::{control_mask, ElementType, CONTROL_SELECT};
use crate::status::StatusPage;
use crate::{check_generation, page_code, ConfigurationPage, Error};

/// Actions addressable on device-slot style elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlotAction {
    /// Identify/locate LED
    Ident,
    /// Fault LED
    Fault,
    /// Power the slot device off
    DeviceOff,
}

/// An Enclosure Control page under construction.
#[derive(Debug, Clone)]
pub struct ControlBuilder {
    generation: u32,
    /// (record, element type, overall) in configuration order
    records: Vec<([u8; 4], ElementType, bool)>,
}

impl ControlBuilder {
    /// Seed the builder from a freshly fetched Status page.
    ///
    /// Status records are masked immediately; a truncated status page is
    /// padded with unselected zero records so the page keeps its full
    /// configured length.
    pub fn from_status(config: &ConfigurationPage, status: &StatusPage) -> Result<Self, Error> {
        check_generation(config, status.generation)?;
        let mut records = Vec::with_capacity(config.total_records());
        let mut elements = status.elements.iter();
        for descriptor in &config.type_descriptors {
            for position in 0..=usize::from(descriptor.count) {
                let mut record = elements
                    .next()
                    .map(|e| e.raw)
                    .unwrap_or_default();
                let mask = control_mask(descriptor.element_type);
                for (byte, mask) in record.iter_mut().zip(mask) {
                    *byte &= mask;
                }
                records.push((record, descriptor.element_type, position == 0));
            }
        }
        Ok(ControlBuilder {
            generation: status.generation,
            records,
        })
    }

    fn record_mut(
        &mut self,
        element_type: ElementType,
        index: usize,
        overall: bool,
    ) -> Result<&mut [u8; 4], Error> {
        self.records
            .iter_mut()
            .filter(|(_, t, o)| *t == element_type && *o == overall)
            .nth(if overall { 0 } else { index })
            .map(|(record, _, _)| record)
            .ok_or(Error::NoSuchElement {
                element_type,
                index,
            })
    }

    /// Mark element `index` of `element_type` selected and let `mutate`
    /// set its action bits. Index 0 is the first individual element.
    pub fn select(
        &mut self,
        element_type: ElementType,
        index: usize,
        mutate: impl FnOnce(&mut [u8; 4]),
    ) -> Result<(), Error> {
        let record = self.record_mut(element_type, index, false)?;
        record[0] |= CONTROL_SELECT;
        mutate(record);
        Ok(())
    }

    /// Select the overall record of a type group.
    pub fn select_overall(
        &mut self,
        element_type: ElementType,
        mutate: impl FnOnce(&mut [u8; 4]),
    ) -> Result<(), Error> {
        let record = self.record_mut(element_type, 0, true)?;
        record[0] |= CONTROL_SELECT;
        mutate(record);
        Ok(())
    }

    /// Set or clear a slot action on a device-slot style element.
    pub fn slot_action(
        &mut self,
        element_type: ElementType,
        index: usize,
        action: SlotAction,
        on: bool,
    ) -> Result<(), Error> {
        self.select(element_type, index, |record| {
            let (byte, bit) = match action {
                SlotAction::Ident => (2, 1),
                SlotAction::Fault => (3, 5),
                SlotAction::DeviceOff => (3, 4),
            };
            scsi::codec::set_bit(&mut record[byte], bit, on);
        })
    }

    /// Serialize the page, ready for SEND DIAGNOSTIC.
    pub fn encode(&self) -> Vec<u8> {
        let mut page = vec![page_code::ENCLOSURE_CONTROL_STATUS, 0x00];
        page.extend_from_slice(&((self.records.len() * 4 + 4) as u16).to_be_bytes());
        page.extend_from_slice(&self.generation.to_be_bytes());
        for (record, _, _) in &self.records {
            page.extend_from_slice(record);
        }
        page
    }
}
