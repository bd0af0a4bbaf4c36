// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Field-pair presentation output
//!
//! Decoded structures are handed to the presentation layer as ordered
//! (name, value) pairs, leaving formatting (plain text, JSON, log files)
//! entirely to the consumer.

use serde::Serialize;

use crate::inquiry::Inquiry;
use crate::sense::{SenseRecord, SenseDescriptor};
use crate::tables;

/// One named value in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: &'static str,
    pub value: String,
}

impl Field {
    pub fn new(name: &'static str, value: impl Into<String>) -> Self {
        Field {
            name,
            value: value.into(),
        }
    }
}

/// Structures that can render themselves as a field-pair sequence.
pub trait Report {
    fn fields(&self) -> Vec<Field>;
}

impl Report for Inquiry {
    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("Peripheral Device Type", self.device_type.name()),
            Field::new("Peripheral Qualifier", self.qualifier.to_string()),
            Field::new("Removable Media", self.removable.to_string()),
            Field::new("Version", format!("{:#04x}", self.version)),
            Field::new("Enclosure Services", self.enclosure_services.to_string()),
            Field::new("Command Queueing", self.command_queueing.to_string()),
            Field::new("Vendor Identification", self.vendor.clone()),
            Field::new("Product Identification", self.product.clone()),
            Field::new("Firmware Revision", self.revision.clone()),
        ]
    }
}

impl Report for SenseRecord {
    fn fields(&self) -> Vec<Field> {
        let mut fields = Vec::new();
        match self {
            SenseRecord::Fixed(fixed) => {
                fields.push(Field::new(
                    "Error Type",
                    if fixed.deferred { "Deferred Error" } else { "Current Error" },
                ));
                fields.push(Field::new("Sense Format", "fixed"));
                push_triple(&mut fields, fixed.sense_key, fixed.asc, fixed.ascq);
                if fixed.info_valid {
                    fields.push(Field::new(
                        "Information",
                        format!("{:#010x}", fixed.information),
                    ));
                }
                if fixed.fru_code != 0 {
                    fields.push(Field::new(
                        "Field Replaceable Unit",
                        format!("{:#04x}", fixed.fru_code),
                    ));
                }
                if fixed.truncated {
                    fields.push(Field::new("Truncated", "true"));
                }
            }
            SenseRecord::Descriptor(sense) => {
                fields.push(Field::new(
                    "Error Type",
                    if sense.deferred { "Deferred Error" } else { "Current Error" },
                ));
                fields.push(Field::new("Sense Format", "descriptor"));
                push_triple(&mut fields, sense.sense_key, sense.asc, sense.ascq);
                for descriptor in &sense.descriptors {
                    if let SenseDescriptor::Information { valid: true, value } = descriptor {
                        fields.push(Field::new("Information", format!("{value:#x}")));
                    }
                }
                if sense.truncated {
                    fields.push(Field::new("Truncated", "true"));
                }
            }
            SenseRecord::VendorSpecific { data } => {
                fields.push(Field::new("Sense Format", "vendor specific"));
                fields.push(Field::new("Length", data.len().to_string()));
            }
            SenseRecord::Raw { data } => {
                fields.push(Field::new("Sense Format", "unrecognized"));
                fields.push(Field::new("Length", data.len().to_string()));
            }
        }
        fields
    }
}

fn push_triple(fields: &mut Vec<Field>, key: u8, asc: u8, ascq: u8) {
    fields.push(Field::new(
        "Sense Key",
        format!("{:#03x} ({})", key, tables::sense_key_name(key)),
    ));
    fields.push(Field::new(
        "Additional Sense",
        format!(
            "({asc:#04x}, {ascq:#04x}) {}",
            tables::sense_code_label(asc, ascq)
        ),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sense;

    #[test]
    fn sense_report_carries_the_triple() {
        let buf = [
            0x70, 0x00, 0x05, 0, 0, 0, 0, 0x0a, 0, 0, 0, 0, 0x24, 0x00, 0, 0, 0, 0,
        ];
        let fields = sense::decode(&buf).fields();
        let value = |name: &str| {
            fields
                .iter()
                .find(|f| f.name == name)
                .map(|f| f.value.clone())
                .unwrap_or_default()
        };
        assert!(value("Sense Key").contains("ILLEGAL REQUEST"));
        assert!(value("Additional Sense").contains("Invalid field in CDB"));
        assert_eq!(value("Sense Format"), "fixed");
    }
}
