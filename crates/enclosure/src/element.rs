// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Enclosure element types and per-type status decoding
//!
//! Status and Control pages carry one 4-byte record per element. Byte 0
//! is common to every type; bytes 1-3 are interpreted per element type.
//! Types no real enclosure has been observed to return stay as raw bytes
//! rather than failing the page.

use serde::Serialize;

use scsi::codec;

/// SES element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ElementType {
    Unspecified,
    DeviceSlot,
    PowerSupply,
    Cooling,
    TemperatureSensor,
    Door,
    AudibleAlarm,
    /// Enclosure Services Controller Electronics
    Esce,
    SccControllerElectronics,
    NonvolatileCache,
    InvalidOperationReason,
    UninterruptiblePowerSupply,
    Display,
    KeyPadEntry,
    Enclosure,
    ScsiPortTransceiver,
    Language,
    CommunicationPort,
    VoltageSensor,
    CurrentSensor,
    ScsiTargetPort,
    ScsiInitiatorPort,
    SimpleSubenclosure,
    ArrayDeviceSlot,
    SasExpander,
    SasConnector,
    Reserved(u8),
    VendorSpecific(u8),
}

impl ElementType {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => ElementType::Unspecified,
            0x01 => ElementType::DeviceSlot,
            0x02 => ElementType::PowerSupply,
            0x03 => ElementType::Cooling,
            0x04 => ElementType::TemperatureSensor,
            0x05 => ElementType::Door,
            0x06 => ElementType::AudibleAlarm,
            0x07 => ElementType::Esce,
            0x08 => ElementType::SccControllerElectronics,
            0x09 => ElementType::NonvolatileCache,
            0x0a => ElementType::InvalidOperationReason,
            0x0b => ElementType::UninterruptiblePowerSupply,
            0x0c => ElementType::Display,
            0x0d => ElementType::KeyPadEntry,
            0x0e => ElementType::Enclosure,
            0x0f => ElementType::ScsiPortTransceiver,
            0x10 => ElementType::Language,
            0x11 => ElementType::CommunicationPort,
            0x12 => ElementType::VoltageSensor,
            0x13 => ElementType::CurrentSensor,
            0x14 => ElementType::ScsiTargetPort,
            0x15 => ElementType::ScsiInitiatorPort,
            0x16 => ElementType::SimpleSubenclosure,
            0x17 => ElementType::ArrayDeviceSlot,
            0x18 => ElementType::SasExpander,
            0x19 => ElementType::SasConnector,
            c if c >= 0x80 => ElementType::VendorSpecific(c),
            c => ElementType::Reserved(c),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ElementType::Unspecified => 0x00,
            ElementType::DeviceSlot => 0x01,
            ElementType::PowerSupply => 0x02,
            ElementType::Cooling => 0x03,
            ElementType::TemperatureSensor => 0x04,
            ElementType::Door => 0x05,
            ElementType::AudibleAlarm => 0x06,
            ElementType::Esce => 0x07,
            ElementType::SccControllerElectronics => 0x08,
            ElementType::NonvolatileCache => 0x09,
            ElementType::InvalidOperationReason => 0x0a,
            ElementType::UninterruptiblePowerSupply => 0x0b,
            ElementType::Display => 0x0c,
            ElementType::KeyPadEntry => 0x0d,
            ElementType::Enclosure => 0x0e,
            ElementType::ScsiPortTransceiver => 0x0f,
            ElementType::Language => 0x10,
            ElementType::CommunicationPort => 0x11,
            ElementType::VoltageSensor => 0x12,
            ElementType::CurrentSensor => 0x13,
            ElementType::ScsiTargetPort => 0x14,
            ElementType::ScsiInitiatorPort => 0x15,
            ElementType::SimpleSubenclosure => 0x16,
            ElementType::ArrayDeviceSlot => 0x17,
            ElementType::SasExpander => 0x18,
            ElementType::SasConnector => 0x19,
            ElementType::Reserved(c) | ElementType::VendorSpecific(c) => c,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementType::Unspecified => "Unspecified",
            ElementType::DeviceSlot => "Device Slot",
            ElementType::PowerSupply => "Power Supply",
            ElementType::Cooling => "Cooling",
            ElementType::TemperatureSensor => "Temperature Sensor",
            ElementType::Door => "Door",
            ElementType::AudibleAlarm => "Audible Alarm",
            ElementType::Esce => "Enclosure Services Controller Electronics",
            ElementType::SccControllerElectronics => "SCC Controller Electronics",
            ElementType::NonvolatileCache => "Nonvolatile Cache",
            ElementType::InvalidOperationReason => "Invalid Operation Reason",
            ElementType::UninterruptiblePowerSupply => "Uninterruptible Power Supply",
            ElementType::Display => "Display",
            ElementType::KeyPadEntry => "Key Pad Entry",
            ElementType::Enclosure => "Enclosure",
            ElementType::ScsiPortTransceiver => "SCSI Port Transceiver",
            ElementType::Language => "Language",
            ElementType::CommunicationPort => "Communication Port",
            ElementType::VoltageSensor => "Voltage Sensor",
            ElementType::CurrentSensor => "Current Sensor",
            ElementType::ScsiTargetPort => "SCSI Target Port",
            ElementType::ScsiInitiatorPort => "SCSI Initiator Port",
            ElementType::SimpleSubenclosure => "Simple Subenclosure",
            ElementType::ArrayDeviceSlot => "Array Device Slot",
            ElementType::SasExpander => "SAS Expander",
            ElementType::SasConnector => "SAS Connector",
            ElementType::Reserved(_) => "Reserved",
            ElementType::VendorSpecific(_) => "Vendor Specific",
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Keyword names accepted on the command line for element types.
static PARSE_NAMES: phf::Map<&'static str, ElementType> = phf::phf_map! {
    "unspecified" => ElementType::Unspecified,
    "device_slot" => ElementType::DeviceSlot,
    "power_supply" => ElementType::PowerSupply,
    "cooling" => ElementType::Cooling,
    "temperature" => ElementType::TemperatureSensor,
    "door" => ElementType::Door,
    "audible_alarm" => ElementType::AudibleAlarm,
    "esce" => ElementType::Esce,
    "scc_controller" => ElementType::SccControllerElectronics,
    "nonvolatile_cache" => ElementType::NonvolatileCache,
    "invalid_operation" => ElementType::InvalidOperationReason,
    "ups" => ElementType::UninterruptiblePowerSupply,
    "display" => ElementType::Display,
    "keypad_entry" => ElementType::KeyPadEntry,
    "enclosure" => ElementType::Enclosure,
    "scsi_port_transceiver" => ElementType::ScsiPortTransceiver,
    "language" => ElementType::Language,
    "communication_port" => ElementType::CommunicationPort,
    "voltage_sensor" => ElementType::VoltageSensor,
    "current_sensor" => ElementType::CurrentSensor,
    "scsi_target_port" => ElementType::ScsiTargetPort,
    "scsi_initiator_port" => ElementType::ScsiInitiatorPort,
    "simple_subenclosure" => ElementType::SimpleSubenclosure,
    "array_device_slot" => ElementType::ArrayDeviceSlot,
    "sas_expander" => ElementType::SasExpander,
    "sas_connector" => ElementType::SasConnector,
};

/// Resolve a keyword like `array_device_slot` to its element type.
pub fn parse_element_type(name: &str) -> Option<ElementType> {
    PARSE_NAMES.get(name).copied()
}

/// Element status codes, common status byte bits 0-3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ElementStatusCode {
    Unsupported,
    Ok,
    Critical,
    NonCritical,
    Unrecoverable,
    NotInstalled,
    Unknown,
    NotAvailable,
    NoAccessAllowed,
    Reserved(u8),
}

impl ElementStatusCode {
    pub fn from_code(code: u8) -> Self {
        match code & 0x0f {
            0x0 => ElementStatusCode::Unsupported,
            0x1 => ElementStatusCode::Ok,
            0x2 => ElementStatusCode::Critical,
            0x3 => ElementStatusCode::NonCritical,
            0x4 => ElementStatusCode::Unrecoverable,
            0x5 => ElementStatusCode::NotInstalled,
            0x6 => ElementStatusCode::Unknown,
            0x7 => ElementStatusCode::NotAvailable,
            0x8 => ElementStatusCode::NoAccessAllowed,
            c => ElementStatusCode::Reserved(c),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementStatusCode::Unsupported => "Unsupported",
            ElementStatusCode::Ok => "OK",
            ElementStatusCode::Critical => "Critical",
            ElementStatusCode::NonCritical => "Non-critical",
            ElementStatusCode::Unrecoverable => "Unrecoverable",
            ElementStatusCode::NotInstalled => "Not Installed",
            ElementStatusCode::Unknown => "Unknown",
            ElementStatusCode::NotAvailable => "Not Available",
            ElementStatusCode::NoAccessAllowed => "No Access Allowed",
            ElementStatusCode::Reserved(_) => "Reserved",
        }
    }
}

/// Byte 0 of every status record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommonStatus {
    pub predicted_failure: bool,
    pub disabled: bool,
    pub swapped: bool,
    pub code: ElementStatusCode,
}

impl CommonStatus {
    fn decode(byte: u8) -> Self {
        CommonStatus {
            predicted_failure: codec::bit(byte, 6),
            disabled: codec::bit(byte, 5),
            swapped: codec::bit(byte, 4),
            code: ElementStatusCode::from_code(codec::bits(byte, 0, 4)),
        }
    }
}

/// Type-specific interpretation of status bytes 1-3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ElementDetail {
    DeviceSlot {
        slot_address: u8,
        app_client_bypassed_a: bool,
        do_not_remove: bool,
        enclosure_bypassed_a: bool,
        enclosure_bypassed_b: bool,
        ready_to_insert: bool,
        removal_prepared: bool,
        ident: bool,
        report: bool,
        app_client_bypassed_b: bool,
        fault_sensed: bool,
        fault_requested: bool,
        device_off: bool,
        bypassed_a: bool,
        bypassed_b: bool,
    },
    PowerSupply {
        ident: bool,
        do_not_remove: bool,
        dc_over_voltage: bool,
        dc_under_voltage: bool,
        dc_over_current: bool,
        hot_swap: bool,
        fail: bool,
        requested_on: bool,
        off: bool,
        over_temp_fail: bool,
        temp_warn: bool,
        ac_fail: bool,
        dc_fail: bool,
    },
    Cooling {
        ident: bool,
        do_not_remove: bool,
        /// Actual speed in rpm (reported in units of 10)
        speed_rpm: u32,
        hot_swap: bool,
        fail: bool,
        requested_on: bool,
        off: bool,
        speed_code: u8,
    },
    TemperatureSensor {
        ident: bool,
        fail: bool,
        /// Degrees Celsius (wire value has a -20 offset)
        temperature: i16,
        ot_failure: bool,
        ot_warning: bool,
        ut_failure: bool,
        ut_warning: bool,
    },
    Door {
        ident: bool,
        fail: bool,
        open: bool,
        unlocked: bool,
    },
    Esce {
        ident: bool,
        fail: bool,
        report: bool,
        hot_swap: bool,
    },
    Enclosure {
        ident: bool,
        time_until_power_cycle: u8,
        failure_indication: bool,
        warning_indication: bool,
        power_off_duration: u8,
        failure_requested: bool,
        warning_requested: bool,
    },
    VoltageSensor {
        ident: bool,
        fail: bool,
        warn_over: bool,
        warn_under: bool,
        crit_over: bool,
        crit_under: bool,
        /// Millivolts (wire value is in units of 10 mV)
        millivolts: i32,
    },
    CurrentSensor {
        ident: bool,
        fail: bool,
        warn_over: bool,
        crit_over: bool,
        /// Milliamps (wire value is in units of 10 mA)
        milliamps: i32,
    },
    ArrayDeviceSlot {
        ok: bool,
        reserved_device: bool,
        hot_spare: bool,
        consistency_check: bool,
        in_critical_array: bool,
        in_failed_array: bool,
        rebuild_remap: bool,
        rebuild_remap_abort: bool,
        app_client_bypassed_a: bool,
        do_not_remove: bool,
        enclosure_bypassed_a: bool,
        enclosure_bypassed_b: bool,
        ready_to_insert: bool,
        removal_prepared: bool,
        ident: bool,
        report: bool,
        app_client_bypassed_b: bool,
        fault_sensed: bool,
        fault_requested: bool,
        device_off: bool,
        bypassed_a: bool,
        bypassed_b: bool,
    },
    SasExpander {
        ident: bool,
        fail: bool,
    },
    SasConnector {
        ident: bool,
        connector_type: u8,
        connector_physical_link: u8,
        fail: bool,
    },
    /// Types with no defined decode keep their raw bytes
    Generic([u8; 3]),
}

/// One fully decoded 4-byte status record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusElement {
    pub element_type: ElementType,
    /// First record of each type group; summarizes the whole group
    pub overall: bool,
    pub common: CommonStatus,
    pub detail: ElementDetail,
    /// The record as received, kept for control read-modify-write
    pub raw: [u8; 4],
}

impl StatusElement {
    pub fn decode(element_type: ElementType, overall: bool, raw: [u8; 4]) -> Self {
        StatusElement {
            element_type,
            overall,
            common: CommonStatus::decode(raw[0]),
            detail: decode_detail(element_type, [raw[1], raw[2], raw[3]]),
            raw,
        }
    }
}

fn decode_detail(element_type: ElementType, b: [u8; 3]) -> ElementDetail {
    use scsi::codec::{bit, bits};
    match element_type {
        ElementType::DeviceSlot => ElementDetail::DeviceSlot {
            slot_address: b[0],
            app_client_bypassed_a: bit(b[1], 7),
            do_not_remove: bit(b[1], 6),
            enclosure_bypassed_a: bit(b[1], 5),
            enclosure_bypassed_b: bit(b[1], 4),
            ready_to_insert: bit(b[1], 3),
            removal_prepared: bit(b[1], 2),
            ident: bit(b[1], 1),
            report: bit(b[1], 0),
            app_client_bypassed_b: bit(b[2], 7),
            fault_sensed: bit(b[2], 6),
            fault_requested: bit(b[2], 5),
            device_off: bit(b[2], 4),
            bypassed_a: bit(b[2], 3),
            bypassed_b: bit(b[2], 2),
        },
        ElementType::PowerSupply => ElementDetail::PowerSupply {
            ident: bit(b[0], 7),
            do_not_remove: bit(b[0], 6),
            dc_over_voltage: bit(b[1], 3),
            dc_under_voltage: bit(b[1], 2),
            dc_over_current: bit(b[1], 1),
            hot_swap: bit(b[2], 7),
            fail: bit(b[2], 6),
            requested_on: bit(b[2], 5),
            off: bit(b[2], 4),
            over_temp_fail: bit(b[2], 3),
            temp_warn: bit(b[2], 2),
            ac_fail: bit(b[2], 1),
            dc_fail: bit(b[2], 0),
        },
        ElementType::Cooling => ElementDetail::Cooling {
            ident: bit(b[0], 7),
            do_not_remove: bit(b[0], 6),
            speed_rpm: ((u32::from(bits(b[0], 0, 3)) << 8) | u32::from(b[1])) * 10,
            hot_swap: bit(b[2], 7),
            fail: bit(b[2], 6),
            requested_on: bit(b[2], 5),
            off: bit(b[2], 4),
            speed_code: bits(b[2], 0, 3),
        },
        ElementType::TemperatureSensor => ElementDetail::TemperatureSensor {
            ident: bit(b[0], 7),
            fail: bit(b[0], 6),
            temperature: i16::from(b[1]) - 20,
            ot_failure: bit(b[2], 3),
            ot_warning: bit(b[2], 2),
            ut_failure: bit(b[2], 1),
            ut_warning: bit(b[2], 0),
        },
        ElementType::Door => ElementDetail::Door {
            ident: bit(b[0], 7),
            fail: bit(b[0], 6),
            open: bit(b[2], 1),
            unlocked: bit(b[2], 0),
        },
        ElementType::Esce => ElementDetail::Esce {
            ident: bit(b[0], 7),
            fail: bit(b[0], 6),
            report: bit(b[1], 0),
            hot_swap: bit(b[2], 7),
        },
        ElementType::Enclosure => ElementDetail::Enclosure {
            ident: bit(b[0], 7),
            time_until_power_cycle: bits(b[1], 2, 6),
            failure_indication: bit(b[1], 1),
            warning_indication: bit(b[1], 0),
            power_off_duration: bits(b[2], 2, 6),
            failure_requested: bit(b[2], 1),
            warning_requested: bit(b[2], 0),
        },
        ElementType::VoltageSensor => ElementDetail::VoltageSensor {
            ident: bit(b[0], 7),
            fail: bit(b[0], 6),
            warn_over: bit(b[0], 3),
            warn_under: bit(b[0], 2),
            crit_over: bit(b[0], 1),
            crit_under: bit(b[0], 0),
            millivolts: i32::from(i16::from_be_bytes([b[1], b[2]])) * 10,
        },
        ElementType::CurrentSensor => ElementDetail::CurrentSensor {
            ident: bit(b[0], 7),
            fail: bit(b[0], 6),
            warn_over: bit(b[0], 3),
            crit_over: bit(b[0], 1),
            milliamps: i32::from(i16::from_be_bytes([b[1], b[2]])) * 10,
        },
        ElementType::ArrayDeviceSlot => ElementDetail::ArrayDeviceSlot {
            ok: bit(b[0], 7),
            reserved_device: bit(b[0], 6),
            hot_spare: bit(b[0], 5),
            consistency_check: bit(b[0], 4),
            in_critical_array: bit(b[0], 3),
            in_failed_array: bit(b[0], 2),
            rebuild_remap: bit(b[0], 1),
            rebuild_remap_abort: bit(b[0], 0),
            app_client_bypassed_a: bit(b[1], 7),
            do_not_remove: bit(b[1], 6),
            enclosure_bypassed_a: bit(b[1], 5),
            enclosure_bypassed_b: bit(b[1], 4),
            ready_to_insert: bit(b[1], 3),
            removal_prepared: bit(b[1], 2),
            ident: bit(b[1], 1),
            report: bit(b[1], 0),
            app_client_bypassed_b: bit(b[2], 7),
            fault_sensed: bit(b[2], 6),
            fault_requested: bit(b[2], 5),
            device_off: bit(b[2], 4),
            bypassed_a: bit(b[2], 3),
            bypassed_b: bit(b[2], 2),
        },
        ElementType::SasExpander => ElementDetail::SasExpander {
            ident: bit(b[0], 7),
            fail: bit(b[0], 6),
        },
        ElementType::SasConnector => ElementDetail::SasConnector {
            ident: bit(b[0], 7),
            connector_type: bits(b[0], 0, 7),
            connector_physical_link: b[1],
            fail: bit(b[2], 6),
        },
        _ => ElementDetail::Generic(b),
    }
}

/// SELECT, the only control bit every element type shares.
pub const CONTROL_SELECT: u8 = 0x80;
/// PRDFAIL, preserved across control read-modify-write for all types.
pub const CONTROL_PRDFAIL: u8 = 0x40;

/// Per-type masks applied to a status record before it is resent as a
/// control record. Bits cleared here are status-only and must not be
/// echoed back at the enclosure.
pub fn control_mask(element_type: ElementType) -> [u8; 4] {
    match element_type {
        ElementType::Unspecified => [CONTROL_PRDFAIL, 0xff, 0xff, 0xff],
        ElementType::DeviceSlot => [CONTROL_PRDFAIL, 0x00, 0x4e, 0x3c],
        ElementType::PowerSupply => [CONTROL_PRDFAIL, 0x80, 0x00, 0x60],
        ElementType::Cooling => [CONTROL_PRDFAIL, 0x80, 0x00, 0x60],
        ElementType::TemperatureSensor => [CONTROL_PRDFAIL, 0xc0, 0x00, 0x00],
        ElementType::Door => [CONTROL_PRDFAIL, 0xc0, 0x00, 0x01],
        ElementType::AudibleAlarm => [CONTROL_PRDFAIL, 0xc0, 0x00, 0x5f],
        ElementType::Esce => [CONTROL_PRDFAIL, 0xc0, 0x01, 0x00],
        ElementType::SccControllerElectronics => [CONTROL_PRDFAIL, 0xc0, 0x00, 0x00],
        ElementType::NonvolatileCache => [CONTROL_PRDFAIL, 0xc0, 0x00, 0x00],
        ElementType::InvalidOperationReason => [CONTROL_PRDFAIL, 0x00, 0x00, 0x00],
        ElementType::UninterruptiblePowerSupply => [CONTROL_PRDFAIL, 0x00, 0x00, 0xc0],
        ElementType::Display => [CONTROL_PRDFAIL, 0xc0, 0xff, 0xff],
        ElementType::KeyPadEntry => [CONTROL_PRDFAIL, 0xc3, 0x00, 0x00],
        ElementType::Enclosure => [CONTROL_PRDFAIL, 0x80, 0x00, 0xff],
        ElementType::ScsiPortTransceiver => [CONTROL_PRDFAIL, 0xc0, 0x00, 0x10],
        ElementType::Language => [CONTROL_PRDFAIL, 0x80, 0xff, 0xff],
        ElementType::CommunicationPort => [CONTROL_PRDFAIL, 0xc0, 0x00, 0x01],
        ElementType::VoltageSensor => [CONTROL_PRDFAIL, 0xc0, 0x00, 0x00],
        ElementType::CurrentSensor => [CONTROL_PRDFAIL, 0xc0, 0x00, 0x00],
        ElementType::ScsiTargetPort => [CONTROL_PRDFAIL, 0xc0, 0x00, 0x01],
        ElementType::ScsiInitiatorPort => [CONTROL_PRDFAIL, 0xc0, 0x00, 0x01],
        ElementType::SimpleSubenclosure => [CONTROL_PRDFAIL, 0xc0, 0x00, 0x00],
        ElementType::ArrayDeviceSlot => [CONTROL_PRDFAIL, 0xff, 0x4e, 0x3c],
        ElementType::SasExpander => [CONTROL_PRDFAIL, 0xc0, 0x00, 0x00],
        ElementType::SasConnector => [CONTROL_PRDFAIL, 0x80, 0x00, 0x40],
        ElementType::Reserved(_) | ElementType::VendorSpecific(_) => {
            [CONTROL_PRDFAIL, 0x00, 0x00, 0x00]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_type_round_trip() {
        for code in 0u8..=0x19 {
            assert_eq!(ElementType::from_code(code).code(), code);
        }
        assert_eq!(ElementType::from_code(0x30), ElementType::Reserved(0x30));
        assert_eq!(
            ElementType::from_code(0x90),
            ElementType::VendorSpecific(0x90)
        );
    }

    #[test]
    fn parse_names_resolve() {
        assert_eq!(
            parse_element_type("array_device_slot"),
            Some(ElementType::ArrayDeviceSlot)
        );
        assert_eq!(parse_element_type("fan"), None);
    }

    #[test]
    fn decodes_power_supply_status() {
        // OK status, DC fail + failure LED lit
        let raw = [0x01, 0x00, 0x00, 0x41];
        let element = StatusElement::decode(ElementType::PowerSupply, false, raw);
        assert_eq!(element.common.code, ElementStatusCode::Ok);
        let ElementDetail::PowerSupply { fail, dc_fail, ac_fail, off, .. } = element.detail else {
            panic!("wrong detail: {:?}", element.detail);
        };
        assert!(fail);
        assert!(dc_fail);
        assert!(!ac_fail);
        assert!(!off);
    }

    #[test]
    fn decodes_cooling_speed() {
        // 3 high bits + low byte, units of 10 rpm
        let raw = [0x01, 0x02, 0x58, 0x25];
        let element = StatusElement::decode(ElementType::Cooling, false, raw);
        let ElementDetail::Cooling { speed_rpm, requested_on, speed_code, .. } = element.detail
        else {
            panic!("wrong detail");
        };
        assert_eq!(speed_rpm, ((2 << 8) | 0x58) * 10);
        assert!(requested_on);
        assert_eq!(speed_code, 0x5);
    }

    #[test]
    fn decodes_temperature_offset() {
        let raw = [0x01, 0x00, 45, 0x00];
        let element = StatusElement::decode(ElementType::TemperatureSensor, false, raw);
        let ElementDetail::TemperatureSensor { temperature, .. } = element.detail else {
            panic!("wrong detail");
        };
        assert_eq!(temperature, 25);
    }

    #[test]
    fn decodes_voltage_as_signed() {
        // -0.5 V = -50 in 10 mV units
        let wire = (-50i16).to_be_bytes();
        let raw = [0x01, 0x00, wire[0], wire[1]];
        let element = StatusElement::decode(ElementType::VoltageSensor, false, raw);
        let ElementDetail::VoltageSensor { millivolts, .. } = element.detail else {
            panic!("wrong detail");
        };
        assert_eq!(millivolts, -500);
    }

    #[test]
    fn unknown_types_stay_raw() {
        let raw = [0x01, 0xaa, 0xbb, 0xcc];
        let element = StatusElement::decode(ElementType::Reserved(0x42), false, raw);
        assert_eq!(element.detail, ElementDetail::Generic([0xaa, 0xbb, 0xcc]));
    }
}
