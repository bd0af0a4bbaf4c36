// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Exercises the command harness end to end against a scripted mock
//! enclosure: inquiry, a retried command, a threaded batch, SES page
//! decoding and a slot-fault control round trip. Run with
//! `RUST_LOG=debug` for the full retry/recovery narration.

use std::sync::Arc;

use log::info;

use dispatch::batch::{self, JobSpec};
use dispatch::mock::{MockStep, MockTransport};
use dispatch::recovery::RunPolicy;
use dispatch::session::DeviceSession;
use dispatch::{ses, CommandRequest, HarnessContext};
use enclosure::control::SlotAction;
use enclosure::{DiagnosticPage, ElementType};
use scsi::cdb::{self, DataDirection};
use scsi::fields::Report;
use scsi::sense;

fn inquiry_data() -> Vec<u8> {
    let mut data = vec![0u8; 96];
    data[0] = 0x0d; // enclosure services device
    data[2] = 0x06;
    data[4] = 91;
    data[6] = 0x40;
    data[8..16].copy_from_slice(b"MOCKVEND");
    data[16..32].copy_from_slice(b"MOCK ENCLOSURE  ");
    data[32..36].copy_from_slice(b"0001");
    data
}

fn configuration_page(generation: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0x11, 0x00, 3, 36]);
    body.extend_from_slice(&0x5000_0000_0000_0001u64.to_be_bytes());
    body.extend_from_slice(b"MOCKVEND");
    body.extend_from_slice(b"MOCK ENCLOSURE  ");
    body.extend_from_slice(b"0001");
    for (element_type, count, text) in [
        (ElementType::ArrayDeviceSlot, 4u8, "Drive Slots"),
        (ElementType::PowerSupply, 2, ""),
        (ElementType::Cooling, 2, "Fans"),
    ] {
        body.extend_from_slice(&[element_type.code(), count, 0, text.len() as u8]);
    }
    body.extend_from_slice(b"Drive Slots");
    body.extend_from_slice(b"Fans");

    let mut page = vec![enclosure::page_code::CONFIGURATION, 0x00];
    page.extend_from_slice(&((body.len() + 4) as u16).to_be_bytes());
    page.extend_from_slice(&generation.to_be_bytes());
    page.extend_from_slice(&body);
    page
}

fn status_page(generation: u32) -> Vec<u8> {
    let mut records: Vec<[u8; 4]> = Vec::new();
    // Array slots: overall plus four slots, slot 2 flagging a fault
    records.push([0x01, 0, 0, 0]);
    records.push([0x01, 0, 0, 0]);
    records.push([0x01, 0, 0, 0]);
    records.push([0x02, 0x00, 0x00, 0x40]); // critical, fault sensed
    records.push([0x01, 0, 0, 0]);
    // Power supplies: overall plus two, one reporting DC fail
    records.push([0x01, 0, 0, 0]);
    records.push([0x01, 0, 0, 0]);
    records.push([0x02, 0x00, 0x00, 0x41]);
    // Cooling: overall plus two fans at 5000 rpm
    records.push([0x01, 0, 0, 0]);
    records.push([0x01, 0x01, 0xf4, 0x25]);
    records.push([0x01, 0x01, 0xf4, 0x25]);

    let mut page = vec![enclosure::page_code::ENCLOSURE_CONTROL_STATUS, 0x02];
    page.extend_from_slice(&((records.len() * 4 + 4) as u16).to_be_bytes());
    page.extend_from_slice(&generation.to_be_bytes());
    for record in records {
        page.extend_from_slice(&record);
    }
    page
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let ctx = Arc::new(HarnessContext::new());
    let generation = 7;

    let transport = MockTransport::new(
        "mock-enclosure",
        vec![
            MockStep::Good { data: inquiry_data() },
            // A transient transport glitch the recovery engine rides out
            MockStep::TransportDisrupted,
            MockStep::Good { data: vec![] },
            MockStep::Good { data: status_page(generation) },
            MockStep::Good { data: configuration_page(generation) },
            MockStep::Good { data: configuration_page(generation) },
            MockStep::Good { data: status_page(generation) },
            MockStep::Good { data: vec![] },
        ],
    );
    let written = transport.written();
    let mut session = DeviceSession::new(Box::new(transport));

    // Identify the target
    let inquiry = session.inquiry(&ctx)?;
    info!("connected to {} {}", inquiry.vendor, inquiry.product);
    for field in inquiry.fields() {
        info!("  {}: {}", field.name, field.value);
    }

    // A command that needs one retry to complete
    let mut request = CommandRequest::new(
        "Test Unit Ready",
        cdb::test_unit_ready(),
        DataDirection::None,
    );
    request.recovery.delay = std::time::Duration::from_millis(50);
    session.execute(&mut request, &ctx)?;
    info!(
        "test unit ready completed after {} attempts in {:?}",
        request.result.attempts, request.result.elapsed
    );

    // Decode a status page, auto-fetching the configuration it needs
    let page = ses::read_page(
        &mut session,
        &ctx,
        enclosure::page_code::ENCLOSURE_CONTROL_STATUS,
        None,
    )?;
    if let DiagnosticPage::Status(status) = &page {
        info!(
            "enclosure status: critical={} non-critical={}",
            status.critical, status.non_critical
        );
        for element in status.elements.iter().filter(|e| !e.overall) {
            info!(
                "  {} [{}]: {}",
                element.element_type,
                element.common.code.name(),
                serde_json::to_string(&element.detail).unwrap_or_default()
            );
        }
    }

    // Light the fault LED on the failed slot, read-modify-write
    ses::set_slot_action(
        &mut session,
        &ctx,
        ElementType::ArrayDeviceSlot,
        2,
        SlotAction::Fault,
        true,
    )?;
    info!(
        "sent control page of {} bytes",
        written.lock().map(|page| page.len()).unwrap_or(0)
    );

    // A four-thread batch against cloned sessions
    let batch_transport = MockTransport::new("mock-batch", vec![]);
    let template = DeviceSession::new(Box::new(batch_transport));
    let spec = JobSpec::single(
        CommandRequest::new("Test Unit Ready", cdb::test_unit_ready(), DataDirection::None),
        RunPolicy {
            repeat: 4,
            ..RunPolicy::default()
        },
    );
    let result = batch::dispatch(&spec, &[&template], 4, &ctx)?;
    info!(
        "batch finished: {:?}, {} thread contexts",
        result.status,
        result.contexts.len()
    );

    // And the classic sense decode, straight off the wire
    let record = sense::decode(&[
        0x70, 0x00, 0x05, 0, 0, 0, 0, 0x0a, 0, 0, 0, 0, 0x24, 0x00, 0, 0, 0, 0,
    ]);
    info!("sense scenario: {}", record.classify().describe());
    Ok(())
}
