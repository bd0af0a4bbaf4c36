// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Enclosure page round trips
//!
//! Fetching, decoding and writing SES diagnostic pages through a
//! [`DeviceSession`]. Decoding a Status/Control-family page without a
//! Configuration page in hand triggers one extra RECEIVE DIAGNOSTIC round
//! trip to fetch it first; that extra I/O happens here, in plain sight,
//! not inside the decoder.

use log::debug;

use enclosure::control::{ControlBuilder, SlotAction};
use enclosure::{page_code, ConfigurationPage, DiagnosticPage, ElementType};
use scsi::cdb::{self, DataDirection};

use crate::request::CommandRequest;
use crate::session::DeviceSession;
use crate::{Error, HarnessContext};

/// Allocation length for RECEIVE DIAGNOSTIC RESULTS fetches.
const PAGE_ALLOCATION: u16 = 0xfffc;

/// Fetch one diagnostic page's raw bytes.
pub fn receive_page(
    session: &mut DeviceSession,
    ctx: &HarnessContext,
    page: u8,
) -> Result<Vec<u8>, Error> {
    let name = session
        .opcode_entry(cdb::op::RECEIVE_DIAGNOSTIC, None)
        .map(|entry| entry.name)
        .unwrap_or("Receive Diagnostic");
    let mut request = CommandRequest::new(
        name,
        cdb::receive_diagnostic(page, PAGE_ALLOCATION),
        DataDirection::FromDevice,
    )
    .with_read_length(usize::from(PAGE_ALLOCATION));
    session.execute(&mut request, ctx)?;
    Ok(request.transferred().to_vec())
}

/// Fetch and decode the Configuration page.
pub fn fetch_configuration(
    session: &mut DeviceSession,
    ctx: &HarnessContext,
) -> Result<ConfigurationPage, Error> {
    let data = receive_page(session, ctx, page_code::CONFIGURATION)?;
    Ok(enclosure::config::decode(&data)?)
}

/// Fetch and decode any diagnostic page.
///
/// When `config` is absent and the page needs one, the Configuration
/// page is fetched first with a second synchronous round trip.
pub fn read_page(
    session: &mut DeviceSession,
    ctx: &HarnessContext,
    page: u8,
    config: Option<&ConfigurationPage>,
) -> Result<DiagnosticPage, Error> {
    let data = receive_page(session, ctx, page)?;
    match enclosure::decode_page(page, &data, config) {
        Err(enclosure::Error::MissingConfiguration { .. }) => {
            debug!("page {page:#04x} needs the configuration page; fetching it first");
            let fetched = fetch_configuration(session, ctx)?;
            Ok(enclosure::decode_page(page, &data, Some(&fetched))?)
        }
        other => Ok(other?),
    }
}

/// Send a fully built control page via SEND DIAGNOSTIC.
pub fn send_control(
    session: &mut DeviceSession,
    ctx: &HarnessContext,
    page: Vec<u8>,
) -> Result<(), Error> {
    let length = page.len() as u16;
    let mut request = CommandRequest::new(
        "Send Diagnostic",
        cdb::send_diagnostic(length),
        DataDirection::ToDevice,
    )
    .with_data(page);
    session.execute(&mut request, ctx)
}

/// Set or clear a slot action (ident/fault/device-off) on one element.
///
/// Performs the full read-modify-write: fetch Configuration and Status,
/// mask the status records, flip the requested bits with SELECT, and
/// send the Control page back.
pub fn set_slot_action(
    session: &mut DeviceSession,
    ctx: &HarnessContext,
    element_type: ElementType,
    index: usize,
    action: SlotAction,
    on: bool,
) -> Result<(), Error> {
    let config = fetch_configuration(session, ctx)?;
    let data = receive_page(session, ctx, page_code::ENCLOSURE_CONTROL_STATUS)?;
    let status = enclosure::status::decode(&data, &config)?;
    let mut builder = ControlBuilder::from_status(&config, &status)?;
    builder.slot_action(element_type, index, action, on)?;
    send_control(session, ctx, builder.encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockStep, MockTransport};
    use test_log::test;
    use enclosure::element::CONTROL_SELECT;

    fn config_page_bytes(generation: u32) -> Vec<u8> {
        // Minimal configuration: one subenclosure, two array slots
        let mut body = Vec::new();
        body.extend_from_slice(&[0x11, 0x00, 1, 36]);
        body.extend_from_slice(&0x5000_0000_0000_0001u64.to_be_bytes());
        body.extend_from_slice(b"MOCKVEND");
        body.extend_from_slice(b"MOCK ENCLOSURE  ");
        body.extend_from_slice(b"0001");
        body.extend_from_slice(&[ElementType::ArrayDeviceSlot.code(), 2, 0, 0]);

        let mut page = vec![page_code::CONFIGURATION, 0x00];
        page.extend_from_slice(&((body.len() + 4) as u16).to_be_bytes());
        page.extend_from_slice(&generation.to_be_bytes());
        page.extend_from_slice(&body);
        page
    }

    fn status_page_bytes(generation: u32) -> Vec<u8> {
        let mut page = vec![page_code::ENCLOSURE_CONTROL_STATUS, 0x00, 0x00, 16];
        page.extend_from_slice(&generation.to_be_bytes());
        for _ in 0..3 {
            page.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]);
        }
        page
    }

    #[test]
    fn read_page_fetches_configuration_on_demand() {
        let transport = MockTransport::new(
            "mock0",
            vec![
                // First fetch: the status page itself
                MockStep::Good {
                    data: status_page_bytes(5),
                },
                // Second fetch: the configuration it turned out to need
                MockStep::Good {
                    data: config_page_bytes(5),
                },
            ],
        );
        let counter = transport.submission_counter();
        let ctx = HarnessContext::new();
        let mut session = DeviceSession::new(Box::new(transport));

        let page = read_page(&mut session, &ctx, page_code::ENCLOSURE_CONTROL_STATUS, None)
            .unwrap();
        let DiagnosticPage::Status(status) = page else {
            panic!("expected a status page");
        };
        assert_eq!(status.elements.len(), 3);
        // Two round trips: the page, then the configuration
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn read_page_reuses_supplied_configuration() {
        let transport = MockTransport::new(
            "mock0",
            vec![MockStep::Good {
                data: status_page_bytes(5),
            }],
        );
        let counter = transport.submission_counter();
        let ctx = HarnessContext::new();
        let mut session = DeviceSession::new(Box::new(transport));
        let config = enclosure::config::decode(&config_page_bytes(5)).unwrap();

        let page = read_page(
            &mut session,
            &ctx,
            page_code::ENCLOSURE_CONTROL_STATUS,
            Some(&config),
        )
        .unwrap();
        assert!(matches!(page, DiagnosticPage::Status(_)));
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn stale_configuration_surfaces() {
        let transport = MockTransport::new(
            "mock0",
            vec![MockStep::Good {
                data: status_page_bytes(6),
            }],
        );
        let ctx = HarnessContext::new();
        let mut session = DeviceSession::new(Box::new(transport));
        let config = enclosure::config::decode(&config_page_bytes(5)).unwrap();

        let result = read_page(
            &mut session,
            &ctx,
            page_code::ENCLOSURE_CONTROL_STATUS,
            Some(&config),
        );
        assert!(matches!(
            result,
            Err(Error::Enclosure(enclosure::Error::StaleConfiguration {
                have: 5,
                expect: 6
            }))
        ));
    }

    #[test]
    fn slot_fault_round_trip_sends_control_page() {
        let transport = MockTransport::new(
            "mock0",
            vec![
                MockStep::Good {
                    data: config_page_bytes(9),
                },
                MockStep::Good {
                    data: status_page_bytes(9),
                },
                MockStep::Good { data: vec![] },
            ],
        );
        let written = transport.written();
        let ctx = HarnessContext::new();
        let mut session = DeviceSession::new(Box::new(transport));

        set_slot_action(
            &mut session,
            &ctx,
            ElementType::ArrayDeviceSlot,
            0,
            SlotAction::Fault,
            true,
        )
        .unwrap();

        let page = written.lock().unwrap();
        assert_eq!(page[0], page_code::ENCLOSURE_CONTROL_STATUS);
        assert_eq!(&page[4..8], &9u32.to_be_bytes());
        // Overall record unselected, slot 0 selected with fault requested
        assert_eq!(page[8] & CONTROL_SELECT, 0);
        assert_eq!(page[12] & CONTROL_SELECT, CONTROL_SELECT);
        assert_eq!(page[15] & 0x20, 0x20);
    }
}
