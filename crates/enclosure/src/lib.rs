// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! SCSI Enclosure Services diagnostic page handling
//!
//! Enclosures report and accept state through diagnostic pages fetched
//! with RECEIVE DIAGNOSTIC RESULTS and written with SEND DIAGNOSTIC. The
//! Configuration page (0x01) enumerates the element layout; every other
//! page is a flat run of records whose attribution to elements depends on
//! that layout, so non-Configuration decodes take a Configuration
//! reference and verify its generation number against the page's own.

use log::debug;
use thiserror::Error;
use zerocopy::byteorder::{BigEndian, U16, U32};
use zerocopy::FromBytes;

pub mod additional;
pub mod config;
pub mod control;
pub mod descriptor;
pub mod element;
pub mod microcode;
pub mod status;

pub use config::ConfigurationPage;
pub use element::{ElementType, StatusElement};

/// Errors raised while decoding or building diagnostic pages
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Scsi(#[from] scsi::Error),

    /// The buffer holds a different page than the caller asked to decode
    #[error("expected page {expected:#04x}, buffer holds page {actual:#04x}")]
    UnexpectedPage { expected: u8, actual: u8 },

    /// Decoding this page requires a previously decoded Configuration page
    #[error("page {page:#04x} cannot be decoded without a configuration page")]
    MissingConfiguration { page: u8 },

    /// The enclosure topology changed since the Configuration page was
    /// fetched; the caller must re-fetch it
    #[error("stale configuration: generation {have}, page reports {expect}")]
    StaleConfiguration { have: u32, expect: u32 },

    /// The addressed element does not exist in the configuration
    #[error("no element {index} of type {element_type}")]
    NoSuchElement {
        element_type: element::ElementType,
        index: usize,
    },
}

/// SES diagnostic page codes.
pub mod page_code {
    pub const SUPPORTED_PAGES: u8 = 0x00;
    pub const CONFIGURATION: u8 = 0x01;
    /// Enclosure Status when read, Enclosure Control when written
    pub const ENCLOSURE_CONTROL_STATUS: u8 = 0x02;
    pub const HELP_TEXT: u8 = 0x03;
    pub const STRING_IN_OUT: u8 = 0x04;
    pub const THRESHOLD_IN_OUT: u8 = 0x05;
    pub const ELEMENT_DESCRIPTOR: u8 = 0x07;
    pub const SHORT_ENCLOSURE_STATUS: u8 = 0x08;
    pub const ENCLOSURE_BUSY: u8 = 0x09;
    pub const ADDITIONAL_ELEMENT_STATUS: u8 = 0x0a;
    pub const SUBENCLOSURE_HELP_TEXT: u8 = 0x0b;
    pub const SUBENCLOSURE_STRING_IN_OUT: u8 = 0x0c;
    pub const SUPPORTED_SES_PAGES: u8 = 0x0d;
    pub const DOWNLOAD_MICROCODE: u8 = 0x0e;
    pub const SUBENCLOSURE_NICKNAME: u8 = 0x0f;
}

static PAGE_NAMES: &[(u8, &str)] = &[
    (page_code::SUPPORTED_PAGES, "Supported Diagnostic Pages"),
    (page_code::CONFIGURATION, "Configuration"),
    (page_code::ENCLOSURE_CONTROL_STATUS, "Enclosure Control/Status"),
    (page_code::HELP_TEXT, "Help Text"),
    (page_code::STRING_IN_OUT, "String In/Out"),
    (page_code::THRESHOLD_IN_OUT, "Threshold In/Out"),
    (page_code::ELEMENT_DESCRIPTOR, "Element Descriptor"),
    (page_code::SHORT_ENCLOSURE_STATUS, "Short Enclosure Status"),
    (page_code::ENCLOSURE_BUSY, "Enclosure Busy"),
    (page_code::ADDITIONAL_ELEMENT_STATUS, "Additional Element Status"),
    (page_code::SUBENCLOSURE_HELP_TEXT, "Subenclosure Help Text"),
    (page_code::SUBENCLOSURE_STRING_IN_OUT, "Subenclosure String In/Out"),
    (page_code::SUPPORTED_SES_PAGES, "Supported SES Diagnostic Pages"),
    (page_code::DOWNLOAD_MICROCODE, "Download Microcode Control/Status"),
    (page_code::SUBENCLOSURE_NICKNAME, "Subenclosure Nickname Control/Status"),
];

/// Resolve a page code to a name; unknown codes classify by range.
pub fn page_name(code: u8) -> &'static str {
    PAGE_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or(match code {
            0x10..=0x3f => "Reserved",
            0x40..=0x7f => "Device Specific",
            _ => "Vendor Specific",
        })
}

/// Common 8-byte header shared by every SES page except Configuration
/// (which reuses byte 1 for its secondary subenclosure count).
#[derive(Debug, FromBytes)]
#[repr(C)]
pub(crate) struct RawPageHeader {
    page_code: u8,
    byte1: u8,
    page_length: U16<BigEndian>,
    generation: U32<BigEndian>,
}

pub(crate) struct PageHeader {
    pub byte1: u8,
    pub generation: u32,
    /// Buffer ended before the declared page length
    pub truncated: bool,
}

/// Parse the page header, returning it with the body it delimits.
///
/// The body spans from byte 8 to the declared page length (which counts
/// bytes after byte 3), capped at the actual buffer.
pub(crate) fn parse_header(expected: u8, buf: &[u8]) -> Result<(PageHeader, &[u8]), Error> {
    let (raw, _) = RawPageHeader::read_from_prefix(buf).map_err(|_| {
        Error::Scsi(scsi::Error::BufferTooShort {
            needed: std::mem::size_of::<RawPageHeader>(),
            actual: buf.len(),
        })
    })?;
    if raw.page_code != expected {
        return Err(Error::UnexpectedPage {
            expected,
            actual: raw.page_code,
        });
    }
    let declared_end = 4 + usize::from(raw.page_length.get());
    let truncated = declared_end > buf.len();
    if truncated {
        debug!(
            "page {expected:#04x} declares {declared_end} bytes, buffer holds {}",
            buf.len()
        );
    }
    // The header parse guarantees at least 8 bytes; a declared length
    // under 4 leaves an empty body
    let body = &buf[8..declared_end.clamp(8, buf.len())];
    Ok((
        PageHeader {
            byte1: raw.byte1,
            generation: raw.generation.get(),
            truncated,
        },
        body,
    ))
}

/// Verify a page's generation number against the configuration it will be
/// attributed with.
pub(crate) fn check_generation(config: &ConfigurationPage, page_generation: u32) -> Result<(), Error> {
    if config.generation != page_generation {
        return Err(Error::StaleConfiguration {
            have: config.generation,
            expect: page_generation,
        });
    }
    Ok(())
}

/// Any decoded diagnostic page.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum DiagnosticPage {
    /// Page 0x00: list of supported page codes
    SupportedPages(Vec<u8>),
    Configuration(config::ConfigurationPage),
    Status(status::StatusPage),
    ElementDescriptor(descriptor::ElementDescriptorPage),
    AdditionalElementStatus(additional::AdditionalElementStatusPage),
    DownloadMicrocodeStatus(microcode::DownloadMicrocodePage),
    /// Pages with no structured decode, kept whole
    Raw { page_code: u8, data: Vec<u8> },
}

/// Decode a received diagnostic page.
///
/// Pages other than Configuration and the flat informational pages need
/// `config`; passing `None` for those yields
/// [`Error::MissingConfiguration`] so the caller can perform the
/// Configuration fetch first (an explicit extra round trip, never a
/// hidden one).
pub fn decode_page(
    page: u8,
    buf: &[u8],
    config: Option<&ConfigurationPage>,
) -> Result<DiagnosticPage, Error> {
    let need_config = || Error::MissingConfiguration { page };
    match page {
        page_code::SUPPORTED_PAGES | page_code::SUPPORTED_SES_PAGES => {
            let (_, body) = parse_header(page, buf)?;
            Ok(DiagnosticPage::SupportedPages(body.to_vec()))
        }
        page_code::CONFIGURATION => Ok(DiagnosticPage::Configuration(config::decode(buf)?)),
        page_code::ENCLOSURE_CONTROL_STATUS => {
            let config = config.ok_or_else(need_config)?;
            Ok(DiagnosticPage::Status(status::decode(buf, config)?))
        }
        page_code::ELEMENT_DESCRIPTOR => {
            let config = config.ok_or_else(need_config)?;
            Ok(DiagnosticPage::ElementDescriptor(descriptor::decode(
                buf, config,
            )?))
        }
        page_code::ADDITIONAL_ELEMENT_STATUS => {
            let config = config.ok_or_else(need_config)?;
            Ok(DiagnosticPage::AdditionalElementStatus(additional::decode(
                buf, config,
            )?))
        }
        page_code::DOWNLOAD_MICROCODE => Ok(DiagnosticPage::DownloadMicrocodeStatus(
            microcode::decode(buf)?,
        )),
        _ => Ok(DiagnosticPage::Raw {
            page_code: page,
            data: buf.to_vec(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_names_resolve() {
        assert_eq!(page_name(0x01), "Configuration");
        assert_eq!(page_name(0x0a), "Additional Element Status");
        assert_eq!(page_name(0x35), "Reserved");
        assert_eq!(page_name(0x44), "Device Specific");
        assert_eq!(page_name(0xc3), "Vendor Specific");
    }

    #[test]
    fn status_requires_configuration() {
        let buf = [0x02, 0x00, 0x00, 0x04, 0, 0, 0, 1];
        assert_eq!(
            decode_page(page_code::ENCLOSURE_CONTROL_STATUS, &buf, None),
            Err(Error::MissingConfiguration { page: 0x02 })
        );
    }

    #[test]
    fn header_mismatch_detected() {
        let buf = [0x07, 0x00, 0x00, 0x04, 0, 0, 0, 1];
        assert_eq!(
            parse_header(0x02, &buf).map(|_| ()),
            Err(Error::UnexpectedPage {
                expected: 0x02,
                actual: 0x07
            })
        );
    }

    #[test]
    fn unknown_pages_kept_raw() {
        let buf = [0x09, 0x00, 0x00, 0x00];
        let page = decode_page(0x09, &buf, None).unwrap();
        assert!(matches!(page, DiagnosticPage::Raw { page_code: 0x09, .. }));
    }
}
