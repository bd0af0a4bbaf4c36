// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The transport boundary
//!
//! Everything OS-specific about getting a CDB to a device lives behind
//! [`Transport`]: submission, status capture, and the judgement of which
//! transport-level outcomes are worth retrying. The execution layer never
//! reaches around this trait.

use std::io;
use std::time::Duration;

use serde::Serialize;

use scsi::cdb::DataDirection;
use scsi::tables;

/// Raw outcome of one submitted command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub scsi_status: u8,
    /// HBA-level status (Linux `DID_*` numbering)
    pub host_status: u16,
    /// Driver-level status
    pub driver_status: u16,
    /// OS error reported alongside a completed submission, if any
    pub os_error: Option<i32>,
    pub bytes_transferred: usize,
    pub residual: usize,
    /// Valid sense bytes deposited in the caller's sense buffer
    pub sense_length: usize,
}

impl Completion {
    /// GOOD status, clean host/driver codes and no sense data.
    pub fn is_good(&self) -> bool {
        self.scsi_status == tables::status::GOOD
            && self.host_status == 0
            && self.driver_status & 0x0f == 0
            && self.sense_length == 0
    }
}

/// Buffers and parameters for one submission.
pub struct SubmitArgs<'a> {
    pub cdb: &'a [u8],
    pub direction: DataDirection,
    pub data: &'a mut [u8],
    pub sense: &'a mut [u8],
    pub timeout: Duration,
}

/// An open path to one target device.
///
/// Implementations block in [`Transport::submit`] for the duration of the
/// command (or its timeout). An `Err` return means the command could not
/// be submitted at all; device-level errors come back as a `Completion`.
pub trait Transport: Send {
    /// Target name, for diagnostics (`/dev/sg4`, `mock0`, ...).
    fn target(&self) -> &str;

    /// Submit one command and block until it completes.
    fn submit(&mut self, io: SubmitArgs<'_>) -> io::Result<Completion>;

    /// Whether this completion represents a transient transport condition
    /// worth retrying. Sense-level retry decisions are made elsewhere.
    fn is_retriable(&self, completion: &Completion) -> bool;

    /// Open an independent handle to the same target. Worker threads get
    /// their own handle; handles are never shared.
    fn reopen(&self) -> io::Result<Box<dyn Transport>>;
}
