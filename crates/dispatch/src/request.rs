// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Command requests and their accumulated results

use std::time::Duration;

use scsi::cdb::DataDirection;
use scsi::sense::{self, SenseRecord};

/// Maximum sense data a request reserves room for.
pub const SENSE_BUFFER_LENGTH: usize = 252;

/// Default command timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Error recovery knobs for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPolicy {
    /// Retry retriable errors at all
    pub enabled: bool,
    /// Wait between retries
    pub delay: Duration,
    /// Retries allowed before the command fails terminally
    pub limit: u32,
    /// On a retriable error, signal the caller to re-encode and restart
    /// instead of resubmitting the same CDB
    pub restart: bool,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        RecoveryPolicy {
            enabled: true,
            delay: Duration::from_secs(2),
            limit: 60,
            restart: false,
        }
    }
}

/// Mutable result set, reset between iterations of a repeated command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub scsi_status: u8,
    pub host_status: u16,
    pub driver_status: u16,
    pub os_error: Option<i32>,
    pub bytes_transferred: usize,
    pub residual: usize,
    pub sense_length: usize,
    pub elapsed: Duration,
    /// Submissions performed, including retries
    pub attempts: u32,
}

/// One command lifecycle: the encoded CDB, its buffers, timeout and
/// recovery policy, plus the mutable result set. Owned exclusively by the
/// thread executing it.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub cdb: Vec<u8>,
    pub direction: DataDirection,
    pub data: Vec<u8>,
    pub sense: Vec<u8>,
    pub timeout: Duration,
    pub recovery: RecoveryPolicy,
    pub result: CommandResult,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>, cdb: impl Into<Vec<u8>>, direction: DataDirection) -> Self {
        CommandRequest {
            name: name.into(),
            cdb: cdb.into(),
            direction,
            data: Vec::new(),
            sense: vec![0u8; SENSE_BUFFER_LENGTH],
            timeout: DEFAULT_TIMEOUT,
            recovery: RecoveryPolicy::default(),
            result: CommandResult::default(),
        }
    }

    /// Attach an outbound payload (write-like commands).
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Reserve an inbound buffer of `length` bytes (read-like commands).
    pub fn with_read_length(mut self, length: usize) -> Self {
        self.data = vec![0u8; length];
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.recovery = recovery;
        self
    }

    /// Clear results and sense between iterations. The encoded CDB and
    /// data buffer are kept.
    pub fn reset(&mut self) {
        self.result = CommandResult::default();
        self.sense.fill(0);
    }

    /// Decode whatever sense data the last submission deposited.
    pub fn sense_record(&self) -> SenseRecord {
        let length = self.result.sense_length.min(self.sense.len());
        sense::decode(&self.sense[..length])
    }

    /// The data the device actually returned.
    pub fn transferred(&self) -> &[u8] {
        &self.data[..self.result.bytes_transferred.min(self.data.len())]
    }
}
