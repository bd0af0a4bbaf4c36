// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Per-target session state
//!
//! A [`DeviceSession`] owns one transport handle plus the block and
//! capacity bookkeeping multi-step operations need. Sessions are never
//! shared: worker threads get their own via [`DeviceSession::duplicate`],
//! which reopens the transport.

use std::io;

use log::debug;

use scsi::cdb::{self, DataDirection};
use scsi::codec;
use scsi::inquiry::Inquiry;
use scsi::opcodes::{self, OpcodeEntry};
use scsi::DeviceType;

use crate::recovery::{self, Terminal};
use crate::request::CommandRequest;
use crate::transport::Transport;
use crate::{Error, HarnessContext};

/// Mutable per-target state for one thread.
pub struct DeviceSession {
    transport: Box<dyn Transport>,
    /// Peripheral device type, refined by the first Inquiry
    pub device_type: DeviceType,
    pub block_size: u32,
    pub capacity_blocks: u64,
    /// Next LBA for multi-step sequential operations
    pub next_lba: u64,
    /// Commands that needed at least one retry to complete
    pub recovered_errors: u32,
}

impl DeviceSession {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        DeviceSession {
            transport,
            device_type: DeviceType::Direct,
            block_size: 512,
            capacity_blocks: 0,
            next_lba: 0,
            recovered_errors: 0,
        }
    }

    pub fn target(&self) -> &str {
        self.transport.target()
    }

    pub fn transport_mut(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    /// An independent session against the same target: own transport
    /// handle and buffers, carried-over bookkeeping.
    pub fn duplicate(&self) -> io::Result<DeviceSession> {
        Ok(DeviceSession {
            transport: self.transport.reopen()?,
            device_type: self.device_type,
            block_size: self.block_size,
            capacity_blocks: self.capacity_blocks,
            next_lba: self.next_lba,
            recovered_errors: 0,
        })
    }

    /// Registry row for an opcode against this session's device type.
    pub fn opcode_entry(&self, opcode: u8, sub_opcode: Option<u8>) -> Option<&'static OpcodeEntry> {
        opcodes::lookup(opcode, sub_opcode, self.device_type)
    }

    /// Execute one request through the recovery engine, folding the
    /// terminal state into a `Result`.
    pub fn execute(
        &mut self,
        request: &mut CommandRequest,
        ctx: &HarnessContext,
    ) -> Result<(), Error> {
        match recovery::execute(self.transport.as_mut(), request, ctx) {
            Terminal::Success => {
                if request.result.attempts > 1 {
                    self.recovered_errors += 1;
                }
                Ok(())
            }
            Terminal::Failure(detail) => Err(Error::Command(detail)),
            Terminal::Restart => Err(Error::RestartRequested(request.name.clone())),
        }
    }

    /// Standard Inquiry; refines the session's device type.
    pub fn inquiry(&mut self, ctx: &HarnessContext) -> Result<Inquiry, Error> {
        let mut request = CommandRequest::new(
            "Inquiry",
            cdb::inquiry(None, 96),
            DataDirection::FromDevice,
        )
        .with_read_length(96);
        self.execute(&mut request, ctx)?;
        let inquiry = Inquiry::decode(request.transferred())?;
        self.device_type = inquiry.device_type;
        Ok(inquiry)
    }

    /// READ CAPACITY, preferring the 10-byte form and escalating to the
    /// 16-byte service action when the capacity saturates it. Updates the
    /// session bookkeeping and returns (blocks, block size).
    pub fn read_capacity(&mut self, ctx: &HarnessContext) -> Result<(u64, u32), Error> {
        let mut request = CommandRequest::new(
            "Read Capacity(10)",
            cdb::read_capacity10(),
            DataDirection::FromDevice,
        )
        .with_read_length(8);
        self.execute(&mut request, ctx)?;
        let data = request.transferred();
        let last_lba = codec::read_be_at(data, 0, 4)?;
        let block_size = codec::read_be_at(data, 4, 4)? as u32;

        let (blocks, block_size) = if last_lba == u64::from(u32::MAX) {
            debug!("{}: capacity saturates Read Capacity(10)", self.target());
            let mut request = CommandRequest::new(
                "Read Capacity(16)",
                cdb::read_capacity16(32),
                DataDirection::FromDevice,
            )
            .with_read_length(32);
            self.execute(&mut request, ctx)?;
            let data = request.transferred();
            (
                codec::read_be_at(data, 0, 8)? + 1,
                codec::read_be_at(data, 8, 4)? as u32,
            )
        } else {
            (last_lba + 1, block_size)
        };

        self.capacity_blocks = blocks;
        self.block_size = block_size;
        Ok((blocks, block_size))
    }

    /// Claim `blocks` sequential blocks, returning their starting LBA and
    /// wrapping at the device capacity.
    pub fn advance(&mut self, blocks: u64) -> u64 {
        let lba = self.next_lba;
        self.next_lba = lba.saturating_add(blocks);
        if self.capacity_blocks > 0 && self.next_lba >= self.capacity_blocks {
            self.next_lba = 0;
        }
        lba
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("target", &self.target())
            .field("device_type", &self.device_type)
            .field("block_size", &self.block_size)
            .field("capacity_blocks", &self.capacity_blocks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockStep, MockTransport};
    use test_log::test;

    fn inquiry_data(device_type: u8) -> Vec<u8> {
        let mut data = vec![0u8; 96];
        data[0] = device_type;
        data[8..16].copy_from_slice(b"MOCKVEND");
        data[16..32].copy_from_slice(b"MOCK DEVICE     ");
        data[32..36].copy_from_slice(b"0001");
        data
    }

    #[test]
    fn inquiry_refines_device_type() {
        let transport = MockTransport::new(
            "mock0",
            vec![MockStep::Good {
                data: inquiry_data(0x0d),
            }],
        );
        let ctx = HarnessContext::new();
        let mut session = DeviceSession::new(Box::new(transport));
        let inquiry = session.inquiry(&ctx).unwrap();
        assert_eq!(inquiry.vendor, "MOCKVEND");
        assert_eq!(session.device_type, DeviceType::Enclosure);
        // Registry rows now resolve against the enclosure device type
        assert!(session.opcode_entry(0x88, None).is_none());
    }

    #[test]
    fn read_capacity_small_device() {
        let mut data = vec![0u8; 8];
        data[0..4].copy_from_slice(&999u32.to_be_bytes());
        data[4..8].copy_from_slice(&4096u32.to_be_bytes());
        let transport = MockTransport::new("mock0", vec![MockStep::Good { data }]);
        let ctx = HarnessContext::new();
        let mut session = DeviceSession::new(Box::new(transport));
        assert_eq!(session.read_capacity(&ctx).unwrap(), (1000, 4096));
        assert_eq!(session.capacity_blocks, 1000);
        assert_eq!(session.block_size, 4096);
    }

    #[test]
    fn read_capacity_escalates_to_16() {
        let mut rc10 = vec![0u8; 8];
        rc10[0..4].copy_from_slice(&u32::MAX.to_be_bytes());
        rc10[4..8].copy_from_slice(&512u32.to_be_bytes());
        let mut rc16 = vec![0u8; 32];
        rc16[0..8].copy_from_slice(&(1u64 << 33).to_be_bytes());
        rc16[8..12].copy_from_slice(&512u32.to_be_bytes());
        let transport = MockTransport::new(
            "mock0",
            vec![MockStep::Good { data: rc10 }, MockStep::Good { data: rc16 }],
        );
        let ctx = HarnessContext::new();
        let mut session = DeviceSession::new(Box::new(transport));
        assert_eq!(session.read_capacity(&ctx).unwrap(), ((1 << 33) + 1, 512));
    }

    #[test]
    fn advance_wraps_at_capacity() {
        let transport = MockTransport::new("mock0", vec![]);
        let mut session = DeviceSession::new(Box::new(transport));
        session.capacity_blocks = 100;
        assert_eq!(session.advance(60), 0);
        assert_eq!(session.advance(60), 60);
        // 120 >= 100, wrapped
        assert_eq!(session.advance(10), 0);
    }
}
