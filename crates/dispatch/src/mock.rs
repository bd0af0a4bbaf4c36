// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Scripted transport for testing
//!
//! Plays back a fixed sequence of outcomes, one per submission, without
//! touching any hardware. Reopened handles normally replay the script
//! from the start; a shared-script transport instead hands the one queue
//! to every reopen, letting batch tests distribute outcomes across
//! worker threads. All handles share one submission counter.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use scsi::cdb::DataDirection;
use scsi::tables::{host_status, status};

use crate::transport::{Completion, SubmitArgs, Transport};

/// One scripted submission outcome.
#[derive(Debug, Clone)]
pub enum MockStep {
    /// GOOD status, returning `data` to read-like commands
    Good { data: Vec<u8> },
    /// CHECK CONDITION carrying the given sense bytes
    CheckCondition { sense: Vec<u8> },
    /// An arbitrary SCSI status with no sense (BUSY, TASK SET FULL, ...)
    Status { scsi_status: u8 },
    /// Submission completes but the HBA reports a disrupted transport;
    /// the transport predicate calls this retriable
    TransportDisrupted,
    /// The submission itself fails with an OS error
    OsError(i32),
}

/// A scripted in-memory transport.
#[derive(Debug)]
pub struct MockTransport {
    target: String,
    queue: Arc<Mutex<VecDeque<MockStep>>>,
    initial: Vec<MockStep>,
    shared: bool,
    submissions: Arc<AtomicUsize>,
    written: Arc<Mutex<Vec<u8>>>,
}

impl MockTransport {
    /// A transport whose reopens each replay the script from the start.
    pub fn new(target: impl Into<String>, steps: Vec<MockStep>) -> Self {
        Self::build(target.into(), steps, false)
    }

    /// A transport whose reopens all drain one shared script, so a batch
    /// of workers distributes the steps between them.
    pub fn new_shared(target: impl Into<String>, steps: Vec<MockStep>) -> Self {
        Self::build(target.into(), steps, true)
    }

    fn build(target: String, steps: Vec<MockStep>, shared: bool) -> Self {
        MockTransport {
            target,
            queue: Arc::new(Mutex::new(steps.clone().into())),
            initial: steps,
            shared,
            submissions: Arc::new(AtomicUsize::new(0)),
            written: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared submission counter, across this handle and its reopens.
    pub fn submission_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.submissions)
    }

    /// The last payload a write-like command carried, across all handles.
    pub fn written(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.written)
    }

    fn next_step(&self) -> MockStep {
        let mut queue = self
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // An exhausted script keeps succeeding quietly
        queue
            .pop_front()
            .unwrap_or(MockStep::Good { data: Vec::new() })
    }
}

impl Transport for MockTransport {
    fn target(&self) -> &str {
        &self.target
    }

    fn submit(&mut self, io: SubmitArgs<'_>) -> io::Result<Completion> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        if io.direction == DataDirection::ToDevice {
            let mut written = self
                .written
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *written = io.data.to_vec();
        }
        match self.next_step() {
            MockStep::Good { data } => {
                let length = data.len().min(io.data.len());
                if io.direction == DataDirection::FromDevice {
                    io.data[..length].copy_from_slice(&data[..length]);
                }
                Ok(Completion {
                    bytes_transferred: if io.direction == DataDirection::ToDevice {
                        io.data.len()
                    } else {
                        length
                    },
                    residual: if io.direction == DataDirection::FromDevice {
                        io.data.len() - length
                    } else {
                        0
                    },
                    ..Completion::default()
                })
            }
            MockStep::CheckCondition { sense } => {
                let length = sense.len().min(io.sense.len());
                io.sense[..length].copy_from_slice(&sense[..length]);
                Ok(Completion {
                    scsi_status: status::CHECK_CONDITION,
                    driver_status: 0x08, // DRIVER_SENSE
                    sense_length: length,
                    residual: io.data.len(),
                    ..Completion::default()
                })
            }
            MockStep::Status { scsi_status } => Ok(Completion {
                scsi_status,
                residual: io.data.len(),
                ..Completion::default()
            }),
            MockStep::TransportDisrupted => Ok(Completion {
                host_status: host_status::DID_TRANSPORT_DISRUPTED,
                residual: io.data.len(),
                ..Completion::default()
            }),
            MockStep::OsError(errno) => Err(io::Error::from_raw_os_error(errno)),
        }
    }

    fn is_retriable(&self, completion: &Completion) -> bool {
        matches!(
            completion.host_status,
            host_status::DID_TRANSPORT_DISRUPTED | host_status::DID_TRANSPORT_FAILFAST
        ) || completion.os_error == Some(EAGAIN)
    }

    fn reopen(&self) -> io::Result<Box<dyn Transport>> {
        let queue = if self.shared {
            Arc::clone(&self.queue)
        } else {
            Arc::new(Mutex::new(self.initial.clone().into()))
        };
        Ok(Box::new(MockTransport {
            target: self.target.clone(),
            queue,
            initial: self.initial.clone(),
            shared: self.shared,
            submissions: Arc::clone(&self.submissions),
            written: Arc::clone(&self.written),
        }))
    }
}

// Mirrors the path-failover errno the Linux transport retries on
const EAGAIN: i32 = 11;

/// Fixed-format sense bytes for (key, asc, ascq), for scripting device
/// errors.
pub fn fixed_sense(key: u8, asc: u8, ascq: u8) -> Vec<u8> {
    let mut sense = vec![0u8; 18];
    sense[0] = 0x70;
    sense[2] = key;
    sense[7] = 0x0a;
    sense[12] = asc;
    sense[13] = ascq;
    sense
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn submit_once(transport: &mut MockTransport) -> io::Result<Completion> {
        let cdb = scsi::cdb::test_unit_ready();
        let mut data = [0u8; 4];
        let mut sense = [0u8; 32];
        transport.submit(SubmitArgs {
            cdb: &cdb,
            direction: DataDirection::None,
            data: &mut data,
            sense: &mut sense,
            timeout: Duration::from_secs(1),
        })
    }

    #[test]
    fn script_plays_in_order() {
        let mut transport = MockTransport::new(
            "mock0",
            vec![
                MockStep::Status { scsi_status: status::BUSY },
                MockStep::Good { data: vec![] },
            ],
        );
        assert_eq!(submit_once(&mut transport).unwrap().scsi_status, status::BUSY);
        assert!(submit_once(&mut transport).unwrap().is_good());
        // Exhausted script keeps returning GOOD
        assert!(submit_once(&mut transport).unwrap().is_good());
        assert_eq!(transport.submission_counter().load(Ordering::SeqCst), 3);
    }

    #[test]
    fn reopen_replays_and_shares_counter() {
        let transport = MockTransport::new(
            "mock0",
            vec![MockStep::Status { scsi_status: status::BUSY }],
        );
        let counter = transport.submission_counter();
        let mut reopened = transport.reopen().unwrap();
        let cdb = scsi::cdb::test_unit_ready();
        let mut data = [0u8; 0];
        let mut sense = [0u8; 32];
        let completion = reopened
            .submit(SubmitArgs {
                cdb: &cdb,
                direction: DataDirection::None,
                data: &mut data,
                sense: &mut sense,
                timeout: Duration::from_secs(1),
            })
            .unwrap();
        assert_eq!(completion.scsi_status, status::BUSY);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shared_script_drains_across_reopens() {
        let transport = MockTransport::new_shared(
            "mock0",
            vec![
                MockStep::Status { scsi_status: status::BUSY },
                MockStep::Good { data: vec![] },
            ],
        );
        let mut first = transport.reopen().unwrap();
        let mut second = transport.reopen().unwrap();
        let cdb = scsi::cdb::test_unit_ready();
        let mut sense = [0u8; 32];
        let a = first
            .submit(SubmitArgs {
                cdb: &cdb,
                direction: DataDirection::None,
                data: &mut [],
                sense: &mut sense,
                timeout: Duration::from_secs(1),
            })
            .unwrap();
        let b = second
            .submit(SubmitArgs {
                cdb: &cdb,
                direction: DataDirection::None,
                data: &mut [],
                sense: &mut sense,
                timeout: Duration::from_secs(1),
            })
            .unwrap();
        // One handle drew the BUSY, the other the GOOD
        assert_eq!(a.scsi_status, status::BUSY);
        assert!(b.is_good());
    }
}
