// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The per-command recovery state machine
//!
//! One command runs Submit → Classify → {Success | RetryWait → Submit |
//! Terminal failure}. A retry resubmits the same encoded CDB after the
//! policy delay; a policy marked `restart` instead hands a Restart
//! terminal back so the caller can re-encode from scratch. The outer
//! [`run`] loop repeats finished commands per repeat-count, run-duration
//! or wait-for-status policies, checking the interrupt flag at every
//! iteration and retry-wait boundary.

use std::fmt;
use std::ops::ControlFlow;
use std::thread;
use std::time::Instant;

use log::{debug, error, warn};
use serde::Serialize;

use scsi::sense::SenseErrors;
use scsi::tables::{self, sense_key, status};

use crate::request::CommandRequest;
use crate::transport::{Completion, SubmitArgs, Transport};
use crate::HarnessContext;

/// How a command lifecycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    Success,
    Failure(FailureDetail),
    /// The recovery policy asked the caller to redo encoding and restart
    Restart,
}

impl Terminal {
    pub fn is_success(&self) -> bool {
        matches!(self, Terminal::Success)
    }
}

/// Classification of a terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// The transport could not submit the command
    Transport,
    /// The device returned an error response
    Device,
    /// Retriable errors persisted past the recovery limit
    RetryLimitExceeded,
    /// The interrupt flag stopped recovery
    Interrupted,
}

/// Everything needed to reconstruct the presentation-layer message for a
/// failed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDetail {
    pub kind: FailureKind,
    pub target: String,
    pub command: String,
    pub scsi_status: u8,
    pub host_status: u16,
    pub driver_status: u16,
    pub os_error: Option<i32>,
    pub sense: SenseErrors,
    pub attempts: u32,
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} failed: status {} ({})",
            self.command,
            self.target,
            self.scsi_status,
            tables::status_name(self.scsi_status),
        )?;
        if self.sense != SenseErrors::default() {
            write!(f, ", {}", self.sense.describe())?;
        }
        if self.host_status != 0 || self.driver_status != 0 {
            write!(
                f,
                ", host {}, driver {}",
                tables::host_status_name(self.host_status),
                tables::driver_status_name(self.driver_status)
            )?;
        }
        if let Some(errno) = self.os_error {
            write!(f, ", os error {errno}")?;
        }
        write!(f, " (after {} attempts)", self.attempts)
    }
}

/// Should this completion be retried on sense grounds alone?
///
/// BUSY and TASK SET FULL always are. CHECK CONDITION is retried for unit
/// attentions (except recovered data) and for a deliberately narrow set
/// of not-ready conditions; retrying every not-ready would spin for
/// minutes against formats, sanitizes and self-tests.
pub fn sense_retriable(scsi_status: u8, errors: &SenseErrors) -> bool {
    match scsi_status {
        status::BUSY | status::QUEUE_FULL => true,
        status::CHECK_CONDITION => match errors.key {
            sense_key::UNIT_ATTENTION => errors.asc != 0x17,
            sense_key::NOT_READY if errors.asc == 0x04 => matches!(
                errors.ascq,
                0x00 | 0x01 | 0x05 | 0x06 | 0x07 | 0x08 | 0x0a | 0x14
            ),
            _ => false,
        },
        _ => false,
    }
}

enum Step {
    Submit,
    Classify(std::io::Result<Completion>),
    RetryWait(FailureKind),
    Done(Terminal),
}

/// Run one command to its terminal state.
pub fn execute(
    transport: &mut dyn Transport,
    request: &mut CommandRequest,
    ctx: &HarnessContext,
) -> Terminal {
    let started = Instant::now();
    let mut retries = 0u32;
    let mut step = Step::Submit;

    let terminal = loop {
        step = match step {
            Step::Submit => {
                // Clear sense and per-attempt codes; a failed submission
                // may never update them
                request.sense.fill(0);
                request.result.scsi_status = 0;
                request.result.host_status = 0;
                request.result.driver_status = 0;
                request.result.os_error = None;
                let outcome = transport.submit(SubmitArgs {
                    cdb: &request.cdb,
                    direction: request.direction,
                    data: &mut request.data,
                    sense: &mut request.sense,
                    timeout: request.timeout,
                });
                request.result.attempts += 1;
                Step::Classify(outcome)
            }

            Step::Classify(Err(error)) => {
                let completion = Completion {
                    os_error: error.raw_os_error(),
                    ..Completion::default()
                };
                request.result.os_error = completion.os_error;
                debug!(
                    "{} on {}: submission failed: {error}",
                    request.name,
                    transport.target()
                );
                disposition(transport, request, &completion, FailureKind::Transport, retries)
            }

            Step::Classify(Ok(completion)) => {
                request.result.scsi_status = completion.scsi_status;
                request.result.host_status = completion.host_status;
                request.result.driver_status = completion.driver_status;
                request.result.os_error = completion.os_error;
                request.result.bytes_transferred = completion.bytes_transferred;
                request.result.residual = completion.residual;
                request.result.sense_length = completion.sense_length;
                if completion.is_good() {
                    break Terminal::Success;
                }
                disposition(transport, request, &completion, FailureKind::Device, retries)
            }

            Step::RetryWait(kind) => {
                // The interrupt flag stops recovery here; the in-flight
                // request has already completed
                if ctx.interrupted() {
                    break Terminal::Failure(failure(
                        FailureKind::Interrupted,
                        transport,
                        request,
                    ));
                }
                warn!(
                    "Retrying {} on {} after {:?} delay, retry #{} ({kind:?})",
                    request.name,
                    transport.target(),
                    request.recovery.delay,
                    retries + 1,
                );
                if !request.recovery.delay.is_zero() {
                    thread::sleep(request.recovery.delay);
                }
                retries += 1;
                Step::Submit
            }

            Step::Done(terminal) => break terminal,
        };
    };

    request.result.elapsed = started.elapsed();
    terminal
}

/// Decide between retry, restart and terminal failure for a failed
/// submission.
fn disposition(
    transport: &dyn Transport,
    request: &CommandRequest,
    completion: &Completion,
    kind: FailureKind,
    retries: u32,
) -> Step {
    if !request.recovery.enabled {
        return Step::Done(Terminal::Failure(failure(kind, transport, request)));
    }
    if retries >= request.recovery.limit {
        error!(
            "Exceeded retry limit ({}) for {} on {}",
            request.recovery.limit,
            request.name,
            transport.target()
        );
        return Step::Done(Terminal::Failure(failure(
            FailureKind::RetryLimitExceeded,
            transport,
            request,
        )));
    }
    let errors = request.sense_record().classify();
    let retriable = transport.is_retriable(completion)
        || sense_retriable(request.result.scsi_status, &errors);
    if !retriable {
        return Step::Done(Terminal::Failure(failure(kind, transport, request)));
    }
    if request.recovery.restart {
        warn!(
            "Restarting {} on {} after retriable error",
            request.name,
            transport.target()
        );
        return Step::Done(Terminal::Restart);
    }
    Step::RetryWait(kind)
}

fn failure(kind: FailureKind, transport: &dyn Transport, request: &CommandRequest) -> FailureDetail {
    FailureDetail {
        kind,
        target: transport.target().to_owned(),
        command: request.name.clone(),
        scsi_status: request.result.scsi_status,
        host_status: request.result.host_status,
        driver_status: request.result.driver_status,
        os_error: request.result.os_error,
        sense: request.sense_record().classify(),
        attempts: request.result.attempts,
    }
}

/// What to do when an iteration finishes with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnError {
    /// Stop the loop at the first terminal failure
    #[default]
    Stop,
    /// Keep iterating through failures
    Continue,
}

/// Outer-loop policy for repeated commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPolicy {
    /// Iterations to run when no duration or expected status is set
    pub repeat: u32,
    /// Run iterations until this much time has passed
    pub duration: Option<std::time::Duration>,
    /// Repeat until the command completes with this SCSI status
    pub until_status: Option<u8>,
    pub on_error: OnError,
}

impl Default for RunPolicy {
    fn default() -> Self {
        RunPolicy {
            repeat: 1,
            duration: None,
            until_status: None,
            on_error: OnError::Stop,
        }
    }
}

/// Result of an outer loop run.
#[derive(Debug)]
pub struct RunOutcome {
    pub iterations: u32,
    /// Terminal state of the last iteration
    pub terminal: Terminal,
}

/// Drive `iteration` under a [`RunPolicy`].
///
/// `iteration` returns the terminal state plus the final SCSI status for
/// the wait-for-status policy. The post-iteration `hook` may stop the
/// loop early; it runs before the policy checks, mirroring its use for
/// on-error scripting. The interrupt flag is honored between iterations.
pub fn run_policy_loop(
    policy: &RunPolicy,
    ctx: &HarnessContext,
    mut hook: Option<&mut dyn FnMut(&Terminal) -> ControlFlow<()>>,
    mut iteration: impl FnMut() -> (Terminal, u8),
) -> RunOutcome {
    let started = Instant::now();
    let mut iterations = 0u32;
    loop {
        let (terminal, scsi_status) = iteration();
        iterations += 1;

        if let Some(hook) = hook.as_deref_mut() {
            if hook(&terminal).is_break() {
                return RunOutcome { iterations, terminal };
            }
        }
        if !terminal.is_success() && policy.on_error == OnError::Stop {
            return RunOutcome { iterations, terminal };
        }
        let satisfied = if let Some(expected) = policy.until_status {
            scsi_status == expected
        } else if let Some(duration) = policy.duration {
            started.elapsed() >= duration
        } else {
            iterations >= policy.repeat
        };
        if satisfied || ctx.interrupted() {
            return RunOutcome { iterations, terminal };
        }
    }
}

/// Run one request under a policy: reset, execute, repeat.
pub fn run(
    transport: &mut dyn Transport,
    request: &mut CommandRequest,
    policy: &RunPolicy,
    ctx: &HarnessContext,
) -> RunOutcome {
    run_policy_loop(policy, ctx, None, || {
        request.reset();
        let terminal = execute(transport, request, ctx);
        (terminal, request.result.scsi_status)
    })
}
