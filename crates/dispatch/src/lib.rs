// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Command execution against SCSI targets
//!
//! This crate drives commands end to end: a [`transport::Transport`]
//! performs the OS-specific submission, the [`recovery`] state machine
//! classifies outcomes and retries per policy, [`session::DeviceSession`]
//! holds per-target state, and [`batch`] fans a command template out over
//! worker threads. [`ses`] layers the enclosure page fetch/control round
//! trips on top.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;

pub mod batch;
pub mod mock;
pub mod recovery;
pub mod request;
pub mod ses;
pub mod session;
#[cfg(target_os = "linux")]
pub mod sg;
pub mod transport;

pub use recovery::{FailureDetail, FailureKind, Terminal};
pub use request::{CommandRequest, RecoveryPolicy};

/// Errors surfaced to callers of the execution layer
#[derive(Debug, Error)]
pub enum Error {
    /// The transport could not submit the command at all
    #[error("transport: {0}")]
    Transport(#[from] io::Error),

    #[error(transparent)]
    Protocol(#[from] scsi::Error),

    #[error(transparent)]
    Enclosure(#[from] enclosure::Error),

    /// A command reached a terminal failure after recovery
    #[error("{0}")]
    Command(FailureDetail),

    /// The command's policy asked for a restart; the caller re-encodes
    /// and resubmits from scratch
    #[error("restart requested for {0}")]
    RestartRequested(String),
}

/// Process-wide execution context, passed down explicitly.
///
/// Carries the interrupt flag checked at iteration and retry-wait
/// boundaries and the single lock serializing textual status output
/// across worker threads. Nothing else is shared between threads.
#[derive(Debug, Default)]
pub struct HarnessContext {
    interrupt: AtomicBool,
    print_gate: Mutex<()>,
}

impl HarnessContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an orderly stop. In-flight commands complete; loops exit
    /// at their next boundary.
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }

    pub fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    /// Take the output serialization lock. Held for the duration of one
    /// status emission; a poisoned lock is reclaimed rather than
    /// propagated so output never deadlocks an exiting batch.
    pub fn print_gate(&self) -> MutexGuard<'_, ()> {
        self.print_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_flag_latches() {
        let ctx = HarnessContext::new();
        assert!(!ctx.interrupted());
        ctx.interrupt();
        assert!(ctx.interrupted());
    }

    #[test]
    fn print_gate_reentry_after_drop() {
        let ctx = HarnessContext::new();
        drop(ctx.print_gate());
        drop(ctx.print_gate());
    }
}
