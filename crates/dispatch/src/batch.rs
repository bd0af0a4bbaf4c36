// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Threaded batch dispatch
//!
//! One user command fans out into N worker threads, each owning cloned
//! sessions (independent transport handles and buffers) and running its
//! own recovery engine to completion. The dispatcher joins the workers
//! synchronously, or hands the join to a single supervisor thread for
//! asynchronous batches. Workers share nothing but the harness context.

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::{error, info};

use crate::recovery::{self, FailureDetail, RunPolicy, Terminal};
use crate::request::CommandRequest;
use crate::session::DeviceSession;
use crate::{Error, HarnessContext};

/// One command of a job, bound to one of the job's sessions.
///
/// Single-device jobs have one step; copy/mirror/verify style jobs chain
/// a read step and a write step over two sessions.
#[derive(Debug, Clone)]
pub struct CommandStep {
    pub request: CommandRequest,
    /// Index into the job's session list
    pub session: usize,
    /// Use the data returned by the previous step as this step's payload
    pub carry_data: bool,
}

impl CommandStep {
    pub fn new(request: CommandRequest) -> Self {
        CommandStep {
            request,
            session: 0,
            carry_data: false,
        }
    }

    pub fn on_session(mut self, session: usize) -> Self {
        self.session = session;
        self
    }

    pub fn carrying_data(mut self) -> Self {
        self.carry_data = true;
        self
    }
}

/// The template a batch clones for every worker thread.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub steps: Vec<CommandStep>,
    pub run: RunPolicy,
}

impl JobSpec {
    /// The common case: one command against one device.
    pub fn single(request: CommandRequest, run: RunPolicy) -> Self {
        JobSpec {
            steps: vec![CommandStep::new(request)],
            run,
        }
    }
}

/// Folded batch outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Success,
    Failure,
}

/// One worker thread's record, from dispatch to join.
#[derive(Debug)]
pub struct ThreadContext {
    pub index: usize,
    pub targets: Vec<String>,
    pub status: BatchStatus,
    pub iterations: u32,
    pub failure: Option<FailureDetail>,
    pub started: Instant,
    pub finished: Instant,
}

/// The joined result of one dispatched batch.
#[derive(Debug)]
pub struct BatchResult {
    pub status: BatchStatus,
    pub contexts: Vec<ThreadContext>,
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        self.status == BatchStatus::Success
    }
}

fn run_worker(
    index: usize,
    mut sessions: Vec<DeviceSession>,
    mut steps: Vec<CommandStep>,
    policy: RunPolicy,
    ctx: Arc<HarnessContext>,
) -> ThreadContext {
    let started = Instant::now();
    let targets: Vec<String> = sessions.iter().map(|s| s.target().to_owned()).collect();

    let outcome = recovery::run_policy_loop(&policy, &ctx, None, || {
        let mut terminal = Terminal::Success;
        let mut scsi_status = 0u8;
        let mut carried: Vec<u8> = Vec::new();
        // Steps run sequentially on this thread; a failing step ends the
        // iteration
        for step in steps.iter_mut() {
            if step.carry_data {
                step.request.data = std::mem::take(&mut carried);
            }
            step.request.reset();
            let session = &mut sessions[step.session.min(sessions.len() - 1)];
            let step_terminal =
                recovery::execute(session.transport_mut(), &mut step.request, &ctx);
            scsi_status = step.request.result.scsi_status;
            carried = step.request.transferred().to_vec();
            if !step_terminal.is_success() {
                terminal = step_terminal;
                break;
            }
        }
        (terminal, scsi_status)
    });

    let (status, failure) = match outcome.terminal {
        Terminal::Success => (BatchStatus::Success, None),
        Terminal::Failure(detail) => (BatchStatus::Failure, Some(detail)),
        Terminal::Restart => (BatchStatus::Failure, None),
    };

    let context = ThreadContext {
        index,
        targets,
        status,
        iterations: outcome.iterations,
        failure,
        started,
        finished: Instant::now(),
    };

    // One status emission per thread, serialized by the shared gate
    {
        let _gate = ctx.print_gate();
        match &context.failure {
            Some(detail) => info!(
                "thread {index}: {} iterations on {:?}: {detail}",
                context.iterations, context.targets
            ),
            None => info!(
                "thread {index}: {} iterations on {:?}: {:?}",
                context.iterations, context.targets, context.status
            ),
        }
    }
    context
}

fn spawn_workers(
    spec: &JobSpec,
    sessions: &[&DeviceSession],
    threads: usize,
    ctx: &Arc<HarnessContext>,
) -> Result<Vec<thread::JoinHandle<ThreadContext>>, Error> {
    let mut handles = Vec::with_capacity(threads);
    for index in 0..threads {
        // Independent handles and buffers per worker; nothing is shared
        let cloned: Vec<DeviceSession> = sessions
            .iter()
            .map(|session| session.duplicate())
            .collect::<io::Result<_>>()?;
        let steps = spec.steps.clone();
        let policy = spec.run.clone();
        let ctx = Arc::clone(ctx);
        let handle = thread::Builder::new()
            .name(format!("scsi-cmd-{index}"))
            .spawn(move || run_worker(index, cloned, steps, policy, ctx))
            .map_err(Error::Transport)?;
        handles.push(handle);
    }
    Ok(handles)
}

fn join_workers(handles: Vec<thread::JoinHandle<ThreadContext>>) -> BatchResult {
    let mut contexts = Vec::with_capacity(handles.len());
    let mut status = BatchStatus::Success;
    for handle in handles {
        match handle.join() {
            Ok(context) => {
                if context.status == BatchStatus::Failure {
                    status = BatchStatus::Failure;
                }
                contexts.push(context);
            }
            Err(_) => {
                error!("worker thread panicked; marking the batch failed");
                status = BatchStatus::Failure;
            }
        }
    }
    BatchResult { status, contexts }
}

/// Run `spec` on `threads` workers and block until all have joined.
pub fn dispatch(
    spec: &JobSpec,
    sessions: &[&DeviceSession],
    threads: usize,
    ctx: &Arc<HarnessContext>,
) -> Result<BatchResult, Error> {
    let handles = spawn_workers(spec, sessions, threads, ctx)?;
    Ok(join_workers(handles))
}

/// Run `spec` without blocking the caller: a single supervisor thread
/// joins the workers and reports the folded result.
pub fn dispatch_async(
    spec: &JobSpec,
    sessions: &[&DeviceSession],
    threads: usize,
    ctx: &Arc<HarnessContext>,
) -> Result<thread::JoinHandle<BatchResult>, Error> {
    let handles = spawn_workers(spec, sessions, threads, ctx)?;
    let ctx = Arc::clone(ctx);
    thread::Builder::new()
        .name("scsi-batch".into())
        .spawn(move || {
            let result = join_workers(handles);
            let _gate = ctx.print_gate();
            info!(
                "async batch finished: {:?} across {} threads",
                result.status,
                result.contexts.len()
            );
            result
        })
        .map_err(Error::Transport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{fixed_sense, MockStep, MockTransport};
    use test_log::test;
    use crate::recovery::OnError;
    use crate::request::RecoveryPolicy;
    use scsi::cdb::{self, DataDirection};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn tur_request() -> CommandRequest {
        CommandRequest::new("Test Unit Ready", cdb::test_unit_ready(), DataDirection::None)
            .with_recovery(RecoveryPolicy {
                delay: Duration::ZERO,
                limit: 2,
                ..RecoveryPolicy::default()
            })
    }

    #[test]
    fn all_workers_succeed() {
        let transport = MockTransport::new("mock0", vec![]);
        let counter = transport.submission_counter();
        let template = DeviceSession::new(Box::new(transport));
        let ctx = Arc::new(HarnessContext::new());
        let spec = JobSpec::single(tur_request(), RunPolicy::default());

        let result = dispatch(&spec, &[&template], 4, &ctx).unwrap();
        assert!(result.is_success());
        assert_eq!(result.contexts.len(), 4);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert!(result.contexts.iter().all(|c| c.iterations == 1));
    }

    #[test]
    fn one_failing_worker_fails_the_batch() {
        // A shared script: three workers draw GOOD, one draws a
        // non-retriable device error
        let transport = MockTransport::new_shared(
            "mock0",
            vec![
                MockStep::Good { data: vec![] },
                MockStep::Good { data: vec![] },
                MockStep::Good { data: vec![] },
                MockStep::CheckCondition {
                    sense: fixed_sense(0x03, 0x11, 0x00),
                },
            ],
        );
        let template = DeviceSession::new(Box::new(transport));
        let ctx = Arc::new(HarnessContext::new());
        let spec = JobSpec::single(tur_request(), RunPolicy::default());

        let result = dispatch(&spec, &[&template], 4, &ctx).unwrap();
        assert_eq!(result.status, BatchStatus::Failure);
        let failed: Vec<_> = result
            .contexts
            .iter()
            .filter(|c| c.status == BatchStatus::Failure)
            .collect();
        assert_eq!(failed.len(), 1);
        let detail = failed[0].failure.as_ref().unwrap();
        assert_eq!(detail.sense.key, 0x03);
    }

    #[test]
    fn interrupted_batch_stops_after_one_iteration() {
        let transport = MockTransport::new("mock0", vec![]);
        let template = DeviceSession::new(Box::new(transport));
        let ctx = Arc::new(HarnessContext::new());
        ctx.interrupt();
        let spec = JobSpec::single(
            tur_request(),
            RunPolicy {
                repeat: 100,
                ..RunPolicy::default()
            },
        );
        let result = dispatch(&spec, &[&template], 2, &ctx).unwrap();
        // The in-flight iteration completes, the loop exits at the
        // boundary
        assert!(result.contexts.iter().all(|c| c.iterations == 1));
    }

    #[test]
    fn async_dispatch_reports_via_supervisor() {
        let transport = MockTransport::new("mock0", vec![]);
        let template = DeviceSession::new(Box::new(transport));
        let ctx = Arc::new(HarnessContext::new());
        let spec = JobSpec::single(tur_request(), RunPolicy::default());

        let handle = dispatch_async(&spec, &[&template], 3, &ctx).unwrap();
        let result = handle.join().expect("supervisor panicked");
        assert!(result.is_success());
        assert_eq!(result.contexts.len(), 3);
    }

    #[test]
    fn copy_steps_carry_data_between_sessions() {
        let source = MockTransport::new(
            "mock-src",
            vec![MockStep::Good {
                data: vec![0xa5; 512],
            }],
        );
        let destination = MockTransport::new("mock-dst", vec![]);
        let written = destination.written();

        let read = CommandRequest::new("Read(10)", cdb::read10(0, 1), DataDirection::FromDevice)
            .with_read_length(512);
        let write =
            CommandRequest::new("Write(10)", cdb::write10(0, 1), DataDirection::ToDevice);
        let spec = JobSpec {
            steps: vec![
                CommandStep::new(read),
                CommandStep::new(write).on_session(1).carrying_data(),
            ],
            run: RunPolicy::default(),
        };

        let src_session = DeviceSession::new(Box::new(source));
        let dst_session = DeviceSession::new(Box::new(destination));
        let ctx = Arc::new(HarnessContext::new());
        let result = dispatch(&spec, &[&src_session, &dst_session], 1, &ctx).unwrap();
        assert!(result.is_success());
        // The write step carried the source data to the destination
        let written = written.lock().unwrap();
        assert_eq!(written.len(), 512);
        assert!(written.iter().all(|b| *b == 0xa5));
    }

    #[test]
    fn failing_first_step_skips_the_second() {
        let source = MockTransport::new(
            "mock-src",
            vec![MockStep::CheckCondition {
                sense: fixed_sense(0x03, 0x11, 0x00),
            }],
        );
        let destination = MockTransport::new("mock-dst", vec![]);
        let dst_counter = destination.submission_counter();

        let read = CommandRequest::new("Read(10)", cdb::read10(0, 1), DataDirection::FromDevice)
            .with_read_length(512);
        let write =
            CommandRequest::new("Write(10)", cdb::write10(0, 1), DataDirection::ToDevice);
        let mut spec = JobSpec {
            steps: vec![
                CommandStep::new(read),
                CommandStep::new(write).on_session(1).carrying_data(),
            ],
            run: RunPolicy::default(),
        };
        for step in &mut spec.steps {
            step.request.recovery.delay = Duration::ZERO;
        }

        let src_session = DeviceSession::new(Box::new(source));
        let dst_session = DeviceSession::new(Box::new(destination));
        let ctx = Arc::new(HarnessContext::new());
        let result = dispatch(&spec, &[&src_session, &dst_session], 1, &ctx).unwrap();
        assert_eq!(result.status, BatchStatus::Failure);
        assert_eq!(dst_counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn on_error_continue_counts_every_iteration() {
        let transport = MockTransport::new(
            "mock0",
            vec![
                MockStep::CheckCondition {
                    sense: fixed_sense(0x03, 0x11, 0x00),
                },
                MockStep::CheckCondition {
                    sense: fixed_sense(0x03, 0x11, 0x00),
                },
                MockStep::Good { data: vec![] },
            ],
        );
        let template = DeviceSession::new(Box::new(transport));
        let ctx = Arc::new(HarnessContext::new());
        let spec = JobSpec::single(
            tur_request(),
            RunPolicy {
                repeat: 3,
                on_error: OnError::Continue,
                ..RunPolicy::default()
            },
        );
        let result = dispatch(&spec, &[&template], 1, &ctx).unwrap();
        // The last iteration succeeded, so the worker ends successful
        assert!(result.is_success());
        assert_eq!(result.contexts[0].iterations, 3);
    }
}
