//! The handshake status loop.
//!
//! Polls the engine's handshake state after every step and dispatches:
//! wraps and unwraps to the [`Worker`], delegated tasks to the host's
//! [`TaskHandler`]. The loop legitimately suspends in exactly one place,
//! `NeedUnwrap` with no ciphertext on hand; everything else either makes
//! progress or fails.

use log::{debug, warn};
use smallvec::SmallVec;

use crate::engine::{EngineResult, EngineStatus, HandshakeStatus};
use crate::tasks::{TaskHandler, Tasks};
use crate::worker::Worker;
use crate::{Error, Result};

/// Where the handshake loop left off when control returned to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeProgress {
    /// Handshake complete; the session is ready for application data.
    Completed,
    /// Waiting for ciphertext from the peer. Resume with
    /// [`crate::TlsSession::continue_handshake`] once it arrives.
    AwaitingInput,
    /// The engine closed the session mid-handshake.
    Closed,
}

pub(crate) struct Handshaker {
    finished: bool,
    listeners: SmallVec<[Box<dyn FnOnce()>; 2]>,
}

impl Handshaker {
    pub fn new() -> Self {
        Handshaker {
            finished: false,
            listeners: SmallVec::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Register a completion listener. Each registered listener fires
    /// exactly once, when the handshake finishes; order is not guaranteed.
    pub fn add_completed_listener(&mut self, listener: Box<dyn FnOnce()>) {
        self.listeners.push(listener);
    }

    pub fn begin(
        &mut self,
        worker: &mut Worker,
        task_handler: &mut dyn TaskHandler,
    ) -> Result<HandshakeProgress> {
        worker.begin_handshake()?;
        self.shakehands(worker, task_handler)
    }

    /// Re-enter the loop, optionally staging freshly delivered ciphertext
    /// first. Used both after task completion and after the host delivers
    /// bytes following an `AwaitingInput` suspension.
    pub fn carry_on(
        &mut self,
        data: Option<&[u8]>,
        worker: &mut Worker,
        task_handler: &mut dyn TaskHandler,
    ) -> Result<HandshakeProgress> {
        if let Some(data) = data {
            worker.stage_input(data);
        }
        self.shakehands(worker, task_handler)
    }

    /* Private */

    fn shakehands(
        &mut self,
        worker: &mut Worker,
        task_handler: &mut dyn TaskHandler,
    ) -> Result<HandshakeProgress> {
        loop {
            if self.finished {
                return Ok(HandshakeProgress::Completed);
            }
            match worker.handshake_status() {
                HandshakeStatus::NotHandshaking => {
                    // Either not started or the engine reported completion
                    // only through the final operation's result.
                    warn!("Handshake loop polled while not handshaking");
                    return Ok(HandshakeProgress::AwaitingInput);
                }
                HandshakeStatus::Finished => {
                    self.finish();
                    return Ok(HandshakeProgress::Completed);
                }
                HandshakeStatus::NeedTask => {
                    debug!("Delegating handshake tasks to the host");
                    let mut tasks = Tasks::new(worker.engine_mut());
                    task_handler.process(&mut tasks)?;
                    let handed_out = tasks.handed_out();
                    if handed_out == 0 && worker.handshake_status() == HandshakeStatus::NeedTask {
                        // No tasks ran and the engine still wants tasks;
                        // looping again would spin forever.
                        return Err(Error::TaskFailed(
                            "engine reports outstanding tasks but hands out none".into(),
                        ));
                    }
                }
                HandshakeStatus::NeedWrap => {
                    let result = worker.wrap(None)?;
                    if let Some(progress) = self.check_step(&result) {
                        return Ok(progress);
                    }
                }
                HandshakeStatus::NeedUnwrap => {
                    if !worker.has_staged_input() {
                        // The one state where the machine waits for external
                        // input rather than erroring.
                        return Ok(HandshakeProgress::AwaitingInput);
                    }
                    let result = worker.unwrap(None)?;
                    if let Some(progress) = self.check_step(&result) {
                        return Ok(progress);
                    }
                    if result.status == EngineStatus::BufferUnderflow {
                        // Staged bytes are not a full record yet.
                        return Ok(HandshakeProgress::AwaitingInput);
                    }
                    if result.bytes_consumed == 0 && result.bytes_produced == 0 {
                        return Ok(HandshakeProgress::AwaitingInput);
                    }
                }
            }
        }
    }

    /// Completion and close can surface in a step result before the polled
    /// status reflects them; engines report `Finished` only transiently.
    fn check_step(&mut self, result: &EngineResult) -> Option<HandshakeProgress> {
        if result.status == EngineStatus::Closed {
            return Some(HandshakeProgress::Closed);
        }
        if result.handshake_status == HandshakeStatus::Finished {
            self.finish();
            return Some(HandshakeProgress::Completed);
        }
        None
    }

    fn finish(&mut self) {
        debug!("Handshake finished");
        self.finished = true;
        for listener in self.listeners.drain(..) {
            listener();
        }
    }
}
