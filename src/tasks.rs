//! Delegation of CPU-bound handshake steps to the host.
//!
//! The engine may ask for expensive work (key computation, certificate
//! checks) to run out-of-line. The handshake loop hands the host a [`Tasks`]
//! cursor; the host's [`TaskHandler`] decides where and how the tasks run.
//! The state machine does not advance until `process` returns, which
//! preserves the single-session serialization guarantee while leaving the
//! scheduling strategy entirely to the host.

use crate::engine::{EngineTask, TlsEngine};
use crate::Result;

/// Pull-cursor over the engine's outstanding delegated tasks.
pub struct Tasks<'a> {
    engine: &'a mut dyn TlsEngine,
    handed_out: usize,
}

impl<'a> Tasks<'a> {
    pub(crate) fn new(engine: &'a mut dyn TlsEngine) -> Self {
        Tasks {
            engine,
            handed_out: 0,
        }
    }

    /// Next outstanding task, or `None` once the engine has handed out all
    /// of them.
    pub fn next(&mut self) -> Option<Box<dyn EngineTask>> {
        let task = self.engine.next_delegated_task();
        if task.is_some() {
            self.handed_out += 1;
        }
        task
    }

    /// How many tasks the cursor has handed out so far.
    pub(crate) fn handed_out(&self) -> usize {
        self.handed_out
    }
}

/// Host-chosen execution strategy for delegated tasks.
///
/// The contract: run every task until [`Tasks::next`] yields `None`, then
/// return. Returning resumes the handshake; returning an error aborts it.
pub trait TaskHandler {
    fn process(&mut self, tasks: &mut Tasks<'_>) -> Result<()>;
}

/// Runs every task inline on the calling thread.
pub struct DefaultTaskHandler;

impl TaskHandler for DefaultTaskHandler {
    fn process(&mut self, tasks: &mut Tasks<'_>) -> Result<()> {
        while let Some(mut task) = tasks.next() {
            task.run()?;
        }
        Ok(())
    }
}
