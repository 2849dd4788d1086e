//! Public entry point composing buffers, worker, and handshaker around one
//! engine instance.

use log::debug;

use crate::config::Config;
use crate::engine::{EngineStatus, HandshakeStatus, TlsEngine};
use crate::handshaker::{HandshakeProgress, Handshaker};
use crate::tasks::{DefaultTaskHandler, TaskHandler};
use crate::worker::{SessionListener, Worker};
use crate::{Error, Result};

/// One TLS session over a host-owned transport.
///
/// The session owns the engine and all buffer state; the host owns the
/// socket. Ciphertext to send and decrypted plaintext come back through the
/// [`SessionListener`]. All calls into one session must be serialized by the
/// host; there is no internal locking.
pub struct TlsSession {
    worker: Worker,
    handshaker: Option<Handshaker>,
    task_handler: Box<dyn TaskHandler>,
    handshake_completed_listener: Option<Box<dyn FnOnce()>>,
}

impl TlsSession {
    /// Create a session around `engine`, running delegated tasks inline.
    pub fn new(engine: Box<dyn TlsEngine>, config: Config) -> Self {
        TlsSession::with_task_handler(engine, config, Box::new(DefaultTaskHandler))
    }

    /// Create a session with a host-chosen task execution strategy.
    pub fn with_task_handler(
        engine: Box<dyn TlsEngine>,
        config: Config,
        task_handler: Box<dyn TaskHandler>,
    ) -> Self {
        TlsSession {
            worker: Worker::new(engine, &config),
            handshaker: Some(Handshaker::new()),
            task_handler,
            handshake_completed_listener: None,
        }
    }

    /// Sink for wrapped data, plain data, and close events.
    pub fn set_listener(&mut self, listener: Box<dyn SessionListener>) {
        self.worker.set_listener(listener);
    }

    /// Callback fired exactly once when the handshake completes.
    pub fn set_handshake_completed_listener(&mut self, listener: Box<dyn FnOnce()>) {
        self.handshake_completed_listener = Some(listener);
    }

    /// Start the handshake and drive it as far as the engine can go without
    /// peer input.
    pub fn begin_handshake(&mut self) -> Result<HandshakeProgress> {
        let Some(handshaker) = self.handshaker.as_mut() else {
            return Ok(HandshakeProgress::Completed);
        };
        if let Some(listener) = self.handshake_completed_listener.take() {
            handshaker.add_completed_listener(listener);
        }
        let progress = handshaker.begin(&mut self.worker, &mut *self.task_handler)?;
        self.after_handshake_step(progress);
        Ok(progress)
    }

    /// Resume a suspended handshake, optionally with freshly received
    /// ciphertext. Safe to call after completion; it reports `Completed`,
    /// and any delivered bytes go through the decrypt path.
    pub fn continue_handshake(&mut self, data: Option<&[u8]>) -> Result<HandshakeProgress> {
        let Some(handshaker) = self.handshaker.as_mut() else {
            // Completion can race a delivery the host is still pumping
            // through the handshake path. The bytes are application
            // ciphertext now; dropping them would lose data.
            if let Some(data) = data {
                self.worker.unwrap(Some(data))?;
                self.check_renegotiation()?;
            }
            return Ok(HandshakeProgress::Completed);
        };
        let progress = handshaker.carry_on(data, &mut self.worker, &mut *self.task_handler)?;
        self.after_handshake_step(progress);
        Ok(progress)
    }

    /// True once the handshake has finished (the handshaker is dropped on
    /// completion, so its absence also means done).
    pub fn is_handshake_completed(&self) -> bool {
        self.handshaker.as_ref().map_or(true, Handshaker::is_finished)
    }

    /// Encrypt application plaintext; the resulting ciphertext is emitted
    /// through the listener as wrapped data.
    pub fn encrypt(&mut self, plain_data: &[u8]) -> Result<EngineStatus> {
        if !self.is_handshake_completed() {
            return Err(Error::HandshakeNotCompleted);
        }
        let result = self.worker.wrap(Some(plain_data))?;
        self.check_renegotiation()?;
        Ok(result.status)
    }

    /// Decrypt received ciphertext; plaintext is emitted through the
    /// listener. Partial records are carried over internally until the rest
    /// arrives.
    pub fn decrypt(&mut self, encrypted_data: &[u8]) -> Result<EngineStatus> {
        if !self.is_handshake_completed() {
            return Err(Error::HandshakeNotCompleted);
        }
        let result = self.worker.unwrap(Some(encrypted_data))?;
        self.check_renegotiation()?;
        Ok(result.status)
    }

    /* Private */

    fn after_handshake_step(&mut self, progress: HandshakeProgress) {
        if progress != HandshakeProgress::Completed {
            return;
        }
        debug!("Dropping handshaker; session ready for application data");
        self.handshaker = None;
        // Listener registered after begin_handshake() still fires once.
        if let Some(listener) = self.handshake_completed_listener.take() {
            listener();
        }
    }

    /// A handshake status reappearing mid-stream is the peer (or engine)
    /// asking to renegotiate, which this layer detects but does not drive.
    fn check_renegotiation(&self) -> Result<()> {
        match self.worker.handshake_status() {
            HandshakeStatus::NeedTask
            | HandshakeStatus::NeedWrap
            | HandshakeStatus::NeedUnwrap => Err(Error::RenegotiationNotSupported),
            HandshakeStatus::NotHandshaking | HandshakeStatus::Finished => Ok(()),
        }
    }
}
