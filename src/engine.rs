//! The TLS engine abstraction this crate drives.
//!
//! An engine performs handshake cryptography and record encode/decode purely
//! against in-memory buffers. It owns no sockets and performs no I/O; moving
//! bytes between the engine and the transport is the job of
//! [`crate::TlsSession`].

use crate::buffer::CursorBuf;
use crate::Error;

/// Outcome status of a single wrap or unwrap operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// The operation completed.
    Ok,
    /// The source buffer does not yet hold a complete unit the engine can
    /// process (a partial TLS record, typically).
    BufferUnderflow,
    /// The destination buffer is too small for the operation's output.
    BufferOverflow,
    /// The session is closed. Terminal; repeated operations keep reporting
    /// `Closed` with zero bytes consumed and produced.
    Closed,
}

/// Handshake state reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// Not started, or already finished.
    NotHandshaking,
    /// The engine has CPU-bound work to delegate via
    /// [`TlsEngine::next_delegated_task`].
    NeedTask,
    /// The engine has handshake bytes to produce; call wrap.
    NeedWrap,
    /// The engine needs handshake bytes from the peer; call unwrap.
    NeedUnwrap,
    /// The handshake just completed. Engines may report this transiently
    /// (only in the [`EngineResult`] of the final operation) and return
    /// `NotHandshaking` from polls thereafter.
    Finished,
}

/// Result of one wrap or unwrap call.
#[derive(Debug, Clone, Copy)]
pub struct EngineResult {
    pub status: EngineStatus,
    pub bytes_consumed: usize,
    pub bytes_produced: usize,
    /// Handshake state as of the end of this operation.
    pub handshake_status: HandshakeStatus,
}

/// A CPU-bound handshake step the engine asks the host to run out-of-line
/// (key computation, certificate verification, ...).
pub trait EngineTask {
    fn run(&mut self) -> Result<(), Error>;
}

/// A non-blocking, memory-to-memory TLS engine.
///
/// Cursor discipline: `wrap`/`unwrap` read from `src.readable()` and write
/// into `dst.writable()`, reporting counts through the returned
/// [`EngineResult`]. The adapter advances both cursors afterward; engines
/// must not move them.
pub trait TlsEngine {
    /// Start (or restart) the handshake.
    fn begin_handshake(&mut self) -> Result<(), Error>;

    /// Encrypt and frame outbound plaintext from `src` into `dst`.
    fn wrap(&mut self, src: &mut CursorBuf, dst: &mut CursorBuf) -> Result<EngineResult, Error>;

    /// Decrypt and parse inbound ciphertext from `src` into `dst`.
    fn unwrap(&mut self, src: &mut CursorBuf, dst: &mut CursorBuf) -> Result<EngineResult, Error>;

    /// Current handshake state.
    fn handshake_status(&self) -> HandshakeStatus;

    /// Next delegated task, if any. Returns `None` once all outstanding
    /// tasks have been handed out.
    fn next_delegated_task(&mut self) -> Option<Box<dyn EngineTask>>;

    /// Recommended capacity for plaintext (application data) buffers.
    fn application_buffer_size(&self) -> usize;

    /// Recommended capacity for ciphertext (network record) buffers. Large
    /// enough to hold one complete TLS record.
    fn record_buffer_size(&self) -> usize;
}
