use thiserror::Error;

use crate::buffers::BufferRole;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by a [`crate::TlsSession`].
///
/// Only protocol-fatal and contract-violation conditions cross the component
/// boundary. Recoverable engine signals (buffer overflow, insufficient input
/// during unwrap) are resolved internally and never appear here.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// `encrypt`/`decrypt` was called before the handshake completed.
    #[error("Handshake not completed")]
    HandshakeNotCompleted,

    /// The engine reported underflow while wrapping. The outbound plaintext
    /// buffer is always fully loaded before a wrap, so this can only mean a
    /// bug in this layer or a broken engine.
    #[error("BUFFER_UNDERFLOW while wrapping")]
    WrapUnderflow,

    /// Overflow reported against the outbound plaintext buffer. The engine
    /// only reads from that buffer during a wrap, so there is no legitimate
    /// reason for it to run out of space.
    #[error("Overflow on source buffer {0:?}")]
    SourceBufferOverflow(BufferRole),

    /// An overflow regrow loop did not converge within the configured
    /// number of retries.
    #[error("Giving up after {retries} retries growing {role:?}")]
    RetryLimitExceeded { role: BufferRole, retries: usize },

    /// The engine requested a new handshake after the first one completed.
    /// Renegotiation is detected but not driven by this layer.
    #[error("Engine requested renegotiation, which is not supported")]
    RenegotiationNotSupported,

    /// The engine failed internally (bad record MAC, protocol violation, ...).
    #[error("TLS engine failure: {0}")]
    Engine(String),

    /// A delegated handshake task failed.
    #[error("Delegated task failed: {0}")]
    TaskFailed(String),
}
