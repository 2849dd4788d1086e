#![forbid(unsafe_code)]
#![warn(clippy::all)]

//! Sans-I/O adapter for memory-to-memory TLS engines.
//!
//! A [`TlsEngine`] performs handshake cryptography and record
//! encryption/decryption against in-memory buffers but owns no sockets and
//! performs no I/O. This crate supplies everything around such an engine:
//! buffer lifecycle management, the wrap/unwrap retry policy for engines
//! that under-produce, over-produce, or demand more input than is
//! available, the handshake orchestration loop, and delegation of CPU-bound
//! handshake steps to a host-chosen execution strategy.
//!
//! The host owns the transport. Ciphertext ready to send and decrypted
//! application bytes are delivered through a [`SessionListener`];
//! handshake progress is driven with [`TlsSession::begin_handshake`] and
//! [`TlsSession::continue_handshake`] as bytes arrive from the peer.
//!
//! Guarantees: no data loss across retries, no delivery of partial records,
//! handshake-only traffic and application data never interleave incorrectly,
//! and `encrypt`/`decrypt` are rejected until the handshake completes.

mod buffer;
mod buffers;
mod config;
mod engine;
mod error;
mod handshaker;
mod pending;
mod session;
mod tasks;
mod worker;

pub use buffer::CursorBuf;
pub use buffers::BufferRole;
pub use config::{Config, ConfigBuilder};
pub use engine::{EngineResult, EngineStatus, EngineTask, HandshakeStatus, TlsEngine};
pub use error::{Error, Result};
pub use handshaker::HandshakeProgress;
pub use session::TlsSession;
pub use tasks::{DefaultTaskHandler, TaskHandler, Tasks};
pub use worker::SessionListener;
