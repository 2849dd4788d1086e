//! One wrap or unwrap cycle against the engine, with retry on buffer
//! signals.
//!
//! The retry loops here are the error-prone heart of the adapter: the engine
//! may consume only a prefix of the offered bytes per call (one handshake
//! message out of several coalesced in a delivery, one record out of a bulk
//! flush), and the unconsumed suffix must be preserved byte-for-byte and
//! re-offered untouched on the next iteration or the next call.

use log::{trace, warn};

use crate::buffers::{BufferRole, Buffers};
use crate::config::Config;
use crate::engine::{EngineResult, EngineStatus, HandshakeStatus, TlsEngine};
use crate::pending::PendingInput;
use crate::{Error, Result};

/// Host-side sink for data and close events.
///
/// Emitted byte vectors are independently owned snapshots; the internal
/// regions they were copied from are never exposed.
pub trait SessionListener {
    /// Ciphertext ready to send over the transport the host owns.
    fn on_wrapped_data(&mut self, data: Vec<u8>);
    /// Decrypted application bytes ready for consumption.
    fn on_plain_data(&mut self, data: Vec<u8>);
    /// The engine reported the session closed. Fired at most once.
    fn on_session_closed(&mut self) {}
}

pub(crate) struct Worker {
    engine: Box<dyn TlsEngine>,
    buffers: Buffers,
    pending: PendingInput,
    listener: Option<Box<dyn SessionListener>>,
    max_retries: usize,
    closed_notified: bool,
}

impl Worker {
    pub fn new(engine: Box<dyn TlsEngine>, config: &Config) -> Self {
        let application_size = engine.application_buffer_size().max(config.min_buffer_size());
        let record_size = engine.record_buffer_size().max(config.min_buffer_size());
        Worker {
            buffers: Buffers::new(application_size, record_size),
            engine,
            pending: PendingInput::default(),
            listener: None,
            max_retries: config.max_retries(),
            closed_notified: false,
        }
    }

    pub fn set_listener(&mut self, listener: Box<dyn SessionListener>) {
        self.listener = Some(listener);
    }

    pub fn begin_handshake(&mut self) -> Result<()> {
        self.engine.begin_handshake()
    }

    pub fn handshake_status(&self) -> HandshakeStatus {
        self.engine.handshake_status()
    }

    pub fn engine_mut(&mut self) -> &mut dyn TlsEngine {
        &mut *self.engine
    }

    /// Stage ciphertext for a later unwrap without running one, keeping any
    /// carried-over fragment in front of it.
    pub fn stage_input(&mut self, data: &[u8]) {
        let combined = self.pending.append(Some(data));
        self.pending.set(combined.readable());
    }

    pub fn has_staged_input(&self) -> bool {
        self.pending.has_remaining()
    }

    /// Wrap one payload (or handshake-only traffic when `None`), emitting
    /// produced ciphertext to the listener.
    pub fn wrap(&mut self, plain_data: Option<&[u8]>) -> Result<EngineResult> {
        self.buffers.prepare_for_wrap(plain_data);
        let mut retries = 0;
        let mut finished_seen = false;

        loop {
            let result = self.do_wrap()?;
            trace!(
                "wrap: {:?}, consumed {}, produced {}",
                result.status,
                result.bytes_consumed,
                result.bytes_produced
            );
            if result.handshake_status == HandshakeStatus::Finished {
                finished_seen = true;
            }

            // Emit even on intermediate results, so partially produced
            // handshake bytes are never dropped.
            if result.bytes_produced > 0 {
                let data = self.buffers.take_snapshot(BufferRole::OutCipher);
                self.emit_wrapped(data);
            }

            match result.status {
                EngineStatus::BufferUnderflow => {
                    // The outbound plaintext window is loaded in full before
                    // every wrap; the engine has no business underflowing.
                    return Err(Error::WrapUnderflow);
                }
                EngineStatus::BufferOverflow => {
                    retries += 1;
                    if retries > self.max_retries {
                        return Err(Error::RetryLimitExceeded {
                            role: BufferRole::OutCipher,
                            retries: self.max_retries,
                        });
                    }
                    let recommended = self.engine.record_buffer_size();
                    self.retry_with_bigger_destination(
                        BufferRole::OutPlain,
                        BufferRole::OutCipher,
                        recommended,
                        result.bytes_consumed,
                    )?;
                }
                EngineStatus::Ok => {
                    if self.reoffer_remainder(BufferRole::OutPlain, BufferRole::OutCipher, &result)
                    {
                        continue;
                    }
                    return Ok(Self::latch_finished(result, finished_seen));
                }
                EngineStatus::Closed => {
                    self.notify_closed();
                    return Ok(result);
                }
            }
        }
    }

    /// Unwrap one delivery of ciphertext (or previously staged bytes when
    /// `None`), emitting decrypted plaintext to the listener.
    pub fn unwrap(&mut self, encrypted_data: Option<&[u8]>) -> Result<EngineResult> {
        let combined = self.pending.append(encrypted_data);
        self.buffers.prepare_for_unwrap(Some(combined.readable()));
        let mut retries = 0;
        let mut finished_seen = false;

        loop {
            let result = self.do_unwrap()?;
            trace!(
                "unwrap: {:?}, consumed {}, produced {}",
                result.status,
                result.bytes_consumed,
                result.bytes_produced
            );
            if result.handshake_status == HandshakeStatus::Finished {
                finished_seen = true;
            }

            if result.bytes_produced > 0 {
                let data = self.buffers.take_snapshot(BufferRole::InPlain);
                self.emit_plain(data);
            }

            match result.status {
                EngineStatus::BufferUnderflow => {
                    // Not a full record yet. Remember the unconsumed suffix
                    // and hand control back until more bytes arrive.
                    let remainder = self.unconsumed_source(BufferRole::InCipher);
                    self.pending.set(&remainder);
                    return Ok(Self::latch_finished(result, finished_seen));
                }
                EngineStatus::BufferOverflow => {
                    retries += 1;
                    if retries > self.max_retries {
                        return Err(Error::RetryLimitExceeded {
                            role: BufferRole::InPlain,
                            retries: self.max_retries,
                        });
                    }
                    let recommended = self.engine.application_buffer_size();
                    self.retry_with_bigger_destination(
                        BufferRole::InCipher,
                        BufferRole::InPlain,
                        recommended,
                        result.bytes_consumed,
                    )?;
                }
                EngineStatus::Ok => {
                    self.pending.clear();
                    if self.reoffer_remainder(BufferRole::InCipher, BufferRole::InPlain, &result) {
                        continue;
                    }
                    return Ok(Self::latch_finished(result, finished_seen));
                }
                EngineStatus::Closed => {
                    self.notify_closed();
                    return Ok(result);
                }
            }
        }
    }

    /* Private */

    /// A transient `Finished` can surface on an intermediate iteration when
    /// the final handshake record arrives coalesced with application data;
    /// later iterations then report `NotHandshaking`. The caller must still
    /// see the completion signal in the returned result.
    fn latch_finished(mut result: EngineResult, finished_seen: bool) -> EngineResult {
        if finished_seen {
            result.handshake_status = HandshakeStatus::Finished;
        }
        result
    }

    fn do_wrap(&mut self) -> Result<EngineResult> {
        let (src, dst) = self.buffers.wrap_pair();
        let result = self.engine.wrap(src, dst)?;
        src.advance(result.bytes_consumed);
        dst.advance_written(result.bytes_produced);
        Ok(result)
    }

    fn do_unwrap(&mut self) -> Result<EngineResult> {
        let (src, dst) = self.buffers.unwrap_pair();
        let result = self.engine.unwrap(src, dst)?;
        src.advance(result.bytes_consumed);
        dst.advance_written(result.bytes_produced);
        Ok(result)
    }

    /// Overflow recovery: regrow the destination toward the engine's
    /// recommendation, then replay the source window minus the bytes the
    /// engine already consumed.
    fn retry_with_bigger_destination(
        &mut self,
        source: BufferRole,
        destination: BufferRole,
        recommended: usize,
        consumed: usize,
    ) -> Result<()> {
        self.buffers.compact_or_grow(destination, recommended)?;
        self.buffers.prepare_retrial(source, destination);
        let src = self.buffers.get_mut(source);
        src.set_position(consumed);
        src.compact();
        src.flip();
        Ok(())
    }

    /// After a successful step, check whether the engine left part of the
    /// source unconsumed (several records coalesced in one delivery, or a
    /// payload larger than the engine takes per call). Returns true when the
    /// remainder has been re-staged and the loop should run another cycle.
    fn reoffer_remainder(
        &mut self,
        source: BufferRole,
        destination: BufferRole,
        result: &EngineResult,
    ) -> bool {
        if !self.buffers.get(source).has_remaining() {
            return false;
        }
        if result.bytes_consumed == 0 {
            // The engine refuses to make progress; stashing the bytes for a
            // later call beats spinning on them.
            warn!(
                "Engine returned OK without consuming; holding {} bytes",
                self.buffers.get(source).remaining()
            );
            if source == BufferRole::InCipher {
                let remainder = self.unconsumed_source(source);
                self.pending.set(&remainder);
            }
            return false;
        }
        let src = self.buffers.get_mut(source);
        src.compact();
        src.flip();
        self.buffers.get_mut(destination).clear();
        true
    }

    /// The unconsumed suffix of a source window, repositioned to the start.
    fn unconsumed_source(&mut self, role: BufferRole) -> Vec<u8> {
        let src = self.buffers.get_mut(role);
        src.compact();
        src.flip();
        src.readable().to_vec()
    }

    fn emit_wrapped(&mut self, data: Vec<u8>) {
        match &mut self.listener {
            Some(l) => l.on_wrapped_data(data),
            None => warn!("No listener; dropping {} wrapped bytes", data.len()),
        }
    }

    fn emit_plain(&mut self, data: Vec<u8>) {
        match &mut self.listener {
            Some(l) => l.on_plain_data(data),
            None => warn!("No listener; dropping {} plain bytes", data.len()),
        }
    }

    fn notify_closed(&mut self) {
        if self.closed_notified {
            return;
        }
        self.closed_notified = true;
        if let Some(l) = &mut self.listener {
            l.on_session_closed();
        }
    }
}
