//! The four role-tagged buffer regions an engine operates on.
//!
//! Two regions carry inbound traffic (ciphertext from the peer and the
//! plaintext decrypted from it), two carry outbound traffic (plaintext from
//! the host and the ciphertext wrapped from it). The regions are owned
//! exclusively by [`Buffers`] and are never handed out by reference to the
//! host, because the engine may mutate them on the next call; everything
//! leaving this struct goes through [`Buffers::take_snapshot`].

use log::debug;

use crate::buffer::CursorBuf;
use crate::{Error, Result};

/// Role of a buffer region relative to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRole {
    /// Plaintext decrypted from the peer (unwrap destination).
    InPlain,
    /// Ciphertext received from the peer, not yet decrypted (unwrap source).
    InCipher,
    /// Plaintext from the host application (wrap source).
    OutPlain,
    /// Ciphertext wrapped for the peer (wrap destination).
    OutCipher,
}

/// Owner of exactly one live [`CursorBuf`] per [`BufferRole`].
///
/// Tied 1:1 to one engine instance for the lifetime of the session. Regions
/// grow in place on overflow/underflow and never shrink.
pub(crate) struct Buffers {
    in_plain: CursorBuf,
    in_cipher: CursorBuf,
    out_plain: CursorBuf,
    out_cipher: CursorBuf,
}

impl Buffers {
    /// Allocate regions sized to the engine's recommendations.
    pub fn new(application_buffer_size: usize, record_buffer_size: usize) -> Self {
        Buffers {
            in_plain: CursorBuf::new(application_buffer_size),
            in_cipher: CursorBuf::new(record_buffer_size),
            out_plain: CursorBuf::new(application_buffer_size),
            out_cipher: CursorBuf::new(record_buffer_size),
        }
    }

    pub fn get(&self, role: BufferRole) -> &CursorBuf {
        match role {
            BufferRole::InPlain => &self.in_plain,
            BufferRole::InCipher => &self.in_cipher,
            BufferRole::OutPlain => &self.out_plain,
            BufferRole::OutCipher => &self.out_cipher,
        }
    }

    pub fn get_mut(&mut self, role: BufferRole) -> &mut CursorBuf {
        match role {
            BufferRole::InPlain => &mut self.in_plain,
            BufferRole::InCipher => &mut self.in_cipher,
            BufferRole::OutPlain => &mut self.out_plain,
            BufferRole::OutCipher => &mut self.out_cipher,
        }
    }

    /// Source/destination pair for a wrap call.
    pub fn wrap_pair(&mut self) -> (&mut CursorBuf, &mut CursorBuf) {
        (&mut self.out_plain, &mut self.out_cipher)
    }

    /// Source/destination pair for an unwrap call.
    pub fn unwrap_pair(&mut self) -> (&mut CursorBuf, &mut CursorBuf) {
        (&mut self.in_cipher, &mut self.in_plain)
    }

    /// Ensure the region for `role` holds at least `min_capacity` bytes.
    ///
    /// Growth is exact, not geometric: callers pass the engine's recommended
    /// size, and a host that repeatedly underflows because it drains too
    /// slowly must fix its own behavior rather than have us over-allocate.
    /// The written prefix of the old region carries over; the old region is
    /// zeroized when dropped.
    pub fn grow_if_necessary(&mut self, role: BufferRole, min_capacity: usize) {
        let current = self.get(role);
        if current.capacity() >= min_capacity {
            return;
        }
        debug!(
            "Growing {:?} from {} to {} bytes",
            role,
            current.capacity(),
            min_capacity
        );
        let mut fresh = CursorBuf::new(min_capacity);
        let old = self.get_mut(role);
        let written = old.position();
        if written > 0 {
            old.flip();
            fresh.put_slice(old.readable());
        }
        *old = fresh;
    }

    /// Response to an overflow or underflow signal from the engine for
    /// `role`: grow to the engine's recommended size if we are below it,
    /// otherwise reclaim space by compacting in place.
    ///
    /// The outbound plaintext region is the one buffer the engine only ever
    /// reads from, so an overflow against it is a contract violation, not a
    /// recoverable condition.
    pub fn compact_or_grow(&mut self, role: BufferRole, recommended_size: usize) -> Result<()> {
        if role == BufferRole::OutPlain {
            return Err(Error::SourceBufferOverflow(role));
        }
        if recommended_size > self.get(role).capacity() {
            self.grow_if_necessary(role, recommended_size);
        } else {
            let buf = self.get_mut(role);
            // A freshly reset region is already compacted.
            if buf.position() != 0 || buf.limit() != buf.capacity() {
                buf.compact();
            }
        }
        Ok(())
    }

    /// Reset the outbound regions and stage `plain_data` for wrapping.
    ///
    /// Handshake-only wraps pass `None`; the engine then produces handshake
    /// records without consuming application plaintext.
    pub fn prepare_for_wrap(&mut self, plain_data: Option<&[u8]>) {
        self.out_plain.clear();
        self.out_cipher.clear();
        if let Some(data) = plain_data {
            self.grow_if_necessary(BufferRole::OutPlain, data.len());
            self.out_plain.put_slice(data);
            self.out_plain.flip();
        } else {
            // Nothing to read; present an empty window.
            self.out_plain.flip();
        }
    }

    /// Reset the inbound regions and stage `cipher_data` for unwrapping.
    pub fn prepare_for_unwrap(&mut self, cipher_data: Option<&[u8]>) {
        self.in_cipher.clear();
        self.in_plain.clear();
        if let Some(data) = cipher_data {
            self.grow_if_necessary(BufferRole::InCipher, data.len());
            self.in_cipher.put_slice(data);
            self.in_cipher.flip();
        } else {
            self.in_cipher.flip();
        }
    }

    /// Set up a retry after an overflow forced a destination regrow: the
    /// source window is replayed from the start and the destination emptied.
    pub fn prepare_retrial(&mut self, source: BufferRole, destination: BufferRole) {
        self.get_mut(source).rewind();
        self.get_mut(destination).clear();
    }

    /// Copy the bytes the engine just produced in `role` out into an
    /// independently owned snapshot, consuming them from the region. The
    /// region is left reset so a later grow or retry cannot replay them.
    pub fn take_snapshot(&mut self, role: BufferRole) -> Vec<u8> {
        let buf = self.get_mut(role);
        buf.flip();
        let snapshot = buf.readable().to_vec();
        buf.clear();
        snapshot
    }
}
