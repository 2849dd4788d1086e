//! Cursor buffer used for all engine-facing byte regions.
//!
//! A [`CursorBuf`] is a bounded byte region with a cursor and a readable
//! limit, the shape a memory-to-memory TLS engine expects for its source and
//! destination arguments. While writing, `pos` is the write cursor and
//! `limit` equals capacity. [`CursorBuf::flip`] switches to reading, after
//! which `pos..limit` is the readable window.

use std::fmt;

use zeroize::Zeroize;

/// Bounded byte region with a cursor (`pos`) and a readable `limit`.
pub struct CursorBuf {
    data: Vec<u8>,
    pos: usize,
    limit: usize,
}

impl CursorBuf {
    /// Create a buffer of `capacity` zeroed bytes, in write mode.
    pub fn new(capacity: usize) -> Self {
        CursorBuf {
            data: vec![0; capacity],
            pos: 0,
            limit: capacity,
        }
    }

    /// Create a buffer holding a copy of `data`, already flipped for reading.
    pub fn from_slice(data: &[u8]) -> Self {
        CursorBuf {
            data: data.to_vec(),
            pos: 0,
            limit: data.len(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes left between the cursor and the limit.
    pub fn remaining(&self) -> usize {
        self.limit - self.pos
    }

    pub fn has_remaining(&self) -> bool {
        self.pos < self.limit
    }

    /// Copy `src` in at the cursor and advance it.
    ///
    /// The caller must have sized the buffer first; see
    /// `Buffers::grow_if_necessary`.
    pub fn put_slice(&mut self, src: &[u8]) {
        assert!(
            src.len() <= self.remaining(),
            "put_slice of {} bytes into buffer with {} remaining",
            src.len(),
            self.remaining()
        );
        self.data[self.pos..self.pos + src.len()].copy_from_slice(src);
        self.pos += src.len();
    }

    /// Switch from writing to reading: limit = cursor, cursor = 0.
    pub fn flip(&mut self) {
        self.limit = self.pos;
        self.pos = 0;
    }

    /// Move unread bytes to offset 0 and make the rest writable again:
    /// cursor = remaining length, limit = capacity.
    pub fn compact(&mut self) {
        let remaining = self.remaining();
        self.data.copy_within(self.pos..self.limit, 0);
        self.pos = remaining;
        self.limit = self.data.len();
    }

    /// Reset to an empty write-mode buffer. Contents are left in place.
    pub fn clear(&mut self) {
        self.pos = 0;
        self.limit = self.data.len();
    }

    /// Cursor back to 0, limit unchanged. Replays the readable window.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// Move the cursor to an absolute offset within the current window.
    pub fn set_position(&mut self, pos: usize) {
        assert!(pos <= self.limit, "position {} past limit {}", pos, self.limit);
        self.pos = pos;
    }

    /// Advance the cursor by `n` read bytes.
    pub fn advance(&mut self, n: usize) {
        assert!(n <= self.remaining(), "advance {} past remaining {}", n, self.remaining());
        self.pos += n;
    }

    /// The readable window `pos..limit`.
    pub fn readable(&self) -> &[u8] {
        &self.data[self.pos..self.limit]
    }

    /// Writable tail of the buffer, `pos..capacity`.
    ///
    /// Engines write produced bytes here and report the count via
    /// `bytes_produced`; the adapter then calls [`CursorBuf::advance_written`].
    pub fn writable(&mut self) -> &mut [u8] {
        let cap = self.data.len();
        &mut self.data[self.pos..cap]
    }

    /// Record that an engine wrote `n` bytes into [`CursorBuf::writable`].
    pub fn advance_written(&mut self, n: usize) {
        assert!(self.pos + n <= self.data.len(), "wrote past capacity");
        self.pos += n;
    }
}

impl fmt::Debug for CursorBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorBuf")
            .field("pos", &self.pos)
            .field("limit", &self.limit)
            .field("capacity", &self.data.len())
            .finish()
    }
}

impl Drop for CursorBuf {
    fn drop(&mut self) {
        // Regions may have held plaintext or key-bearing handshake data.
        self.data.zeroize();
    }
}
