//! Carry-over for ciphertext the engine could not yet act on.
//!
//! TLS records may be fragmented across host delivery boundaries (partial
//! socket reads). The engine's underflow signal is the only way to detect
//! "not a full record yet"; this accumulator is what makes that loss-free
//! across calls.

use crate::buffer::CursorBuf;

/// At most one undelivered ciphertext fragment.
///
/// Invariant: empty unless the most recent unwrap attempt reported
/// underflow. Cleared on any successful unwrap.
#[derive(Default)]
pub(crate) struct PendingInput {
    held: Option<Vec<u8>>,
}

impl PendingInput {
    /// Combine the held bytes (if any) with `new_data` into a freshly
    /// allocated region, flipped for reading. The held state is consumed.
    pub fn append(&mut self, new_data: Option<&[u8]>) -> CursorBuf {
        let mut combined = Vec::with_capacity(self.len() + new_data.map_or(0, <[u8]>::len));
        if let Some(held) = self.held.take() {
            combined.extend_from_slice(&held);
        }
        if let Some(data) = new_data {
            combined.extend_from_slice(data);
        }
        CursorBuf::from_slice(&combined)
    }

    /// Remember `remainder` for the next delivery. Empty remainders are
    /// dropped so the invariant stays observable via `has_remaining`.
    pub fn set(&mut self, remainder: &[u8]) {
        if remainder.is_empty() {
            self.held = None;
        } else {
            self.held = Some(remainder.to_vec());
        }
    }

    /// Discard held bytes after a successful unwrap.
    pub fn clear(&mut self) {
        self.held = None;
    }

    pub fn has_remaining(&self) -> bool {
        self.held.is_some()
    }

    fn len(&self) -> usize {
        self.held.as_ref().map_or(0, Vec::len)
    }
}
