#![no_main]

//! Drive a [`CursorBuf`] through arbitrary sequences of legal cursor
//! operations and check the window invariants after every step. Each
//! operation's precondition is checked first, the same checks the adapter
//! performs before calling, so a panic here means a broken invariant rather
//! than a misused API.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use memtls::CursorBuf;

#[derive(Arbitrary, Debug)]
enum Op {
    Put(Vec<u8>),
    Flip,
    Compact,
    Clear,
    Rewind,
    Advance(u8),
    SetPosition(u8),
    WriteThrough(u8),
}

#[derive(Arbitrary, Debug)]
struct Input {
    capacity: u8,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let mut buf = CursorBuf::new(input.capacity as usize);

    for op in input.ops {
        match op {
            Op::Put(data) => {
                if data.len() <= buf.remaining() {
                    buf.put_slice(&data);
                }
            }
            Op::Flip => buf.flip(),
            Op::Compact => buf.compact(),
            Op::Clear => buf.clear(),
            Op::Rewind => buf.rewind(),
            Op::Advance(n) => {
                if (n as usize) <= buf.remaining() {
                    buf.advance(n as usize);
                }
            }
            Op::SetPosition(pos) => {
                if (pos as usize) <= buf.limit() {
                    buf.set_position(pos as usize);
                }
            }
            Op::WriteThrough(n) => {
                let n = n as usize;
                // Engines only write into write-mode buffers (limit at
                // capacity), as the adapter guarantees before every call.
                if buf.limit() == buf.capacity() {
                    let writable = buf.writable();
                    if n <= writable.len() {
                        for b in &mut writable[..n] {
                            *b = 0xa5;
                        }
                        buf.advance_written(n);
                    }
                }
            }
        }

        // Window invariants: pos <= limit <= capacity, and the readable and
        // writable views agree with the counters.
        assert!(buf.position() <= buf.limit());
        assert!(buf.limit() <= buf.capacity());
        assert_eq!(buf.remaining(), buf.limit() - buf.position());
        assert_eq!(buf.readable().len(), buf.remaining());
        assert_eq!(buf.has_remaining(), buf.remaining() > 0);
    }
});
