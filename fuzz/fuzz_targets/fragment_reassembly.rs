#![no_main]

//! Fragmentation independence: however the wire bytes are sliced up across
//! deliveries, the receiving session must reassemble exactly the plaintext
//! that went in, with no loss, duplication, or reordering.
//!
//! The engine here is a deliberately tiny one, length-prefixed records with
//! an XOR "cipher" and a one-flight handshake, sized so that normal fuzz
//! inputs push the adapter through its underflow accumulation and overflow
//! regrow paths.

use std::cell::RefCell;
use std::rc::Rc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use memtls::{
    Config, CursorBuf, EngineResult, EngineStatus, Error, HandshakeStatus, SessionListener,
    TlsEngine, TlsSession,
};

const HEADER_LEN: usize = 3;
const MAX_CHUNK: usize = 32;
const KEY: u8 = 0x2f;
const HS_RECORD: u8 = 0x16;
const APP_RECORD: u8 = 0x17;
const SYN: &[u8] = b"syn";

// Deliberately cramped so real inputs trigger regrowth.
const INITIAL_APP_SIZE: usize = 16;
const INITIAL_RECORD_SIZE: usize = 8;
const DONE_APP_SIZE: usize = 64;
const DONE_RECORD_SIZE: usize = 64;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Sender,
    Receiver,
}

struct XorEngine {
    side: Side,
    finished: bool,
}

impl XorEngine {
    fn new(side: Side) -> XorEngine {
        XorEngine {
            side,
            finished: false,
        }
    }

    fn result(
        status: EngineStatus,
        consumed: usize,
        produced: usize,
        hs: HandshakeStatus,
    ) -> EngineResult {
        EngineResult {
            status,
            bytes_consumed: consumed,
            bytes_produced: produced,
            handshake_status: hs,
        }
    }

    fn parse_record<'a>(src: &'a CursorBuf) -> Option<(u8, &'a [u8], usize)> {
        let readable = src.readable();
        if readable.len() < HEADER_LEN {
            return None;
        }
        let len = u16::from_be_bytes([readable[1], readable[2]]) as usize;
        let total = HEADER_LEN + len;
        if readable.len() < total {
            return None;
        }
        Some((readable[0], &readable[HEADER_LEN..total], total))
    }
}

impl TlsEngine for XorEngine {
    fn begin_handshake(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn wrap(&mut self, src: &mut CursorBuf, dst: &mut CursorBuf) -> Result<EngineResult, Error> {
        if !self.finished {
            let needed = HEADER_LEN + SYN.len();
            if dst.writable().len() < needed {
                return Ok(Self::result(
                    EngineStatus::BufferOverflow,
                    0,
                    0,
                    HandshakeStatus::NeedWrap,
                ));
            }
            let out = dst.writable();
            out[0] = HS_RECORD;
            out[1..HEADER_LEN].copy_from_slice(&(SYN.len() as u16).to_be_bytes());
            out[HEADER_LEN..needed].copy_from_slice(SYN);
            self.finished = true;
            return Ok(Self::result(
                EngineStatus::Ok,
                0,
                needed,
                HandshakeStatus::Finished,
            ));
        }

        let readable = src.readable();
        if readable.is_empty() {
            return Ok(Self::result(
                EngineStatus::Ok,
                0,
                0,
                HandshakeStatus::NotHandshaking,
            ));
        }
        let chunk = readable.len().min(MAX_CHUNK);
        let needed = HEADER_LEN + chunk;
        if dst.writable().len() < needed {
            return Ok(Self::result(
                EngineStatus::BufferOverflow,
                0,
                0,
                HandshakeStatus::NotHandshaking,
            ));
        }
        let mut record = Vec::with_capacity(needed);
        record.push(APP_RECORD);
        record.extend_from_slice(&(chunk as u16).to_be_bytes());
        record.extend(readable[..chunk].iter().map(|b| b ^ KEY));
        dst.writable()[..needed].copy_from_slice(&record);
        Ok(Self::result(
            EngineStatus::Ok,
            chunk,
            needed,
            HandshakeStatus::NotHandshaking,
        ))
    }

    fn unwrap(&mut self, src: &mut CursorBuf, dst: &mut CursorBuf) -> Result<EngineResult, Error> {
        let Some((rtype, payload, total)) = Self::parse_record(src) else {
            return Ok(Self::result(
                EngineStatus::BufferUnderflow,
                0,
                0,
                self.handshake_status(),
            ));
        };
        if !self.finished {
            if rtype != HS_RECORD || payload != SYN {
                return Err(Error::Engine("bad handshake record".into()));
            }
            self.finished = true;
            return Ok(Self::result(
                EngineStatus::Ok,
                total,
                0,
                HandshakeStatus::Finished,
            ));
        }
        if rtype != APP_RECORD {
            return Err(Error::Engine("bad record type".into()));
        }
        if dst.writable().len() < payload.len() {
            return Ok(Self::result(
                EngineStatus::BufferOverflow,
                0,
                0,
                HandshakeStatus::NotHandshaking,
            ));
        }
        let plain: Vec<u8> = payload.iter().map(|b| b ^ KEY).collect();
        dst.writable()[..plain.len()].copy_from_slice(&plain);
        Ok(Self::result(
            EngineStatus::Ok,
            total,
            plain.len(),
            HandshakeStatus::NotHandshaking,
        ))
    }

    fn handshake_status(&self) -> HandshakeStatus {
        if self.finished {
            HandshakeStatus::NotHandshaking
        } else {
            match self.side {
                Side::Sender => HandshakeStatus::NeedWrap,
                Side::Receiver => HandshakeStatus::NeedUnwrap,
            }
        }
    }

    fn next_delegated_task(&mut self) -> Option<Box<dyn memtls::EngineTask>> {
        None
    }

    fn application_buffer_size(&self) -> usize {
        if self.finished {
            DONE_APP_SIZE
        } else {
            INITIAL_APP_SIZE
        }
    }

    fn record_buffer_size(&self) -> usize {
        if self.finished {
            DONE_RECORD_SIZE
        } else {
            INITIAL_RECORD_SIZE
        }
    }
}

#[derive(Clone, Default)]
struct Sink {
    wrapped: Rc<RefCell<Vec<u8>>>,
    plain: Rc<RefCell<Vec<u8>>>,
}

impl SessionListener for Sink {
    fn on_wrapped_data(&mut self, data: Vec<u8>) {
        self.wrapped.borrow_mut().extend_from_slice(&data);
    }

    fn on_plain_data(&mut self, data: Vec<u8>) {
        self.plain.borrow_mut().extend_from_slice(&data);
    }
}

#[derive(Arbitrary, Debug)]
struct Input {
    payload: Vec<u8>,
    cuts: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let mut payload = input.payload;
    payload.truncate(4096);

    let sender_sink = Sink::default();
    let mut sender = TlsSession::new(Box::new(XorEngine::new(Side::Sender)), Config::default());
    sender.set_listener(Box::new(sender_sink.clone()));

    let receiver_sink = Sink::default();
    let mut receiver = TlsSession::new(Box::new(XorEngine::new(Side::Receiver)), Config::default());
    receiver.set_listener(Box::new(receiver_sink.clone()));

    sender.begin_handshake().expect("sender handshake");
    receiver.begin_handshake().expect("receiver begin");
    let flight = std::mem::take(&mut *sender_sink.wrapped.borrow_mut());
    receiver
        .continue_handshake(Some(&flight))
        .expect("receiver handshake");
    assert!(sender.is_handshake_completed());
    assert!(receiver.is_handshake_completed());

    sender.encrypt(&payload).expect("encrypt");
    let wire = std::mem::take(&mut *sender_sink.wrapped.borrow_mut());

    // Slice the wire bytes at fuzzer-chosen points and deliver piecewise.
    let mut offset = 0;
    for cut in input.cuts {
        if offset >= wire.len() {
            break;
        }
        let len = (cut as usize % (wire.len() - offset)) + 1;
        receiver
            .decrypt(&wire[offset..offset + len])
            .expect("decrypt chunk");
        offset += len;
    }
    if offset < wire.len() {
        receiver.decrypt(&wire[offset..]).expect("decrypt tail");
    }

    assert_eq!(*receiver_sink.plain.borrow(), payload);
});
