#![allow(dead_code)]

//! Shared test support: a scripted mock TLS engine and an in-memory pipe.
//!
//! The mock speaks a toy record format, `type(1) | len(2, BE) | payload`,
//! with handshake payloads in the clear and application payloads XORed with
//! a "negotiated" key. The handshake script exercises every engine signal
//! the adapter must handle: wrap-only flights, unwrap-only flights, a
//! delegated key-derivation task, underflow on partial records, and
//! overflow once the negotiated buffer sizes exceed the initial ones.
//!
//! Client script: send client-hello, await server-hello, derive key (task),
//! send client-finished (reports Finished). Server script: await
//! client-hello, derive key (task), send server-hello, await
//! client-finished (reports Finished).

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use memtls::{
    Config, CursorBuf, EngineResult, EngineStatus, EngineTask, Error, HandshakeStatus,
    SessionListener, TaskHandler, TlsEngine, TlsSession,
};

pub const HS_RECORD: u8 = 0x16;
pub const APP_RECORD: u8 = 0x17;
pub const HEADER_LEN: usize = 3;
/// Max plaintext bytes the mock packs into one record.
pub const MAX_CHUNK: usize = 40;

const KEY: u8 = 0x5a;
const INITIAL_APP_SIZE: usize = 24;
const INITIAL_RECORD_SIZE: usize = 16;
const NEGOTIATED_APP_SIZE: usize = 256;
const NEGOTIATED_RECORD_SIZE: usize = 256;

const CLIENT_HELLO: &[u8] = b"client-hello";
const SERVER_HELLO: &[u8] = b"server-hello";
const CLIENT_FINISHED: &[u8] = b"client-fin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Client,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Before begin_handshake.
    Idle,
    /// Client only: produce the client-hello flight.
    SendHello,
    /// Waiting for the peer's hello.
    WaitHello,
    /// Key derivation delegated to the host; NeedWrap once it ran.
    Derive,
    /// Server only: waiting for client-finished.
    WaitFinished,
    /// Handshake complete; application records flow.
    Done,
}

/// Knobs shared between a test and the engine it handed to the session.
#[derive(Clone)]
pub struct EngineHandles {
    pub key_ready: Arc<AtomicBool>,
    pub closed: Arc<AtomicBool>,
    pub renegotiate: Arc<AtomicBool>,
    pub wrap_underflow: Arc<AtomicBool>,
}

impl EngineHandles {
    fn new() -> Self {
        EngineHandles {
            key_ready: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
            renegotiate: Arc::new(AtomicBool::new(false)),
            wrap_underflow: Arc::new(AtomicBool::new(false)),
        }
    }
}

pub struct MockEngine {
    side: Side,
    phase: Phase,
    task_handed: bool,
    handles: EngineHandles,
}

impl MockEngine {
    pub fn client() -> (MockEngine, EngineHandles) {
        MockEngine::new(Side::Client)
    }

    pub fn server() -> (MockEngine, EngineHandles) {
        MockEngine::new(Side::Server)
    }

    fn new(side: Side) -> (MockEngine, EngineHandles) {
        let handles = EngineHandles::new();
        let engine = MockEngine {
            side,
            phase: Phase::Idle,
            task_handed: false,
            handles: handles.clone(),
        };
        (engine, handles)
    }

    fn key_ready(&self) -> bool {
        self.handles.key_ready.load(Ordering::SeqCst)
    }

    fn result(
        &self,
        status: EngineStatus,
        consumed: usize,
        produced: usize,
        handshake_status: HandshakeStatus,
    ) -> EngineResult {
        EngineResult {
            status,
            bytes_consumed: consumed,
            bytes_produced: produced,
            handshake_status,
        }
    }

    fn closed_result(&self) -> EngineResult {
        self.result(EngineStatus::Closed, 0, 0, HandshakeStatus::NotHandshaking)
    }

    /// Frame `payload` into `dst` as a handshake record, or report overflow.
    fn emit_handshake(
        &mut self,
        dst: &mut CursorBuf,
        payload: &[u8],
        next: Phase,
        reported: HandshakeStatus,
    ) -> EngineResult {
        let needed = HEADER_LEN + payload.len();
        if dst.writable().len() < needed {
            return self.result(
                EngineStatus::BufferOverflow,
                0,
                0,
                self.handshake_status(),
            );
        }
        let out = dst.writable();
        out[0] = HS_RECORD;
        out[1..HEADER_LEN].copy_from_slice(&(payload.len() as u16).to_be_bytes());
        out[HEADER_LEN..needed].copy_from_slice(payload);
        self.phase = next;
        self.result(EngineStatus::Ok, 0, needed, reported)
    }

    /// Parse one record from `src`, or report underflow.
    fn parse_record<'a>(&self, src: &'a CursorBuf) -> Option<(u8, &'a [u8], usize)> {
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

impl TlsEngine for MockEngine {
    fn begin_handshake(&mut self) -> Result<(), Error> {
        self.phase = match self.side {
            Side::Client => Phase::SendHello,
            Side::Server => Phase::WaitHello,
        };
        Ok(())
    }

    fn wrap(&mut self, src: &mut CursorBuf, dst: &mut CursorBuf) -> Result<EngineResult, Error> {
        if self.handles.closed.load(Ordering::SeqCst) {
            return Ok(self.closed_result());
        }
        if self.handles.wrap_underflow.load(Ordering::SeqCst) {
            return Ok(self.result(
                EngineStatus::BufferUnderflow,
                0,
                0,
                self.handshake_status(),
            ));
        }
        match (self.phase, self.side) {
            (Phase::SendHello, Side::Client) => Ok(self.emit_handshake(
                dst,
                CLIENT_HELLO,
                Phase::WaitHello,
                HandshakeStatus::NeedUnwrap,
            )),
            (Phase::Derive, Side::Server) if self.key_ready() => Ok(self.emit_handshake(
                dst,
                SERVER_HELLO,
                Phase::WaitFinished,
                HandshakeStatus::NeedUnwrap,
            )),
            (Phase::Derive, Side::Client) if self.key_ready() => Ok(self.emit_handshake(
                dst,
                CLIENT_FINISHED,
                Phase::Done,
                HandshakeStatus::Finished,
            )),
            (Phase::Done, _) => {
                let readable = src.readable();
                if readable.is_empty() {
                    return Ok(self.result(EngineStatus::Ok, 0, 0, self.handshake_status()));
                }
                let chunk = readable.len().min(MAX_CHUNK);
                let needed = HEADER_LEN + chunk;
                if dst.writable().len() < needed {
                    return Ok(self.result(
                        EngineStatus::BufferOverflow,
                        0,
                        0,
                        self.handshake_status(),
                    ));
                }
                let mut record = Vec::with_capacity(needed);
                record.push(APP_RECORD);
                record.extend_from_slice(&(chunk as u16).to_be_bytes());
                record.extend(readable[..chunk].iter().map(|b| b ^ KEY));
                dst.writable()[..needed].copy_from_slice(&record);
                Ok(self.result(
                    EngineStatus::Ok,
                    chunk,
                    needed,
                    HandshakeStatus::NotHandshaking,
                ))
            }
            _ => Err(Error::Engine(format!(
                "wrap called in unexpected phase {:?}",
                self.phase
            ))),
        }
    }

    fn unwrap(&mut self, src: &mut CursorBuf, dst: &mut CursorBuf) -> Result<EngineResult, Error> {
        if self.handles.closed.load(Ordering::SeqCst) {
            return Ok(self.closed_result());
        }
        let Some((rtype, payload, total)) = self.parse_record(src) else {
            return Ok(self.result(
                EngineStatus::BufferUnderflow,
                0,
                0,
                self.handshake_status(),
            ));
        };
        match self.phase {
            Phase::WaitHello => {
                let expected = match self.side {
                    Side::Client => SERVER_HELLO,
                    Side::Server => CLIENT_HELLO,
                };
                if rtype != HS_RECORD || payload != expected {
                    return Err(Error::Engine("unexpected handshake message".into()));
                }
                self.phase = Phase::Derive;
                self.task_handed = false;
                Ok(self.result(EngineStatus::Ok, total, 0, HandshakeStatus::NeedTask))
            }
            Phase::WaitFinished => {
                if rtype != HS_RECORD || payload != CLIENT_FINISHED {
                    return Err(Error::Engine("expected client-finished".into()));
                }
                self.phase = Phase::Done;
                Ok(self.result(EngineStatus::Ok, total, 0, HandshakeStatus::Finished))
            }
            Phase::Done => {
                if rtype != APP_RECORD {
                    return Err(Error::Engine("expected application record".into()));
                }
                if dst.writable().len() < payload.len() {
                    return Ok(self.result(
                        EngineStatus::BufferOverflow,
                        0,
                        0,
                        HandshakeStatus::NotHandshaking,
                    ));
                }
                let plain: Vec<u8> = payload.iter().map(|b| b ^ KEY).collect();
                dst.writable()[..plain.len()].copy_from_slice(&plain);
                Ok(self.result(
                    EngineStatus::Ok,
                    total,
                    plain.len(),
                    HandshakeStatus::NotHandshaking,
                ))
            }
            _ => Err(Error::Engine(format!(
                "unwrap called in unexpected phase {:?}",
                self.phase
            ))),
        }
    }

    fn handshake_status(&self) -> HandshakeStatus {
        if self.phase == Phase::Done && self.handles.renegotiate.load(Ordering::SeqCst) {
            return HandshakeStatus::NeedUnwrap;
        }
        match self.phase {
            Phase::Idle | Phase::Done => HandshakeStatus::NotHandshaking,
            Phase::SendHello => HandshakeStatus::NeedWrap,
            Phase::WaitHello | Phase::WaitFinished => HandshakeStatus::NeedUnwrap,
            Phase::Derive => {
                if self.key_ready() {
                    HandshakeStatus::NeedWrap
                } else {
                    HandshakeStatus::NeedTask
                }
            }
        }
    }

    fn next_delegated_task(&mut self) -> Option<Box<dyn EngineTask>> {
        if self.phase == Phase::Derive && !self.task_handed && !self.key_ready() {
            self.task_handed = true;
            Some(Box::new(DeriveKeyTask {
                key_ready: self.handles.key_ready.clone(),
            }))
        } else {
            None
        }
    }

    fn application_buffer_size(&self) -> usize {
        if self.key_ready() {
            NEGOTIATED_APP_SIZE
        } else {
            INITIAL_APP_SIZE
        }
    }

    fn record_buffer_size(&self) -> usize {
        if self.key_ready() {
            NEGOTIATED_RECORD_SIZE
        } else {
            INITIAL_RECORD_SIZE
        }
    }
}

struct DeriveKeyTask {
    key_ready: Arc<AtomicBool>,
}

impl EngineTask for DeriveKeyTask {
    fn run(&mut self) -> Result<(), Error> {
        self.key_ready.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// XOR "encryption" matching the mock engine, for asserting raw ciphertext.
pub fn mock_encrypt(plain: &[u8]) -> Vec<u8> {
    plain.iter().map(|b| b ^ KEY).collect()
}

/* Recorder */

#[derive(Default)]
struct RecorderInner {
    wrapped: Vec<Vec<u8>>,
    plain: Vec<Vec<u8>>,
    closed: usize,
}

/// Listener that records every emission. Cloned handles share state, so a
/// test keeps one handle while the session owns the other.
#[derive(Clone, Default)]
pub struct Recorder(Rc<RefCell<RecorderInner>>);

impl Recorder {
    pub fn new() -> Recorder {
        Recorder::default()
    }

    /// Drain ciphertext emissions, one `Vec` per data event.
    pub fn take_wrapped(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.0.borrow_mut().wrapped)
    }

    /// All plaintext emissions so far, concatenated.
    pub fn plain_concat(&self) -> Vec<u8> {
        self.0.borrow().plain.concat()
    }

    pub fn plain_event_count(&self) -> usize {
        self.0.borrow().plain.len()
    }

    pub fn closed_count(&self) -> usize {
        self.0.borrow().closed
    }
}

impl SessionListener for Recorder {
    fn on_wrapped_data(&mut self, data: Vec<u8>) {
        self.0.borrow_mut().wrapped.push(data);
    }

    fn on_plain_data(&mut self, data: Vec<u8>) {
        self.0.borrow_mut().plain.push(data);
    }

    fn on_session_closed(&mut self) {
        self.0.borrow_mut().closed += 1;
    }
}

/* Harness */

pub struct TestEnd {
    pub session: TlsSession,
    pub recorder: Recorder,
    pub handles: EngineHandles,
}

fn make_end(engine: MockEngine, handles: EngineHandles) -> TestEnd {
    let recorder = Recorder::new();
    let mut session = TlsSession::new(Box::new(engine), Config::default());
    session.set_listener(Box::new(recorder.clone()));
    TestEnd {
        session,
        recorder,
        handles,
    }
}

/// A client/server pair wired to recorders.
pub fn session_pair() -> (TestEnd, TestEnd) {
    let (client_engine, client_handles) = MockEngine::client();
    let (server_engine, server_handles) = MockEngine::server();
    (
        make_end(client_engine, client_handles),
        make_end(server_engine, server_handles),
    )
}

/// A client end with a host-chosen task execution strategy.
pub fn client_end_with_task_handler(task_handler: Box<dyn TaskHandler>) -> TestEnd {
    let (engine, handles) = MockEngine::client();
    let recorder = Recorder::new();
    let mut session =
        TlsSession::with_task_handler(Box::new(engine), Config::default(), task_handler);
    session.set_listener(Box::new(recorder.clone()));
    TestEnd {
        session,
        recorder,
        handles,
    }
}

pub fn server_end() -> TestEnd {
    let (engine, handles) = MockEngine::server();
    make_end(engine, handles)
}

/// Feed one delivery into a session, picking the handshake or data path.
pub fn deliver(session: &mut TlsSession, data: &[u8]) {
    if session.is_handshake_completed() {
        session.decrypt(data).expect("decrypt");
    } else {
        session.continue_handshake(Some(data)).expect("continue handshake");
    }
}

/// Shuttle wrapped data across the simulated pipe until both sides go
/// quiet.
pub fn pump(client: &mut TestEnd, server: &mut TestEnd) {
    loop {
        let to_server = client.recorder.take_wrapped();
        let to_client = server.recorder.take_wrapped();
        if to_server.is_empty() && to_client.is_empty() {
            break;
        }
        for packet in to_server {
            deliver(&mut server.session, &packet);
        }
        for packet in to_client {
            deliver(&mut client.session, &packet);
        }
    }
}

/// Run both handshakes to completion over the pipe.
pub fn handshake_pair(client: &mut TestEnd, server: &mut TestEnd) {
    client.session.begin_handshake().expect("client begin");
    server.session.begin_handshake().expect("server begin");
    pump(client, server);
    assert!(client.session.is_handshake_completed());
    assert!(server.session.is_handshake_completed());
}
