//! Per-connection session state machine.
//!
//! `Session` owns the byte buffer for one TCP connection and is otherwise
//! pure: it takes bytes in and returns a list of [`SessionAction`]s for an
//! I/O executor to perform. It never touches a socket, a clock besides the
//! injected [`Clock`], or a dispatcher directly, which makes it exercisable
//! with nothing but byte slices in tests.
//!
//! # Invariants
//!
//! - `state` only ever moves `Unauthenticated -> Authenticated -> Closed`,
//!   or `Unauthenticated -> Closed` directly. It never moves backwards.
//! - The buffer never exceeds [`MAX_BUFFER_BYTES`]; exceeding it closes the
//!   session with [`ProtocolFault::BufferOverflow`].
//! - `packets_received` increments exactly once per successfully decoded
//!   frame (login or AVL), never per AVL record.

use teltonika_proto::Imei;

use crate::decoder::{decode_next, DecodeOutcome, SessionPhase};
use crate::env::Clock;
use crate::error::ProtocolFault;
use crate::normalize::{normalize, NormalizedRecord};

/// Hard cap on the per-session byte buffer. A device that never completes a
/// frame within this many bytes is either broken or hostile.
pub const MAX_BUFFER_BYTES: usize = 64 * 1024;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the IMEI login frame.
    Unauthenticated,
    /// Login has completed; accepting AVL frames.
    Authenticated,
    /// The session has faulted or been idle-timed-out and must be closed.
    Closed,
}

/// An effect the connection handler must perform on behalf of the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Write these bytes back to the device (a login or record ACK).
    WriteAck(Vec<u8>),
    /// Hand a normalized batch to the sink dispatcher.
    Dispatch {
        /// The authenticated device's IMEI.
        imei: Imei,
        /// Normalized records from one AVL frame.
        records: Vec<NormalizedRecord>,
    },
}

/// Result of feeding a chunk of bytes into a session.
///
/// `actions` holds every action produced by frames that decoded
/// successfully *before* a fault was hit, in order. Callers must run all of
/// `actions` (e.g. write ACK bytes, enqueue dispatches) before tearing the
/// connection down on `fault` — a frame that completed earlier in the same
/// chunk is fully accepted regardless of what comes after it, matching the
/// outcome of receiving the same bytes across separate reads.
#[derive(Debug, Clone, PartialEq)]
pub struct OnBytesOutcome {
    /// Actions produced by frames decoded so far, in order.
    pub actions: Vec<SessionAction>,
    /// Set once a frame could never become valid for the current phase.
    /// The session is already [`SessionState::Closed`] when this is `Some`.
    pub fault: Option<ProtocolFault>,
}

/// Per-connection protocol state machine.
pub struct Session<C: Clock> {
    clock: C,
    state: SessionState,
    imei: Option<Imei>,
    buffer: Vec<u8>,
    connected_at: C::Instant,
    last_data_at: C::Instant,
    packets_received: u64,
    bytes_received: u64,
}

impl<C: Clock> Session<C> {
    /// Creates a new, unauthenticated session.
    pub fn new(clock: C) -> Self {
        let now = clock.now();
        Self {
            clock,
            state: SessionState::Unauthenticated,
            imei: None,
            buffer: Vec::new(),
            connected_at: now,
            last_data_at: now,
            packets_received: 0,
            bytes_received: 0,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The device's IMEI, once known.
    pub fn imei(&self) -> Option<&Imei> {
        self.imei.as_ref()
    }

    /// Number of frames (login or AVL) successfully decoded so far.
    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    /// Number of raw bytes received so far.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// When this session accepted its connection.
    pub fn connected_at(&self) -> C::Instant {
        self.connected_at
    }

    /// How long it has been since a byte last arrived.
    pub fn idle_for(&self) -> std::time::Duration {
        self.clock.now() - self.last_data_at
    }

    /// Feeds a chunk of bytes read from the socket into the session.
    ///
    /// Runs the framing loop to completion: every full frame currently
    /// sitting in the buffer is decoded and turned into actions, one at a
    /// time, until the buffer is exhausted or a frame faults. A fault never
    /// discards the actions already produced by earlier frames in this same
    /// chunk — the caller must still run them (e.g. write a login ACK)
    /// before tearing the connection down, so a chunk containing a valid
    /// frame immediately followed by a malformed one behaves the same as
    /// receiving those two frames across separate reads.
    pub fn on_bytes(&mut self, chunk: &[u8]) -> OnBytesOutcome {
        self.last_data_at = self.clock.now();
        self.bytes_received = self.bytes_received.saturating_add(chunk.len() as u64);
        self.buffer.extend_from_slice(chunk);

        if self.buffer.len() > MAX_BUFFER_BYTES {
            self.state = SessionState::Closed;
            self.buffer.clear();
            return OnBytesOutcome { actions: Vec::new(), fault: Some(ProtocolFault::BufferOverflow) };
        }

        let mut actions = Vec::new();
        let mut consumed_total = 0;
        let mut fault = None;

        loop {
            let phase = match self.state {
                SessionState::Unauthenticated => SessionPhase::Unauthenticated,
                SessionState::Authenticated => SessionPhase::Authenticated,
                SessionState::Closed => break,
            };

            match decode_next(&self.buffer[consumed_total..], phase) {
                DecodeOutcome::Incomplete => break,
                DecodeOutcome::LoginConsumed { imei, consumed } => {
                    consumed_total += consumed;
                    self.packets_received += 1;
                    self.imei = Some(imei);
                    self.state = SessionState::Authenticated;
                    actions.push(SessionAction::WriteAck(login_ack()));
                },
                DecodeOutcome::AvlConsumed { records, consumed } => {
                    consumed_total += consumed;
                    self.packets_received += 1;
                    // `Authenticated` is only reached via `LoginConsumed` above, which
                    // always sets `self.imei` first, so this is always populated.
                    if let Some(imei) = self.imei.clone() {
                        actions.push(SessionAction::Dispatch { imei, records: normalize(&records) });
                    }
                    actions.push(SessionAction::WriteAck(avl_ack(records.len())));
                },
                DecodeOutcome::Fault(decode_fault) => {
                    self.state = SessionState::Closed;
                    fault = Some(decode_fault);
                    break;
                },
            }
        }

        self.buffer.drain(..consumed_total);
        OnBytesOutcome { actions, fault }
    }

    /// Marks the session closed, e.g. after an idle timeout the supervisor
    /// detected.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}

fn login_ack() -> Vec<u8> {
    vec![0x01]
}

fn avl_ack(record_count: usize) -> Vec<u8> {
    (record_count as u32).to_be_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use teltonika_proto::{encode_avl, encode_login, AvlFault, Codec, GpsFix, IoValue};

    use super::*;

    #[derive(Clone)]
    struct TestClock(Arc<Mutex<Instant>>);

    impl TestClock {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(Instant::now())))
        }

        fn advance(&self, by: Duration) {
            let mut guard = self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *guard += by;
        }
    }

    impl Clock for TestClock {
        type Instant = Instant;

        fn now(&self) -> Instant {
            *self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
        }
    }

    fn avl_frame_with_one_record() -> Vec<u8> {
        let record = teltonika_proto::AvlRecord {
            timestamp_ms: 1_560_161_086_000,
            priority: 1,
            gps: GpsFix { longitude: 252_228_260, latitude: 548_965_830, altitude: 16, angle: 154, satellites: 6, speed: 0 },
            io_elements: vec![(239, IoValue::U8(1))],
        };
        encode_avl(Codec::Codec8, &[record])
    }

    #[test]
    fn login_then_avl_happy_path() {
        let mut session = Session::new(TestClock::new());
        let login_bytes = encode_login("356307042441013");

        let outcome = session.on_bytes(&login_bytes);
        assert_eq!(outcome.actions, vec![SessionAction::WriteAck(vec![0x01])]);
        assert_eq!(outcome.fault, None);
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(session.imei().map(|i| i.as_str()), Some("356307042441013"));
        assert_eq!(session.packets_received(), 1);

        let avl_bytes = avl_frame_with_one_record();
        let outcome = session.on_bytes(&avl_bytes);
        assert_eq!(outcome.fault, None);
        assert_eq!(outcome.actions.len(), 2);
        assert!(matches!(&outcome.actions[0], SessionAction::Dispatch { records, .. } if records.len() == 1));
        assert_eq!(outcome.actions[1], SessionAction::WriteAck(vec![0, 0, 0, 1]));
        assert_eq!(session.packets_received(), 2);
    }

    #[test]
    fn avl_before_login_is_bad_login_fault() {
        // An AVL frame's leading bytes (all-zero preamble) read as a login
        // frame declare length zero, which spec.md §4.B rule 1 rejects the
        // same as any other length that isn't 15 -- a literal `BadLogin`,
        // not a dedicated "unexpected AVL" fault kind.
        let mut session = Session::new(TestClock::new());
        let avl_bytes = avl_frame_with_one_record();
        let outcome = session.on_bytes(&avl_bytes);
        assert!(matches!(
            outcome.fault,
            Some(ProtocolFault::Login(teltonika_proto::LoginFault::UnexpectedLength { declared: 0 }))
        ));
        assert!(outcome.actions.is_empty());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn wrong_login_length_closes_session() {
        let mut session = Session::new(TestClock::new());
        let mut bytes = vec![0x00, 0x05];
        bytes.extend_from_slice(b"12345");
        let outcome = session.on_bytes(&bytes);
        assert!(matches!(outcome.fault, Some(ProtocolFault::Login(_))));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn buffer_overflow_closes_session() {
        let mut session = Session::new(TestClock::new());
        // Declares a huge length so the framing loop keeps waiting for more
        // bytes rather than faulting on the length itself.
        let mut bytes = vec![0x00, 0x0F];
        bytes.extend(std::iter::repeat(b'1').take(MAX_BUFFER_BYTES + 1));
        let outcome = session.on_bytes(&bytes);
        assert_eq!(outcome.fault, Some(ProtocolFault::BufferOverflow));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn fragmented_arrival_yields_same_outcome_as_one_chunk() {
        let login_bytes = encode_login("356307042441013");
        let avl_bytes = avl_frame_with_one_record();
        let mut all_bytes = login_bytes.clone();
        all_bytes.extend_from_slice(&avl_bytes);

        let mut whole = Session::new(TestClock::new());
        whole.on_bytes(&all_bytes);

        let mut fragmented = Session::new(TestClock::new());
        for chunk in all_bytes.chunks(3) {
            fragmented.on_bytes(chunk);
        }

        assert_eq!(whole.packets_received(), fragmented.packets_received());
        assert_eq!(whole.state(), fragmented.state());
        assert_eq!(whole.imei(), fragmented.imei());
    }

    #[test]
    fn idle_for_tracks_clock_advances() {
        let clock = TestClock::new();
        let mut session = Session::new(clock.clone());
        session.on_bytes(&encode_login("356307042441013"));
        clock.advance(Duration::from_secs(30));
        assert!(session.idle_for() >= Duration::from_secs(30));
    }

    #[test]
    fn valid_frame_followed_by_fault_in_same_chunk_still_runs_its_actions() {
        // A login frame immediately followed, in the same socket read, by a
        // malformed AVL chunk (here: a non-zero preamble). The login's
        // WriteAck must still be produced even though the chunk as a whole
        // faults, matching what two separate `on_bytes` calls would produce.
        let mut session = Session::new(TestClock::new());
        let mut bytes = encode_login("356307042441013");
        bytes.extend_from_slice(&[0xFF, 0, 0, 0, 0, 0, 0, 1]);

        let outcome = session.on_bytes(&bytes);
        assert_eq!(outcome.actions, vec![SessionAction::WriteAck(vec![0x01])]);
        assert!(matches!(outcome.fault, Some(ProtocolFault::Avl(AvlFault::BadPreamble))));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.imei().map(|i| i.as_str()), Some("356307042441013"));
    }
}
