//! Bridges the stateless wire-format decoders in `teltonika-proto` with the
//! session's current authentication phase.
//!
//! A device's first frame is always a login; every frame after that is an
//! AVL batch. The two wire formats are not self-describing (nothing at the
//! start of an AVL frame rules out also being read as a login length
//! prefix), so which decoder runs is entirely a function of where the
//! session is in its lifecycle, not of the bytes themselves.

use teltonika_proto::{decode_avl, decode_login, AvlOutcome, AvlRecord, Imei, LoginOutcome};

use crate::error::ProtocolFault;

/// Which frame kind the session currently expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for the IMEI login frame.
    Unauthenticated,
    /// Waiting for AVL data frames.
    Authenticated,
}

/// Result of attempting to decode the next frame from a session's buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A login frame was decoded.
    LoginConsumed {
        /// The device's IMEI.
        imei: Imei,
        /// Bytes consumed from the front of the buffer.
        consumed: usize,
    },
    /// An AVL frame was decoded.
    AvlConsumed {
        /// The decoded records.
        records: Vec<AvlRecord>,
        /// Bytes consumed from the front of the buffer.
        consumed: usize,
    },
    /// Not enough bytes are buffered yet.
    Incomplete,
    /// The buffered bytes can never form a valid frame for the current
    /// phase.
    Fault(ProtocolFault),
}

/// Decodes the next frame from `buf` given the session's current `phase`.
pub fn decode_next(buf: &[u8], phase: SessionPhase) -> DecodeOutcome {
    match phase {
        SessionPhase::Unauthenticated => match decode_login(buf) {
            LoginOutcome::Consumed { imei, consumed } => DecodeOutcome::LoginConsumed { imei, consumed },
            LoginOutcome::Incomplete => DecodeOutcome::Incomplete,
            // spec.md §4.B rule 1 applies literally: any declared length other
            // than 15 is a `BadLogin` fault, including a declared length of
            // zero (e.g. an AVL preamble arriving before the device logs in).
            LoginOutcome::Fault(fault) => DecodeOutcome::Fault(ProtocolFault::from(fault)),
        },
        SessionPhase::Authenticated => match decode_avl(buf) {
            AvlOutcome::Consumed { records, consumed, .. } => DecodeOutcome::AvlConsumed { records, consumed },
            AvlOutcome::Incomplete => DecodeOutcome::Incomplete,
            AvlOutcome::Fault(fault) => DecodeOutcome::Fault(ProtocolFault::from(fault)),
        },
    }
}
