//! Protocol-agnostic engine for a Teltonika ingest connection: the
//! byte-stream framer, the session lifecycle state machine, the decoder
//! dispatch between login and AVL frames, and record normalization.
//!
//! Everything here is Sans-IO: no sockets, no sleeping, no HTTP clients.
//! Callers feed in bytes and get back a list of actions to perform.

mod decoder;
mod env;
mod error;
mod normalize;
mod session;

pub use decoder::{decode_next, DecodeOutcome, SessionPhase};
pub use env::Clock;
pub use error::ProtocolFault;
pub use normalize::{normalize, NormalizedRecord};
pub use session::{OnBytesOutcome, Session, SessionAction, SessionState, MAX_BUFFER_BYTES};
