//! Faults that terminate a session.
//!
//! Every variant here has exactly one disposition: close the connection.
//! There is no transient/fatal distinction to make, unlike transport-level
//! errors the gateway handles separately.

use teltonika_proto::{AvlFault, LoginFault};
use thiserror::Error;

/// A fault raised while decoding or framing a session's byte stream.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolFault {
    /// The login frame was malformed.
    #[error("login frame fault: {0}")]
    Login(#[from] LoginFault),
    /// The AVL frame was malformed.
    #[error("AVL frame fault: {0}")]
    Avl(#[from] AvlFault),
    /// The session's byte buffer grew past the cap without completing a
    /// frame.
    #[error("session buffer exceeded the 64KiB cap without completing a frame")]
    BufferOverflow,
}
