//! Wire format for the Teltonika Codec 8 / 8E AVL protocol.
//!
//! This crate is pure: it knows how to turn bytes into typed frames and
//! back, and nothing about sockets, sessions, or time. Callers decide when
//! to attempt a login decode versus an AVL decode based on where the
//! connection is in its lifecycle.

mod avl;
mod crc;
mod error;
mod login;
mod record;

pub use avl::{decode as decode_avl, encode as encode_avl, AvlOutcome, Codec};
pub use crc::checksum as crc16;
pub use error::{AvlFault, LoginFault};
pub use login::{decode as decode_login, encode as encode_login, Imei, LoginOutcome, IMEI_LEN};
pub use record::{AvlRecord, GpsFix, IoValue};
