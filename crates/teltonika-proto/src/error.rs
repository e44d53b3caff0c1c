//! Fault types for malformed frames.
//!
//! These are not `std::error::Error` wrappers around I/O failures; they
//! describe a buffer that can never become a valid frame, which always
//! means the connection must close. Kept separate from the `Incomplete`
//! outcome so callers can't accidentally treat "need more bytes" as fatal.

use thiserror::Error;

/// Why a login frame could not be decoded.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFault {
    /// The declared length did not equal the fixed 15-digit IMEI length.
    #[error("login frame declared length {declared}, expected 15")]
    UnexpectedLength {
        /// The length the device actually sent.
        declared: u16,
    },
    /// The IMEI field contained a non-ASCII-digit byte.
    #[error("login frame IMEI contained a non-digit byte")]
    NonDigitImei,
}

/// Why an AVL (Codec 8/8E) frame could not be decoded.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvlFault {
    /// The 4-byte preamble was not all zero.
    #[error("AVL frame preamble was not zero")]
    BadPreamble,
    /// The declared data length overflows sane bounds or the buffer.
    #[error("AVL frame declared data length {declared} exceeds maximum")]
    BadLength {
        /// The declared data-field length.
        declared: u32,
    },
    /// The codec id was neither 0x08 (Codec 8) nor 0x8E (Codec 8 Extended).
    #[error("AVL frame used unsupported codec id {codec_id:#04x}")]
    BadCodec {
        /// The codec id byte as received.
        codec_id: u8,
    },
    /// The leading and trailing record-count bytes disagreed.
    #[error("AVL frame record count mismatch: header said {declared}, trailer said {trailer}")]
    BadRecordCount {
        /// Record count declared right after the codec id.
        declared: u8,
        /// Record count repeated after the record array.
        trailer: u8,
    },
    /// The trailing CRC-16 did not match the computed checksum.
    #[error("AVL frame CRC mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    BadCrc {
        /// CRC the device sent.
        expected: u16,
        /// CRC we computed over the data field.
        computed: u16,
    },
}
