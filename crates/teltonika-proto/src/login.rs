//! IMEI login frame: the first 17 bytes a device sends on a new connection.
//!
//! Wire layout: a 2-byte big-endian length prefix, followed by that many
//! ASCII digit bytes. Every real-world Codec 8/8E device sends a fixed
//! 15-digit IMEI, so we require the length to equal exactly 15 and reject
//! anything else as malformed rather than supporting arbitrary lengths.

use crate::error::LoginFault;

/// Required length of the IMEI digit string.
pub const IMEI_LEN: usize = 15;

/// An IMEI as reported by the login frame.
///
/// Stored as the raw ASCII digits; we do not interpret it numerically since
/// it is only ever used as an opaque device identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Imei(String);

impl Imei {
    /// Builds an `Imei` from a validated 15-digit ASCII string.
    fn from_digits(digits: &[u8]) -> Self {
        debug_assert!(digits.len() == IMEI_LEN);
        debug_assert!(digits.iter().all(u8::is_ascii_digit));
        // SAFETY-free: digits are already validated as ASCII.
        Self(String::from_utf8_lossy(digits).into_owned())
    }

    /// Returns the IMEI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Imei {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of attempting to decode a login frame from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// A complete, valid login frame was decoded.
    Consumed {
        /// The device's IMEI.
        imei: Imei,
        /// Number of bytes consumed from the front of the buffer.
        consumed: usize,
    },
    /// Not enough bytes are buffered yet to make a decision.
    Incomplete,
    /// The buffered bytes can never form a valid login frame.
    Fault(LoginFault),
}

/// Decodes a login frame from the front of `buf`.
///
/// Does not require `buf` to contain only the login frame; trailing bytes
/// are simply left unconsumed.
pub fn decode(buf: &[u8]) -> LoginOutcome {
    if buf.len() < 2 {
        return LoginOutcome::Incomplete;
    }
    let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    if len != IMEI_LEN {
        return LoginOutcome::Fault(LoginFault::UnexpectedLength { declared: len as u16 });
    }
    if buf.len() < 2 + len {
        return LoginOutcome::Incomplete;
    }
    let digits = &buf[2..2 + len];
    if !digits.iter().all(u8::is_ascii_digit) {
        return LoginOutcome::Fault(LoginFault::NonDigitImei);
    }
    LoginOutcome::Consumed { imei: Imei::from_digits(digits), consumed: 2 + len }
}

/// Encodes a login frame for `imei`. Used by tests and the fuzz corpus.
///
/// # Panics
///
/// Panics if `imei` is not exactly [`IMEI_LEN`] ASCII digits; callers control
/// the input and this is only ever used to construct test fixtures.
pub fn encode(imei: &str) -> Vec<u8> {
    assert!(imei.len() == IMEI_LEN && imei.bytes().all(|b| b.is_ascii_digit()));
    let mut out = Vec::with_capacity(2 + IMEI_LEN);
    out.extend_from_slice(&(IMEI_LEN as u16).to_be_bytes());
    out.extend_from_slice(imei.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_literal_login_frame() {
        // 0x000F ("15"), followed by the ASCII digits of a real-looking IMEI.
        let bytes = hex::decode("000F333536333037303432343431303133").expect("valid hex");
        match decode(&bytes) {
            LoginOutcome::Consumed { imei, consumed } => {
                assert_eq!(imei.as_str(), "356307042441013");
                assert_eq!(consumed, 17);
            },
            other => panic!("expected Consumed, got {other:?}"),
        }
    }

    #[test]
    fn incomplete_on_short_prefix() {
        assert_eq!(decode(&[0x00]), LoginOutcome::Incomplete);
    }

    #[test]
    fn incomplete_while_digits_still_arriving() {
        let full = encode("123456789012345");
        assert_eq!(decode(&full[..10]), LoginOutcome::Incomplete);
    }

    #[test]
    fn faults_on_wrong_length() {
        let mut bytes = vec![0x00, 0x05];
        bytes.extend_from_slice(b"12345");
        assert_eq!(
            decode(&bytes),
            LoginOutcome::Fault(LoginFault::UnexpectedLength { declared: 5 })
        );
    }

    #[test]
    fn faults_on_non_digit_imei() {
        let mut bytes = vec![0x00, 0x0F];
        bytes.extend_from_slice(b"12345abc901234X");
        assert_eq!(decode(&bytes), LoginOutcome::Fault(LoginFault::NonDigitImei));
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let imei = "490154203237518";
        let bytes = encode(imei);
        match decode(&bytes) {
            LoginOutcome::Consumed { imei: decoded, consumed } => {
                assert_eq!(decoded.as_str(), imei);
                assert_eq!(consumed, bytes.len());
            },
            other => panic!("expected Consumed, got {other:?}"),
        }
    }
}
