//! CRC-16/IBM (ARC) checksum used to guard the AVL data field.
//!
//! Teltonika computes the checksum over the data field only: codec id,
//! record count, the records themselves, and the trailing record count
//! repeat. Preamble, length prefix and the checksum field itself are
//! excluded.

use crc::{Crc, CRC_16_ARC};

static CRC16_IBM: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// Computes the CRC-16/IBM checksum over `data`.
pub fn checksum(data: &[u8]) -> u16 {
    CRC16_IBM.checksum(data)
}
