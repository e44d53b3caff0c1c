//! Codec 8 / Codec 8E AVL frame decoding and encoding.
//!
//! Wire layout of a complete frame:
//!
//! ```text
//! preamble(4, must be zero) | data_length(4, BE) | data field | crc(4, BE)
//! ```
//!
//! The data field is `codec_id(1) | record_count(1) | records... |
//! record_count(1)`, and the CRC-16/IBM checksum in the trailer covers
//! exactly the data field (nothing else).

use crate::crc;
use crate::error::AvlFault;
use crate::record::{AvlRecord, GpsFix, IoValue};

/// Codec 8 uses 1-byte I/O ids and block counts; Codec 8E widens those to
/// 2 bytes and adds a fifth variable-length I/O block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Codec id 0x08.
    Codec8,
    /// Codec id 0x8E.
    Codec8E,
}

impl Codec {
    fn from_id(id: u8) -> Option<Self> {
        match id {
            0x08 => Some(Self::Codec8),
            0x8E => Some(Self::Codec8E),
            _ => None,
        }
    }

    const fn id(self) -> u8 {
        match self {
            Self::Codec8 => 0x08,
            Self::Codec8E => 0x8E,
        }
    }

    const fn wide(self) -> bool {
        matches!(self, Self::Codec8E)
    }
}

/// Refuse to even attempt parsing a data field declaring more than this many
/// bytes. Matches the Teltonika Codec 8/8E wire limit: the data field plus
/// its 8-byte header and 4-byte CRC trailer must still fit the 64KiB
/// per-session buffer cap with room for the next frame's header to arrive.
const MAX_DATA_LENGTH: u32 = 65_528;

/// Result of attempting to decode one AVL frame from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvlOutcome {
    /// A complete, CRC-valid frame was decoded.
    Consumed {
        /// Codec used to encode the frame.
        codec: Codec,
        /// The decoded records, in wire order.
        records: Vec<AvlRecord>,
        /// Number of bytes consumed from the front of the buffer.
        consumed: usize,
    },
    /// Not enough bytes are buffered yet to make a decision.
    Incomplete,
    /// The buffered bytes can never form a valid frame.
    Fault(AvlFault),
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        if end > self.data.len() {
            return None;
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Some(slice)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u16(&mut self) -> Option<u16> {
        let b = self.take(2)?;
        Some(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Option<u32> {
        let b = self.take(4)?;
        Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Option<u64> {
        let b = self.take(8)?;
        Some(u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    fn i16(&mut self) -> Option<i16> {
        self.u16().map(|v| v as i16)
    }

    fn i32(&mut self) -> Option<i32> {
        self.u32().map(|v| v as i32)
    }

    fn count(&mut self, wide: bool) -> Option<u16> {
        if wide { self.u16() } else { self.u8().map(u16::from) }
    }
}

fn decode_fixed_block(
    cur: &mut Cursor<'_>,
    wide: bool,
    width: u8,
    out: &mut Vec<(u16, IoValue)>,
) -> Option<()> {
    let count = cur.count(wide)?;
    for _ in 0..count {
        let id = cur.count(wide)?;
        let value = match width {
            1 => IoValue::U8(cur.u8()?),
            2 => IoValue::U16(cur.u16()?),
            4 => IoValue::U32(cur.u32()?),
            _ => IoValue::U64(cur.u64()?),
        };
        out.push((id, value));
    }
    Some(())
}

fn decode_variable_block(cur: &mut Cursor<'_>, out: &mut Vec<(u16, IoValue)>) -> Option<()> {
    let count = cur.u16()?;
    for _ in 0..count {
        let id = cur.u16()?;
        let len = usize::from(cur.u16()?);
        let bytes = cur.take(len)?.to_vec();
        out.push((id, IoValue::Bytes(bytes)));
    }
    Some(())
}

fn decode_record(cur: &mut Cursor<'_>, wide: bool) -> Option<AvlRecord> {
    let timestamp_ms = cur.u64()?;
    let priority = cur.u8()?;
    let longitude = cur.i32()?;
    let latitude = cur.i32()?;
    let altitude = cur.i16()?;
    let angle = cur.u16()?;
    let satellites = cur.u8()?;
    let speed = cur.u16()?;
    let gps = GpsFix { longitude, latitude, altitude, angle, satellites, speed };

    let _event_io_id = cur.count(wide)?;
    let _total_io_count = cur.count(wide)?;

    let mut io_elements = Vec::new();
    decode_fixed_block(cur, wide, 1, &mut io_elements)?;
    decode_fixed_block(cur, wide, 2, &mut io_elements)?;
    decode_fixed_block(cur, wide, 4, &mut io_elements)?;
    decode_fixed_block(cur, wide, 8, &mut io_elements)?;
    if wide {
        decode_variable_block(cur, &mut io_elements)?;
    }

    Some(AvlRecord { timestamp_ms, priority, gps, io_elements })
}

/// Decodes an AVL frame from the front of `buf`.
pub fn decode(buf: &[u8]) -> AvlOutcome {
    if buf.len() < 8 {
        return AvlOutcome::Incomplete;
    }
    if buf[0..4] != [0, 0, 0, 0] {
        return AvlOutcome::Fault(AvlFault::BadPreamble);
    }
    let data_length = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    if data_length == 0 || data_length > MAX_DATA_LENGTH {
        return AvlOutcome::Fault(AvlFault::BadLength { declared: data_length });
    }

    let total_len = 8usize.saturating_add(data_length as usize).saturating_add(4);
    if buf.len() < total_len {
        return AvlOutcome::Incomplete;
    }

    let data = &buf[8..8 + data_length as usize];

    let mut cur = Cursor::new(data);
    let Some(codec_id) = cur.u8() else {
        return AvlOutcome::Fault(AvlFault::BadLength { declared: data_length });
    };
    let Some(codec) = Codec::from_id(codec_id) else {
        return AvlOutcome::Fault(AvlFault::BadCodec { codec_id });
    };
    let Some(declared_count) = cur.u8() else {
        return AvlOutcome::Fault(AvlFault::BadLength { declared: data_length });
    };

    let mut records = Vec::with_capacity(usize::from(declared_count));
    for _ in 0..declared_count {
        let Some(record) = decode_record(&mut cur, codec.wide()) else {
            return AvlOutcome::Fault(AvlFault::BadLength { declared: data_length });
        };
        records.push(record);
    }

    let Some(trailer_count) = cur.u8() else {
        return AvlOutcome::Fault(AvlFault::BadLength { declared: data_length });
    };
    if trailer_count != declared_count {
        return AvlOutcome::Fault(AvlFault::BadRecordCount { declared: declared_count, trailer: trailer_count });
    }

    let crc_field = &buf[8 + data_length as usize..total_len];
    let expected_crc = u32::from_be_bytes([crc_field[0], crc_field[1], crc_field[2], crc_field[3]]);
    let computed_crc = crc::checksum(data);
    if expected_crc != u32::from(computed_crc) {
        return AvlOutcome::Fault(AvlFault::BadCrc { expected: expected_crc as u16, computed: computed_crc });
    }

    AvlOutcome::Consumed { codec, records, consumed: total_len }
}

fn encode_count(out: &mut Vec<u8>, wide: bool, value: u16) {
    if wide {
        out.extend_from_slice(&value.to_be_bytes());
    } else {
        out.push(value as u8);
    }
}

fn encode_fixed_block(out: &mut Vec<u8>, wide: bool, width: u8, elements: &[(u16, IoValue)]) {
    let matching: Vec<_> = elements
        .iter()
        .filter(|(_, v)| {
            matches!(
                (width, v),
                (1, IoValue::U8(_)) | (2, IoValue::U16(_)) | (4, IoValue::U32(_)) | (8, IoValue::U64(_))
            )
        })
        .collect();
    encode_count(out, wide, matching.len() as u16);
    for (id, value) in matching {
        encode_count(out, wide, *id);
        match value {
            IoValue::U8(v) => out.push(*v),
            IoValue::U16(v) => out.extend_from_slice(&v.to_be_bytes()),
            IoValue::U32(v) => out.extend_from_slice(&v.to_be_bytes()),
            IoValue::U64(v) => out.extend_from_slice(&v.to_be_bytes()),
            IoValue::Bytes(_) => unreachable!("filtered above"),
        }
    }
}

/// Encodes `records` as a complete AVL frame using `codec`. Used by tests
/// and the fuzz corpus; the gateway never sends AVL frames itself.
pub fn encode(codec: Codec, records: &[AvlRecord]) -> Vec<u8> {
    let wide = codec.wide();
    let mut data = Vec::new();
    data.push(codec.id());
    data.push(records.len() as u8);
    for record in records {
        data.extend_from_slice(&record.timestamp_ms.to_be_bytes());
        data.push(record.priority);
        data.extend_from_slice(&record.gps.longitude.to_be_bytes());
        data.extend_from_slice(&record.gps.latitude.to_be_bytes());
        data.extend_from_slice(&record.gps.altitude.to_be_bytes());
        data.extend_from_slice(&record.gps.angle.to_be_bytes());
        data.push(record.gps.satellites);
        data.extend_from_slice(&record.gps.speed.to_be_bytes());

        let variable: Vec<_> =
            record.io_elements.iter().filter(|(_, v)| matches!(v, IoValue::Bytes(_))).collect();
        let fixed_count = record.io_elements.len() - variable.len();
        let total_count = fixed_count + variable.len();
        encode_count(&mut data, wide, fixed_count as u16); // event_io_id: arbitrary, unused on decode
        encode_count(&mut data, wide, total_count as u16);

        encode_fixed_block(&mut data, wide, 1, &record.io_elements);
        encode_fixed_block(&mut data, wide, 2, &record.io_elements);
        encode_fixed_block(&mut data, wide, 4, &record.io_elements);
        encode_fixed_block(&mut data, wide, 8, &record.io_elements);
        if wide {
            encode_count(&mut data, true, variable.len() as u16);
            for (id, value) in variable {
                encode_count(&mut data, true, *id);
                let IoValue::Bytes(bytes) = value else { unreachable!("filtered above") };
                encode_count(&mut data, true, bytes.len() as u16);
                data.extend_from_slice(bytes);
            }
        }
    }
    data.push(records.len() as u8);

    let crc = crc::checksum(&data);
    let mut out = Vec::with_capacity(8 + data.len() + 4);
    out.extend_from_slice(&[0, 0, 0, 0]);
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(&data);
    out.extend_from_slice(&u32::from(crc).to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> AvlRecord {
        AvlRecord {
            timestamp_ms: 1_560_161_086_000,
            priority: 1,
            gps: GpsFix { longitude: 252_228_260, latitude: 548_965_830, altitude: 16, angle: 154, satellites: 6, speed: 0 },
            io_elements: vec![(239, IoValue::U8(1)), (240, IoValue::U8(0)), (200, IoValue::U16(0)), (199, IoValue::U32(16_002)), (16, IoValue::U64(0))],
        }
    }

    #[test]
    fn incomplete_on_short_header() {
        assert_eq!(decode(&[0, 0, 0, 0, 0, 0]), AvlOutcome::Incomplete);
    }

    #[test]
    fn faults_on_nonzero_preamble() {
        let buf = [1, 0, 0, 0, 0, 0, 0, 1];
        assert_eq!(decode(&buf), AvlOutcome::Fault(AvlFault::BadPreamble));
    }

    #[test]
    fn faults_on_oversized_length() {
        let mut buf = vec![0, 0, 0, 0];
        buf.extend_from_slice(&(MAX_DATA_LENGTH + 1).to_be_bytes());
        assert_eq!(
            decode(&buf),
            AvlOutcome::Fault(AvlFault::BadLength { declared: MAX_DATA_LENGTH + 1 })
        );
    }

    #[test]
    fn incomplete_when_data_field_still_arriving() {
        let frame = encode(Codec::Codec8, &[sample_record()]);
        assert_eq!(decode(&frame[..frame.len() - 1]), AvlOutcome::Incomplete);
    }

    #[test]
    fn round_trips_codec8_frame() {
        let records = vec![sample_record(), sample_record()];
        let frame = encode(Codec::Codec8, &records);
        match decode(&frame) {
            AvlOutcome::Consumed { codec, records: decoded, consumed } => {
                assert_eq!(codec, Codec::Codec8);
                assert_eq!(consumed, frame.len());
                assert_eq!(decoded.len(), 2);
                assert_eq!(decoded[0].gps.latitude, 548_965_830);
                assert_eq!(decoded[0].io(199).and_then(IoValue::as_u64), Some(16_002));
                assert_eq!(decoded[0].io(239).and_then(IoValue::as_u64), Some(1));
            },
            other => panic!("expected Consumed, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_codec8e_frame_with_variable_block() {
        let mut record = sample_record();
        record.io_elements.push((12_345, IoValue::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF])));
        let frame = encode(Codec::Codec8E, &[record]);
        match decode(&frame) {
            AvlOutcome::Consumed { codec, records, .. } => {
                assert_eq!(codec, Codec::Codec8E);
                assert_eq!(records[0].io(12_345), Some(&IoValue::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF])));
            },
            other => panic!("expected Consumed, got {other:?}"),
        }
    }

    #[test]
    fn faults_on_corrupted_crc() {
        let mut frame = encode(Codec::Codec8, &[sample_record()]);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        assert!(matches!(decode(&frame), AvlOutcome::Fault(AvlFault::BadCrc { .. })));
    }

    #[test]
    fn faults_on_unknown_codec() {
        let mut frame = encode(Codec::Codec8, &[sample_record()]);
        // codec id is the first byte of the data field, right after the 8-byte header.
        frame[8] = 0x01;
        let data = &frame[8..frame.len() - 4];
        let crc = crc::checksum(data);
        let crc_start = frame.len() - 4;
        frame[crc_start..].copy_from_slice(&u32::from(crc).to_be_bytes());
        assert_eq!(decode(&frame), AvlOutcome::Fault(AvlFault::BadCodec { codec_id: 0x01 }));
    }
}
