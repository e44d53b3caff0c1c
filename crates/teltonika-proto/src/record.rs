//! AVL record types shared by the Codec 8 and Codec 8E decoders.

/// The value carried by a single I/O element.
///
/// Codec 8/8E encode I/O values in one of four fixed widths, plus (for
/// Codec 8E only) a variable-length fifth block. We keep the original
/// width rather than widening everything to `u64` so normalization can
/// tell a genuine 8-byte counter from a 1-byte flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoValue {
    /// 1-byte value (Codec 8/8E "N1" block).
    U8(u8),
    /// 2-byte value (Codec 8/8E "N2" block).
    U16(u16),
    /// 4-byte value (Codec 8/8E "N4" block).
    U32(u32),
    /// 8-byte value (Codec 8/8E "N8" block).
    U64(u64),
    /// Variable-length value (Codec 8E "NX" block only).
    Bytes(Vec<u8>),
}

impl IoValue {
    /// Widens the value to `u64` for numeric I/O ids (odometer, ignition,
    /// and the like). Returns `None` for variable-length values, which have
    /// no numeric interpretation.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U8(v) => Some(u64::from(*v)),
            Self::U16(v) => Some(u64::from(*v)),
            Self::U32(v) => Some(u64::from(*v)),
            Self::U64(v) => Some(*v),
            Self::Bytes(_) => None,
        }
    }
}

/// GPS element of an AVL record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsFix {
    /// Longitude in 10^-7 degrees, as transmitted on the wire.
    pub longitude: i32,
    /// Latitude in 10^-7 degrees, as transmitted on the wire.
    pub latitude: i32,
    /// Altitude in meters. Signed: some devices report negative altitude
    /// for below-sea-level fixes.
    pub altitude: i16,
    /// Heading in degrees (0-360).
    pub angle: u16,
    /// Number of satellites used in the fix.
    pub satellites: u8,
    /// Speed in km/h.
    pub speed: u16,
}

/// A single decoded AVL record: one GPS fix plus its I/O elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvlRecord {
    /// Milliseconds since the Unix epoch, as transmitted on the wire.
    pub timestamp_ms: u64,
    /// Device-assigned priority (0 = low, 1 = high, 2 = panic).
    pub priority: u8,
    /// GPS fix.
    pub gps: GpsFix,
    /// I/O elements, in the order they appeared on the wire. IDs are
    /// widened to `u16` uniformly regardless of whether the originating
    /// frame was Codec 8 (1-byte ids) or Codec 8E (2-byte ids).
    pub io_elements: Vec<(u16, IoValue)>,
}

impl AvlRecord {
    /// Looks up the first I/O element with the given id.
    pub fn io(&self, id: u16) -> Option<&IoValue> {
        self.io_elements.iter().find(|(elem_id, _)| *elem_id == id).map(|(_, v)| v)
    }
}
