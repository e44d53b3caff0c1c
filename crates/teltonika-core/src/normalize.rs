//! Converts raw AVL records into the normalized, sink-ready shape.
//!
//! Coordinate scaling and I/O element lookups are Teltonika-specific
//! details we don't want leaking into the sink's wire format; this is the
//! one place that knowledge lives.

use serde::Serialize;
use teltonika_proto::{AvlRecord, IoValue};

/// AVL I/O element id carrying total distance traveled.
const IO_ID_ODOMETER: u16 = 199;
/// AVL I/O element id carrying the ignition status flag.
const IO_ID_IGNITION: u16 = 239;

/// An AVL record after unit conversion and I/O element extraction.
///
/// Field names match the Fleet API sink's wire schema directly (see
/// `teltonika_gateway::dispatcher`), so this can be serialized as-is into
/// the `records` array of a batch POST body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Decimal degrees.
    pub latitude: f64,
    /// Decimal degrees.
    pub longitude: f64,
    /// Speed in km/h.
    pub speed: u16,
    /// Heading in degrees, when present.
    pub angle: Option<u16>,
    /// Altitude in meters, when present. Signed: below-sea-level fixes
    /// report negative altitude.
    pub altitude: Option<i16>,
    /// Number of satellites used in the fix, when present.
    pub satellites: Option<u8>,
    /// Total odometer distance in meters, from I/O id 199, when reported.
    pub odometer: Option<u64>,
    /// Ignition state from I/O id 239: `Some(true)` iff the reported value
    /// is exactly `1`, `Some(false)` iff exactly `0`. `None` if the device
    /// didn't report it for this record, or reported anything else.
    pub ignition: Option<bool>,
}

fn normalize_one(record: &AvlRecord) -> NormalizedRecord {
    NormalizedRecord {
        timestamp: record.timestamp_ms,
        latitude: f64::from(record.gps.latitude) / 1e7,
        longitude: f64::from(record.gps.longitude) / 1e7,
        speed: record.gps.speed,
        angle: Some(record.gps.angle),
        altitude: Some(record.gps.altitude),
        satellites: Some(record.gps.satellites),
        odometer: record.io(IO_ID_ODOMETER).and_then(IoValue::as_u64),
        ignition: record.io(IO_ID_IGNITION).and_then(IoValue::as_u64).and_then(|v| match v {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }),
    }
}

/// Normalizes a batch of decoded AVL records.
pub fn normalize(records: &[AvlRecord]) -> Vec<NormalizedRecord> {
    records.iter().map(normalize_one).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use teltonika_proto::GpsFix;

    fn record_with_io(io_elements: Vec<(u16, IoValue)>) -> AvlRecord {
        AvlRecord {
            timestamp_ms: 1_700_000_000_000,
            priority: 0,
            gps: GpsFix { longitude: 252_228_260, latitude: -548_965_830, altitude: 123, angle: 90, satellites: 9, speed: 42 },
            io_elements,
        }
    }

    #[test]
    fn scales_coordinates_by_ten_million() {
        let record = record_with_io(vec![]);
        let normalized = normalize(std::slice::from_ref(&record));
        assert!((normalized[0].longitude - 25.222_826).abs() < 1e-6);
        assert!((normalized[0].latitude - (-54.896_583)).abs() < 1e-6);
    }

    #[test]
    fn negative_altitude_is_preserved() {
        let mut record = record_with_io(vec![]);
        record.gps.altitude = -42;
        let normalized = normalize(std::slice::from_ref(&record));
        assert_eq!(normalized[0].altitude, Some(-42));
    }

    #[test]
    fn odometer_absent_is_none() {
        let record = record_with_io(vec![]);
        let normalized = normalize(std::slice::from_ref(&record));
        assert_eq!(normalized[0].odometer, None);
    }

    #[test]
    fn odometer_present_is_extracted() {
        let record = record_with_io(vec![(IO_ID_ODOMETER, IoValue::U32(184_213))]);
        let normalized = normalize(std::slice::from_ref(&record));
        assert_eq!(normalized[0].odometer, Some(184_213));
    }

    #[test]
    fn ignition_is_tri_state() {
        let off = record_with_io(vec![(IO_ID_IGNITION, IoValue::U8(0))]);
        let on = record_with_io(vec![(IO_ID_IGNITION, IoValue::U8(1))]);
        let absent = record_with_io(vec![]);
        assert_eq!(normalize(std::slice::from_ref(&off))[0].ignition, Some(false));
        assert_eq!(normalize(std::slice::from_ref(&on))[0].ignition, Some(true));
        assert_eq!(normalize(std::slice::from_ref(&absent))[0].ignition, None);
    }

    #[test]
    fn ignition_out_of_range_value_is_none() {
        let weird = record_with_io(vec![(IO_ID_IGNITION, IoValue::U8(2))]);
        assert_eq!(normalize(std::slice::from_ref(&weird))[0].ignition, None);
    }
}
