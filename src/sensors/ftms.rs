//! FTMS (Fitness Machine Service) telemetry decoding.
//!
//! Indoor Bike Data (0x2AD2) frames start with a little-endian 16-bit flags
//! word. Each flag gates one optional field, and fields appear in ascending
//! bit order, so a field's offset depends on every flag below it. Fields this
//! client does not use are still consumed to keep the cursor aligned.

use crate::sensors::types::{FrameLayout, ParseError, TelemetrySample};
use uuid::Uuid;

/// FTMS Service UUID (0x1826)
pub const FTMS_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_1826_0000_1000_8000_0080_5f9b_34fb);

/// Indoor Bike Data Characteristic UUID (0x2AD2)
pub const INDOOR_BIKE_DATA_UUID: Uuid = Uuid::from_u128(0x0000_2ad2_0000_1000_8000_0080_5f9b_34fb);

/// Fitness Machine Control Point UUID (0x2AD9)
pub const FTMS_CONTROL_POINT_UUID: Uuid =
    Uuid::from_u128(0x0000_2ad9_0000_1000_8000_0080_5f9b_34fb);

/// Fitness Machine Feature UUID (0x2ACC)
pub const FTMS_FEATURE_UUID: Uuid = Uuid::from_u128(0x0000_2acc_0000_1000_8000_0080_5f9b_34fb);

/// Training Status UUID (0x2AD3)
pub const TRAINING_STATUS_UUID: Uuid = Uuid::from_u128(0x0000_2ad3_0000_1000_8000_0080_5f9b_34fb);

/// Fitness Machine Status UUID (0x2ADA)
pub const MACHINE_STATUS_UUID: Uuid = Uuid::from_u128(0x0000_2ada_0000_1000_8000_0080_5f9b_34fb);

/// Speed conversion from m/s to km/h.
const MS_TO_KMH: f64 = 3.6;

/// Indoor Bike Data flags (first 2 bytes).
#[derive(Debug, Clone, Copy)]
struct IndoorBikeDataFlags {
    /// More data / speed present, depending on layout (bit 0)
    bit0: bool,
    /// Average speed present (bit 1)
    avg_speed_present: bool,
    /// Instantaneous cadence present (bit 2)
    inst_cadence_present: bool,
    /// Average cadence present (bit 3)
    avg_cadence_present: bool,
    /// Total distance present (bit 4)
    total_distance_present: bool,
    /// Resistance level present (bit 5)
    resistance_level_present: bool,
    /// Instantaneous power present (bit 6)
    inst_power_present: bool,
    /// Average power present (bit 7)
    avg_power_present: bool,
    /// Expended energy present (bit 8)
    expended_energy_present: bool,
    /// Heart rate present (bit 9)
    heart_rate_present: bool,
    /// Metabolic equivalent present (bit 10)
    metabolic_equivalent_present: bool,
    /// Elapsed time present (bit 11)
    elapsed_time_present: bool,
    /// Remaining time present (bit 12)
    remaining_time_present: bool,
}

impl IndoorBikeDataFlags {
    fn from_bits(flags: u16) -> Self {
        Self {
            bit0: (flags & 0x0001) != 0,
            avg_speed_present: (flags & 0x0002) != 0,
            inst_cadence_present: (flags & 0x0004) != 0,
            avg_cadence_present: (flags & 0x0008) != 0,
            total_distance_present: (flags & 0x0010) != 0,
            resistance_level_present: (flags & 0x0020) != 0,
            inst_power_present: (flags & 0x0040) != 0,
            avg_power_present: (flags & 0x0080) != 0,
            expended_energy_present: (flags & 0x0100) != 0,
            heart_rate_present: (flags & 0x0200) != 0,
            metabolic_equivalent_present: (flags & 0x0400) != 0,
            elapsed_time_present: (flags & 0x0800) != 0,
            remaining_time_present: (flags & 0x1000) != 0,
        }
    }
}

/// Bounds-checked little-endian reader over one frame.
struct FrameCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> FrameCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take(&mut self, field: &'static str, width: usize) -> Result<&'a [u8], ParseError> {
        let available = self.data.len().saturating_sub(self.offset);
        if width > available {
            return Err(ParseError::Truncated {
                field,
                offset: self.offset,
                needed: width,
                available,
            });
        }
        let bytes = &self.data[self.offset..self.offset + width];
        self.offset += width;
        Ok(bytes)
    }

    fn skip(&mut self, field: &'static str, width: usize) -> Result<(), ParseError> {
        self.take(field, width).map(|_| ())
    }

    fn read_u8(&mut self, field: &'static str) -> Result<u8, ParseError> {
        Ok(self.take(field, 1)?[0])
    }

    fn read_u16(&mut self, field: &'static str) -> Result<u16, ParseError> {
        let b = self.take(field, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_i16(&mut self, field: &'static str) -> Result<i16, ParseError> {
        let b = self.take(field, 2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u24(&mut self, field: &'static str) -> Result<u32, ParseError> {
        let b = self.take(field, 3)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], 0]))
    }

    fn read_u32(&mut self, field: &'static str) -> Result<u32, ParseError> {
        let b = self.take(field, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Decode an Indoor Bike Data notification.
///
/// Each call is independent. A field whose presence bit is set but which
/// does not fit in `data` yields [`ParseError::Truncated`]; trailing bytes
/// after the last present field are ignored.
pub fn decode_indoor_bike_data(
    data: &[u8],
    layout: FrameLayout,
) -> Result<TelemetrySample, ParseError> {
    let mut cursor = FrameCursor::new(data);
    let flags = IndoorBikeDataFlags::from_bits(cursor.read_u16("flags")?);
    let mut sample = TelemetrySample::default();

    match layout {
        FrameLayout::MandatorySpeed => {
            // 0.01 km/h units
            let raw = cursor.read_u16("instantaneous speed")?;
            sample.speed_kmh = f64::from(raw) * 0.01;
        }
        FrameLayout::FlagGatedSpeed => {
            if flags.bit0 {
                // 0.01 m/s units
                let raw = cursor.read_u16("instantaneous speed")?;
                sample.speed_kmh = f64::from(raw) * 0.01 * MS_TO_KMH;
            }
        }
    }

    if flags.avg_speed_present {
        cursor.skip("average speed", 2)?;
    }

    if flags.inst_cadence_present {
        // 0.5 RPM units
        let raw = cursor.read_u16("instantaneous cadence")?;
        sample.cadence_rpm = f64::from(raw) * 0.5;
    }

    if flags.avg_cadence_present {
        cursor.skip("average cadence", 2)?;
    }

    if flags.total_distance_present {
        sample.total_distance_m = Some(cursor.read_u24("total distance")?);
    }

    if flags.resistance_level_present {
        cursor.skip("resistance level", 2)?;
    }

    if flags.inst_power_present {
        sample.power_watts = cursor.read_i16("instantaneous power")?;
    }

    if flags.avg_power_present {
        cursor.skip("average power", 2)?;
    }

    // Total energy (2), energy per hour (2), energy per minute (1)
    if flags.expended_energy_present {
        cursor.skip("expended energy", 5)?;
    }

    if flags.heart_rate_present {
        sample.heart_rate_bpm = Some(cursor.read_u8("heart rate")?);
    }

    if flags.metabolic_equivalent_present {
        cursor.skip("metabolic equivalent", 1)?;
    }

    if flags.elapsed_time_present {
        cursor.skip("elapsed time", 2)?;
    }

    if flags.remaining_time_present {
        cursor.skip("remaining time", 2)?;
    }

    Ok(sample)
}

/// Contents of the Fitness Machine Feature characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FitnessMachineFeatures {
    /// Fitness Machine Features bitfield
    pub machine: u32,
    /// Target Setting Features bitfield
    pub target_setting: u32,
}

impl FitnessMachineFeatures {
    /// Parse the 8-byte feature characteristic value.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut cursor = FrameCursor::new(data);
        Ok(Self {
            machine: cursor.read_u32("machine features")?,
            target_setting: cursor.read_u32("target setting features")?,
        })
    }

    pub fn supports_cadence(&self) -> bool {
        self.machine & (1 << 1) != 0
    }

    pub fn supports_power_measurement(&self) -> bool {
        self.machine & (1 << 14) != 0
    }

    pub fn supports_resistance_target(&self) -> bool {
        self.target_setting & (1 << 2) != 0
    }

    pub fn supports_power_target(&self) -> bool {
        self.target_setting & (1 << 3) != 0
    }

    pub fn supports_simulation(&self) -> bool {
        self.target_setting & (1 << 13) != 0
    }
}
