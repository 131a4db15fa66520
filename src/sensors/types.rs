//! Sensor types for FTMS trainers.
//!
//! Decoded telemetry, frame layout selection, transport events and the
//! errors raised by the decoder and the BLE transport.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How instantaneous speed is carried in an Indoor Bike Data frame.
///
/// Trainers in the wild disagree, so the layout is chosen per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameLayout {
    /// Speed always follows the flags word (uint16, 0.01 km/h).
    /// Bit 0 ("more data") does not affect the layout.
    #[default]
    MandatorySpeed,
    /// Speed is present only when bit 0 is set (uint16, 0.01 m/s).
    FlagGatedSpeed,
}

impl std::fmt::Display for FrameLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameLayout::MandatorySpeed => write!(f, "mandatory speed"),
            FrameLayout::FlagGatedSpeed => write!(f, "flag-gated speed"),
        }
    }
}

/// One decoded Indoor Bike Data notification.
///
/// Fields whose presence bit is unset are zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetrySample {
    /// Instantaneous speed in km/h
    pub speed_kmh: f64,
    /// Instantaneous cadence in RPM
    pub cadence_rpm: f64,
    /// Instantaneous power in watts
    pub power_watts: i16,
    /// Total distance reported by the trainer in meters (if present)
    pub total_distance_m: Option<u32>,
    /// Heart rate in BPM (if present)
    pub heart_rate_bpm: Option<u8>,
}

/// Connection state of the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected
    #[default]
    Disconnected,
    /// Connection in progress
    Connecting,
    /// Active connection
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting..."),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}

/// Inbound events from the trainer transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Raw Indoor Bike Data notification
    TelemetryFrame(Vec<u8>),
    /// Raw Fitness Machine Control Point indication
    ControlIndication(Vec<u8>),
    /// The link to the trainer was lost
    Disconnected,
}

/// Failure to decode a binary frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A field whose presence bit is set does not fit in the frame
    #[error("frame truncated reading {field} at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        field: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },
}

/// Errors that can occur in the trainer transport.
#[derive(Debug, Error)]
pub enum SensorError {
    /// BLE adapter not found or unavailable
    #[error("Bluetooth adapter not found")]
    AdapterNotFound,

    /// Failed to start BLE scanning
    #[error("Failed to start scanning: {0}")]
    ScanFailed(String),

    /// No FTMS trainer found during discovery
    #[error("No FTMS trainer found")]
    TrainerNotFound,

    /// Connection to trainer failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection timed out
    #[error("Connection timed out")]
    ConnectionTimeout,

    /// Not connected to a trainer
    #[error("Not connected")]
    NotConnected,

    /// Failed to subscribe to trainer notifications
    #[error("Failed to subscribe to notifications: {0}")]
    SubscriptionFailed(String),

    /// Failed to read a trainer characteristic
    #[error("Read failed: {0}")]
    ReadFailed(String),

    /// Failed to write to trainer characteristic
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Optional characteristic not offered by this trainer
    #[error("Unsupported characteristic: {0}")]
    Unsupported(String),

    /// Frame could not be decoded
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Generic BLE error
    #[error("BLE error: {0}")]
    BleError(String),
}
