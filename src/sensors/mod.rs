//! Sensor module for FTMS trainer communication.

pub mod ftms;
pub mod manager;
pub mod types;

pub use ftms::{decode_indoor_bike_data, FitnessMachineFeatures};
pub use manager::BleTrainer;
pub use types::{
    ConnectionState, FrameLayout, ParseError, SensorError, TelemetrySample, TransportEvent,
};
