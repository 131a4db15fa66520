//! ErgRide - FTMS trainer control and ride telemetry
//!
//! Decodes Indoor Bike Data notifications, drives the Fitness Machine Control
//! Point one command at a time to hold an ERG target power, and aggregates
//! the samples of a ride session into live and summary metrics.

pub mod control;
pub mod metrics;
pub mod recording;
pub mod sensors;
pub mod storage;

// Re-export commonly used types
pub use control::engine::ControlEngine;
pub use control::power::PowerTargetCoordinator;
pub use recording::controller::SessionController;
pub use recording::runner::{RideHandle, RideRunner};
pub use sensors::manager::BleTrainer;
pub use storage::config::AppConfig;
