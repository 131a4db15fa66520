//! Ride session recording: aggregation, lifecycle and the event loop.

pub mod aggregator;
pub mod controller;
pub mod observer;
pub mod runner;
pub mod types;

pub use controller::{SessionController, SessionSettings};
pub use observer::{ChannelObserver, RideEvent, RideObserver, TracingObserver};
pub use runner::{RideCommand, RideHandle, RideRunner};
pub use types::{MetricStats, MetricsSnapshot, RideSession, RideSummary, SessionStatus};
