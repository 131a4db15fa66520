//! Fitness Machine Control Point: command engine and ERG power coordination.

pub mod engine;
pub mod power;
pub mod transport;
pub mod types;

pub use engine::ControlEngine;
pub use power::{PowerRequest, PowerTargetCoordinator};
pub use transport::ControlTransport;
pub use types::{
    CommandOutcome, ControlCommand, ControlError, ControlOpcode, ControlResponse, ControlTiming,
    PowerEncoding, ResultCode,
};
