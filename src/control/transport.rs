//! Write side of the trainer link, as seen by the control engine.

use crate::sensors::types::SensorError;
use std::future::Future;

/// Writes control point commands to a trainer.
///
/// Inbound indications and telemetry arrive separately as
/// [`TransportEvent`](crate::sensors::types::TransportEvent)s.
pub trait ControlTransport: Send + Sync {
    /// Write one command to the control point (write with response).
    fn write_command(
        &self,
        bytes: &[u8],
    ) -> impl Future<Output = Result<(), SensorError>> + Send;

    /// Whether a trainer is currently connected.
    fn is_connected(&self) -> bool;
}
