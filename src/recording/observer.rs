//! Presentation side of the ride engine.

use crate::control::types::CommandOutcome;
use crate::metrics::calculator::format_elapsed;
use crate::recording::types::{MetricsSnapshot, RideSummary};
use crossbeam::channel::Sender;

/// Receives live metrics, summaries and command outcomes.
///
/// Callbacks run on the engine's tasks and must not block.
pub trait RideObserver: Send + Sync {
    fn on_metrics_updated(&self, _snapshot: &MetricsSnapshot) {}

    fn on_session_ended(&self, _summary: &RideSummary) {}

    fn on_command_outcome(&self, _label: &str, _outcome: CommandOutcome) {}
}

/// Writes every event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RideObserver for TracingObserver {
    fn on_metrics_updated(&self, snapshot: &MetricsSnapshot) {
        tracing::debug!(
            "{} | {}W (target {}W) | {:.0} rpm | {:.1} {} | {:.2} {}",
            format_elapsed(snapshot.elapsed),
            snapshot.power_watts,
            snapshot.target_watts,
            snapshot.cadence_rpm,
            snapshot.speed,
            snapshot.units.speed_label(),
            snapshot.distance,
            snapshot.units.distance_label(),
        );
    }

    fn on_session_ended(&self, summary: &RideSummary) {
        tracing::info!(
            "Ride ended after {}: {:.2} {}, avg {:.0}W",
            summary.duration,
            summary.distance,
            summary.units.distance_label(),
            summary.power.average
        );
    }

    fn on_command_outcome(&self, label: &str, outcome: CommandOutcome) {
        tracing::debug!("{}: {}", label, outcome);
    }
}

/// An observer callback as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum RideEvent {
    Metrics(MetricsSnapshot),
    SessionEnded(RideSummary),
    CommandOutcome { label: String, outcome: CommandOutcome },
}

/// Forwards events over a crossbeam channel to a consumer thread.
///
/// Events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: Sender<RideEvent>,
}

impl ChannelObserver {
    pub fn new(tx: Sender<RideEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: RideEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Ride event receiver dropped");
        }
    }
}

impl RideObserver for ChannelObserver {
    fn on_metrics_updated(&self, snapshot: &MetricsSnapshot) {
        self.send(RideEvent::Metrics(snapshot.clone()));
    }

    fn on_session_ended(&self, summary: &RideSummary) {
        self.send(RideEvent::SessionEnded(summary.clone()));
    }

    fn on_command_outcome(&self, label: &str, outcome: CommandOutcome) {
        self.send(RideEvent::CommandOutcome {
            label: label.to_string(),
            outcome,
        });
    }
}
