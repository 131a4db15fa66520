//! Ride session types.

use crate::metrics::calculator::SampleSeries;
use crate::sensors::types::TelemetrySample;
use crate::storage::config::Units;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Lifecycle of a ride session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No session has been started
    #[default]
    NotStarted,
    /// Riding; samples are folded into the session
    Active,
    /// Clock and aggregates frozen
    Paused,
    /// Session finished; aggregates are final
    Ended,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::NotStarted => write!(f, "Not started"),
            SessionStatus::Active => write!(f, "Active"),
            SessionStatus::Paused => write!(f, "Paused"),
            SessionStatus::Ended => write!(f, "Ended"),
        }
    }
}

/// Aggregate state of one ride.
///
/// Speeds are kept in km/h as decoded; distance accumulates in the unit
/// system fixed when the session was created.
#[derive(Debug, Clone)]
pub struct RideSession {
    pub(crate) status: SessionStatus,
    pub(crate) units: Units,
    pub(crate) target_watts: u16,
    /// Wall-clock start, for the summary
    pub(crate) started_at: Option<DateTime<Utc>>,
    /// Monotonic start
    pub(crate) start: Option<Instant>,
    pub(crate) paused_total: Duration,
    pub(crate) pause_started: Option<Instant>,
    pub(crate) ended_at: Option<Instant>,
    pub(crate) power: SampleSeries,
    pub(crate) cadence: SampleSeries,
    pub(crate) speed: SampleSeries,
    pub(crate) distance: f64,
    /// Last decoded sample, whatever the status
    pub(crate) current: TelemetrySample,
}

impl RideSession {
    /// A fresh, not yet started session.
    pub fn new(units: Units, target_watts: u16) -> Self {
        Self {
            status: SessionStatus::NotStarted,
            units,
            target_watts,
            started_at: None,
            start: None,
            paused_total: Duration::ZERO,
            pause_started: None,
            ended_at: None,
            power: SampleSeries::new(),
            cadence: SampleSeries::new(),
            speed: SampleSeries::new(),
            distance: 0.0,
            current: TelemetrySample::default(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn units(&self) -> Units {
        self.units
    }

    pub fn target_watts(&self) -> u16 {
        self.target_watts
    }

    /// Distance covered while active, in the session's units.
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Most recent sample, including ones received while not active.
    pub fn current(&self) -> &TelemetrySample {
        &self.current
    }

    pub fn power_samples(&self) -> &SampleSeries {
        &self.power
    }

    pub fn cadence_samples(&self) -> &SampleSeries {
        &self.cadence
    }

    /// Speed samples in km/h.
    pub fn speed_samples(&self) -> &SampleSeries {
        &self.speed
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }
}

/// Average and maximum of one metric.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MetricStats {
    pub average: f64,
    pub maximum: f64,
}

impl MetricStats {
    pub(crate) fn of(series: &SampleSeries, factor: f64) -> Self {
        Self {
            average: series.average() * factor,
            maximum: series.maximum() * factor,
        }
    }
}

/// Live values for display.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub status: SessionStatus,
    pub units: Units,
    /// Instantaneous power in watts
    pub power_watts: i16,
    /// Instantaneous cadence in RPM
    pub cadence_rpm: f64,
    /// Instantaneous speed in the session's units
    pub speed: f64,
    /// Distance in the session's units
    pub distance: f64,
    /// Active riding time
    pub elapsed: Duration,
    pub avg_power: f64,
    pub avg_cadence: f64,
    /// Average speed in the session's units
    pub avg_speed: f64,
    pub target_watts: u16,
    pub heart_rate_bpm: Option<u8>,
}

/// Final aggregates of an ended session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RideSummary {
    pub started_at: Option<DateTime<Utc>>,
    /// Active riding time in seconds
    pub duration_seconds: f64,
    /// Active riding time as `MM:SS`
    pub duration: String,
    pub units: Units,
    pub distance: f64,
    pub power: MetricStats,
    pub cadence: MetricStats,
    /// Speed statistics in the session's units
    pub speed: MetricStats,
    pub target_watts: u16,
    pub sample_count: usize,
}
