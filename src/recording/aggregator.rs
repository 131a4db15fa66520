//! Sample folding and elapsed-time accounting for a ride session.

use crate::metrics::calculator::format_elapsed;
use crate::recording::types::{
    MetricStats, MetricsSnapshot, RideSession, RideSummary, SessionStatus,
};
use crate::sensors::types::TelemetrySample;
use chrono::Utc;
use std::time::Duration;
use tokio::time::Instant;

/// Notifications are assumed to arrive once per second.
const SECONDS_PER_HOUR: f64 = 3600.0;

impl RideSession {
    /// Fold one decoded sample into the session.
    ///
    /// Last-seen values always update. Sequences and distance only grow
    /// while the session is active.
    pub fn ingest(&mut self, sample: &TelemetrySample) {
        self.current = *sample;

        if self.status != SessionStatus::Active {
            return;
        }

        self.power.push(f64::from(sample.power_watts));
        self.cadence.push(sample.cadence_rpm);
        self.speed.push(sample.speed_kmh);
        self.distance += self.units.convert_speed(sample.speed_kmh) / SECONDS_PER_HOUR;
    }

    /// Active riding time as of `now`.
    ///
    /// Frozen while paused and final once ended.
    pub fn elapsed_active(&self, now: Instant) -> Duration {
        let Some(start) = self.start else {
            return Duration::ZERO;
        };
        let until = match (self.ended_at, self.pause_started) {
            (Some(ended), _) => ended,
            (None, Some(paused)) => paused,
            (None, None) => now,
        };
        until
            .saturating_duration_since(start)
            .saturating_sub(self.paused_total)
    }

    pub(crate) fn mark_started(&mut self, now: Instant) {
        self.status = SessionStatus::Active;
        self.start = Some(now);
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn mark_paused(&mut self, now: Instant) {
        self.status = SessionStatus::Paused;
        self.pause_started = Some(now);
    }

    pub(crate) fn mark_resumed(&mut self, now: Instant) {
        if let Some(paused) = self.pause_started.take() {
            self.paused_total += now.saturating_duration_since(paused);
        }
        self.status = SessionStatus::Active;
    }

    pub(crate) fn mark_ended(&mut self, now: Instant) {
        if self.status == SessionStatus::Paused {
            self.mark_resumed(now);
        }
        self.status = SessionStatus::Ended;
        self.ended_at = Some(now);
    }

    /// Live values as of `now`.
    pub fn snapshot(&self, now: Instant) -> MetricsSnapshot {
        let factor = self.units.factor();
        MetricsSnapshot {
            status: self.status,
            units: self.units,
            power_watts: self.current.power_watts,
            cadence_rpm: self.current.cadence_rpm,
            speed: self.current.speed_kmh * factor,
            distance: self.distance,
            elapsed: self.elapsed_active(now),
            avg_power: self.power.average(),
            avg_cadence: self.cadence.average(),
            avg_speed: self.speed.average() * factor,
            target_watts: self.target_watts,
            heart_rate_bpm: self.current.heart_rate_bpm,
        }
    }

    /// Aggregates as of `now`.
    pub fn summary(&self, now: Instant) -> RideSummary {
        let elapsed = self.elapsed_active(now);
        RideSummary {
            started_at: self.started_at,
            duration_seconds: elapsed.as_secs_f64(),
            duration: format_elapsed(elapsed),
            units: self.units,
            distance: self.distance,
            power: MetricStats::of(&self.power, 1.0),
            cadence: MetricStats::of(&self.cadence, 1.0),
            speed: MetricStats::of(&self.speed, self.units.factor()),
            target_watts: self.target_watts,
            sample_count: self.power.len(),
        }
    }
}
