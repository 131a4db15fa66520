//! Ride session lifecycle.
//!
//! `NotStarted -> Active <-> Paused -> Ended`. Transitions requested from
//! the wrong state are ignored. Target power changes are handed to the
//! power coordinator on their own task so the caller never waits on the
//! control point.

use crate::control::power::{PowerRequest, PowerTargetCoordinator};
use crate::control::transport::ControlTransport;
use crate::recording::observer::RideObserver;
use crate::recording::types::{MetricsSnapshot, RideSession, RideSummary, SessionStatus};
use crate::sensors::ftms::decode_indoor_bike_data;
use crate::sensors::types::{FrameLayout, TelemetrySample};
use crate::storage::config::{AppConfig, Units};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Session parameters fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub frame_layout: FrameLayout,
    pub units: Units,
    pub initial_target_watts: u16,
    pub erg_step_watts: u16,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            frame_layout: config.device_profile().frame_layout,
            units: config.ride.units,
            initial_target_watts: config.ride.initial_target_watts,
            erg_step_watts: config.ride.erg_step_watts,
        }
    }
}

/// Owns the ride session and routes user intents.
pub struct SessionController<T: ControlTransport + 'static> {
    session: RideSession,
    coordinator: Arc<PowerTargetCoordinator<T>>,
    observer: Arc<dyn RideObserver>,
    settings: SessionSettings,
    /// Remembered across sessions
    target_watts: u16,
}

impl<T: ControlTransport + 'static> SessionController<T> {
    pub fn new(
        coordinator: Arc<PowerTargetCoordinator<T>>,
        observer: Arc<dyn RideObserver>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            session: RideSession::new(settings.units, settings.initial_target_watts),
            coordinator,
            observer,
            settings,
            target_watts: settings.initial_target_watts,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn session(&self) -> &RideSession {
        &self.session
    }

    pub fn target_watts(&self) -> u16 {
        self.target_watts
    }

    /// Start a fresh session and apply the current target power.
    ///
    /// Only valid before the first session or after one has ended.
    pub fn start(&mut self) -> bool {
        if matches!(self.status(), SessionStatus::Active | SessionStatus::Paused) {
            tracing::debug!("Ignoring start: session already {}", self.status());
            return false;
        }

        let mut session = RideSession::new(self.settings.units, self.target_watts);
        session.current = self.session.current;
        session.mark_started(Instant::now());
        self.session = session;

        tracing::info!("Ride started (target {}W)", self.target_watts);
        self.dispatch_target(self.target_watts);
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.status() != SessionStatus::Active {
            tracing::debug!("Ignoring pause: session {}", self.status());
            return false;
        }
        self.session.mark_paused(Instant::now());
        tracing::info!("Ride paused");
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.status() != SessionStatus::Paused {
            tracing::debug!("Ignoring resume: session {}", self.status());
            return false;
        }
        self.session.mark_resumed(Instant::now());
        tracing::info!("Ride resumed");
        true
    }

    /// End the session and report its summary.
    ///
    /// Returns `None` unless the session was active or paused.
    pub fn end(&mut self) -> Option<RideSummary> {
        if !matches!(self.status(), SessionStatus::Active | SessionStatus::Paused) {
            tracing::debug!("Ignoring end: session {}", self.status());
            return None;
        }
        let now = Instant::now();
        self.session.mark_ended(now);
        let summary = self.session.summary(now);

        tracing::info!("Ride ended ({})", summary.duration);
        self.observer.on_session_ended(&summary);
        Some(summary)
    }

    /// Set the ERG target. Negative values are ignored.
    ///
    /// The value is remembered for the next `start()` and, when a trainer is
    /// connected, sent through the coordinator on a separate task.
    pub fn set_target_power(&mut self, watts: i32) -> Option<JoinHandle<PowerRequest>> {
        if watts < 0 {
            tracing::debug!("Ignoring negative target power {}W", watts);
            return None;
        }
        let watts = u16::try_from(watts).unwrap_or(u16::MAX);
        self.target_watts = watts;
        self.session.target_watts = watts;
        Some(self.dispatch_target(watts))
    }

    /// Nudge the target by `delta` watts, clamping at zero.
    pub fn adjust_target_power(&mut self, delta: i32) -> Option<JoinHandle<PowerRequest>> {
        let watts = (i32::from(self.target_watts) + delta).max(0);
        self.set_target_power(watts)
    }

    /// Raise the target by one ERG step.
    pub fn step_up(&mut self) -> Option<JoinHandle<PowerRequest>> {
        self.adjust_target_power(i32::from(self.settings.erg_step_watts))
    }

    /// Lower the target by one ERG step.
    pub fn step_down(&mut self) -> Option<JoinHandle<PowerRequest>> {
        self.adjust_target_power(-i32::from(self.settings.erg_step_watts))
    }

    fn dispatch_target(&self, watts: u16) -> JoinHandle<PowerRequest> {
        let coordinator = self.coordinator.clone();
        tokio::spawn(async move {
            let result = coordinator.request_target_power(i32::from(watts)).await;
            if let PowerRequest::Failed { watts, error } = &result {
                tracing::warn!("Target power {}W not applied: {}", watts, error);
            }
            result
        })
    }

    /// Decode a telemetry frame and fold it into the session.
    ///
    /// Malformed frames are logged and dropped.
    pub fn ingest_frame(&mut self, data: &[u8]) -> Option<TelemetrySample> {
        let sample = match decode_indoor_bike_data(data, self.settings.frame_layout) {
            Ok(sample) => sample,
            Err(e) => {
                tracing::debug!("Dropping telemetry frame: {}", e);
                return None;
            }
        };

        self.session.ingest(&sample);
        if self.status() == SessionStatus::Active {
            self.observer.on_metrics_updated(&self.snapshot());
        }
        Some(sample)
    }

    /// The trainer link dropped; end any running session.
    pub fn handle_disconnect(&mut self) -> Option<RideSummary> {
        tracing::info!("Trainer disconnected");
        self.end()
    }

    /// Report live metrics if the session is active.
    pub fn tick(&self) {
        if self.status() == SessionStatus::Active {
            self.observer.on_metrics_updated(&self.snapshot());
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.session.snapshot(Instant::now())
    }
}
