//! Event loop tying transport events and user intents to one session.
//!
//! The runner task is the only owner of the [`SessionController`]. Control
//! point indications are routed straight to the engine, so commands spawned
//! from the loop can complete while it keeps draining events.

use crate::control::engine::ControlEngine;
use crate::control::transport::ControlTransport;
use crate::recording::controller::SessionController;
use crate::recording::types::{MetricsSnapshot, RideSummary};
use crate::sensors::types::TransportEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

/// User intents accepted by the runner.
#[derive(Debug)]
pub enum RideCommand {
    Start,
    Pause,
    Resume,
    End {
        reply: Option<oneshot::Sender<Option<RideSummary>>>,
    },
    SetTargetPower(i32),
    AdjustTargetPower(i32),
    StepUp,
    StepDown,
    Snapshot {
        reply: oneshot::Sender<MetricsSnapshot>,
    },
    Shutdown,
}

/// Cloneable handle for sending intents to a running [`RideRunner`].
#[derive(Debug, Clone)]
pub struct RideHandle {
    tx: mpsc::Sender<RideCommand>,
}

impl RideHandle {
    async fn send(&self, command: RideCommand) -> bool {
        self.tx.send(command).await.is_ok()
    }

    pub async fn start(&self) -> bool {
        self.send(RideCommand::Start).await
    }

    pub async fn pause(&self) -> bool {
        self.send(RideCommand::Pause).await
    }

    pub async fn resume(&self) -> bool {
        self.send(RideCommand::Resume).await
    }

    /// End the session, returning its summary if one was running.
    pub async fn end(&self) -> Option<RideSummary> {
        let (reply, rx) = oneshot::channel();
        if !self.send(RideCommand::End { reply: Some(reply) }).await {
            return None;
        }
        rx.await.ok().flatten()
    }

    pub async fn set_target_power(&self, watts: i32) -> bool {
        self.send(RideCommand::SetTargetPower(watts)).await
    }

    pub async fn adjust_target_power(&self, delta: i32) -> bool {
        self.send(RideCommand::AdjustTargetPower(delta)).await
    }

    pub async fn step_up(&self) -> bool {
        self.send(RideCommand::StepUp).await
    }

    pub async fn step_down(&self) -> bool {
        self.send(RideCommand::StepDown).await
    }

    pub async fn snapshot(&self) -> Option<MetricsSnapshot> {
        let (reply, rx) = oneshot::channel();
        if !self.send(RideCommand::Snapshot { reply }).await {
            return None;
        }
        rx.await.ok()
    }

    pub async fn shutdown(&self) -> bool {
        self.send(RideCommand::Shutdown).await
    }
}

/// Owns a session and reacts to transport events, intents and the
/// metrics ticker.
pub struct RideRunner<T: ControlTransport + 'static> {
    controller: SessionController<T>,
    engine: Arc<ControlEngine<T>>,
    events: mpsc::Receiver<TransportEvent>,
    commands: mpsc::Receiver<RideCommand>,
    metrics_interval: Duration,
}

impl<T: ControlTransport + 'static> RideRunner<T> {
    /// Create a runner and the handle used to drive it.
    pub fn new(
        controller: SessionController<T>,
        engine: Arc<ControlEngine<T>>,
        events: mpsc::Receiver<TransportEvent>,
        metrics_interval: Duration,
    ) -> (Self, RideHandle) {
        let (tx, commands) = mpsc::channel(32);
        let runner = Self {
            controller,
            engine,
            events,
            commands,
            metrics_interval,
        };
        (runner, RideHandle { tx })
    }

    /// Run until shutdown or until every handle is dropped.
    ///
    /// Returns the controller so the final session can be inspected.
    pub async fn run(mut self) -> SessionController<T> {
        let mut ticker = tokio::time::interval(self.metrics_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut events_open = true;

        loop {
            tokio::select! {
                event = self.events.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        tracing::debug!("Transport event stream closed");
                        events_open = false;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(RideCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                _ = ticker.tick() => self.controller.tick(),
            }
        }

        tracing::debug!("Ride runner stopped");
        self.controller
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::TelemetryFrame(data) => {
                self.controller.ingest_frame(&data);
            }
            TransportEvent::ControlIndication(data) => self.engine.handle_indication(&data),
            TransportEvent::Disconnected => {
                self.engine.cancel_outstanding();
                self.controller.handle_disconnect();
            }
        }
    }

    fn handle_command(&mut self, command: RideCommand) {
        match command {
            RideCommand::Start => {
                self.controller.start();
            }
            RideCommand::Pause => {
                self.controller.pause();
            }
            RideCommand::Resume => {
                self.controller.resume();
            }
            RideCommand::End { reply } => {
                let summary = self.controller.end();
                if let Some(reply) = reply {
                    let _ = reply.send(summary);
                }
            }
            RideCommand::SetTargetPower(watts) => {
                self.controller.set_target_power(watts);
            }
            RideCommand::AdjustTargetPower(delta) => {
                self.controller.adjust_target_power(delta);
            }
            RideCommand::StepUp => {
                self.controller.step_up();
            }
            RideCommand::StepDown => {
                self.controller.step_down();
            }
            RideCommand::Snapshot { reply } => {
                let _ = reply.send(self.controller.snapshot());
            }
            RideCommand::Shutdown => {}
        }
    }
}
