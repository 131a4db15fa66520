//! Control point request/response engine.
//!
//! The control point has no request IDs: an indication answers whatever
//! command was written last. The engine therefore keeps at most one command
//! outstanding. Submitters queue in FIFO order on an async mutex that is held
//! across write, wait and settle delay, while the outstanding command's
//! responder lives in a separate slot that the event loop resolves from
//! [`ControlEngine::handle_indication`].

use crate::control::transport::ControlTransport;
use crate::control::types::{
    CommandOutcome, ControlCommand, ControlError, ControlResponse, ControlTiming,
};
use crate::recording::observer::RideObserver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// The command currently awaiting its indication.
struct InFlight {
    opcode: u8,
    label: String,
    responder: oneshot::Sender<ControlResponse>,
}

/// Serializes control point commands over a transport.
pub struct ControlEngine<T: ControlTransport> {
    transport: Arc<T>,
    timing: ControlTiming,
    observer: Arc<dyn RideObserver>,
    /// FIFO turn for submitters
    queue: tokio::sync::Mutex<()>,
    /// Correlation slot for the outstanding command
    in_flight: Mutex<Option<InFlight>>,
}

impl<T: ControlTransport> ControlEngine<T> {
    /// Create a new engine.
    pub fn new(transport: Arc<T>, timing: ControlTiming, observer: Arc<dyn RideObserver>) -> Self {
        Self {
            transport,
            timing,
            observer,
            queue: tokio::sync::Mutex::new(()),
            in_flight: Mutex::new(None),
        }
    }

    /// Whether the underlying transport is connected.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Whether a command is currently waiting for its indication.
    pub fn has_outstanding(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> MutexGuard<'_, Option<InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send a command and wait for its acknowledgment.
    ///
    /// Waits for any earlier command (including its settle delay) first.
    /// Resolves exactly once: with the trainer's result code, or with
    /// [`CommandOutcome::TimedOut`] when no indication arrives in time or the
    /// link drops. The settle delay is always observed before returning once
    /// a write has been attempted.
    pub async fn submit(&self, command: ControlCommand) -> Result<CommandOutcome, ControlError> {
        let _turn = self.queue.lock().await;

        if !self.transport.is_connected() {
            tracing::debug!("Dropping {}: no trainer connected", command.label);
            return Err(ControlError::TransportUnavailable);
        }

        let (tx, rx) = oneshot::channel();
        *self.slot() = Some(InFlight {
            opcode: command.opcode,
            label: command.label.clone(),
            responder: tx,
        });

        tracing::debug!("Sending {}", command.label);

        let result = match self.transport.write_command(&command.to_bytes()).await {
            Ok(()) => Ok(self.await_response(&command.label, rx).await),
            Err(e) => {
                tracing::error!("{} failed: {}", command.label, e);
                Err(ControlError::WriteFailed(e.to_string()))
            }
        };

        self.slot().take();

        if let Ok(outcome) = result {
            match outcome {
                CommandOutcome::Acknowledged(code) if outcome.is_rejected() => {
                    tracing::warn!("{} rejected: {}", command.label, code);
                }
                CommandOutcome::Acknowledged(_) => {
                    tracing::debug!("{} acknowledged", command.label);
                }
                CommandOutcome::TimedOut => {}
            }
            self.observer.on_command_outcome(&command.label, outcome);
        }

        // Trainers apply commands with internal latency and drop adjacent writes
        tokio::time::sleep(self.timing.settle_delay).await;

        result
    }

    async fn await_response(
        &self,
        label: &str,
        rx: oneshot::Receiver<ControlResponse>,
    ) -> CommandOutcome {
        match tokio::time::timeout(self.timing.response_timeout, rx).await {
            Ok(Ok(response)) => CommandOutcome::Acknowledged(response.result),
            Ok(Err(_)) => {
                tracing::warn!("{} abandoned: trainer link lost", label);
                CommandOutcome::TimedOut
            }
            Err(_) => {
                tracing::warn!("{} timed out waiting for indication", label);
                CommandOutcome::TimedOut
            }
        }
    }

    /// Route a control point indication to the outstanding command.
    ///
    /// Indications that are not responses, that arrive with nothing
    /// outstanding, or that echo a different opcode are ignored.
    pub fn handle_indication(&self, data: &[u8]) {
        let Some(response) = ControlResponse::parse(data) else {
            tracing::debug!("Ignoring control point frame {:02X?}", data);
            return;
        };

        tracing::debug!(
            "Control point response: request opcode 0x{:02X}, result {}",
            response.request_opcode,
            response.result
        );

        let mut slot = self.slot();
        match slot.take() {
            Some(in_flight) if in_flight.opcode == response.request_opcode => {
                // Receiver is gone only if the submitter was cancelled
                let _ = in_flight.responder.send(response);
            }
            Some(in_flight) => {
                tracing::warn!(
                    "Response for opcode 0x{:02X} while waiting on {} (0x{:02X}); ignored",
                    response.request_opcode,
                    in_flight.label,
                    in_flight.opcode
                );
                *slot = Some(in_flight);
            }
            None => {
                tracing::warn!(
                    "Unsolicited control point response for opcode 0x{:02X}; ignored",
                    response.request_opcode
                );
            }
        }
    }

    /// Resolve the outstanding command, if any, as timed out right away.
    ///
    /// Called when the link drops so no submitter waits out the full window.
    pub fn cancel_outstanding(&self) {
        if let Some(in_flight) = self.slot().take() {
            tracing::info!("Cancelling {}: trainer disconnected", in_flight.label);
        }
    }

    /// Take control of the trainer: Request Control, Reset, Start/Resume.
    ///
    /// Outcomes are reported to the observer. A rejected or unanswered step
    /// does not stop the sequence; only a transport error does.
    pub async fn initialize(&self) -> Result<(), ControlError> {
        tracing::info!("Initializing trainer");
        for command in [
            ControlCommand::request_control(),
            ControlCommand::reset(),
            ControlCommand::start_or_resume(),
        ] {
            self.submit(command).await?;
        }
        Ok(())
    }
}
