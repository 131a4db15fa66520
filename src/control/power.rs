//! ERG target power coordination.
//!
//! At most one "set target power" command is in flight. Requests arriving
//! meanwhile overwrite a single pending slot, and the caller driving the
//! in-flight command sends the pending value once its command resolves. A
//! burst of requests therefore costs at most two commands and always ends on
//! the last value requested.

use crate::control::engine::ControlEngine;
use crate::control::transport::ControlTransport;
use crate::control::types::{CommandOutcome, ControlError, PowerEncoding};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What happened to one `request_target_power` call.
#[derive(Debug)]
pub enum PowerRequest {
    /// Negative target; nothing sent
    Ignored,
    /// No trainer connected; nothing sent
    Unavailable,
    /// A command is in flight; this value was parked in the pending slot
    Coalesced,
    /// This call drove the command loop; the last value sent and its outcome
    Sent { watts: u16, outcome: CommandOutcome },
    /// This call drove the command loop and the last write failed
    Failed { watts: u16, error: ControlError },
}

#[derive(Debug, Default)]
struct CoordinatorState {
    in_flight: bool,
    pending: Option<u16>,
}

/// Resets the in-flight flag if the driving future is dropped mid-command.
struct DriveGuard<'a> {
    state: &'a Mutex<CoordinatorState>,
    armed: bool,
}

impl Drop for DriveGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.in_flight = false;
            state.pending = None;
        }
    }
}

/// Serializes target power updates against the control engine.
pub struct PowerTargetCoordinator<T: ControlTransport> {
    engine: Arc<ControlEngine<T>>,
    encoding: PowerEncoding,
    state: Mutex<CoordinatorState>,
}

impl<T: ControlTransport> PowerTargetCoordinator<T> {
    /// Create a coordinator using the given wire encoding.
    pub fn new(engine: Arc<ControlEngine<T>>, encoding: PowerEncoding) -> Self {
        Self {
            engine,
            encoding,
            state: Mutex::new(CoordinatorState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a set-power command is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.state().in_flight
    }

    /// Ask the trainer to hold `watts`.
    ///
    /// Returns immediately with [`PowerRequest::Coalesced`] if another
    /// request is already driving the command loop; otherwise sends the
    /// value, then any value that was parked meanwhile, until the slot is
    /// empty.
    pub async fn request_target_power(&self, watts: i32) -> PowerRequest {
        if watts < 0 {
            tracing::debug!("Ignoring negative target power {}W", watts);
            return PowerRequest::Ignored;
        }
        let watts = u16::try_from(watts).unwrap_or(u16::MAX);

        {
            let mut state = self.state();
            if state.in_flight {
                tracing::debug!("Target power {}W queued behind in-flight command", watts);
                state.pending = Some(watts);
                return PowerRequest::Coalesced;
            }
            if !self.engine.is_connected() {
                tracing::debug!("Target power {}W not sent: no trainer connected", watts);
                return PowerRequest::Unavailable;
            }
            state.in_flight = true;
        }

        let mut guard = DriveGuard {
            state: &self.state,
            armed: true,
        };
        let mut value = watts;

        loop {
            let result = self.engine.submit(self.encoding.encode(value)).await;

            let next = {
                let mut state = self.state();
                let next = match result {
                    Err(ControlError::TransportUnavailable) => None,
                    _ => state.pending.take(),
                };
                if next.is_none() {
                    state.in_flight = false;
                    state.pending = None;
                }
                next
            };

            if let Some(next) = next {
                value = next;
                continue;
            }

            guard.armed = false;

            return match result {
                Ok(outcome) => {
                    tracing::info!("Target power {}W: {}", value, outcome);
                    PowerRequest::Sent {
                        watts: value,
                        outcome,
                    }
                }
                Err(ControlError::TransportUnavailable) => PowerRequest::Unavailable,
                Err(error) => PowerRequest::Failed {
                    watts: value,
                    error,
                },
            };
        }
    }
}
