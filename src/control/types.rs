//! Fitness Machine Control Point types.
//!
//! Commands are an opcode byte followed by an opcode-specific payload. The
//! trainer answers each one with an indication `[0x80, request_opcode,
//! result_code]`.

use std::time::Duration;
use thiserror::Error;

/// Opcode of a control point response frame.
pub const RESPONSE_OPCODE: u8 = 0x80;

/// FTMS Control Point opcodes used by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlOpcode {
    /// Request control of the fitness machine
    RequestControl = 0x00,
    /// Reset the fitness machine
    Reset = 0x01,
    /// Set target power
    SetTargetPower = 0x05,
    /// Start or resume training
    StartOrResume = 0x07,
}

impl From<ControlOpcode> for u8 {
    fn from(opcode: ControlOpcode) -> Self {
        opcode as u8
    }
}

/// An outbound control point request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCommand {
    /// Opcode byte
    pub opcode: u8,
    /// Opcode-specific payload
    pub payload: Vec<u8>,
    /// Human-readable label for diagnostics
    pub label: String,
}

impl ControlCommand {
    pub fn new(opcode: u8, payload: Vec<u8>, label: impl Into<String>) -> Self {
        Self {
            opcode,
            payload,
            label: label.into(),
        }
    }

    pub fn request_control() -> Self {
        Self::new(ControlOpcode::RequestControl.into(), Vec::new(), "Request Control")
    }

    pub fn reset() -> Self {
        Self::new(ControlOpcode::Reset.into(), Vec::new(), "Reset")
    }

    pub fn start_or_resume() -> Self {
        Self::new(ControlOpcode::StartOrResume.into(), Vec::new(), "Start/Resume")
    }

    /// Wire bytes: opcode followed by payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.payload.len());
        bytes.push(self.opcode);
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

/// Result code carried by a control point response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Success,
    OpCodeNotSupported,
    InvalidParameter,
    OperationFailed,
    ControlNotPermitted,
    /// Reserved value, passed through for diagnostics
    Other(u8),
}

impl From<u8> for ResultCode {
    fn from(value: u8) -> Self {
        match value {
            0x01 => ResultCode::Success,
            0x02 => ResultCode::OpCodeNotSupported,
            0x03 => ResultCode::InvalidParameter,
            0x04 => ResultCode::OperationFailed,
            0x05 => ResultCode::ControlNotPermitted,
            other => ResultCode::Other(other),
        }
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultCode::Success => write!(f, "Success"),
            ResultCode::OpCodeNotSupported => write!(f, "Op Code Not Supported"),
            ResultCode::InvalidParameter => write!(f, "Invalid Parameter"),
            ResultCode::OperationFailed => write!(f, "Operation Failed"),
            ResultCode::ControlNotPermitted => write!(f, "Control Not Permitted"),
            ResultCode::Other(code) => write!(f, "Reserved (0x{:02X})", code),
        }
    }
}

/// A decoded control point response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlResponse {
    /// Opcode of the command being acknowledged
    pub request_opcode: u8,
    /// Result reported by the trainer
    pub result: ResultCode,
}

impl ControlResponse {
    /// Parse an indication. Returns `None` for anything that is not a
    /// well-formed response frame.
    pub fn parse(data: &[u8]) -> Option<Self> {
        match data {
            [RESPONSE_OPCODE, request_opcode, result, ..] => Some(Self {
                request_opcode: *request_opcode,
                result: ResultCode::from(*result),
            }),
            _ => None,
        }
    }
}

/// How a submitted command resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The trainer answered with a result code
    Acknowledged(ResultCode),
    /// No answer within the response window, or the link dropped
    TimedOut,
}

impl CommandOutcome {
    /// The trainer answered with anything other than success.
    pub fn is_rejected(&self) -> bool {
        matches!(self, CommandOutcome::Acknowledged(code) if *code != ResultCode::Success)
    }
}

impl std::fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandOutcome::Acknowledged(code) => write!(f, "{}", code),
            CommandOutcome::TimedOut => write!(f, "Timed out"),
        }
    }
}

/// Wire encoding of a "set target power" command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerEncoding {
    /// Opcode 0x05, signed 16-bit value in 1 W units
    #[default]
    Watts,
    /// Signed 16-bit value in 0.1 W units under the given opcode
    DeciWatts { opcode: u8 },
}

impl PowerEncoding {
    /// Build the command for a target in watts. Values outside the i16
    /// range of the chosen unit saturate.
    pub fn encode(&self, watts: u16) -> ControlCommand {
        let (opcode, raw) = match *self {
            PowerEncoding::Watts => (
                u8::from(ControlOpcode::SetTargetPower),
                i16::try_from(watts).unwrap_or(i16::MAX),
            ),
            PowerEncoding::DeciWatts { opcode } => (
                opcode,
                i16::try_from(u32::from(watts) * 10).unwrap_or(i16::MAX),
            ),
        };
        ControlCommand::new(
            opcode,
            raw.to_le_bytes().to_vec(),
            format!("Set Power {}W", watts),
        )
    }
}

/// Control point timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlTiming {
    /// How long to wait for an indication
    pub response_timeout: Duration,
    /// Quiet period after each command before the next may be written
    pub settle_delay: Duration,
}

impl Default for ControlTiming {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_millis(3000),
            settle_delay: Duration::from_millis(500),
        }
    }
}

/// Errors from the control point engine.
#[derive(Debug, Error)]
pub enum ControlError {
    /// No trainer connected
    #[error("Control point transport unavailable")]
    TransportUnavailable,

    /// The transport rejected the write
    #[error("Control point write failed: {0}")]
    WriteFailed(String),
}
