//! # RN2483 Error Handling
//!
//! This module defines the LoRaError enum, which represents the different error
//! types that can occur in the rn2483-rs crate.

use thiserror::Error;

/// Represents the different error types that can occur while talking to the module.
#[derive(Debug, Error)]
pub enum LoRaError {
    /// The command identifier is not present in the catalog.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Two catalog entries share one identifier.
    #[error("Duplicate command in catalog: {0}")]
    DuplicateCommand(String),

    /// A template's pattern and its placeholder schema disagree.
    #[error("Invalid template for {command}: {reason}")]
    InvalidTemplate { command: String, reason: String },

    /// A placeholder of the command has no bound value.
    #[error("Missing argument '{placeholder}' for {command}")]
    MissingArgument { command: String, placeholder: String },

    /// A bound value failed its type or range constraint.
    #[error("Invalid argument '{placeholder}' for {command}: {reason}")]
    InvalidArgument {
        command: String,
        placeholder: String,
        reason: String,
    },

    /// Indicates an error related to the serial port communication.
    #[error("Serial port error: {0}")]
    SerialPortError(String),

    /// No response line arrived within the deadline.
    #[error("Timed out waiting for a response")]
    Timeout,

    /// The response line could not be decoded as text.
    #[error("Error decoding response: {0}")]
    Decode(String),

    /// The module replied with its error token.
    #[error("Device rejected command: {0}")]
    DeviceRejected(String),

    /// The response classification did not match what the operation expects.
    #[error("Unexpected response to {command}: expected {expected}, got '{response}'")]
    UnexpectedResponse {
        command: String,
        expected: &'static str,
        response: String,
    },

    /// The module refused or aborted a radio or MAC transmission.
    #[error("Transmission failed: {0}")]
    TransmissionFailed(String),

    /// The module reported an error while listening.
    #[error("Reception failed: {0}")]
    ReceptionFailed(String),

    /// The join configuration does not match its activation mode.
    #[error("Invalid join configuration: {0}")]
    InvalidJoinConfig(String),

    /// The join sequence stopped at the given stage.
    #[error("Join failed at {stage}: {reason}")]
    JoinFailed { stage: String, reason: String },
}

impl LoRaError {
    /// True for channel-level failures (I/O fault or timeout) where the command
    /// may not have reached the module.
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, LoRaError::SerialPortError(_) | LoRaError::Timeout)
    }

    /// True when the module answered and refused the command.
    pub fn is_device_rejection(&self) -> bool {
        matches!(
            self,
            LoRaError::DeviceRejected(_)
                | LoRaError::TransmissionFailed(_)
                | LoRaError::ReceptionFailed(_)
        )
    }

    /// True for errors raised before any I/O because the caller passed bad input.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            LoRaError::MissingArgument { .. }
                | LoRaError::InvalidArgument { .. }
                | LoRaError::InvalidJoinConfig(_)
        )
    }

    /// The text the module sent back with its error token, if any.
    pub fn device_reason(&self) -> Option<&str> {
        match self {
            LoRaError::DeviceRejected(reason)
            | LoRaError::TransmissionFailed(reason)
            | LoRaError::ReceptionFailed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LoRaError {
    fn from(e: std::io::Error) -> Self {
        LoRaError::SerialPortError(e.to_string())
    }
}

impl From<tokio_serial::Error> for LoRaError {
    fn from(e: tokio_serial::Error) -> Self {
        LoRaError::SerialPortError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LoRaError>;
