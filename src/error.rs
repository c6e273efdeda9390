//! Error types
//!
//! Crate-wide error enum plus the module-level errors it wraps.

use std::fmt;
use std::io;

use crate::registry::RegistryError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Transport I/O failure
    Io(io::Error),
    /// Malformed or oversized frame on the wire
    Protocol(ProtocolError),
    /// Registry lookup failure
    Registry(RegistryError),
    /// Request rejected before reaching the registries
    Validation(ValidationError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::Registry(e) => write!(f, "Registry error: {}", e),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Registry(e) => Some(e),
            Error::Validation(e) => Some(e),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Error::Registry(e)
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation(e)
    }
}

/// Wire-level protocol errors
#[derive(Debug)]
pub enum ProtocolError {
    /// Declared frame length exceeds the configured payload limit
    FrameTooLarge { size: usize, max: usize },
    /// Frame body is not a known event
    Decode(serde_json::Error),
    /// Outbound event could not be serialized
    Encode(serde_json::Error),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::FrameTooLarge { size, max } => {
                write!(f, "Frame of {} bytes exceeds limit of {} bytes", size, max)
            }
            ProtocolError::Decode(e) => write!(f, "Failed to decode event: {}", e),
            ProtocolError::Encode(e) => write!(f, "Failed to encode event: {}", e),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// A control request was missing a required field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingField(&'static str),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingField(name) => write!(f, "Missing required field: {}", name),
        }
    }
}

impl std::error::Error for ValidationError {}
