//! Registry error types

use crate::connection::ConnectionId;

/// Error type for registry operations
///
/// Unknown producers are deliberately absent: a targeted operation naming a
/// producer that is not registered is a silent drop, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Connection never registered as a consumer
    UnknownConsumer(ConnectionId),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::UnknownConsumer(id) => write!(f, "Unknown consumer: {}", id),
        }
    }
}

impl std::error::Error for RegistryError {}
