//! Error types for the serial backend

use thiserror::Error;

/// Serial backend errors
#[derive(Error, Debug)]
pub enum SerialError {
    /// Invalid connection parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The receive thread could not be started
    #[error("Failed to start receive thread: {0}")]
    ReaderSpawn(std::io::Error),

    /// I/O error during communication
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port error
    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),
}

/// Result type for serial backend operations
pub type Result<T> = core::result::Result<T, SerialError>;
