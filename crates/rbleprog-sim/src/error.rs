//! Error types for the emulated radio

use thiserror::Error;

/// Emulator setup errors
#[derive(Error, Debug)]
pub enum SimError {
    /// Initial OTP image does not fit
    #[error("Image of {size} bytes does not fit in {capacity} bytes of OTP")]
    ImageTooLarge {
        /// Image size in bytes
        size: usize,
        /// OTP size in bytes
        capacity: usize,
    },

    /// Reading the image file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for emulator setup
pub type Result<T> = core::result::Result<T, SimError>;
