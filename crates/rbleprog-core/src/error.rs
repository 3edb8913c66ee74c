//! Error types for rbleprog-core
//!
//! This module provides a no_std compatible error type that is returned by
//! every layer of the programmer. Each variant maps to a stable numeric code
//! so failures can be reported the same way on a host and on a board.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Bring-up errors
    /// Power, clock or pin-mux initialization failed
    PowerInit,
    /// The vendor command channel to the radio could not be opened
    CompanionInit,
    /// The raw transport could not be opened
    TransportInit,
    /// The raw transport could not be closed before switching channels
    TransportUninit,

    // Transport errors
    /// Writing a request to the radio failed
    TransportWrite,
    /// Reading a response from the radio failed
    TransportRead,
    /// No completion event arrived within the wait budget
    WaitTimeout,
    /// Response payload had an unexpected length
    ResponseLength {
        /// Length the request implies
        expected: usize,
        /// Length actually received
        actual: usize,
    },
    /// Response carried a different opcode than the request
    OpcodeMismatch {
        /// Opcode of the request
        expected: u16,
        /// Opcode found in the response
        actual: u16,
    },
    /// Response had the right shape but unexpected content
    UnexpectedResponse,
    /// Request would not fit in the working buffer
    FrameTooLarge,

    // OTP errors
    /// Read-back after write did not match the patch
    ReadbackMismatch {
        /// OTP address the patch was written to
        address: u32,
        /// Offset of the first differing byte within the patch
        offset: usize,
        /// Byte that was written
        expected: u8,
        /// Byte that was read back
        found: u8,
    },
    /// No room left in OTP for another patch
    OtpExhausted,

    // Configuration errors
    /// Requested MAC octet has no precomputed patch checksum
    UnsupportedMac(u8),
}

impl Error {
    /// Numeric error code reported in log lines
    pub fn code(&self) -> u8 {
        match self {
            Self::PowerInit => 1,
            Self::CompanionInit => 2,
            Self::TransportWrite => 3,
            Self::TransportRead => 4,
            Self::ResponseLength { .. }
            | Self::OpcodeMismatch { .. }
            | Self::UnexpectedResponse => 5,
            Self::TransportInit => 6,
            Self::TransportUninit => 7,
            Self::WaitTimeout => 8,
            Self::ReadbackMismatch { .. } => 10,
            Self::OtpExhausted => 12,
            Self::UnsupportedMac(_) => 13,
            Self::FrameTooLarge => 14,
        }
    }

    /// Whether the error happened after OTP may already have been modified
    ///
    /// OTP writes cannot be undone, so these failures require a fresh run
    /// that rescans the memory instead of a blind retry.
    pub fn is_irreversible(&self) -> bool {
        matches!(self, Self::ReadbackMismatch { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PowerInit => write!(f, "power or clock initialization failed"),
            Self::CompanionInit => write!(f, "radio command channel initialization failed"),
            Self::TransportInit => write!(f, "transport initialization failed"),
            Self::TransportUninit => write!(f, "transport shutdown failed"),
            Self::TransportWrite => write!(f, "transport write failed"),
            Self::TransportRead => write!(f, "transport read failed"),
            Self::WaitTimeout => write!(f, "timed out waiting for the radio"),
            Self::ResponseLength { expected, actual } => write!(
                f,
                "malformed response: expected {} bytes, got {}",
                expected, actual
            ),
            Self::OpcodeMismatch { expected, actual } => write!(
                f,
                "response opcode 0x{:04X} does not match request 0x{:04X}",
                actual, expected
            ),
            Self::UnexpectedResponse => write!(f, "unexpected response from the radio"),
            Self::FrameTooLarge => write!(f, "request does not fit in the working buffer"),
            Self::ReadbackMismatch {
                address,
                offset,
                expected,
                found,
            } => write!(
                f,
                "read-back mismatch at 0x{:06X}+{}: expected 0x{:02X}, found 0x{:02X}",
                address, offset, expected, found
            ),
            Self::OtpExhausted => write!(f, "no free space left in OTP"),
            Self::UnsupportedMac(octet) => {
                write!(f, "no precomputed patch for MAC octet 0x{:02X}", octet)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
