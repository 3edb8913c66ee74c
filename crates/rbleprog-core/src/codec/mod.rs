//! OTP access over the radio's two command protocols
//!
//! The radio speaks exactly one protocol at a time. The sequencer probes
//! which one, builds the matching codec once, and hands it to the scanner
//! and writer. Nothing downstream needs to know which protocol is active.

pub mod proprietary;
pub mod standard;

use core::fmt;

use crate::board::{Transport, VendorChannel};
use crate::error::Result;

pub use proprietary::ProprietaryCodec;
pub use standard::StandardCodec;

/// Vendor opcode: read OTP
pub const OPCODE_OTP_READ: u16 = 0xFC20;
/// Vendor opcode: write OTP
pub const OPCODE_OTP_WRITE: u16 = 0xFC22;

/// Command protocol the radio is currently running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMode {
    /// Vendor-proprietary protocol of the radio SDK
    Proprietary,
    /// Standard host-controller protocol
    StandardHost,
}

impl ProtocolMode {
    /// The mode a mode-switch patch moves the radio into
    pub fn other(self) -> Self {
        match self {
            Self::Proprietary => Self::StandardHost,
            Self::StandardHost => Self::Proprietary,
        }
    }
}

impl fmt::Display for ProtocolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proprietary => write!(f, "proprietary"),
            Self::StandardHost => write!(f, "standard host"),
        }
    }
}

/// Address-based access to the radio's OTP memory
pub trait OtpAccess {
    /// Read `buf.len()` bytes starting at `address`
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()>;

    /// Write `data` starting at `address`
    fn write(&mut self, address: u32, data: &[u8]) -> Result<()>;

    /// Protocol this accessor speaks
    fn mode(&self) -> ProtocolMode;
}

/// OTP accessor for whichever protocol was detected
pub enum ProtocolCodec<T: Transport, V: VendorChannel> {
    /// Vendor command channel
    Proprietary(ProprietaryCodec<V>),
    /// Raw host-controller frames
    Standard(StandardCodec<T>),
}

impl<T: Transport, V: VendorChannel> OtpAccess for ProtocolCodec<T, V> {
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        match self {
            Self::Proprietary(codec) => codec.read(address, buf),
            Self::Standard(codec) => codec.read(address, buf),
        }
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<()> {
        match self {
            Self::Proprietary(codec) => codec.write(address, data),
            Self::Standard(codec) => codec.write(address, data),
        }
    }

    fn mode(&self) -> ProtocolMode {
        match self {
            Self::Proprietary(_) => ProtocolMode::Proprietary,
            Self::Standard(_) => ProtocolMode::StandardHost,
        }
    }
}

/// Check a response opcode against the request
pub(crate) fn check_opcode(expected: u16, actual: u16) -> Result<()> {
    if expected != actual {
        return Err(crate::Error::OpcodeMismatch { expected, actual });
    }
    Ok(())
}

/// Check a response length against what the request implies
pub(crate) fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(crate::Error::ResponseLength { expected, actual });
    }
    Ok(())
}
