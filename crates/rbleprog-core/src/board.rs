//! Board collaborator traits
//!
//! The programmer consumes these interfaces and never implements them
//! itself. A backend (the emulator, a host serial adapter, or firmware
//! for the evaluation board) provides one implementation of each.
//!
//! Collaborators report failures as a [`BoardError`]; the codecs and the
//! sequencer decide which programmer [`Error`](crate::Error) that maps to.

use core::fmt;

use heapless::Vec;

use crate::signal::EventSignal;

/// Size of the buffer used to pack and unpack radio transactions
pub const WORKING_MEMORY_SIZE: usize = 64;

/// Failure reported by a board collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardError(pub &'static str);

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Result type for collaborator calls
pub type BoardResult<T> = core::result::Result<T, BoardError>;

/// Clock domains whose dividers the programmer sets during bring-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockDomain {
    /// Core clock
    Hclk,
    /// Peripheral clock
    Pclk,
}

/// GPIO ports of the host MCU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    /// GPIO port 0
    Port0,
    /// GPIO port 1
    Port1,
    /// GPIO port 2
    Port2,
}

/// A single GPIO line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pin {
    /// Port the line belongs to
    pub port: Port,
    /// Line number within the port
    pub number: u8,
}

/// Raw byte link to the radio
///
/// Completion of an inbound packet is announced through [`signal`]: the
/// transport raises it, the caller waits on it and then calls [`read`].
///
/// [`signal`]: Transport::signal
/// [`read`]: Transport::read
pub trait Transport {
    /// Send bytes to the radio
    fn write(&mut self, data: &[u8]) -> BoardResult<()>;

    /// Copy the last received packet into `buf`
    ///
    /// Returns the number of bytes copied.
    fn read(&mut self, buf: &mut [u8]) -> BoardResult<usize>;

    /// Completion signal raised by the transport callback
    fn signal(&self) -> &EventSignal;
}

/// Events the vendor command channel can wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorEvent {
    /// A vendor-specific command completed
    VendorCommandComplete,
}

/// Response to the last vendor command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VendorResponse {
    /// Opcode the response belongs to
    pub opcode: u16,
    /// Response payload, status byte first
    pub data: Vec<u8, WORKING_MEMORY_SIZE>,
}

/// Vendor command channel of the proprietary protocol
pub trait VendorChannel {
    /// Send a vendor-specific command
    fn send_vendor_command(&mut self, opcode: u16, params: &[u8]) -> BoardResult<()>;

    /// Block until `event` arrives or `timeout_ms` elapses
    fn wait_for_event(&mut self, event: VendorEvent, timeout_ms: u32) -> BoardResult<()>;

    /// Response to the most recent vendor command
    fn vendor_response(&mut self) -> VendorResponse;
}

/// GPIO access used to drive the status LEDs
pub trait Gpio {
    /// Configure a line as output
    fn enable_output(&mut self, pin: Pin);
    /// Drive a line high
    fn set_high(&mut self, pin: Pin);
    /// Drive a line low
    fn set_low(&mut self, pin: Pin);
}

/// Everything the sequencer needs from the hardware around the radio
pub trait Board {
    /// Raw link type
    type Transport: Transport;
    /// Vendor command channel type
    type Vendor: VendorChannel;
    /// GPIO controller type
    type Gpio: Gpio;

    /// Configure pin multiplexing
    fn init_pinmux(&mut self) -> BoardResult<()>;

    /// Initialize the power controller
    fn power_init(&mut self) -> BoardResult<()>;

    /// Set the divider of a clock domain
    fn set_clock_divider(&mut self, domain: ClockDomain, divider: u8) -> BoardResult<()>;

    /// Open the raw link to the radio
    fn open_transport(&mut self) -> BoardResult<Self::Transport>;

    /// Release the raw link so the vendor channel can take over the UART
    fn close_transport(&mut self, transport: Self::Transport) -> BoardResult<()>;

    /// Bring up the radio framework and return its vendor command channel
    fn open_companion(&mut self) -> BoardResult<Self::Vendor>;

    /// GPIO controller
    fn gpio(&mut self) -> &mut Self::Gpio;

    /// Busy-wait for `ticks` loop iterations
    fn delay(&mut self, ticks: u32);
}
