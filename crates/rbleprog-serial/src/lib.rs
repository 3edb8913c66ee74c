//! rbleprog-serial - Host serial port backend
//!
//! This crate lets the programmer run on a PC with the radio's UART
//! attached through a USB serial adapter. Only the standard host protocol
//! is reachable this way.
//!
//! # Example
//!
//! ```no_run
//! use rbleprog_core::sequencer::{ProgrammerConfig, Sequencer};
//! use rbleprog_serial::{SerialBoard, SerialConnection, HOST_WAIT_BUDGET};
//!
//! let conn = SerialConnection::parse("dev=/dev/ttyUSB0:115200")?;
//! let board = SerialBoard::new(conn.device, conn.baud);
//! let config = ProgrammerConfig {
//!     wait_budget: HOST_WAIT_BUDGET,
//!     ..Default::default()
//! };
//! let mut sequencer = Sequencer::new(board, config);
//! let outcome = sequencer.switch_protocol()?;
//! println!("{}", outcome);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod board;
pub mod error;
pub mod h4;
pub mod transport;

pub use board::{ConsoleGpio, NoVendor, SerialBoard};
pub use error::{Result, SerialError};
pub use transport::{SerialTransport, DEFAULT_BAUD};

/// Wait budget for replies crossing a USB serial adapter
///
/// The default budget is sized for an on-board UART and runs out long
/// before a reply makes it through the host's USB stack.
pub const HOST_WAIT_BUDGET: u32 = 0x0FFF_FFFF;

/// Serial connection options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConnection {
    /// Device path (e.g., "/dev/ttyUSB0" or "COM1")
    pub device: String,
    /// Baud rate (None for [`DEFAULT_BAUD`])
    pub baud: Option<u32>,
}

impl SerialConnection {
    /// Parse a connection string
    ///
    /// Formats:
    /// - `dev=/dev/ttyUSB0` - default baud
    /// - `dev=/dev/ttyUSB0:115200` - specified baud
    pub fn parse(s: &str) -> Result<Self> {
        let dev = s.strip_prefix("dev=").ok_or_else(|| {
            SerialError::InvalidParameter(format!("{} (expected dev=<port>[:baud])", s))
        })?;

        // by-path device names contain ':' too, so only a numeric suffix is a baud rate
        let (device, baud) = match dev.rsplit_once(':') {
            Some((device, baud_str))
                if !baud_str.is_empty() && baud_str.bytes().all(|b| b.is_ascii_digit()) =>
            {
                let baud = baud_str
                    .parse()
                    .map_err(|_| SerialError::InvalidParameter(format!("baud rate {}", baud_str)))?;
                (device, Some(baud))
            }
            _ => (dev, None),
        };

        if device.is_empty() {
            return Err(SerialError::InvalidParameter("empty device path".into()));
        }

        Ok(Self {
            device: device.to_string(),
            baud,
        })
    }
}

/// Names of the serial ports present on this host
pub fn available_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            log::debug!("Failed to enumerate serial ports: {}", e);
            Vec::new()
        }
    }
}
