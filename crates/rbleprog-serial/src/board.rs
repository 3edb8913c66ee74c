//! Host-side board: the radio hangs off a USB serial adapter
//!
//! There is no power controller, pin-mux or clock tree to set up on a PC,
//! and the vendor command channel needs the radio framework that only runs
//! on the evaluation board, so only the standard protocol is reachable.

use std::time::Duration;

use rbleprog_core::board::{
    Board, BoardError, BoardResult, ClockDomain, Gpio, Pin, VendorChannel, VendorEvent,
    VendorResponse,
};
use rbleprog_core::indicator::{FAIL_LED, PASS_LED};

use crate::transport::SerialTransport;

/// Delay ticks per microsecond of host sleep
const TICKS_PER_US: u32 = 16;

/// Vendor channel that cannot exist on the host
pub enum NoVendor {}

impl VendorChannel for NoVendor {
    fn send_vendor_command(&mut self, _opcode: u16, _params: &[u8]) -> BoardResult<()> {
        match *self {}
    }

    fn wait_for_event(&mut self, _event: VendorEvent, _timeout_ms: u32) -> BoardResult<()> {
        match *self {}
    }

    fn vendor_response(&mut self) -> VendorResponse {
        match *self {}
    }
}

/// Status LEDs rendered as log lines
#[derive(Debug, Default)]
pub struct ConsoleGpio;

fn led_name(pin: Pin) -> Option<&'static str> {
    if pin == PASS_LED {
        Some("green")
    } else if pin == FAIL_LED {
        Some("red")
    } else {
        None
    }
}

impl Gpio for ConsoleGpio {
    fn enable_output(&mut self, _pin: Pin) {}

    fn set_high(&mut self, pin: Pin) {
        if let Some(name) = led_name(pin) {
            log::info!("[{} LED on]", name);
        }
    }

    fn set_low(&mut self, pin: Pin) {
        if let Some(name) = led_name(pin) {
            log::debug!("[{} LED off]", name);
        }
    }
}

/// Board for a radio attached to a host serial port
pub struct SerialBoard {
    device: String,
    baud: Option<u32>,
    gpio: ConsoleGpio,
}

impl SerialBoard {
    /// Board whose radio is on `device`
    pub fn new(device: impl Into<String>, baud: Option<u32>) -> Self {
        Self {
            device: device.into(),
            baud,
            gpio: ConsoleGpio,
        }
    }

    /// Serial device path
    pub fn device(&self) -> &str {
        &self.device
    }
}

impl Board for SerialBoard {
    type Transport = SerialTransport;
    type Vendor = NoVendor;
    type Gpio = ConsoleGpio;

    fn init_pinmux(&mut self) -> BoardResult<()> {
        Ok(())
    }

    fn power_init(&mut self) -> BoardResult<()> {
        Ok(())
    }

    fn set_clock_divider(&mut self, domain: ClockDomain, divider: u8) -> BoardResult<()> {
        log::trace!("serial: ignoring {:?} divider {}", domain, divider);
        Ok(())
    }

    fn open_transport(&mut self) -> BoardResult<SerialTransport> {
        SerialTransport::open(&self.device, self.baud).map_err(|e| {
            log::error!("Failed to open serial port {}: {}", self.device, e);
            BoardError("cannot open serial port")
        })
    }

    fn close_transport(&mut self, transport: SerialTransport) -> BoardResult<()> {
        drop(transport);
        Ok(())
    }

    fn open_companion(&mut self) -> BoardResult<NoVendor> {
        Err(BoardError(
            "the proprietary protocol needs the radio framework on the evaluation board",
        ))
    }

    fn gpio(&mut self) -> &mut ConsoleGpio {
        &mut self.gpio
    }

    fn delay(&mut self, ticks: u32) {
        std::thread::sleep(Duration::from_micros(u64::from(ticks / TICKS_PER_US)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbleprog_core::sequencer::{ProgrammerConfig, Sequencer};
    use rbleprog_core::Error;

    #[test]
    fn test_missing_port_fails_transport_init() {
        let board = SerialBoard::new("/dev/rbleprog-does-not-exist", None);
        let mut sequencer = Sequencer::new(board, ProgrammerConfig::default());
        assert_eq!(sequencer.switch_protocol(), Err(Error::TransportInit));
    }

    #[test]
    fn test_no_vendor_channel_on_host() {
        let board = SerialBoard::new("/dev/null", None);
        let mut sequencer = Sequencer::new(board, ProgrammerConfig::default());
        let variant = rbleprog_core::patch::MacVariant::lookup(0x45).unwrap();
        assert_eq!(sequencer.change_mac(variant), Err(Error::CompanionInit));
    }

    #[test]
    fn test_led_names() {
        assert_eq!(led_name(PASS_LED), Some("green"));
        assert_eq!(led_name(FAIL_LED), Some("red"));
    }
}
