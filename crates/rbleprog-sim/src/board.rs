//! Emulated board: transport, vendor channel, GPIO and delay

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use rbleprog_core::board::{
    Board, BoardError, BoardResult, ClockDomain, Gpio, Pin, Transport, VendorChannel, VendorEvent,
    VendorResponse,
};
use rbleprog_core::codec::ProtocolMode;
use rbleprog_core::signal::EventSignal;

use crate::radio::RadioState;

/// Raw link to the emulated radio
///
/// Replies are queued as whole frames and the signal is raised whenever
/// one is waiting, the way the UART callback does on hardware.
pub struct SimTransport {
    radio: Rc<RefCell<RadioState>>,
    signal: EventSignal,
    inbox: VecDeque<Vec<u8>>,
}

impl Transport for SimTransport {
    fn write(&mut self, data: &[u8]) -> BoardResult<()> {
        let replies = self.radio.borrow_mut().handle_h4(data);
        self.inbox.extend(replies);
        if !self.inbox.is_empty() {
            self.signal.raise();
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> BoardResult<usize> {
        let frame = self.inbox.pop_front().ok_or(BoardError("no frame received"))?;
        if frame.len() > buf.len() {
            return Err(BoardError("frame larger than receive buffer"));
        }
        buf[..frame.len()].copy_from_slice(&frame);
        if !self.inbox.is_empty() {
            self.signal.raise();
        }
        Ok(frame.len())
    }

    fn signal(&self) -> &EventSignal {
        &self.signal
    }
}

/// Vendor command channel of the emulated radio
pub struct SimVendor {
    radio: Rc<RefCell<RadioState>>,
    response: Option<VendorResponse>,
}

impl VendorChannel for SimVendor {
    fn send_vendor_command(&mut self, opcode: u16, params: &[u8]) -> BoardResult<()> {
        self.response = match self.radio.borrow_mut().handle_vendor(opcode, params) {
            Some((opcode, payload)) => Some(VendorResponse {
                opcode,
                data: heapless::Vec::from_slice(&payload)
                    .map_err(|_| BoardError("response larger than working memory"))?,
            }),
            None => None,
        };
        Ok(())
    }

    fn wait_for_event(&mut self, _event: VendorEvent, _timeout_ms: u32) -> BoardResult<()> {
        match self.response {
            Some(_) => Ok(()),
            None => Err(BoardError("vendor command timed out")),
        }
    }

    fn vendor_response(&mut self) -> VendorResponse {
        self.response.take().unwrap_or_default()
    }
}

/// GPIO controller that records every level change
#[derive(Debug, Default)]
pub struct SimGpio {
    outputs: Vec<Pin>,
    levels: Vec<(Pin, bool)>,
    history: Vec<(Pin, bool)>,
}

impl SimGpio {
    /// Current level of a line
    pub fn is_high(&self, pin: Pin) -> bool {
        self.levels
            .iter()
            .find(|(p, _)| *p == pin)
            .is_some_and(|(_, high)| *high)
    }

    /// Number of low-to-high transitions seen on a line
    pub fn rising_edges(&self, pin: Pin) -> usize {
        let mut high = false;
        let mut edges = 0;
        for &(p, level) in &self.history {
            if p != pin {
                continue;
            }
            if level && !high {
                edges += 1;
            }
            high = level;
        }
        edges
    }

    fn drive(&mut self, pin: Pin, high: bool) {
        if !self.outputs.contains(&pin) {
            log::warn!("sim: {:?} driven without being configured as output", pin);
            return;
        }
        match self.levels.iter_mut().find(|(p, _)| *p == pin) {
            Some(entry) => entry.1 = high,
            None => self.levels.push((pin, high)),
        }
        self.history.push((pin, high));
    }
}

impl Gpio for SimGpio {
    fn enable_output(&mut self, pin: Pin) {
        if !self.outputs.contains(&pin) {
            self.outputs.push(pin);
        }
    }

    fn set_high(&mut self, pin: Pin) {
        self.drive(pin, true);
    }

    fn set_low(&mut self, pin: Pin) {
        self.drive(pin, false);
    }
}

/// Board wired to an emulated radio
pub struct SimBoard {
    radio: Rc<RefCell<RadioState>>,
    gpio: SimGpio,
    dividers: [u8; 2],
    elapsed_ticks: u64,
    transport_open: bool,
}

impl SimBoard {
    pub(crate) fn new(radio: Rc<RefCell<RadioState>>) -> Self {
        Self {
            radio,
            gpio: SimGpio::default(),
            dividers: [0; 2],
            elapsed_ticks: 0,
            transport_open: false,
        }
    }

    /// Recorded LED activity
    pub fn leds(&self) -> &SimGpio {
        &self.gpio
    }

    /// Divider last set for a clock domain
    pub fn clock_divider(&self, domain: ClockDomain) -> u8 {
        self.dividers[domain as usize]
    }

    /// Total delay ticks requested
    pub fn elapsed_ticks(&self) -> u64 {
        self.elapsed_ticks
    }

    /// Whether the raw transport is currently open
    pub fn transport_open(&self) -> bool {
        self.transport_open
    }
}

impl Board for SimBoard {
    type Transport = SimTransport;
    type Vendor = SimVendor;
    type Gpio = SimGpio;

    fn init_pinmux(&mut self) -> BoardResult<()> {
        Ok(())
    }

    fn power_init(&mut self) -> BoardResult<()> {
        if self.radio.borrow().faults.fail_power {
            return Err(BoardError("power controller not responding"));
        }
        Ok(())
    }

    fn set_clock_divider(&mut self, domain: ClockDomain, divider: u8) -> BoardResult<()> {
        if divider == 0 {
            return Err(BoardError("clock divider must be non-zero"));
        }
        self.dividers[domain as usize] = divider;
        Ok(())
    }

    fn open_transport(&mut self) -> BoardResult<SimTransport> {
        if self.radio.borrow().faults.fail_transport_open {
            return Err(BoardError("UART init failed"));
        }
        self.transport_open = true;
        Ok(SimTransport {
            radio: Rc::clone(&self.radio),
            signal: EventSignal::new(),
            inbox: VecDeque::new(),
        })
    }

    fn close_transport(&mut self, transport: SimTransport) -> BoardResult<()> {
        if self.radio.borrow().faults.fail_transport_close {
            return Err(BoardError("UART uninit failed"));
        }
        drop(transport);
        self.transport_open = false;
        Ok(())
    }

    fn open_companion(&mut self) -> BoardResult<SimVendor> {
        let radio = self.radio.borrow();
        if radio.faults.fail_companion {
            return Err(BoardError("radio framework init failed"));
        }
        if radio.mode != ProtocolMode::Proprietary {
            return Err(BoardError("radio does not speak the proprietary protocol"));
        }
        Ok(SimVendor {
            radio: Rc::clone(&self.radio),
            response: None,
        })
    }

    fn gpio(&mut self) -> &mut SimGpio {
        &mut self.gpio
    }

    fn delay(&mut self, ticks: u32) {
        self.elapsed_ticks += u64::from(ticks);
    }
}
