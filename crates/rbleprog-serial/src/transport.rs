//! Raw link to the radio over a host serial port
//!
//! A receive thread stands in for the UART interrupt: it reassembles event
//! packets, parks the latest one in a single-slot inbox and raises the
//! completion signal. The sequencer thread only ever writes, waits and
//! takes from the inbox.

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use rbleprog_core::board::{BoardError, BoardResult, Transport};
use rbleprog_core::signal::EventSignal;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::error::{Result, SerialError};
use crate::h4::H4Assembler;

/// Default baud rate of the radio's UART
pub const DEFAULT_BAUD: u32 = 115_200;

/// How often the receive thread checks for shutdown
const POLL_INTERVAL: Duration = Duration::from_millis(10);

struct Shared {
    signal: EventSignal,
    inbox: Mutex<Option<Vec<u8>>>,
    stop: AtomicBool,
}

impl Shared {
    fn deliver(&self, frame: Vec<u8>) {
        let mut inbox = self.inbox.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = inbox.replace(frame) {
            log::debug!("serial: unread {}-byte frame overwritten", old.len());
        }
        drop(inbox);
        self.signal.raise();
    }
}

/// Serial port transport
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    shared: Arc<Shared>,
    reader: Option<JoinHandle<()>>,
}

impl SerialTransport {
    /// Open a serial port and start receiving
    ///
    /// If no baud rate is given, uses [`DEFAULT_BAUD`].
    pub fn open(device: &str, baud: Option<u32>) -> Result<Self> {
        let baud_rate = baud.unwrap_or(DEFAULT_BAUD);

        let port = serialport::new(device, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(POLL_INTERVAL)
            .open()?;
        port.clear(serialport::ClearBuffer::All)?;

        log::info!("Opened serial port {} at {} baud", device, baud_rate);

        let shared = Arc::new(Shared {
            signal: EventSignal::new(),
            inbox: Mutex::new(None),
            stop: AtomicBool::new(false),
        });
        let rx_port = port.try_clone()?;
        let rx_shared = Arc::clone(&shared);
        let reader = std::thread::Builder::new()
            .name("rbleprog-rx".into())
            .spawn(move || receive_loop(rx_port, rx_shared))
            .map_err(SerialError::ReaderSpawn)?;

        Ok(Self {
            port,
            shared,
            reader: Some(reader),
        })
    }
}

fn receive_loop(mut port: Box<dyn SerialPort>, shared: Arc<Shared>) {
    let mut assembler = H4Assembler::default();
    let mut buf = [0u8; 64];

    while !shared.stop.load(Ordering::Acquire) {
        match port.read(&mut buf) {
            Ok(n) => {
                for frame in assembler.extend(&buf[..n]) {
                    log::trace!("serial: rx {:02X?}", frame);
                    shared.deliver(frame);
                }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => {}
            Err(e) => {
                log::error!("serial: receive thread stopped: {}", e);
                break;
            }
        }
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> BoardResult<()> {
        log::trace!("serial: tx {:02X?}", data);
        self.port
            .write_all(data)
            .and_then(|_| self.port.flush())
            .map_err(|e| {
                log::debug!("serial: write failed: {}", e);
                BoardError("serial write failed")
            })
    }

    fn read(&mut self, buf: &mut [u8]) -> BoardResult<usize> {
        let frame = self
            .shared
            .inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(BoardError("no frame received"))?;
        if frame.len() > buf.len() {
            return Err(BoardError("frame larger than receive buffer"));
        }
        buf[..frame.len()].copy_from_slice(&frame);
        Ok(frame.len())
    }

    fn signal(&self) -> &EventSignal {
        &self.shared.signal
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                log::warn!("serial: receive thread panicked");
            }
        }
    }
}
