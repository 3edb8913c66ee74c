//! Reassembly of H4 event packets from a byte stream
//!
//! ```text
//! 04 <event code> <param len> <params...>
//! ```
//!
//! Bytes that arrive outside a packet and do not start one are dropped.

use rbleprog_core::codec::standard::H4_EVENT;

/// Length of the H4 event header including the packet indicator
const EVENT_HEADER_LEN: usize = 3;

/// Collects bytes until a complete event packet is available
#[derive(Debug, Default)]
pub struct H4Assembler {
    frame: Vec<u8>,
}

impl H4Assembler {
    /// Feed one byte, returning a packet when it completes one
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8>> {
        if self.frame.is_empty() && byte != H4_EVENT {
            log::trace!("serial: skipping stray byte 0x{:02X}", byte);
            return None;
        }

        self.frame.push(byte);
        if self.frame.len() >= EVENT_HEADER_LEN
            && self.frame.len() == EVENT_HEADER_LEN + self.frame[2] as usize
        {
            return Some(std::mem::take(&mut self.frame));
        }
        None
    }

    /// Feed a run of bytes, returning every packet completed by it
    pub fn extend(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }

    /// Whether a packet is partially received
    pub fn is_mid_frame(&self) -> bool {
        !self.frame.is_empty()
    }
}
