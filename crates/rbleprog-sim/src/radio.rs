//! Radio model: OTP memory plus both command protocols
//!
//! Erased OTP reads as zero and programming can only set bits, so a second
//! write over the same cells ORs into what is already there.

use rbleprog_core::codec::standard::{EVT_COMMAND_COMPLETE, H4_COMMAND, H4_EVENT, RESET_RESPONSE};
use rbleprog_core::codec::{OtpAccess, ProtocolMode, OPCODE_OTP_READ, OPCODE_OTP_WRITE};
use rbleprog_core::otp::{OTP_END, OTP_START};

/// Reset opcode
const OPCODE_RESET: u16 = 0x0C03;

/// Status returned for an opcode the radio does not know
const STATUS_UNKNOWN_COMMAND: u8 = 0x01;

/// Status returned for malformed parameters
const STATUS_INVALID_PARAMS: u8 = 0x12;

/// Frame the radio emits ahead of its first reset reply
const JUNK_FRAME: [u8; 4] = [H4_EVENT, 0xFF, 0x01, 0x00];

/// Capacity of the emulated OTP in bytes
pub const OTP_CAPACITY: usize = (OTP_END - OTP_START) as usize;

/// A bit flip applied to every OTP write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitFlip {
    /// Offset within the written data
    pub offset: usize,
    /// Bits to toggle
    pub mask: u8,
}

/// Fault injection knobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Faults {
    /// Never answer any command
    pub silent: bool,
    /// Stop answering after this many commands
    pub answer_limit: Option<usize>,
    /// Emit a junk frame before the first reset reply
    pub junk_first_reset: bool,
    /// Corrupt written data
    pub flip_bit: Option<BitFlip>,
    /// Power controller init fails
    pub fail_power: bool,
    /// Raw transport cannot be opened
    pub fail_transport_open: bool,
    /// Raw transport cannot be closed
    pub fail_transport_close: bool,
    /// Radio framework init fails
    pub fail_companion: bool,
}

pub(crate) struct RadioState {
    pub(crate) otp: Vec<u8>,
    pub(crate) mode: ProtocolMode,
    pub(crate) faults: Faults,
    pub(crate) otp_writes: u32,
    resets: u32,
    answered: usize,
}

impl RadioState {
    pub(crate) fn new(mode: ProtocolMode) -> Self {
        Self {
            otp: vec![0; OTP_CAPACITY],
            mode,
            faults: Faults::default(),
            otp_writes: 0,
            resets: 0,
            answered: 0,
        }
    }

    fn offset(address: u32) -> Option<usize> {
        address.checked_sub(OTP_START).map(|o| o as usize)
    }

    /// Copy OTP contents; cells outside the array read as zero
    pub(crate) fn read_otp(&self, address: u32, buf: &mut [u8]) {
        let base = Self::offset(address);
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = base
                .and_then(|b| self.otp.get(b + i))
                .copied()
                .unwrap_or(0);
        }
    }

    /// Program OTP cells; bits can only be set
    pub(crate) fn program_otp(&mut self, address: u32, data: &[u8]) {
        let Some(base) = Self::offset(address) else {
            log::warn!("sim: write below OTP at 0x{:06X} ignored", address);
            return;
        };

        let flip = self.faults.flip_bit;
        for (i, &byte) in data.iter().enumerate() {
            let byte = match flip {
                Some(f) if f.offset == i => byte ^ f.mask,
                _ => byte,
            };
            if let Some(cell) = self.otp.get_mut(base + i) {
                *cell |= byte;
            }
        }
        self.otp_writes += 1;
        log::debug!("sim: programmed {} bytes at 0x{:06X}", data.len(), address);
    }

    /// Whether the radio answers the next command
    fn answers(&mut self) -> bool {
        if self.faults.silent {
            return false;
        }
        if let Some(limit) = self.faults.answer_limit {
            if self.answered >= limit {
                return false;
            }
        }
        self.answered += 1;
        true
    }

    /// Handle one H4 command frame, returning the event frames sent back
    pub(crate) fn handle_h4(&mut self, frame: &[u8]) -> Vec<Vec<u8>> {
        if self.mode != ProtocolMode::StandardHost {
            log::trace!("sim: raw frame ignored in {} protocol", self.mode);
            return Vec::new();
        }
        if frame.len() < 4 || frame[0] != H4_COMMAND || !self.answers() {
            return Vec::new();
        }

        let opcode = u16::from_le_bytes([frame[1], frame[2]]);
        let params = &frame[4..];
        match opcode {
            OPCODE_RESET => {
                let mut replies = Vec::new();
                if self.faults.junk_first_reset && self.resets == 0 {
                    replies.push(JUNK_FRAME.to_vec());
                }
                self.resets += 1;
                replies.push(RESET_RESPONSE.to_vec());
                replies
            }
            OPCODE_OTP_READ if params.len() == 5 => {
                let address = le32(params);
                let mut data = vec![0u8; params[4] as usize];
                self.read_otp(address, &mut data);
                vec![command_complete(opcode, 0x00, &data)]
            }
            OPCODE_OTP_WRITE if params.len() >= 4 => {
                self.program_otp(le32(params), &params[4..]);
                vec![command_complete(opcode, 0x00, &[])]
            }
            OPCODE_OTP_READ | OPCODE_OTP_WRITE => {
                vec![command_complete(opcode, STATUS_INVALID_PARAMS, &[])]
            }
            _ => vec![command_complete(opcode, STATUS_UNKNOWN_COMMAND, &[])],
        }
    }

    /// Handle one vendor command, returning the opcode and payload
    pub(crate) fn handle_vendor(&mut self, opcode: u16, params: &[u8]) -> Option<(u16, Vec<u8>)> {
        if !self.answers() {
            return None;
        }
        let payload = match opcode {
            OPCODE_OTP_READ if params.len() == 5 => {
                let mut payload = vec![0u8; 1 + params[4] as usize];
                self.read_otp(le32(params), &mut payload[1..]);
                payload
            }
            OPCODE_OTP_WRITE if params.len() >= 4 => {
                self.program_otp(le32(params), &params[4..]);
                vec![0x00]
            }
            OPCODE_OTP_READ | OPCODE_OTP_WRITE => vec![STATUS_INVALID_PARAMS],
            _ => vec![STATUS_UNKNOWN_COMMAND],
        };
        Some((opcode, payload))
    }
}

impl OtpAccess for RadioState {
    fn read(&mut self, address: u32, buf: &mut [u8]) -> rbleprog_core::Result<()> {
        self.read_otp(address, buf);
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> rbleprog_core::Result<()> {
        self.program_otp(address, data);
        Ok(())
    }

    fn mode(&self) -> ProtocolMode {
        self.mode
    }
}

fn le32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn command_complete(opcode: u16, status: u8, data: &[u8]) -> Vec<u8> {
    let [lo, hi] = opcode.to_le_bytes();
    let mut event = vec![
        H4_EVENT,
        EVT_COMMAND_COMPLETE,
        (4 + data.len()) as u8,
        0x01,
        lo,
        hi,
        status,
    ];
    event.extend_from_slice(data);
    event
}
