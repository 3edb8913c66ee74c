//! Proprietary protocol over the radio's vendor command channel
//!
//! The channel does its own framing; this codec only packs the address
//! and size, waits for the vendor Command Complete event and checks the
//! response. The first response byte is a status code.

use heapless::Vec;

use super::{check_len, check_opcode, OtpAccess, ProtocolMode, OPCODE_OTP_READ, OPCODE_OTP_WRITE};
use crate::board::{VendorChannel, VendorEvent, WORKING_MEMORY_SIZE};
use crate::error::{Error, Result};

/// How long to wait for a vendor Command Complete event
pub const VENDOR_TIMEOUT_MS: u32 = 3;

/// OTP accessor speaking the proprietary protocol
pub struct ProprietaryCodec<V: VendorChannel> {
    channel: V,
}

impl<V: VendorChannel> ProprietaryCodec<V> {
    /// Wrap an open vendor command channel
    pub fn new(channel: V) -> Self {
        Self { channel }
    }

    /// Give the channel back
    pub fn into_inner(self) -> V {
        self.channel
    }

    /// Send a command and return the payload of its response
    fn command(&mut self, opcode: u16, params: &[u8]) -> Result<Vec<u8, WORKING_MEMORY_SIZE>> {
        self.channel
            .send_vendor_command(opcode, params)
            .map_err(|e| {
                log::debug!("proprietary: send 0x{:04X} failed: {}", opcode, e);
                Error::TransportWrite
            })?;

        self.channel
            .wait_for_event(VendorEvent::VendorCommandComplete, VENDOR_TIMEOUT_MS)
            .map_err(|e| {
                log::debug!("proprietary: no completion for 0x{:04X}: {}", opcode, e);
                Error::WaitTimeout
            })?;

        let response = self.channel.vendor_response();
        check_opcode(opcode, response.opcode)?;
        Ok(response.data)
    }
}

fn address_params(address: u32, tail: &[u8]) -> Result<Vec<u8, WORKING_MEMORY_SIZE>> {
    let mut params = Vec::new();
    params
        .extend_from_slice(&address.to_le_bytes())
        .and_then(|_| params.extend_from_slice(tail))
        .map_err(|_| Error::FrameTooLarge)?;
    Ok(params)
}

impl<V: VendorChannel> OtpAccess for ProprietaryCodec<V> {
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        let size = u8::try_from(buf.len()).map_err(|_| Error::FrameTooLarge)?;
        if 1 + buf.len() > WORKING_MEMORY_SIZE {
            return Err(Error::FrameTooLarge);
        }

        let params = address_params(address, &[size])?;
        let data = self.command(OPCODE_OTP_READ, &params)?;

        check_len(1 + buf.len(), data.len())?;
        buf.copy_from_slice(&data[1..]);
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<()> {
        let params = address_params(address, data)?;
        let response = self.command(OPCODE_OTP_WRITE, &params)?;
        check_len(1, response.len())
    }

    fn mode(&self) -> ProtocolMode {
        ProtocolMode::Proprietary
    }
}
