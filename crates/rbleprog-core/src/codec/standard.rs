//! Standard host-controller protocol over the raw transport
//!
//! Requests are H4 command packets, responses are Command Complete events.
//! Every response echoes a fixed 7-byte header:
//!
//! ```text
//! 04 0E <len> <ncmd> <opcode lo> <opcode hi> <status> [data...]
//! ```
//!
//! Waits poll the transport's [`EventSignal`](crate::signal::EventSignal)
//! with an iteration budget, never a wall-clock timeout.

use heapless::Vec;

use super::{
    check_len, check_opcode, OtpAccess, ProtocolMode, OPCODE_OTP_READ, OPCODE_OTP_WRITE,
};
use crate::board::{Transport, WORKING_MEMORY_SIZE};
use crate::error::{Error, Result};
use crate::signal::DEFAULT_WAIT_BUDGET;

/// H4 packet indicator: command
pub const H4_COMMAND: u8 = 0x01;
/// H4 packet indicator: event
pub const H4_EVENT: u8 = 0x04;
/// Command Complete event code
pub const EVT_COMMAND_COMPLETE: u8 = 0x0E;
/// Length of the echoed response header
pub const RESPONSE_HEADER_LEN: usize = 7;

/// Reset command
pub const RESET_COMMAND: [u8; 4] = [0x01, 0x03, 0x0C, 0x00];
/// Expected reply to [`RESET_COMMAND`]
pub const RESET_RESPONSE: [u8; 7] = [0x04, 0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00];

type Frame = Vec<u8, WORKING_MEMORY_SIZE>;

/// OTP accessor speaking the standard host protocol
pub struct StandardCodec<T: Transport> {
    transport: T,
    wait_budget: u32,
    rx: [u8; WORKING_MEMORY_SIZE],
}

impl<T: Transport> StandardCodec<T> {
    /// Wrap a transport with the default wait budget
    pub fn new(transport: T) -> Self {
        Self::with_wait_budget(transport, DEFAULT_WAIT_BUDGET)
    }

    /// Wrap a transport with a custom wait budget
    pub fn with_wait_budget(transport: T, wait_budget: u32) -> Self {
        Self {
            transport,
            wait_budget,
            rx: [0; WORKING_MEMORY_SIZE],
        }
    }

    /// Give the transport back, e.g. to close it
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Issue a reset and check the reply
    ///
    /// The radio answers the first reset after power-up with a junk frame,
    /// so a mismatching first reply is followed by one more wait. Only a
    /// second mismatch is an error. In the proprietary protocol the radio
    /// does not answer at all and this times out.
    pub fn reset(&mut self) -> Result<()> {
        let n = self.transact(&RESET_COMMAND)?;
        if self.rx[..n] == RESET_RESPONSE {
            return Ok(());
        }

        log::debug!("standard: first reset reply did not match, waiting for another");
        let n = self.receive()?;
        if self.rx[..n] != RESET_RESPONSE {
            return Err(Error::UnexpectedResponse);
        }
        Ok(())
    }

    /// Send a frame, wait for completion and read the reply into `rx`
    fn transact(&mut self, frame: &[u8]) -> Result<usize> {
        self.transport.write(frame).map_err(|e| {
            log::debug!("standard: transport write failed: {}", e);
            Error::TransportWrite
        })?;
        self.receive()
    }

    fn receive(&mut self) -> Result<usize> {
        self.transport.signal().wait(self.wait_budget)?;
        self.transport.read(&mut self.rx).map_err(|e| {
            log::debug!("standard: transport read failed: {}", e);
            Error::TransportRead
        })
    }

    fn response_opcode(&self) -> u16 {
        u16::from_le_bytes([self.rx[4], self.rx[5]])
    }
}

/// Build a vendor command frame: header, 32-bit address, then `tail`
fn command_frame(opcode: u16, address: u32, tail: &[u8]) -> Result<Frame> {
    let param_len = u8::try_from(4 + tail.len()).map_err(|_| Error::FrameTooLarge)?;
    let [lo, hi] = opcode.to_le_bytes();

    let mut frame = Frame::new();
    frame
        .extend_from_slice(&[H4_COMMAND, lo, hi, param_len])
        .and_then(|_| frame.extend_from_slice(&address.to_le_bytes()))
        .and_then(|_| frame.extend_from_slice(tail))
        .map_err(|_| Error::FrameTooLarge)?;
    Ok(frame)
}

impl<T: Transport> OtpAccess for StandardCodec<T> {
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        let size = u8::try_from(buf.len()).map_err(|_| Error::FrameTooLarge)?;
        if RESPONSE_HEADER_LEN + buf.len() > WORKING_MEMORY_SIZE {
            return Err(Error::FrameTooLarge);
        }

        let frame = command_frame(OPCODE_OTP_READ, address, &[size])?;
        let n = self.transact(&frame)?;

        check_len(RESPONSE_HEADER_LEN + buf.len(), n)?;
        check_opcode(OPCODE_OTP_READ, self.response_opcode())?;
        buf.copy_from_slice(&self.rx[RESPONSE_HEADER_LEN..n]);
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<()> {
        let frame = command_frame(OPCODE_OTP_WRITE, address, data)?;
        let n = self.transact(&frame)?;

        check_len(RESPONSE_HEADER_LEN, n)?;
        check_opcode(OPCODE_OTP_WRITE, self.response_opcode())
    }

    fn mode(&self) -> ProtocolMode {
        ProtocolMode::StandardHost
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::collections::VecDeque;
    use std::vec::Vec as StdVec;

    use super::*;
    use crate::board::{BoardError, BoardResult};
    use crate::signal::EventSignal;

    /// Transport that replays canned replies and records requests
    #[derive(Default)]
    struct ScriptedTransport {
        signal: EventSignal,
        replies: VecDeque<StdVec<u8>>,
        sent: StdVec<StdVec<u8>>,
        silent: bool,
    }

    impl ScriptedTransport {
        fn replying(replies: StdVec<StdVec<u8>>) -> Self {
            Self {
                replies: replies.into(),
                ..Default::default()
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn write(&mut self, data: &[u8]) -> BoardResult<()> {
            self.sent.push(data.to_vec());
            if !self.silent && !self.replies.is_empty() {
                self.signal.raise();
            }
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> BoardResult<usize> {
            let reply = self.replies.pop_front().ok_or(BoardError("no data"))?;
            buf[..reply.len()].copy_from_slice(&reply);
            if !self.replies.is_empty() {
                self.signal.raise();
            }
            Ok(reply.len())
        }

        fn signal(&self) -> &EventSignal {
            &self.signal
        }
    }

    fn read_reply(opcode: u16, data: &[u8]) -> StdVec<u8> {
        let [lo, hi] = opcode.to_le_bytes();
        let mut reply = std::vec![0x04, 0x0E, (4 + data.len()) as u8, 0x01, lo, hi, 0x00];
        reply.extend_from_slice(data);
        reply
    }

    #[test]
    fn test_read_frame_and_payload() {
        let data = [0xA5u8; 40];
        let reply = read_reply(OPCODE_OTP_READ, &data);
        let mut codec = StandardCodec::new(ScriptedTransport::replying(std::vec![reply]));

        let mut buf = [0u8; 40];
        codec.read(0x0010_0020, &mut buf).unwrap();
        assert_eq!(buf, data);

        let transport = codec.into_inner();
        assert_eq!(
            transport.sent[0],
            [0x01, 0x20, 0xFC, 0x05, 0x20, 0x00, 0x10, 0x00, 40]
        );
    }

    #[test]
    fn test_write_frame() {
        let reply = read_reply(OPCODE_OTP_WRITE, &[]);
        let mut codec = StandardCodec::new(ScriptedTransport::replying(std::vec![reply]));

        codec.write(0x0010_0000, &[1, 2, 3]).unwrap();

        let transport = codec.into_inner();
        assert_eq!(
            transport.sent[0],
            [0x01, 0x22, 0xFC, 0x07, 0x00, 0x00, 0x10, 0x00, 1, 2, 3]
        );
    }

    #[test]
    fn test_read_rejects_short_response() {
        let reply = read_reply(OPCODE_OTP_READ, &[0u8; 39]);
        let mut codec = StandardCodec::new(ScriptedTransport::replying(std::vec![reply]));

        let mut buf = [0u8; 40];
        assert_eq!(
            codec.read(0x0010_0000, &mut buf),
            Err(Error::ResponseLength {
                expected: 47,
                actual: 46
            })
        );
    }

    #[test]
    fn test_opcode_mismatch() {
        let reply = read_reply(OPCODE_OTP_READ, &[]);
        let mut codec = StandardCodec::new(ScriptedTransport::replying(std::vec![reply]));

        assert_eq!(
            codec.write(0x0010_0000, &[0u8; 40]),
            Err(Error::OpcodeMismatch {
                expected: OPCODE_OTP_WRITE,
                actual: OPCODE_OTP_READ
            })
        );
    }

    #[test]
    fn test_silent_transport_times_out() {
        let transport = ScriptedTransport {
            silent: true,
            ..Default::default()
        };
        let mut codec = StandardCodec::with_wait_budget(transport, 1000);

        let mut buf = [0u8; 40];
        assert_eq!(codec.read(0x0010_0000, &mut buf), Err(Error::WaitTimeout));
        assert_eq!(codec.reset(), Err(Error::WaitTimeout));
    }

    #[test]
    fn test_reset_tolerates_one_junk_reply() {
        let transport =
            ScriptedTransport::replying(std::vec![std::vec![0xFF, 0x00], RESET_RESPONSE.to_vec()]);
        let mut codec = StandardCodec::new(transport);
        assert_eq!(codec.reset(), Ok(()));

        let transport =
            ScriptedTransport::replying(std::vec![std::vec![0xFF, 0x00], std::vec![0xFF, 0x01]]);
        let mut codec = StandardCodec::new(transport);
        assert_eq!(codec.reset(), Err(Error::UnexpectedResponse));
    }

    #[test]
    fn test_oversized_requests_rejected() {
        let mut codec = StandardCodec::new(ScriptedTransport::default());
        let mut buf = [0u8; 60];
        assert_eq!(codec.read(0x0010_0000, &mut buf), Err(Error::FrameTooLarge));
        assert_eq!(codec.write(0x0010_0000, &[0u8; 60]), Err(Error::FrameTooLarge));
        assert!(codec.into_inner().sent.is_empty());
    }
}
