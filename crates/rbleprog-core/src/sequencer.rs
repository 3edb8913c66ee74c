//! Top-level programming sequence
//!
//! ```text
//! Init -> ModeDetect -> SelectFunctions -> Scan -> Write -> ReadBack -> Verify -> Done
//!                   \-> (locked) Done                                        \-> Failed
//! ```
//!
//! Every error is terminal for the run. OTP writes cannot be undone, so
//! nothing is retried here: a failed run has to be restarted from scratch
//! so the memory gets rescanned.

use core::fmt;

use crate::board::{Board, BoardError, ClockDomain};
use crate::codec::{OtpAccess, ProprietaryCodec, ProtocolCodec, ProtocolMode, StandardCodec};
use crate::error::{Error, Result};
use crate::indicator::{clear_leds, Signal, StatusIndicator};
use crate::otp::{self, Chunk, ChunkKind, ScanReport};
use crate::patch::{MacVariant, PatchRecord, PATCH_SIZE};
use crate::signal::DEFAULT_WAIT_BUDGET;

/// Run-time switches of the programmer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgrammerConfig {
    /// Allow flipping a radio from the proprietary back to the standard
    /// protocol. Off by default so a factory line cannot program the same
    /// radio twice.
    pub allow_switch_back: bool,
    /// Scan and report OTP but never write
    pub inspect_only: bool,
    /// Poll budget for waits on the raw transport
    pub wait_budget: u32,
}

impl Default for ProgrammerConfig {
    fn default() -> Self {
        Self {
            allow_switch_back: false,
            inspect_only: false,
            wait_budget: DEFAULT_WAIT_BUDGET,
        }
    }
}

/// Sequencer states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Bringing up clocks, pins and the transport
    Init,
    /// Probing which protocol the radio speaks
    ModeDetect,
    /// Binding the codec and patch for the detected protocol
    SelectFunctions,
    /// Walking OTP for the next free address
    Scan,
    /// Burning the patch
    Write,
    /// Reading the patch back
    ReadBack,
    /// Comparing the read-back with the patch
    Verify,
    /// Finished successfully
    Done,
    /// Finished with an error
    Failed,
}

/// How a successful run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A patch was written and verified
    Programmed {
        /// Protocol the radio was in before programming
        mode: ProtocolMode,
        /// Patch that was written
        patch: PatchRecord,
        /// OTP address it was written to
        address: u32,
        /// OTP state before the write
        report: ScanReport,
    },
    /// OTP was scanned, nothing written
    Inspected {
        /// Protocol the radio is in
        mode: ProtocolMode,
        /// OTP state
        report: ScanReport,
    },
    /// Radio is in the proprietary protocol and switching back is disabled
    Locked,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Programmed { patch, address, .. } => write!(
                f,
                "wrote {} patch at 0x{:06X}, power cycle the radio to apply it",
                patch.name(),
                address
            ),
            Self::Inspected { mode, report } => write!(
                f,
                "{} protocol, {} patch(es), next free 0x{:06X}",
                mode, report.patch_count, report.next_free
            ),
            Self::Locked => write!(f, "proprietary protocol, switching back is locked"),
        }
    }
}

/// LED signal for the result of a run
///
/// A locked radio is a deliberate early stop, not a fault.
pub fn signal_for(result: &Result<Outcome>) -> Signal {
    match result {
        Ok(_) => Signal::Pass,
        Err(_) => Signal::Fail,
    }
}

/// Compare a read-back with the patch that was written
pub fn verify_readback(address: u32, patch: &PatchRecord, found: &[u8; PATCH_SIZE]) -> Result<()> {
    match patch
        .as_bytes()
        .iter()
        .zip(found.iter())
        .position(|(a, b)| a != b)
    {
        None => Ok(()),
        Some(offset) => Err(Error::ReadbackMismatch {
            address,
            offset,
            expected: patch.0[offset],
            found: found[offset],
        }),
    }
}

fn fault(error: Error, what: &'static str) -> impl FnOnce(BoardError) -> Error {
    move |e| {
        log::error!("{} failed: {}", what, e);
        error
    }
}

/// Drives a board through the programming sequence
pub struct Sequencer<B: Board> {
    board: B,
    config: ProgrammerConfig,
    state: State,
}

impl<B: Board> Sequencer<B> {
    /// Create a sequencer for `board`
    pub fn new(board: B, config: ProgrammerConfig) -> Self {
        Self {
            board,
            config,
            state: State::Init,
        }
    }

    /// Current state; after a run, `Done` or `Failed`
    pub fn state(&self) -> State {
        self.state
    }

    /// The board being driven
    pub fn board(&self) -> &B {
        &self.board
    }

    /// Mutable access to the board
    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    /// Release the board
    pub fn into_board(self) -> B {
        self.board
    }

    /// Detect the radio's protocol and program the patch that flips it
    pub fn switch_protocol(&mut self) -> Result<Outcome> {
        let result = self.try_switch_protocol();
        self.finish(&result);
        result
    }

    /// Program a MAC override patch; the radio must run the proprietary protocol
    pub fn change_mac(&mut self, variant: MacVariant) -> Result<Outcome> {
        let result = self.try_change_mac(variant);
        self.finish(&result);
        result
    }

    /// Detect the protocol and walk OTP without writing
    ///
    /// Unlike [`switch_protocol`](Self::switch_protocol) this also reads a
    /// radio that is locked in the proprietary protocol. `observer` sees
    /// every chunk the scan reads.
    pub fn inspect<F>(&mut self, observer: F) -> Result<Outcome>
    where
        F: FnMut(u32, &Chunk, ChunkKind),
    {
        let result = self.try_inspect(observer);
        self.finish(&result);
        result
    }

    /// Blink the result a bounded number of times
    pub fn show(&mut self, result: &Result<Outcome>, cycles: u32) {
        StatusIndicator::new(&mut self.board).signal_cycles(signal_for(result), cycles);
    }

    /// Blink the result forever
    pub fn halt(&mut self, result: &Result<Outcome>) -> ! {
        StatusIndicator::new(&mut self.board).signal(signal_for(result))
    }

    fn try_switch_protocol(&mut self) -> Result<Outcome> {
        let (mode, standard) = self.detect()?;
        if mode == ProtocolMode::Proprietary && !self.config.allow_switch_back {
            log::info!("In the proprietary protocol, but locked from switching back");
            return Ok(Outcome::Locked);
        }
        let mut codec = self.select(mode, standard)?;

        let patch = PatchRecord::for_switch_from(mode);
        log::info!(
            "Switching to the {} protocol with the {} patch",
            mode.other(),
            patch.name()
        );
        self.program(&mut codec, &patch)
    }

    fn try_inspect<F>(&mut self, observer: F) -> Result<Outcome>
    where
        F: FnMut(u32, &Chunk, ChunkKind),
    {
        let (mode, standard) = self.detect()?;
        let mut codec = self.select(mode, standard)?;

        self.enter(State::Scan);
        let report = otp::scan_with(&mut codec, observer)?;
        Ok(Outcome::Inspected { mode, report })
    }

    /// Bring the board up and probe the radio's protocol
    fn detect(&mut self) -> Result<(ProtocolMode, StandardCodec<B::Transport>)> {
        self.enter(State::Init);
        self.bring_up()?;
        let transport = self
            .board
            .open_transport()
            .map_err(fault(Error::TransportInit, "transport init"))?;
        clear_leds(&mut self.board);

        self.enter(State::ModeDetect);
        let mut standard = StandardCodec::with_wait_budget(transport, self.config.wait_budget);
        let mode = match standard.reset() {
            Ok(()) => ProtocolMode::StandardHost,
            Err(e) => {
                log::debug!("Reset probe failed ({}), assuming proprietary protocol", e);
                ProtocolMode::Proprietary
            }
        };
        log::info!("Detected the {} protocol", mode);
        Ok((mode, standard))
    }

    /// Bind the codec for `mode`, handing the UART to the vendor channel if needed
    fn select(
        &mut self,
        mode: ProtocolMode,
        standard: StandardCodec<B::Transport>,
    ) -> Result<ProtocolCodec<B::Transport, B::Vendor>> {
        self.enter(State::SelectFunctions);
        match mode {
            ProtocolMode::StandardHost => Ok(ProtocolCodec::Standard(standard)),
            ProtocolMode::Proprietary => {
                self.board
                    .close_transport(standard.into_inner())
                    .map_err(fault(Error::TransportUninit, "transport shutdown"))?;
                let vendor = self
                    .board
                    .open_companion()
                    .map_err(fault(Error::CompanionInit, "radio framework init"))?;
                Ok(ProtocolCodec::Proprietary(ProprietaryCodec::new(vendor)))
            }
        }
    }

    fn try_change_mac(&mut self, variant: MacVariant) -> Result<Outcome> {
        self.enter(State::Init);
        self.bring_up()?;
        let vendor = self
            .board
            .open_companion()
            .map_err(fault(Error::CompanionInit, "radio framework init"))?;
        clear_leds(&mut self.board);

        self.enter(State::SelectFunctions);
        let mut codec = ProprietaryCodec::new(vendor);
        let patch = variant.patch();
        log::info!(
            "Overriding the last MAC octet with 0x{:02X}",
            variant.last_octet
        );
        self.program(&mut codec, &patch)
    }

    fn bring_up(&mut self) -> Result<()> {
        self.board
            .init_pinmux()
            .map_err(fault(Error::PowerInit, "pin-mux init"))?;
        self.board
            .power_init()
            .map_err(fault(Error::PowerInit, "power init"))?;
        self.board
            .set_clock_divider(ClockDomain::Hclk, 1)
            .map_err(fault(Error::PowerInit, "HCLK divider"))?;
        self.board
            .set_clock_divider(ClockDomain::Pclk, 1)
            .map_err(fault(Error::PowerInit, "PCLK divider"))?;
        Ok(())
    }

    fn program<A: OtpAccess + ?Sized>(
        &mut self,
        codec: &mut A,
        patch: &PatchRecord,
    ) -> Result<Outcome> {
        self.enter(State::Scan);
        let report = otp::scan(codec)?;

        if self.config.inspect_only {
            log::info!("Inspect-only mode, not writing");
            return Ok(Outcome::Inspected {
                mode: codec.mode(),
                report,
            });
        }

        if !report.has_room() {
            return Err(Error::OtpExhausted);
        }
        let address = report.next_free;

        self.enter(State::Write);
        log::info!(
            "Writing the patch to OTP at 0x{:06X} (this is irreversible)",
            address
        );
        codec.write(address, patch.as_bytes())?;

        self.enter(State::ReadBack);
        log::info!("Write succeeded, reading back for verification");
        let mut readback = [0u8; PATCH_SIZE];
        codec.read(address, &mut readback)?;

        self.enter(State::Verify);
        verify_readback(address, patch, &readback)?;
        log::info!("Read-back succeeded. Power cycle the radio for the change to take effect");

        Ok(Outcome::Programmed {
            mode: codec.mode(),
            patch: *patch,
            address,
            report,
        })
    }

    fn enter(&mut self, state: State) {
        log::debug!("sequencer: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn finish(&mut self, result: &Result<Outcome>) {
        match result {
            Ok(outcome) => {
                self.enter(State::Done);
                log::info!("Programmer passed: {}", outcome);
            }
            Err(e) => {
                self.enter(State::Failed);
                log::error!("Sequence failed with error code {}: {}", e.code(), e);
                if e.is_irreversible() {
                    log::error!(
                        "OTP may have been modified. Restart the programmer so it rescans before trying again"
                    );
                }
            }
        }
    }
}
