//! rbleprog-sim - Emulated companion radio for testing
//!
//! This crate emulates an EM9304-class radio with 1 MiB of OTP behind both
//! command protocols, plus a [`SimBoard`] that hands it to the sequencer.
//! It's useful for testing and development without real hardware.
//!
//! The radio and its board share state, so a test can run the sequencer
//! on the board and then look at the OTP, or power cycle the radio to see
//! which protocol it boots into.

pub mod board;
pub mod error;
mod radio;

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use rbleprog_core::codec::ProtocolMode;
use rbleprog_core::otp::{scan_with, ChunkKind, OTP_START};
use rbleprog_core::patch::{PatchRecord, MAC_LAST_OCTET_OFFSET, PATCH_SIZE};

pub use board::{SimBoard, SimGpio, SimTransport, SimVendor};
pub use error::{Result, SimError};
pub use radio::{BitFlip, Faults, OTP_CAPACITY};

use radio::RadioState;

/// Last MAC octet of a radio without an override patch
pub const DEFAULT_MAC_LAST_OCTET: u8 = 0x44;

/// Handle to an emulated radio
#[derive(Clone)]
pub struct SimRadio {
    state: Rc<RefCell<RadioState>>,
}

impl SimRadio {
    /// Radio with empty OTP running `mode`
    pub fn new(mode: ProtocolMode) -> Self {
        Self {
            state: Rc::new(RefCell::new(RadioState::new(mode))),
        }
    }

    /// Radio whose OTP starts out with `image`
    pub fn with_image(mode: ProtocolMode, image: &[u8]) -> Result<Self> {
        if image.len() > OTP_CAPACITY {
            return Err(SimError::ImageTooLarge {
                size: image.len(),
                capacity: OTP_CAPACITY,
            });
        }
        let radio = Self::new(mode);
        radio.state.borrow_mut().otp[..image.len()].copy_from_slice(image);
        Ok(radio)
    }

    /// Radio whose OTP starts out with the contents of a file
    pub fn from_image_file<P: AsRef<Path>>(mode: ProtocolMode, path: P) -> Result<Self> {
        let image = std::fs::read(path)?;
        Self::with_image(mode, &image)
    }

    /// Replace the active fault injection
    pub fn set_faults(&self, faults: Faults) {
        self.state.borrow_mut().faults = faults;
    }

    /// Protocol the radio is running
    pub fn mode(&self) -> ProtocolMode {
        self.state.borrow().mode
    }

    /// Read `len` bytes of OTP starting at `address`
    pub fn read_otp(&self, address: u32, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        self.state.borrow().read_otp(address, &mut buf);
        buf
    }

    /// Copy of the whole OTP array
    pub fn image(&self) -> Vec<u8> {
        self.state.borrow().otp.clone()
    }

    /// Number of OTP write commands executed
    pub fn otp_writes(&self) -> u32 {
        self.state.borrow().otp_writes
    }

    /// Last valid patch in OTP, as the boot ROM would apply it
    pub fn active_patch(&self) -> Option<PatchRecord> {
        let mut last = None;
        let mut state = self.state.borrow_mut();
        // Memory access cannot fail
        let _ = scan_with(&mut *state, |_, chunk, kind| {
            if kind == ChunkKind::Patch {
                last = Some(PatchRecord(*chunk));
            }
        });
        last
    }

    /// Reboot the radio into the protocol its OTP selects
    pub fn power_cycle(&self) -> ProtocolMode {
        if let Some(patch) = self.active_patch() {
            self.state.borrow_mut().mode = if patch.enables_proprietary() {
                ProtocolMode::Proprietary
            } else {
                ProtocolMode::StandardHost
            };
        }
        let mode = self.mode();
        log::debug!("sim: radio booted into the {} protocol", mode);
        mode
    }

    /// Last MAC octet the radio reports after boot
    pub fn mac_last_octet(&self) -> u8 {
        self.active_patch()
            .map_or(DEFAULT_MAC_LAST_OCTET, |p| p.0[MAC_LAST_OCTET_OFFSET])
    }

    /// A board wired to this radio
    pub fn board(&self) -> SimBoard {
        SimBoard::new(Rc::clone(&self.state))
    }
}

/// Build an OTP image holding `patches` back to back, as the programmer lays them out
pub fn image_of(patches: &[PatchRecord]) -> Vec<u8> {
    let mut image = Vec::new();
    for patch in patches {
        image.extend_from_slice(patch.as_bytes());
        image.resize(rbleprog_core::otp::align_up(image.len() as u32) as usize, 0);
    }
    image
}

/// Address the `n`th patch of [`image_of`] lands at
pub fn slot_address(n: u32) -> u32 {
    OTP_START + n * rbleprog_core::otp::align_up(PATCH_SIZE as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbleprog_core::board::ClockDomain;
    use rbleprog_core::indicator::{
        Signal, FAIL_HALF_PERIOD, FAIL_LED, PASS_HALF_PERIOD, PASS_LED,
    };
    use rbleprog_core::patch::{MacVariant, DISABLE_PROPRIETARY, DISABLE_STANDARD};
    use rbleprog_core::sequencer::{signal_for, Outcome, ProgrammerConfig, Sequencer, State};
    use rbleprog_core::Error;

    fn unlocked() -> ProgrammerConfig {
        ProgrammerConfig {
            allow_switch_back: true,
            ..Default::default()
        }
    }

    fn run(
        radio: &SimRadio,
        config: ProgrammerConfig,
    ) -> (rbleprog_core::Result<Outcome>, Sequencer<SimBoard>) {
        let mut sequencer = Sequencer::new(radio.board(), config);
        let result = sequencer.switch_protocol();
        (result, sequencer)
    }

    #[test]
    fn test_standard_radio_gets_disable_standard() {
        let radio = SimRadio::new(ProtocolMode::StandardHost);
        let (result, sequencer) = run(&radio, ProgrammerConfig::default());

        match result {
            Ok(Outcome::Programmed {
                mode,
                patch,
                address,
                ..
            }) => {
                assert_eq!(mode, ProtocolMode::StandardHost);
                assert_eq!(patch, DISABLE_STANDARD);
                assert_eq!(address, OTP_START);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(sequencer.state(), State::Done);
        assert_eq!(radio.read_otp(OTP_START, PATCH_SIZE), DISABLE_STANDARD.as_bytes());
        assert_eq!(radio.otp_writes(), 1);
        assert_eq!(radio.power_cycle(), ProtocolMode::Proprietary);

        let board = sequencer.into_board();
        assert_eq!(board.clock_divider(ClockDomain::Hclk), 1);
        assert_eq!(board.clock_divider(ClockDomain::Pclk), 1);
    }

    #[test]
    fn test_proprietary_radio_gets_disable_proprietary() {
        let radio = SimRadio::new(ProtocolMode::Proprietary);
        let (result, sequencer) = run(&radio, unlocked());

        assert!(matches!(
            result,
            Ok(Outcome::Programmed {
                mode: ProtocolMode::Proprietary,
                patch: DISABLE_PROPRIETARY,
                address: OTP_START,
                ..
            })
        ));
        // The raw link is handed over to the vendor channel
        assert!(!sequencer.board().transport_open());
        assert_eq!(
            radio.read_otp(OTP_START, PATCH_SIZE),
            DISABLE_PROPRIETARY.as_bytes()
        );
        assert_eq!(radio.power_cycle(), ProtocolMode::StandardHost);
    }

    #[test]
    fn test_locked_radio_is_left_alone() {
        let radio = SimRadio::new(ProtocolMode::Proprietary);
        let (result, sequencer) = run(&radio, ProgrammerConfig::default());

        assert_eq!(result, Ok(Outcome::Locked));
        assert_eq!(signal_for(&result), Signal::Pass);
        assert_eq!(sequencer.state(), State::Done);
        assert_eq!(radio.otp_writes(), 0);
    }

    #[test]
    fn test_switch_back_and_forth() {
        let radio = SimRadio::new(ProtocolMode::StandardHost);

        for (n, expected) in [
            ProtocolMode::Proprietary,
            ProtocolMode::StandardHost,
            ProtocolMode::Proprietary,
        ]
        .into_iter()
        .enumerate()
        {
            let (result, _) = run(&radio, unlocked());
            match result {
                Ok(Outcome::Programmed { address, report, .. }) => {
                    assert_eq!(address, slot_address(n as u32));
                    assert_eq!(report.patch_count, n as u32);
                }
                other => panic!("unexpected result: {:?}", other),
            }
            assert_eq!(radio.power_cycle(), expected);
        }
    }

    #[test]
    fn test_appends_after_existing_patch() {
        let image = image_of(&[DISABLE_PROPRIETARY]);
        let radio = SimRadio::with_image(ProtocolMode::StandardHost, &image).unwrap();
        let (result, _) = run(&radio, ProgrammerConfig::default());

        assert!(matches!(
            result,
            Ok(Outcome::Programmed { address, .. }) if address == OTP_START + 64
        ));
        assert_eq!(
            radio.read_otp(OTP_START + 64, PATCH_SIZE),
            DISABLE_STANDARD.as_bytes()
        );
        // First record untouched
        assert_eq!(
            radio.read_otp(OTP_START, PATCH_SIZE),
            DISABLE_PROPRIETARY.as_bytes()
        );
    }

    #[test]
    fn test_junk_before_first_reset_still_detects_standard() {
        let radio = SimRadio::new(ProtocolMode::StandardHost);
        radio.set_faults(Faults {
            junk_first_reset: true,
            ..Default::default()
        });
        let (result, _) = run(&radio, ProgrammerConfig::default());

        assert!(matches!(
            result,
            Ok(Outcome::Programmed {
                mode: ProtocolMode::StandardHost,
                ..
            })
        ));
    }

    #[test]
    fn test_radio_going_silent_times_out() {
        let radio = SimRadio::new(ProtocolMode::StandardHost);
        radio.set_faults(Faults {
            answer_limit: Some(1),
            ..Default::default()
        });
        let (result, sequencer) = run(
            &radio,
            ProgrammerConfig {
                wait_budget: 1000,
                ..Default::default()
            },
        );

        assert_eq!(result, Err(Error::WaitTimeout));
        assert_eq!(sequencer.state(), State::Failed);
        assert_eq!(signal_for(&result), Signal::Fail);
        assert_eq!(radio.otp_writes(), 0);
    }

    #[test]
    fn test_bit_flip_fails_readback() {
        let radio = SimRadio::new(ProtocolMode::StandardHost);
        radio.set_faults(Faults {
            flip_bit: Some(BitFlip {
                offset: 20,
                mask: 0x02,
            }),
            ..Default::default()
        });
        let (result, _) = run(&radio, ProgrammerConfig::default());

        assert_eq!(
            result,
            Err(Error::ReadbackMismatch {
                address: OTP_START,
                offset: 20,
                expected: DISABLE_STANDARD.0[20],
                found: DISABLE_STANDARD.0[20] ^ 0x02,
            })
        );
        assert!(result.unwrap_err().is_irreversible());
    }

    #[test]
    fn test_inspect_only_writes_nothing() {
        let image = image_of(&[DISABLE_STANDARD, DISABLE_PROPRIETARY]);
        let radio = SimRadio::with_image(ProtocolMode::StandardHost, &image).unwrap();
        let (result, _) = run(
            &radio,
            ProgrammerConfig {
                inspect_only: true,
                ..Default::default()
            },
        );

        match result {
            Ok(Outcome::Inspected { mode, report }) => {
                assert_eq!(mode, ProtocolMode::StandardHost);
                assert_eq!(report.patch_count, 2);
                assert_eq!(report.next_free, slot_address(2));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(radio.otp_writes(), 0);
        assert_eq!(&radio.image()[..image.len()], &image[..]);
    }

    #[test]
    fn test_inspect_reads_locked_radio() {
        let image = image_of(&[DISABLE_STANDARD]);
        let radio = SimRadio::with_image(ProtocolMode::Proprietary, &image).unwrap();
        let mut sequencer = Sequencer::new(radio.board(), ProgrammerConfig::default());

        let mut seen = Vec::new();
        let result = sequencer.inspect(|address, _, kind| seen.push((address, kind)));

        assert!(matches!(
            result,
            Ok(Outcome::Inspected {
                mode: ProtocolMode::Proprietary,
                report,
            }) if report.patch_count == 1
        ));
        assert_eq!(
            seen,
            [(OTP_START, ChunkKind::Patch), (slot_address(1), ChunkKind::Free)]
        );
        assert_eq!(radio.otp_writes(), 0);
    }

    #[test]
    fn test_full_otp_is_exhausted() {
        let radio = SimRadio::with_image(
            ProtocolMode::Proprietary,
            &vec![0xEE; OTP_CAPACITY],
        )
        .unwrap();
        let (result, _) = run(&radio, unlocked());

        assert_eq!(result, Err(Error::OtpExhausted));
        assert_eq!(radio.otp_writes(), 0);
    }

    #[test]
    fn test_bring_up_failures() {
        let cases = [
            (
                Faults {
                    fail_power: true,
                    ..Default::default()
                },
                ProtocolMode::StandardHost,
                Error::PowerInit,
            ),
            (
                Faults {
                    fail_transport_open: true,
                    ..Default::default()
                },
                ProtocolMode::StandardHost,
                Error::TransportInit,
            ),
            (
                Faults {
                    fail_transport_close: true,
                    ..Default::default()
                },
                ProtocolMode::Proprietary,
                Error::TransportUninit,
            ),
            (
                Faults {
                    fail_companion: true,
                    ..Default::default()
                },
                ProtocolMode::Proprietary,
                Error::CompanionInit,
            ),
        ];

        for (faults, mode, expected) in cases {
            let radio = SimRadio::new(mode);
            radio.set_faults(faults);
            let (result, _) = run(&radio, unlocked());
            assert_eq!(result, Err(expected));
            assert_eq!(radio.otp_writes(), 0);
        }
    }

    #[test]
    fn test_change_mac() {
        let radio = SimRadio::new(ProtocolMode::Proprietary);
        let variant = MacVariant::lookup(0x47).unwrap();
        let mut sequencer = Sequencer::new(radio.board(), ProgrammerConfig::default());

        let result = sequencer.change_mac(variant);
        assert!(matches!(result, Ok(Outcome::Programmed { address: OTP_START, .. })));

        let written = radio.read_otp(OTP_START, PATCH_SIZE);
        assert_eq!(&written[16..20], &variant.crc);
        assert_eq!(written[MAC_LAST_OCTET_OFFSET], 0x47);
        assert_eq!(radio.power_cycle(), ProtocolMode::Proprietary);
        assert_eq!(radio.mac_last_octet(), 0x47);
    }

    #[test]
    fn test_change_mac_needs_proprietary_radio() {
        let radio = SimRadio::new(ProtocolMode::StandardHost);
        let variant = MacVariant::lookup(0x45).unwrap();
        let mut sequencer = Sequencer::new(radio.board(), ProgrammerConfig::default());

        assert_eq!(sequencer.change_mac(variant), Err(Error::CompanionInit));
        assert_eq!(radio.mac_last_octet(), DEFAULT_MAC_LAST_OCTET);
    }

    #[test]
    fn test_indicator_blinks_pass() {
        let radio = SimRadio::new(ProtocolMode::StandardHost);
        let (result, mut sequencer) = run(&radio, ProgrammerConfig::default());
        sequencer.show(&result, 3);

        let board = sequencer.into_board();
        assert_eq!(board.leds().rising_edges(PASS_LED), 3);
        assert_eq!(board.leds().rising_edges(FAIL_LED), 0);
        assert!(!board.leds().is_high(PASS_LED));
        assert_eq!(board.elapsed_ticks(), 6 * u64::from(PASS_HALF_PERIOD));
    }

    #[test]
    fn test_indicator_blinks_fail() {
        let radio = SimRadio::new(ProtocolMode::StandardHost);
        radio.set_faults(Faults {
            fail_power: true,
            ..Default::default()
        });
        let (result, mut sequencer) = run(&radio, ProgrammerConfig::default());
        sequencer.show(&result, 2);

        let board = sequencer.into_board();
        assert_eq!(board.leds().rising_edges(FAIL_LED), 2);
        assert_eq!(board.leds().rising_edges(PASS_LED), 0);
        assert_eq!(board.elapsed_ticks(), 4 * u64::from(FAIL_HALF_PERIOD));
    }

    #[test]
    fn test_image_too_large() {
        assert!(matches!(
            SimRadio::with_image(ProtocolMode::Proprietary, &vec![0; OTP_CAPACITY + 1]),
            Err(SimError::ImageTooLarge { .. })
        ));
    }
}
