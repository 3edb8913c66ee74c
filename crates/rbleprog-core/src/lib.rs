//! rbleprog-core - Core library for BLE companion radio OTP programming
//!
//! This crate implements the OTP mode-switch sequence for EM9304-class
//! radios. It is `no_std` so the same sequence can run on the MCU that
//! hosts the radio or on a PC driving the radio over a UART.
//!
//! # Features
//!
//! - `std` - Implement `std::error::Error` for the core error type
//!
//! # Example
//!
//! ```ignore
//! use rbleprog_core::sequencer::{ProgrammerConfig, Sequencer};
//!
//! let mut sequencer = Sequencer::new(board, ProgrammerConfig::default());
//! match sequencer.switch_protocol() {
//!     Ok(outcome) => println!("{}", outcome),
//!     Err(e) => println!("Programming failed: {}", e),
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "std")]
extern crate std;

pub mod board;
pub mod codec;
pub mod error;
pub mod indicator;
pub mod otp;
pub mod patch;
pub mod sequencer;
pub mod signal;

pub use error::{Error, Result};
