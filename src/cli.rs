//! CLI argument parsing

use crate::programmers;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a string as a hex or decimal u8
fn parse_hex_u8(s: &str) -> Result<u8, String> {
    let n = parse_hex_u32(s)?;
    u8::try_from(n).map_err(|_| format!("{} does not fit in a byte", s))
}

/// Generate dynamic help text for the programmer argument
fn programmer_help() -> String {
    format!(
        "Programmer to use [available: {}]",
        programmers::programmer_names_short()
    )
}

#[derive(Parser)]
#[command(name = "rbleprog")]
#[command(author, version, about = "BLE companion radio OTP programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (TOML format)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that talks to a radio
#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Programmer to use
    #[arg(short, long, help = programmer_help())]
    pub programmer: String,

    /// Poll budget for raw transport waits (hex or decimal)
    #[arg(long, value_parser = parse_hex_u32)]
    pub wait_budget: Option<u32>,

    /// Number of LED blink cycles to show before exiting
    #[arg(long)]
    pub blink_cycles: Option<u32>,

    /// Blink the result LED forever instead of exiting
    #[arg(long)]
    pub halt: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect the radio's protocol and program the patch that switches it
    Program {
        #[command(flatten)]
        run: RunArgs,

        /// Allow switching a radio from the proprietary back to the standard protocol
        #[arg(long, overrides_with = "no_allow_switch_back")]
        allow_switch_back: bool,

        /// Refuse to switch back, even if the config file allows it
        #[arg(long, overrides_with = "allow_switch_back")]
        no_allow_switch_back: bool,

        /// Scan OTP and report, but do not write
        #[arg(long, overrides_with = "no_inspect_only")]
        inspect_only: bool,

        /// Write even if the config file sets inspect_only
        #[arg(long, overrides_with = "inspect_only")]
        no_inspect_only: bool,
    },

    /// Program a MAC address override (radio must run the proprietary protocol)
    ChangeMac {
        #[command(flatten)]
        run: RunArgs,

        /// Last octet of the new MAC address (hex, e.g., 0x47)
        #[arg(short, long, value_parser = parse_hex_u8)]
        mac: Option<u8>,
    },

    /// Walk OTP and list the patches it holds
    Inspect {
        #[command(flatten)]
        run: RunArgs,

        /// Write the chunks read during the scan to an image file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List supported MAC overrides
    ListMacs,

    /// List supported programmers
    ListProgrammers,
}
