//! CLI command implementations
//!
//! Every command that talks to a radio is a [`Job`]: one sequencer run on
//! whichever board the programmer string selects, followed by the LED
//! signal for its result.

pub mod inspect;
mod list;

use std::path::PathBuf;

use rbleprog_core::board::Board;
use rbleprog_core::patch::MacVariant;
use rbleprog_core::sequencer::{Outcome, ProgrammerConfig, Sequencer};

use crate::programmers::{BoardDefaults, BoardJob};

pub use list::{list_macs, list_programmers};

/// Blink cycles shown when neither the CLI nor the config file sets them
pub const DEFAULT_BLINK_CYCLES: u32 = 3;

/// What a job does to the radio
#[derive(Debug, Clone)]
pub enum Operation {
    /// Program the patch that flips the radio's protocol
    SwitchProtocol,
    /// Program a MAC override patch
    ChangeMac(MacVariant),
    /// Scan OTP, optionally saving the chunks read
    Inspect {
        /// Image file to write
        output: Option<PathBuf>,
    },
}

/// Settings resolved from the CLI and the config file
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Allow flipping a radio back to the standard protocol
    pub allow_switch_back: bool,
    /// Stop after the scan
    pub inspect_only: bool,
    /// Explicit wait budget; the backend default otherwise
    pub wait_budget: Option<u32>,
    /// Blink cycles before exiting
    pub blink_cycles: u32,
    /// Blink forever instead of exiting
    pub halt: bool,
}

impl RunSettings {
    fn programmer_config(&self, defaults: BoardDefaults) -> ProgrammerConfig {
        ProgrammerConfig {
            allow_switch_back: self.allow_switch_back,
            inspect_only: self.inspect_only,
            wait_budget: self.wait_budget.unwrap_or(defaults.wait_budget),
        }
    }
}

/// One sequencer run
pub struct Job {
    /// What to do
    pub operation: Operation,
    /// How to do it
    pub settings: RunSettings,
}

impl BoardJob for Job {
    type Output = Result<Outcome, Box<dyn std::error::Error>>;

    fn run<B: Board>(self, board: B, defaults: BoardDefaults) -> Self::Output {
        let config = self.settings.programmer_config(defaults);
        log::debug!("Programmer config: {:?}", config);

        let mut sequencer = Sequencer::new(board, config);
        let mut dump = inspect::OtpDump::default();
        let result = match &self.operation {
            Operation::SwitchProtocol => sequencer.switch_protocol(),
            Operation::ChangeMac(variant) => sequencer.change_mac(*variant),
            Operation::Inspect { .. } => inspect::scan(&mut sequencer, &mut dump),
        };

        let output = complete(&self.operation, result, &dump);
        if self.settings.halt {
            // Nothing runs after the halt, so report now
            report(&output);
            sequencer.halt(&result);
        }
        sequencer.show(&result, self.settings.blink_cycles);
        output
    }
}

/// Finish a run: write the requested dump of a successful scan
fn complete(
    operation: &Operation,
    result: rbleprog_core::Result<Outcome>,
    dump: &inspect::OtpDump,
) -> Result<Outcome, Box<dyn std::error::Error>> {
    let outcome = result?;
    if let Operation::Inspect {
        output: Some(path),
    } = operation
    {
        dump.save(path)?;
    }
    Ok(outcome)
}

/// Print the final PASS/FAIL line
pub fn report(output: &Result<Outcome, Box<dyn std::error::Error>>) {
    match output {
        Ok(outcome) => println!("PASS: {}", outcome),
        Err(e) => eprintln!("FAIL: {}", e),
    }
}
