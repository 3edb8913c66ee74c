//! rbleprog - OTP protocol switch programmer for BLE companion radios
//!
//! Detects whether an EM9304-class radio speaks the standard host protocol
//! or the vendor-proprietary one, and burns the OTP patch that makes it
//! boot into the other.
//!
//! # Architecture
//!
//! The programming sequence lives in `rbleprog-core` and talks to hardware
//! only through the `Board` trait. Backends provide boards:
//! - **sim** - emulated radio with in-memory OTP, both protocols
//! - **serial** - radio UART on a host serial port, standard protocol only
//!
//! The same command implementations run on either backend.

mod cli;
mod commands;
mod config;
mod programmers;

use clap::Parser;
use cli::{Cli, Commands, RunArgs};
use commands::{Job, Operation, RunSettings, DEFAULT_BLINK_CYCLES};
use config::Config;
use rbleprog_core::patch::MacVariant;
use rbleprog_core::sequencer::Outcome;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let file_config = match cli.config.as_deref() {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let result = match cli.command {
        Commands::Program {
            run,
            allow_switch_back,
            no_allow_switch_back,
            inspect_only,
            no_inspect_only,
        } => {
            let mut settings = resolve(&run, &file_config);
            settings.allow_switch_back = override_flag(
                allow_switch_back,
                no_allow_switch_back,
                settings.allow_switch_back,
            );
            settings.inspect_only =
                override_flag(inspect_only, no_inspect_only, settings.inspect_only);
            run_job(&run.programmer, Operation::SwitchProtocol, settings)
        }
        Commands::ChangeMac { run, mac } => {
            let octet = mac
                .or(file_config.mac_last_octet)
                .ok_or("No MAC octet given (use --mac or mac_last_octet in the config file)")?;
            // Reject unknown octets before touching the radio
            let variant = MacVariant::lookup(octet).map_err(|e| {
                format!("{}\nUse 'rbleprog list-macs' to see supported values", e)
            })?;
            let settings = resolve(&run, &file_config);
            run_job(&run.programmer, Operation::ChangeMac(variant), settings)
        }
        Commands::Inspect { run, output } => {
            let mut settings = resolve(&run, &file_config);
            settings.inspect_only = true;
            run_job(&run.programmer, Operation::Inspect { output }, settings)
        }
        Commands::ListMacs => {
            commands::list_macs();
            return Ok(());
        }
        Commands::ListProgrammers => {
            commands::list_programmers();
            return Ok(());
        }
    };

    commands::report(&result);
    if result.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

/// Merge CLI flags over config file values
fn resolve(run: &RunArgs, config: &Config) -> RunSettings {
    RunSettings {
        allow_switch_back: config.allow_switch_back.unwrap_or(false),
        inspect_only: config.inspect_only.unwrap_or(false),
        wait_budget: run.wait_budget.or(config.wait_budget),
        blink_cycles: run
            .blink_cycles
            .or(config.blink_cycles)
            .unwrap_or(DEFAULT_BLINK_CYCLES),
        halt: run.halt,
    }
}

/// A `--flag`/`--no-flag` pair over the file value; clap keeps only the last one given
fn override_flag(set: bool, unset: bool, file: bool) -> bool {
    if set {
        true
    } else if unset {
        false
    } else {
        file
    }
}

fn run_job(
    programmer: &str,
    operation: Operation,
    settings: RunSettings,
) -> Result<Outcome, Box<dyn std::error::Error>> {
    programmers::with_board(programmer, Job { operation, settings })?
}
