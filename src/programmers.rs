//! Programmer registration and dispatch
//!
//! This module provides a centralized registry for all backends, with support
//! for feature-gated inclusion and dynamic help text generation.

use rbleprog_core::board::Board;

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "sim")]
    programmers.push(ProgrammerInfo {
        name: "sim",
        aliases: &["dummy"],
        description: "Emulated radio for testing (mode=standard|proprietary,image=<file>)",
    });

    #[cfg(feature = "serial")]
    programmers.push(ProgrammerInfo {
        name: "serial",
        aliases: &["uart"],
        description: "Radio UART on a host serial port, standard protocol only (dev=<port>[:baud])",
    });

    programmers
}

/// Generate help text listing all available programmers
pub fn programmer_help() -> String {
    let programmers = available_programmers();

    if programmers.is_empty() {
        return "No programmers available (recompile with programmer features enabled)".to_string();
    }

    let mut help = String::from("Available programmers:\n");
    for p in &programmers {
        help.push_str(&format!("  {:8} - {}\n", p.name, p.description));
    }
    help
}

/// Generate a short list of programmer names for CLI help
pub fn programmer_names_short() -> String {
    let programmers = available_programmers();
    let names: Vec<&str> = programmers.iter().map(|p| p.name).collect();
    names.join(", ")
}

/// Resolve a programmer name or alias to its primary name
pub fn find_programmer(name: &str) -> Option<&'static str> {
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.contains(&name))
        .map(|p| p.name)
}

/// Backend-specific defaults handed to a job
#[derive(Debug, Clone, Copy)]
pub struct BoardDefaults {
    /// Wait budget suited to the backend's link latency
    pub wait_budget: u32,
}

/// Work to run against whichever board the programmer string selects
///
/// Closures cannot be generic over the board type, so jobs implement this
/// trait instead.
pub trait BoardJob {
    /// What the job produces
    type Output;

    /// Run the job on `board`
    fn run<B: Board>(self, board: B, defaults: BoardDefaults) -> Self::Output;
}

/// Execute a job with the specified programmer
///
/// The programmer string can be just the name (e.g., "sim") or include
/// parameters (e.g., "sim:mode=proprietary").
#[allow(unused_variables)]
pub fn with_board<J: BoardJob>(
    programmer: &str,
    job: J,
) -> Result<J::Output, Box<dyn std::error::Error>> {
    let (name, options) = parse_programmer_string(programmer);

    let canonical_name = match find_programmer(name) {
        Some(n) => n,
        None => return Err(unknown_programmer_error(name)),
    };

    match canonical_name {
        #[cfg(feature = "sim")]
        "sim" => {
            use rbleprog_core::codec::ProtocolMode;
            use rbleprog_sim::SimRadio;

            let mode = match option(&options, "mode") {
                None | Some("standard") | Some("hci") => ProtocolMode::StandardHost,
                Some("proprietary") | Some("aci") => ProtocolMode::Proprietary,
                Some(other) => {
                    return Err(format!(
                        "Invalid sim mode: {} (expected standard or proprietary)",
                        other
                    )
                    .into())
                }
            };

            let radio = match option(&options, "image") {
                Some(path) => SimRadio::from_image_file(mode, path)
                    .map_err(|e| format!("Failed to load OTP image {}: {}", path, e))?,
                None => SimRadio::new(mode),
            };

            log::info!("Using emulated radio in the {} protocol", mode);
            let output = job.run(
                radio.board(),
                BoardDefaults {
                    wait_budget: rbleprog_core::signal::DEFAULT_WAIT_BUDGET,
                },
            );
            log::info!(
                "Emulated radio would boot into the {} protocol",
                radio.power_cycle()
            );
            Ok(output)
        }

        #[cfg(feature = "serial")]
        "serial" => {
            use rbleprog_serial::{SerialBoard, SerialConnection, HOST_WAIT_BUDGET};

            let conn_str = options
                .iter()
                .filter(|(k, _)| *k == "dev")
                .map(|(k, v)| format!("{}={}", k, v))
                .next()
                .ok_or("serial requires connection parameters.\n\
                    Usage: serial:dev=/dev/ttyUSB0[:baud]")?;

            let conn = SerialConnection::parse(&conn_str)
                .map_err(|e| format!("Invalid serial parameters: {}", e))?;

            log::info!("Opening serial programmer on {}...", conn.device);
            Ok(job.run(
                SerialBoard::new(conn.device, conn.baud),
                BoardDefaults {
                    wait_budget: HOST_WAIT_BUDGET,
                },
            ))
        }

        _ => Err(unknown_programmer_error(name)),
    }
}

/// Parse a programmer string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_programmer_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

#[allow(dead_code)]
fn option<'a>(options: &[(&str, &'a str)], key: &str) -> Option<&'a str> {
    options.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn unknown_programmer_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown programmer: {}\n\n", name);
    msg.push_str(&programmer_help());
    msg.push_str("\nUse 'rbleprog list-programmers' for more details");
    msg.into()
}
