//! List commands implementation

use rbleprog_core::patch::MAC_VARIANTS;

use crate::programmers::available_programmers;

/// List all supported programmers
pub fn list_programmers() {
    println!("Supported programmers:");
    println!();
    for p in available_programmers() {
        let aliases = if p.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", p.aliases.join(", "))
        };
        println!("  {:8} - {}{}", p.name, p.description, aliases);
    }

    #[cfg(feature = "serial")]
    {
        let ports = rbleprog_serial::available_ports();
        if !ports.is_empty() {
            println!();
            println!("Serial ports found: {}", ports.join(", "));
        }
    }
}

/// List all MAC overrides with a known checksum
pub fn list_macs() {
    println!("Supported MAC overrides:");
    println!();
    println!("{:<12} {:<12}", "Last octet", "CRC");
    println!("{}", "-".repeat(24));

    for variant in MAC_VARIANTS {
        let crc: String = variant.crc.iter().map(|b| format!("{:02X}", b)).collect();
        println!("{:<12} {:<12}", format!("0x{:02X}", variant.last_octet), crc);
    }
}
