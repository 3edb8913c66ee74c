//! TOML configuration file
//!
//! Every key is optional; command-line flags override file values.
//!
//! ```toml
//! allow_switch_back = true
//! inspect_only = false
//! mac_last_octet = "0x47"
//! wait_budget = 0xFFFF
//! blink_cycles = 3
//! ```

use std::fs;
use std::path::Path;

use thiserror::Error;

/// Configuration file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that was being read
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings that can come from the configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Allow flipping a radio from the proprietary back to the standard protocol
    pub allow_switch_back: Option<bool>,
    /// Scan and report OTP but never write
    pub inspect_only: Option<bool>,
    /// Default last MAC octet for `change-mac`
    #[serde(default, deserialize_with = "deserialize_hex_u8")]
    pub mac_last_octet: Option<u8>,
    /// Poll budget for raw transport waits
    #[serde(default, deserialize_with = "deserialize_hex_u32")]
    pub wait_budget: Option<u32>,
    /// Number of LED blink cycles before exiting
    pub blink_cycles: Option<u32>,
}

impl Config {
    /// Parse configuration from a TOML string
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum HexOrInt {
    Int(u32),
    Str(String),
}

/// Deserialize an optional u32 that can be hex (0x...) or decimal
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(Some(n)),
        HexOrInt::Str(s) => parse_number(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Deserialize an optional u8 that can be hex (0x...) or decimal
fn deserialize_hex_u8<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match deserialize_hex_u32(deserializer)? {
        Some(n) => u8::try_from(n)
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("{} does not fit in a byte", n))),
        None => Ok(None),
    }
}

/// Parse a number that can be hex (0x...) or decimal
pub fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
            allow_switch_back = true
            inspect_only = false
            mac_last_octet = "0x47"
            wait_budget = 0xFFFF
            blink_cycles = 5
            "#,
        )
        .unwrap();

        assert_eq!(
            config,
            Config {
                allow_switch_back: Some(true),
                inspect_only: Some(false),
                mac_last_octet: Some(0x47),
                wait_budget: Some(0xFFFF),
                blink_cycles: Some(5),
            }
        );
    }

    #[test]
    fn test_decimal_and_hex_strings() {
        let config = Config::parse("mac_last_octet = 72\nwait_budget = \"1000\"").unwrap();
        assert_eq!(config.mac_last_octet, Some(0x48));
        assert_eq!(config.wait_budget, Some(1000));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::parse("mac_last_octet = \"0x1FF\"").is_err());
        assert!(Config::parse("wait_budget = \"soon\"").is_err());
        assert!(Config::parse("allow_switch_bak = true").is_err());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("0x10"), Ok(16));
        assert_eq!(parse_number(" 42 "), Ok(42));
        assert!(parse_number("0xZZ").is_err());
    }
}
