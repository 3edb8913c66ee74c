//! Mode-switch patch catalog
//!
//! A patch is a 40-byte container understood by the radio's boot loader.
//! Layout (byte offsets):
//!
//! ```text
//!  0..4   magic "39me" (33 39 6D 65)
//!  4..8   container size, little endian
//!  8      format version
//!  9      container type
//! 10      container identifier
//! 11      header length
//! 12..14  vendor build number
//! 14..16  user build number
//! 16..20  CRC32 of the container
//! 20..40  payload
//! ```
//!
//! CRCs are precomputed literals. Nothing here computes a CRC32 at runtime;
//! the MAC variants are a closed table.

use core::fmt;

use crate::codec::ProtocolMode;
use crate::error::{Error, Result};

/// Size of a mode-switch patch
pub const PATCH_SIZE: usize = 40;

/// Magic sequence at the start of every patch
pub const MAGIC: [u8; 4] = [0x33, 0x39, 0x6D, 0x65];

/// Offset of the CRC32 field
pub const CRC_OFFSET: usize = 16;

/// Size of the CRC32 field
pub const CRC_SIZE: usize = 4;

/// Offset of the last MAC octet in the payload
pub const MAC_LAST_OCTET_OFFSET: usize = 35;

/// Offset of the payload byte that enables the proprietary protocol
pub const PROPRIETARY_ENABLE_OFFSET: usize = 24;

/// Patch that disables the standard host protocol (keeps proprietary enabled)
pub const DISABLE_STANDARD: PatchRecord = PatchRecord([
    0x33, 0x39, 0x6D, 0x65, // magic
    0x28, 0x00, 0x00, 0x00, // container size
    0x01, // format version
    0x01, // container type
    0x00, // container identifier
    0x14, // header length
    0x11, 0x0C, // vendor build number
    0x00, 0x00, // user build number
    0x49, 0x36, 0xD5, 0x59, // crc32
    0x34, 0x02, 0x00, 0x00, //
    0x01, 0x02, 0x01, 0x01, //
    0xB7, 0x04, 0x00, 0x05, //
    0xF7, 0x01, 0x41, 0x44, //
    0x34, 0xC2, 0x01, 0x00,
]);

/// Patch that disables the proprietary protocol (re-enables standard host)
pub const DISABLE_PROPRIETARY: PatchRecord = PatchRecord([
    0x33, 0x39, 0x6D, 0x65, // magic
    0x28, 0x00, 0x00, 0x00, // container size
    0x01, // format version
    0x01, // container type
    0x00, // container identifier
    0x14, // header length
    0x11, 0x0C, // vendor build number
    0x00, 0x00, // user build number
    0xD8, 0xA7, 0xBD, 0xF7, // crc32
    0x34, 0x02, 0x00, 0x00, //
    0x00, 0x02, 0x01, 0x01, //
    0xB7, 0x04, 0x00, 0x05, //
    0xF7, 0x01, 0x41, 0x44, //
    0x34, 0xC2, 0x01, 0x00,
]);

/// A MAC override choice with its precomputed container CRC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacVariant {
    /// Last octet of the MAC address
    pub last_octet: u8,
    /// CRC32 of DISABLE_STANDARD with this octet patched in
    pub crc: [u8; CRC_SIZE],
}

/// All MAC overrides with a known-good checksum
pub const MAC_VARIANTS: [MacVariant; 5] = [
    MacVariant {
        last_octet: 0x45,
        crc: [0xF9, 0x1F, 0xB5, 0x64],
    },
    MacVariant {
        last_octet: 0x46,
        crc: [0x29, 0x65, 0x15, 0x23],
    },
    MacVariant {
        last_octet: 0x47,
        crc: [0x99, 0x4C, 0x75, 0x1E],
    },
    MacVariant {
        last_octet: 0x48,
        crc: [0x48, 0xDB, 0x25, 0x9C],
    },
    MacVariant {
        last_octet: 0x49,
        crc: [0xF8, 0xF2, 0x45, 0xA1],
    },
];

impl MacVariant {
    /// Look up the variant for a requested last MAC octet
    pub fn lookup(last_octet: u8) -> Result<Self> {
        MAC_VARIANTS
            .iter()
            .find(|v| v.last_octet == last_octet)
            .copied()
            .ok_or(Error::UnsupportedMac(last_octet))
    }

    /// The patch that keeps the proprietary protocol and sets this MAC octet
    pub fn patch(&self) -> PatchRecord {
        let mut patch = DISABLE_STANDARD;
        patch.customize(self.crc, self.last_octet);
        patch
    }
}

/// A 40-byte patch container
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PatchRecord(pub [u8; PATCH_SIZE]);

impl PatchRecord {
    /// Select the patch that moves a radio out of `current` into the other mode
    pub fn for_switch_from(current: ProtocolMode) -> Self {
        match current {
            ProtocolMode::StandardHost => DISABLE_STANDARD,
            ProtocolMode::Proprietary => DISABLE_PROPRIETARY,
        }
    }

    /// Raw bytes of the patch
    pub fn as_bytes(&self) -> &[u8; PATCH_SIZE] {
        &self.0
    }

    /// Overwrite the CRC field and the last MAC octet in place
    pub fn customize(&mut self, crc: [u8; CRC_SIZE], last_octet: u8) {
        self.0[CRC_OFFSET..CRC_OFFSET + CRC_SIZE].copy_from_slice(&crc);
        self.0[MAC_LAST_OCTET_OFFSET] = last_octet;
    }

    /// Container size field
    pub fn container_size(&self) -> u32 {
        container_size(&self.0)
    }

    /// CRC field as stored in the container
    pub fn crc(&self) -> [u8; CRC_SIZE] {
        let mut crc = [0u8; CRC_SIZE];
        crc.copy_from_slice(&self.0[CRC_OFFSET..CRC_OFFSET + CRC_SIZE]);
        crc
    }

    /// Whether the payload leaves the proprietary protocol enabled
    pub fn enables_proprietary(&self) -> bool {
        self.0[PROPRIETARY_ENABLE_OFFSET] == 0x01
    }

    /// Short human-readable name for log output
    pub fn name(&self) -> &'static str {
        if self.enables_proprietary() {
            "disable-standard"
        } else {
            "disable-proprietary"
        }
    }
}

impl fmt::Debug for PatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PatchRecord({}, crc=", self.name())?;
        for b in self.crc() {
            write!(f, "{:02X}", b)?;
        }
        write!(f, ", mac=0x{:02X})", self.0[MAC_LAST_OCTET_OFFSET])
    }
}

/// Whether a chunk starts with the patch magic
pub fn has_magic(chunk: &[u8]) -> bool {
    chunk.len() >= MAGIC.len() && chunk[..MAGIC.len()] == MAGIC
}

/// Little-endian container size stored at bytes 4..8
pub fn container_size(chunk: &[u8]) -> u32 {
    u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]])
}
