//! OTP address space scanner
//!
//! OTP is append-only: each patch is written once, padded up to the next
//! 32-byte boundary, and the first all-zero chunk marks free space. The
//! scanner walks the space in patch-sized chunks and follows each patch's
//! container size to the next record.
//!
//! Checksums of discovered patches are not validated. A magic-matching
//! record with a corrupted size field will desynchronize the walk.

use crate::codec::OtpAccess;
use crate::error::Result;
use crate::patch::{container_size, has_magic, PATCH_SIZE};

/// First OTP address
pub const OTP_START: u32 = 0x0010_0000;

/// End of the OTP address space (exclusive)
pub const OTP_END: u32 = 0x001F_FFFF;

/// Alignment of every record start
pub const RECORD_ALIGN: u32 = 32;

/// One chunk as read during a scan
pub type Chunk = [u8; PATCH_SIZE];

/// How a scanned chunk was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// Header of a valid patch
    Patch,
    /// Non-zero data that is not a patch header
    Invalid,
    /// All zeros, start of free space
    Free,
}

/// Result of walking the OTP space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    /// First address a new patch can be written to
    pub next_free: u32,
    /// Number of valid patches found
    pub patch_count: u32,
    /// Number of invalid chunks skipped
    pub invalid_regions: u32,
}

impl ScanReport {
    /// Bytes consumed so far
    pub fn used_bytes(&self) -> u32 {
        self.next_free.saturating_sub(OTP_START)
    }

    /// Share of the OTP space consumed, in percent
    pub fn utilization_percent(&self) -> f32 {
        self.used_bytes() as f32 / (OTP_END - OTP_START) as f32 * 100.0
    }

    /// Whether one more patch fits at `next_free`
    pub fn has_room(&self) -> bool {
        self.next_free
            .checked_add(PATCH_SIZE as u32)
            .is_some_and(|end| end <= OTP_END)
    }
}

/// Round `address` up to the next record boundary
pub fn align_up(address: u32) -> u32 {
    address.saturating_add(RECORD_ALIGN - 1) & !(RECORD_ALIGN - 1)
}

/// Classify one chunk
pub fn classify(chunk: &Chunk) -> ChunkKind {
    if has_magic(chunk) {
        ChunkKind::Patch
    } else if chunk.iter().all(|&b| b == 0) {
        ChunkKind::Free
    } else {
        ChunkKind::Invalid
    }
}

/// Walk the OTP space and find the next free address
pub fn scan<A: OtpAccess + ?Sized>(access: &mut A) -> Result<ScanReport> {
    scan_with(access, |_, _, _| {})
}

/// Walk the OTP space, reporting every chunk read to `observer`
pub fn scan_with<A, F>(access: &mut A, mut observer: F) -> Result<ScanReport>
where
    A: OtpAccess + ?Sized,
    F: FnMut(u32, &Chunk, ChunkKind),
{
    let mut report = ScanReport {
        next_free: OTP_START,
        patch_count: 0,
        invalid_regions: 0,
    };
    let mut cursor = OTP_START;
    let mut chunk = [0u8; PATCH_SIZE];

    log::info!("Reading the one-time programmable memory space");

    while cursor < OTP_END {
        access.read(cursor, &mut chunk)?;
        let kind = classify(&chunk);
        observer(cursor, &chunk, kind);

        match kind {
            ChunkKind::Patch => {
                let size = container_size(&chunk);
                log::info!(
                    "Found a valid patch at 0x{:06X} of size {} bytes",
                    cursor,
                    size
                );
                // A zero size must still move the cursor or the walk never ends
                cursor = align_up(cursor.saturating_add(size.max(1)));
                report.patch_count += 1;
                report.next_free = cursor;
            }
            ChunkKind::Invalid => {
                log::warn!(
                    "Found invalid memory at 0x{:06X}. Not catastrophic, but OTP was programmed incorrectly once",
                    cursor
                );
                cursor = cursor.saturating_add(PATCH_SIZE as u32);
                report.invalid_regions += 1;
                report.next_free = cursor;
            }
            ChunkKind::Free => break,
        }
    }

    log::info!("Done traversing the programmable memory space");
    log::info!("OTP has been programmed {} time(s)", report.patch_count);
    log::info!(
        "Next free address is 0x{:06X}, {:.3}% of OTP used",
        report.next_free,
        report.utilization_percent()
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec;
    use std::vec::Vec;

    use super::*;
    use crate::codec::ProtocolMode;
    use crate::patch::{DISABLE_PROPRIETARY, DISABLE_STANDARD};

    /// OTP image backed by a Vec, starting at OTP_START
    struct Image {
        data: Vec<u8>,
        reads: usize,
    }

    impl Image {
        fn zeroed(len: usize) -> Self {
            Self {
                data: vec![0; len],
                reads: 0,
            }
        }

        fn put(&mut self, address: u32, bytes: &[u8]) {
            let offset = (address - OTP_START) as usize;
            self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
    }

    impl OtpAccess for Image {
        fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
            self.reads += 1;
            let offset = (address - OTP_START) as usize;
            buf.fill(0);
            if offset < self.data.len() {
                let end = (offset + buf.len()).min(self.data.len());
                buf[..end - offset].copy_from_slice(&self.data[offset..end]);
            }
            Ok(())
        }

        fn write(&mut self, address: u32, data: &[u8]) -> Result<()> {
            self.put(address, data);
            Ok(())
        }

        fn mode(&self) -> ProtocolMode {
            ProtocolMode::StandardHost
        }
    }

    #[test]
    fn test_empty_otp() {
        let mut image = Image::zeroed(4096);
        let report = scan(&mut image).unwrap();
        assert_eq!(report.next_free, OTP_START);
        assert_eq!(report.patch_count, 0);
        assert_eq!(report.utilization_percent(), 0.0);
        assert!(report.has_room());
        assert_eq!(image.reads, 1);
    }

    #[test]
    fn test_k_patches_then_filler() {
        for k in 1..=5u32 {
            let mut image = Image::zeroed(4096);
            let mut address = OTP_START;
            for i in 0..k {
                let patch = if i % 2 == 0 {
                    DISABLE_STANDARD
                } else {
                    DISABLE_PROPRIETARY
                };
                image.put(address, patch.as_bytes());
                address = align_up(address + PATCH_SIZE as u32);
            }

            let report = scan(&mut image).unwrap();
            assert_eq!(report.patch_count, k);
            // 40 bytes rounded up to 64 per record
            assert_eq!(report.next_free, OTP_START + 64 * k);
            assert_eq!(report.invalid_regions, 0);
        }
    }

    #[test]
    fn test_invalid_chunk_advances_flat() {
        let mut image = Image::zeroed(4096);
        image.put(OTP_START, &[0xFF; PATCH_SIZE]);

        let report = scan(&mut image).unwrap();
        assert_eq!(report.patch_count, 0);
        assert_eq!(report.invalid_regions, 1);
        assert_eq!(report.next_free, OTP_START + PATCH_SIZE as u32);
    }

    #[test]
    fn test_patch_after_invalid_region() {
        let mut image = Image::zeroed(4096);
        image.put(OTP_START, &[0x5A; PATCH_SIZE]);
        image.put(OTP_START + 40, DISABLE_STANDARD.as_bytes());

        let report = scan(&mut image).unwrap();
        assert_eq!(report.patch_count, 1);
        assert_eq!(report.invalid_regions, 1);
        // 0x100028 + 40 = 0x100050, aligned up to 0x100060
        assert_eq!(report.next_free, 0x0010_0060);
    }

    #[test]
    fn test_zero_size_patch_terminates() {
        let mut image = Image::zeroed(4096);
        let mut patch = DISABLE_STANDARD;
        patch.0[4..8].copy_from_slice(&[0, 0, 0, 0]);
        image.put(OTP_START, patch.as_bytes());

        // The cursor lands inside the record's own payload, which then
        // reads back as one invalid chunk before the free space
        let report = scan(&mut image).unwrap();
        assert_eq!(report.patch_count, 1);
        assert_eq!(report.invalid_regions, 1);
        assert_eq!(report.next_free, OTP_START + RECORD_ALIGN + PATCH_SIZE as u32);
    }

    #[test]
    fn test_full_otp() {
        let mut image = Image::zeroed(0);
        image.data = vec![0xEE; (OTP_END - OTP_START) as usize];

        let report = scan(&mut image).unwrap();
        assert!(report.next_free >= OTP_END);
        assert!(!report.has_room());
        assert!(report.utilization_percent() >= 100.0);
    }

    #[test]
    fn test_observer_sees_every_chunk() {
        let mut image = Image::zeroed(4096);
        image.put(OTP_START, DISABLE_STANDARD.as_bytes());

        let mut seen = Vec::new();
        scan_with(&mut image, |address, _, kind| seen.push((address, kind))).unwrap();
        assert_eq!(
            seen,
            [
                (OTP_START, ChunkKind::Patch),
                (OTP_START + 64, ChunkKind::Free)
            ]
        );
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0x0010_0000), 0x0010_0000);
        assert_eq!(align_up(0x0010_0001), 0x0010_0020);
        assert_eq!(align_up(0x0010_0028), 0x0010_0040);
        assert_eq!(align_up(u32::MAX), u32::MAX & !31);
    }
}
