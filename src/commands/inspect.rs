//! Inspect command implementation

use std::fs;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use rbleprog_core::board::Board;
use rbleprog_core::otp::{Chunk, ChunkKind, OTP_END, OTP_START};
use rbleprog_core::patch::{PatchRecord, PATCH_SIZE};
use rbleprog_core::sequencer::{Outcome, Sequencer};

/// Chunks read during a scan, by address
#[derive(Debug, Default)]
pub struct OtpDump {
    chunks: Vec<(u32, Chunk, ChunkKind)>,
}

impl OtpDump {
    /// Record one chunk
    pub fn record(&mut self, address: u32, chunk: &Chunk, kind: ChunkKind) {
        self.chunks.push((address, *chunk, kind));
    }

    /// Sparse OTP image starting at `OTP_START`
    ///
    /// Only the chunks the scan read are filled in; everything else is zero,
    /// so the image reloads as the same layout of patch headers. The last
    /// chunk of a full OTP is cut at `OTP_END`.
    pub fn to_image(&self) -> Vec<u8> {
        let capacity = (OTP_END - OTP_START) as usize;
        let len = self
            .chunks
            .iter()
            .filter(|(_, _, kind)| *kind != ChunkKind::Free)
            .map(|(address, _, _)| ((address - OTP_START) as usize + PATCH_SIZE).min(capacity))
            .max()
            .unwrap_or(0);

        let mut image = vec![0u8; len];
        for (address, chunk, kind) in &self.chunks {
            if *kind == ChunkKind::Free {
                continue;
            }
            let offset = (address - OTP_START) as usize;
            let end = (offset + PATCH_SIZE).min(len);
            image[offset..end].copy_from_slice(&chunk[..end - offset]);
        }
        image
    }

    /// Write the sparse image to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let image = self.to_image();
        fs::write(path, &image)?;
        println!("Wrote {} bytes of OTP to {:?}", image.len(), path);
        Ok(())
    }

    /// Print one line per non-free chunk
    pub fn print_listing(&self) {
        println!("{:<10} {:<8} {:<22} {:>6}", "Address", "Kind", "Patch", "Size");
        println!("{}", "-".repeat(50));
        for (address, chunk, kind) in &self.chunks {
            match kind {
                ChunkKind::Patch => {
                    let patch = PatchRecord(*chunk);
                    println!(
                        "0x{:06X}   {:<8} {:<22} {:>6}",
                        address,
                        "patch",
                        patch.name(),
                        patch.container_size()
                    );
                }
                ChunkKind::Invalid => {
                    println!("0x{:06X}   {:<8} {:<22} {:>6}", address, "invalid", "-", PATCH_SIZE);
                }
                ChunkKind::Free => {}
            }
        }
    }
}

fn progress_bar() -> Result<ProgressBar, indicatif::style::TemplateError> {
    let pb = ProgressBar::new(u64::from(OTP_END - OTP_START));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} Scanning OTP")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Walk OTP with a progress bar, recording every chunk into `dump`
pub fn scan<B: Board>(
    sequencer: &mut Sequencer<B>,
    dump: &mut OtpDump,
) -> rbleprog_core::Result<Outcome> {
    let pb = progress_bar().unwrap_or_else(|_| ProgressBar::hidden());

    let result = sequencer.inspect(|address, chunk, kind| {
        pb.set_position(u64::from(address - OTP_START) + PATCH_SIZE as u64);
        dump.record(address, chunk, kind);
    });
    pb.finish_and_clear();

    if result.is_ok() {
        dump.print_listing();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbleprog_core::patch::DISABLE_STANDARD;

    #[test]
    fn test_image_skips_free_chunks() {
        let mut dump = OtpDump::default();
        dump.record(OTP_START, DISABLE_STANDARD.as_bytes(), ChunkKind::Patch);
        dump.record(OTP_START + 64, &[0xFF; PATCH_SIZE], ChunkKind::Invalid);
        dump.record(OTP_START + 104, &[0; PATCH_SIZE], ChunkKind::Free);

        let image = dump.to_image();
        assert_eq!(image.len(), 64 + PATCH_SIZE);
        assert_eq!(&image[..PATCH_SIZE], DISABLE_STANDARD.as_bytes());
        assert!(image[PATCH_SIZE..64].iter().all(|&b| b == 0));
        assert!(image[64..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_empty_dump() {
        assert!(OtpDump::default().to_image().is_empty());
    }

    #[test]
    fn test_image_stops_at_otp_end() {
        let last = OTP_END - 8;
        let mut dump = OtpDump::default();
        dump.record(last, &[0xEE; PATCH_SIZE], ChunkKind::Invalid);

        let image = dump.to_image();
        assert_eq!(image.len(), (OTP_END - OTP_START) as usize);
        assert_eq!(&image[image.len() - 8..], &[0xEE; 8]);
    }

    #[cfg(feature = "sim")]
    #[test]
    fn test_full_otp_dump_reloads() {
        use rbleprog_core::codec::ProtocolMode;
        use rbleprog_core::sequencer::ProgrammerConfig;
        use rbleprog_sim::{SimRadio, OTP_CAPACITY};

        let image = vec![0xEE; OTP_CAPACITY];
        let radio = SimRadio::with_image(ProtocolMode::StandardHost, &image).unwrap();
        let mut sequencer = Sequencer::new(radio.board(), ProgrammerConfig::default());

        let mut dump = OtpDump::default();
        scan(&mut sequencer, &mut dump).unwrap();

        let reloaded = SimRadio::with_image(ProtocolMode::StandardHost, &dump.to_image()).unwrap();
        assert_eq!(reloaded.image(), radio.image());
    }

    #[cfg(feature = "sim")]
    #[test]
    fn test_scan_round_trips_through_sim() {
        use rbleprog_core::codec::ProtocolMode;
        use rbleprog_core::patch::DISABLE_PROPRIETARY;
        use rbleprog_core::sequencer::ProgrammerConfig;
        use rbleprog_sim::{image_of, SimRadio};

        let image = image_of(&[DISABLE_STANDARD, DISABLE_PROPRIETARY]);
        let radio = SimRadio::with_image(ProtocolMode::StandardHost, &image).unwrap();
        let mut sequencer = Sequencer::new(radio.board(), ProgrammerConfig::default());

        let mut dump = OtpDump::default();
        let outcome = scan(&mut sequencer, &mut dump).unwrap();
        assert!(matches!(outcome, Outcome::Inspected { report, .. } if report.patch_count == 2));
        assert_eq!(dump.to_image(), image[..64 + PATCH_SIZE]);
    }
}
