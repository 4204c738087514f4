//! Program command implementation

use super::bitfile::print_header;
use super::CommandError;
use indicatif::{ProgressBar, ProgressStyle};
use rmesaflash_board::{scan_devices, BoardMode, ScanOptions};
use rmesaflash_core::bitfile::BitfileHeader;
use rmesaflash_core::program::{MarkerProgress, ProgramProgress, ProgramStats, PRIMING_COUNT};
use std::path::Path;
use std::time::Duration;

/// Progress reporter using an indicatif progress bar
struct IndicatifProgress {
    current_bar: Option<ProgressBar>,
    total: u64,
    written: u64,
}

impl IndicatifProgress {
    fn new() -> Self {
        Self {
            current_bar: None,
            total: 0,
            written: 0,
        }
    }

    fn create_spinner(&mut self, message: &str) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        self.current_bar = Some(pb);
    }

    fn create_bar(&mut self, total: u64) {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) Programming",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        self.current_bar = Some(pb);
    }

    fn finish(&mut self, message: &str) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_with_message(message.to_string());
        }
    }
}

impl ProgramProgress for IndicatifProgress {
    fn started(&mut self, header: &BitfileHeader, payload_bytes: u64) {
        print_header(header);
        self.total = payload_bytes;
        self.create_spinner("Priming CPLD...");
    }

    fn priming(&mut self, step: usize) {
        if let Some(pb) = &self.current_bar {
            pb.set_message(format!("Priming CPLD ({})...", step + 1));
        }
        if step + 1 == PRIMING_COUNT {
            self.finish("Primed");
            self.create_bar(self.total);
        }
    }

    fn chunk_written(&mut self, bytes: usize) {
        self.written += bytes as u64;
        if let Some(pb) = &self.current_bar {
            pb.set_position(self.written);
        }
    }

    fn complete(&mut self, stats: &ProgramStats) {
        self.finish("Programming complete");
        println!(
            "Sent {} bytes in {} chunk{}",
            stats.bytes_sent,
            stats.chunks,
            if stats.chunks == 1 { "" } else { "s" }
        );
    }
}

/// Scan the devices and load `bitfile` into the first CPLD-controlled board
pub fn run_program(
    devices: &[String],
    options: &ScanOptions,
    bitfile: &Path,
    plain: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut boards = scan_devices(devices, options)?;
    let found = boards.len();

    let board = boards
        .iter_mut()
        .find(|b| b.info().mode == BoardMode::CpldControlled)
        .ok_or(CommandError::NoProgrammableBoard { found })?;

    println!("{}", board.info());

    let Some(mut loader) = board.firmware() else {
        return Err(CommandError::NoProgrammableBoard { found }.into());
    };

    if let Some(part) = loader.part() {
        println!("Loading {} into {} FPGA", bitfile.display(), part);
    }

    let stats = if plain {
        let mut progress = MarkerProgress::new(std::io::stdout());
        loader.program(bitfile, &mut progress)?
    } else {
        let mut progress = IndicatifProgress::new();
        loader.program(bitfile, &mut progress)?
    };

    log::info!(
        "Programmed {} bytes from {}",
        stats.bytes_sent,
        bitfile.display()
    );

    boards.release_all();
    Ok(())
}
