//! rmesaflash - Mesa LBP/USB board tool
//!
//! Finds Mesa boards attached over LBP, prints what they are, and loads
//! FPGA bitstreams into 7I43 boards whose FPGA is still unconfigured.
//!
//! # Architecture
//!
//! - `rmesaflash-core` knows the boards: identification, descriptors,
//!   bitstream parsing and upload.
//! - `rmesaflash-board` opens buses from device strings and scans them.
//! - This binary only parses arguments and presents results.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use rmesaflash_board::ScanOptions;

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

    match cli.command {
        Commands::Scan { devices } => {
            let options = ScanOptions {
                verbose: cli.verbose > 0,
                max_boards: devices.max_boards,
            };
            commands::scan::run_scan(&devices.devices, &options)
        }
        Commands::Program {
            devices,
            bitfile,
            plain,
        } => {
            let options = ScanOptions {
                verbose: cli.verbose > 0,
                max_boards: devices.max_boards,
            };
            commands::program::run_program(&devices.devices, &options, &bitfile, plain)
        }
        Commands::BitfileInfo { file } => commands::bitfile::run_info(&file),
        Commands::ListBuses => {
            commands::list_buses();
            Ok(())
        }
    }
}
