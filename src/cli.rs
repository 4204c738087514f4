//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Generate dynamic help text for the device argument
fn device_help() -> String {
    format!(
        "Device to scan, as bus[:key=value,...] (repeatable) [available: {}]",
        rmesaflash_board::bus_names_short()
    )
}

#[derive(Parser)]
#[command(name = "rmesaflash")]
#[command(author, version, about = "Mesa LBP/USB board scanner and FPGA loader", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Device selection shared across commands
#[derive(clap::Args, Debug, Clone)]
pub struct DeviceArgs {
    #[arg(short, long = "device", required = true, help = device_help())]
    pub devices: Vec<String>,

    /// Maximum number of boards to register
    #[arg(long, default_value_t = rmesaflash_board::MAX_BOARDS)]
    pub max_boards: usize,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify boards on the given devices
    Scan {
        #[command(flatten)]
        devices: DeviceArgs,
    },

    /// Load a bitstream into the first CPLD-controlled board found
    Program {
        #[command(flatten)]
        devices: DeviceArgs,

        /// Bitstream file (.bit or .bin)
        #[arg(short, long)]
        bitfile: PathBuf,

        /// Print a marker trail instead of a progress bar
        #[arg(long)]
        plain: bool,
    },

    /// Show the header of a bitstream file
    BitfileInfo {
        /// Bitstream file (.bit or .bin)
        file: PathBuf,
    },

    /// List available buses
    ListBuses,
}
