//! Scan command implementation

use super::CommandError;
use rmesaflash_board::{scan_devices, ScanOptions};

/// Scan the devices and print every board found
pub fn run_scan(
    devices: &[String],
    options: &ScanOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut boards = scan_devices(devices, options)?;

    if boards.is_empty() {
        return Err(CommandError::NoBoards.into());
    }

    for board in boards.iter() {
        println!("{}", board.info());
        if options.verbose {
            println!("  capabilities: {:?}", board.capabilities());
        }
    }

    boards.release_all();
    Ok(())
}
