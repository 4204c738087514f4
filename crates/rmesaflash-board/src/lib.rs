//! Board bus access and scanning
//!
//! This crate opens register buses by name and runs scans over them. The CLI
//! only hands it device strings such as `dummy:board=7i43-cpld` and gets back
//! a [`BoardRegistry`] of identified boards.
//!
//! # Example
//!
//! ```ignore
//! use rmesaflash_board::{scan_devices, ScanOptions};
//!
//! let boards = scan_devices(&["dummy:board=7i43".into()], &ScanOptions::default())?;
//! for board in boards.iter() {
//!     println!("{}", board.info());
//! }
//! ```

mod registry;
mod session;

pub use registry::{
    available_buses, bus_names_short, open_bus, parse_bus_params, BusInfo, BusParams, OpenedBus,
};
pub use session::{scan_devices, ScanOptions};

// Re-export core types that the CLI needs
pub use rmesaflash_core::board::{Board, BoardInfo, BoardMode, FpgaPart};
pub use rmesaflash_core::registry::{BoardRegistry, MAX_BOARDS};
