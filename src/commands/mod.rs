//! CLI command implementations
//!
//! Every command that touches hardware goes through
//! [`rmesaflash_board::scan_devices`] first, then works on the boards it
//! registered.

pub mod bitfile;
mod list;
pub mod program;
pub mod scan;

pub use list::list_buses;

/// Failures specific to the CLI
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Scanning registered nothing
    #[error("no boards found")]
    NoBoards,

    /// Boards were found, but none can take a bitstream
    #[error("no CPLD-controlled board found ({found} board(s) scanned)")]
    NoProgrammableBoard {
        /// Boards that were registered
        found: usize,
    },
}
