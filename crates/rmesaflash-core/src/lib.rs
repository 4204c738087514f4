//! rmesaflash-core - Core library for Mesa LBP boards
//!
//! This crate identifies boards that sit behind an LBP (Local Bus Protocol)
//! connection, describes what each of them can do, and loads a bitstream
//! into boards whose FPGA is not configured yet.
//!
//! The transport itself is not part of this crate. Anything that implements
//! [`bus::RegisterBus`] can be scanned.
//!
//! # Example
//!
//! ```ignore
//! use rmesaflash_core::identify::{scan, ScanRequest};
//! use rmesaflash_core::program::NoProgress;
//! use rmesaflash_core::registry::BoardRegistry;
//!
//! let mut boards = BoardRegistry::new();
//! let request = ScanRequest::new("/dev/ttyUSB0");
//!
//! if let Some(board) = scan(bus, &request, &mut boards)? {
//!     println!("{}", board.info());
//! }
//!
//! for board in boards.iter_mut() {
//!     if let Some(mut loader) = board.firmware() {
//!         loader.program("7i43_200.bit".as_ref(), &mut NoProgress)?;
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bitfile;
pub mod board;
pub mod bus;
pub mod error;
pub mod hostmot2;
pub mod identify;
pub mod lbp;
pub mod program;
pub mod registry;

pub use error::{Error, Result};
