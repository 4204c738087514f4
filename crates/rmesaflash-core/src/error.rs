//! Error types for rmesaflash-core

use std::path::PathBuf;

use thiserror::Error;

use crate::bitfile::BitfileError;
use crate::bus::BusError;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// The bitstream file does not exist
    #[error("can't find file {}", path.display())]
    ResourceNotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// Reading the bitstream file failed (open or mid-stream read)
    #[error("can't read file {}: {source}", path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: std::io::Error,
    },

    /// The bitstream container header could not be parsed
    #[error("invalid bitfile {}: {source}", path.display())]
    MalformedBitstream {
        /// File being parsed
        path: PathBuf,
        /// What was wrong with the header
        #[source]
        source: BitfileError,
    },

    /// The transport failed while talking to the board
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// More boards were found than the registry can hold
    #[error("too many boards (registry holds at most {capacity})")]
    RegistryFull {
        /// Configured registry capacity
        capacity: usize,
    },
}

/// Result type alias using the core Error type
pub type Result<T> = std::result::Result<T, Error>;
