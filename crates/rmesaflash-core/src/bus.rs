//! Register bus abstraction
//!
//! A board is reached through a connection that offers two kinds of access:
//! 32-bit register reads and writes in the board's address space, and raw
//! byte transfers for the control bytes that live outside the register
//! model (identification, CPLD commands, configuration data).
//!
//! How those operations are encoded on the wire is up to the implementor.

use thiserror::Error;

/// Errors reported by a bus implementation
#[derive(Debug, Error)]
pub enum BusError {
    /// Transport-level I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No answer within the transport's deadline
    #[error("communication timeout")]
    Timeout,

    /// The connection was already released
    #[error("bus connection released")]
    Released,

    /// Register access at an address that is not 32-bit aligned
    #[error("misaligned register address 0x{addr:04X}")]
    Misaligned {
        /// Offending address
        addr: u32,
    },

    /// Fewer bytes came back than were asked for
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead {
        /// Requested byte count
        expected: usize,
        /// Received byte count
        got: usize,
    },
}

/// Result type for bus operations
pub type BusResult<T> = Result<T, BusError>;

/// A blocking connection to a single board
///
/// All calls block until the transport completes them. Only one command may
/// be outstanding at a time, so a bus is never shared between threads.
pub trait RegisterBus {
    /// Read the 32-bit register at `addr`
    fn register_read(&mut self, addr: u32) -> BusResult<u32>;

    /// Write `value` to the 32-bit register at `addr`
    fn register_write(&mut self, addr: u32, value: u32) -> BusResult<()>;

    /// Send raw bytes, bypassing the register model
    fn raw_send(&mut self, data: &[u8]) -> BusResult<()>;

    /// Receive exactly `count` raw bytes
    fn raw_recv(&mut self, count: usize) -> BusResult<Vec<u8>>;

    /// Release the underlying connection
    ///
    /// Must be safe to call more than once, including after earlier calls
    /// failed.
    fn release(&mut self);

    /// Issue a one-byte control command and return the one-byte answer
    fn read_ctrl(&mut self, cmd: u8) -> BusResult<u8> {
        self.raw_send(&[cmd])?;
        let data = self.raw_recv(1)?;
        data.first().copied().ok_or(BusError::ShortRead {
            expected: 1,
            got: 0,
        })
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for Box<B> {
    fn register_read(&mut self, addr: u32) -> BusResult<u32> {
        (**self).register_read(addr)
    }

    fn register_write(&mut self, addr: u32, value: u32) -> BusResult<()> {
        (**self).register_write(addr, value)
    }

    fn raw_send(&mut self, data: &[u8]) -> BusResult<()> {
        (**self).raw_send(data)
    }

    fn raw_recv(&mut self, count: usize) -> BusResult<Vec<u8>> {
        (**self).raw_recv(count)
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn read_ctrl(&mut self, cmd: u8) -> BusResult<u8> {
        (**self).read_ctrl(cmd)
    }
}

/// Type-erased bus, as handed out by bus registries
pub type BoxedBus = Box<dyn RegisterBus>;
