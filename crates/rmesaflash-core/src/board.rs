//! Board descriptors and the capabilities they expose
//!
//! A [`Board`] is created once by identification and owns the bus it was
//! found on. What callers may do with it depends on its [`BoardMode`]:
//!
//! | Mode             | Registers | Program firmware |
//! |------------------|-----------|------------------|
//! | `Unknown`        | yes       | no               |
//! | `FpgaControlled` | yes       | no               |
//! | `CpldControlled` | yes       | yes              |
//!
//! Firmware loading is only reachable through [`Board::firmware`], which
//! returns `None` unless the board is CPLD-controlled.

use core::fmt;
use std::path::Path;

use bitflags::bitflags;

use crate::bus::{BoxedBus, BusError, BusResult, RegisterBus};
use crate::error::Result;
use crate::hostmot2::ADDR_MASK;
use crate::program::{program_bitstream, ProgramProgress, ProgramStats};

/// Four character board tag, e.g. `7I43`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoardName([u8; 4]);

impl BoardName {
    /// 7I64 passive I/O board
    pub const MESA_7I64: Self = Self(*b"7I64");
    /// 7I43 FPGA board
    pub const MESA_7I43: Self = Self(*b"7I43");

    /// Create a name from its raw bytes
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Raw tag bytes
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for BoardName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            let c = if b.is_ascii_graphic() { b as char } else { '?' };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// How the board is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardType {
    /// USB-attached LBP device
    Usb,
    /// Any other attachment
    Other,
}

/// Who answers on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoardMode {
    /// Not determined
    #[default]
    Unknown,
    /// The CPLD answers; the FPGA still needs a bitstream
    CpldControlled,
    /// The FPGA is configured and exposes the register file
    FpgaControlled,
}

/// FPGA parts fitted to supported boards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpgaPart {
    /// Spartan-3 XC3S200, TQ144
    Xc3s200Tq144,
    /// Spartan-3 XC3S400, TQ144
    Xc3s400Tq144,
}

impl FpgaPart {
    /// Pick the part from the `fpga_size` field of a HostMot2 IDROM
    ///
    /// Only an exact 400 selects the larger part.
    pub fn from_idrom_size(fpga_size: u32) -> Self {
        if fpga_size == 400 {
            Self::Xc3s400Tq144
        } else {
            Self::Xc3s200Tq144
        }
    }

    /// Part name as it appears in bitfile headers
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xc3s200Tq144 => "3s200tq144",
            Self::Xc3s400Tq144 => "3s400tq144",
        }
    }
}

impl fmt::Display for FpgaPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Operations a board supports
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Register reads through [`RegisterWindow`]
        const REGISTER_READ    = 1 << 0;
        /// Register writes through [`RegisterWindow`]
        const REGISTER_WRITE   = 1 << 1;
        /// Bitstream loading through [`FirmwareLoader`]
        const PROGRAM_FIRMWARE = 1 << 2;

        /// Read and write
        const REGISTERS = Self::REGISTER_READ.bits() | Self::REGISTER_WRITE.bits();
    }
}

impl Capabilities {
    /// Capabilities implied by a board mode
    pub fn for_mode(mode: BoardMode) -> Self {
        match mode {
            BoardMode::CpldControlled => Self::REGISTERS | Self::PROGRAM_FIRMWARE,
            BoardMode::Unknown | BoardMode::FpgaControlled => Self::REGISTERS,
        }
    }
}

/// Static description of an identified board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardInfo {
    /// Board tag
    pub name: BoardName,
    /// Transport address the board was found at
    pub device_address: String,
    /// Attachment type
    pub board_type: BoardType,
    /// Controller mode
    pub mode: BoardMode,
    /// Number of I/O connectors
    pub num_io_connectors: usize,
    /// Pins on each connector
    pub pins_per_connector: usize,
    /// Connector names, in connector order
    pub connector_names: Vec<&'static str>,
    /// Number of user LEDs
    pub num_leds: usize,
    /// Fitted FPGA, when known
    pub fpga_part: Option<FpgaPart>,
    /// Copied from the scan request
    pub verbose: bool,
}

impl BoardInfo {
    /// Bare descriptor with identity only
    pub fn new(name: BoardName, device_address: impl Into<String>, verbose: bool) -> Self {
        Self {
            name,
            device_address: device_address.into(),
            board_type: BoardType::Usb,
            mode: BoardMode::Unknown,
            num_io_connectors: 0,
            pins_per_connector: 0,
            connector_names: Vec::new(),
            num_leds: 0,
            fpga_part: None,
            verbose,
        }
    }

    /// Total number of I/O pins
    pub fn total_pins(&self) -> usize {
        self.num_io_connectors * self.pins_per_connector
    }
}

impl fmt::Display for BoardInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.board_type {
            BoardType::Usb => "USB",
            BoardType::Other => "Unknown",
        };
        write!(f, "{} device {} at {}", kind, self.name, self.device_address)?;
        if self.verbose {
            match self.mode {
                BoardMode::CpldControlled => write!(f, "\n  controlled by CPLD")?,
                BoardMode::FpgaControlled => write!(f, "\n  controlled by FPGA")?,
                BoardMode::Unknown => {}
            }
            if let Some(part) = self.fpga_part {
                write!(f, "\n  FPGA part: {}", part)?;
            }
            if self.num_io_connectors > 0 {
                write!(
                    f,
                    "\n  {} connectors ({}), {} pins each",
                    self.num_io_connectors,
                    self.connector_names.join(", "),
                    self.pins_per_connector
                )?;
            }
        }
        Ok(())
    }
}

/// An identified board together with its bus
pub struct Board {
    info: BoardInfo,
    capabilities: Capabilities,
    bus: BoxedBus,
}

impl Board {
    /// Bind a descriptor to the bus it was found on
    ///
    /// The capability set is fixed here from the descriptor's mode.
    pub fn new(info: BoardInfo, bus: BoxedBus) -> Self {
        let capabilities = Capabilities::for_mode(info.mode);
        Self {
            info,
            capabilities,
            bus,
        }
    }

    /// Static board description
    pub fn info(&self) -> &BoardInfo {
        &self.info
    }

    /// Operations this board supports
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Register access through the board's 16-bit address window
    pub fn registers(&mut self) -> RegisterWindow<'_> {
        RegisterWindow {
            bus: self.bus.as_mut(),
        }
    }

    /// Bitstream loader, for boards waiting for firmware
    pub fn firmware(&mut self) -> Option<FirmwareLoader<'_>> {
        if !self.capabilities.contains(Capabilities::PROGRAM_FIRMWARE) {
            return None;
        }
        Some(FirmwareLoader {
            bus: self.bus.as_mut(),
            part: self.info.fpga_part,
        })
    }

    /// Release the bus connection
    pub fn release(&mut self) {
        self.bus.release();
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Board")
            .field("info", &self.info)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl Drop for Board {
    fn drop(&mut self) {
        self.bus.release();
    }
}

/// Register access bound to a board's bus
///
/// Addresses are truncated to 16 bits. Upper bits are ignored, not
/// rejected. Alignment is checked by the bus.
pub struct RegisterWindow<'a> {
    bus: &'a mut dyn RegisterBus,
}

impl RegisterWindow<'_> {
    /// Read one 32-bit register
    pub fn read(&mut self, addr: u32) -> BusResult<u32> {
        self.bus.register_read(addr & ADDR_MASK)
    }

    /// Write one 32-bit register
    pub fn write(&mut self, addr: u32, value: u32) -> BusResult<()> {
        self.bus.register_write(addr & ADDR_MASK, value)
    }

    /// Read consecutive registers into `buf`, little-endian
    ///
    /// `buf.len()` must be a multiple of 4.
    pub fn read_block(&mut self, addr: u32, buf: &mut [u8]) -> BusResult<()> {
        if buf.len() % 4 != 0 {
            return Err(BusError::Misaligned {
                addr: addr.wrapping_add(buf.len() as u32),
            });
        }
        for (i, word) in buf.chunks_exact_mut(4).enumerate() {
            let value = self.read(addr.wrapping_add(4 * i as u32))?;
            word.copy_from_slice(&value.to_le_bytes());
        }
        Ok(())
    }

    /// Write `data` to consecutive registers, little-endian
    ///
    /// `data.len()` must be a multiple of 4.
    pub fn write_block(&mut self, addr: u32, data: &[u8]) -> BusResult<()> {
        if data.len() % 4 != 0 {
            return Err(BusError::Misaligned {
                addr: addr.wrapping_add(data.len() as u32),
            });
        }
        for (i, word) in data.chunks_exact(4).enumerate() {
            let value = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            self.write(addr.wrapping_add(4 * i as u32), value)?;
        }
        Ok(())
    }
}

/// Loads a bitstream into a CPLD-controlled board
pub struct FirmwareLoader<'a> {
    bus: &'a mut dyn RegisterBus,
    part: Option<FpgaPart>,
}

impl FirmwareLoader<'_> {
    /// FPGA part the bitstream should target
    pub fn part(&self) -> Option<FpgaPart> {
        self.part
    }

    /// Stream the bitstream at `path` into the FPGA
    ///
    /// See [`program_bitstream`] for the sequence and failure modes.
    pub fn program<P: ProgramProgress + ?Sized>(
        &mut self,
        path: &Path,
        progress: &mut P,
    ) -> Result<ProgramStats> {
        program_bitstream(&mut *self.bus, path, self.part, progress)
    }
}
