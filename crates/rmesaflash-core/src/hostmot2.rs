//! HostMot2 register map (the subset needed for identification)

/// Address of the HostMot2 cookie register
pub const COOKIE_REG: u32 = 0x0100;

/// Expected contents of [`COOKIE_REG`] on a configured FPGA
pub const COOKIE: u32 = 0x55AA_CAFE;

/// Register holding the address of the IDROM descriptor
pub const IDROM_ADDR_REG: u32 = 0x010C;

/// Byte offset of `fpga_size` inside the IDROM descriptor
///
/// Layout: idrom_type, offset_to_modules, offset_to_pins (u32 each),
/// board_name (8 bytes), fpga_size.
pub const IDROM_FPGA_SIZE_OFFSET: u32 = 20;

/// Registers are addressed through a 16-bit window
pub const ADDR_MASK: u32 = 0xFFFF;
