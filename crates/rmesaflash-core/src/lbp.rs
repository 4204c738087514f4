//! LBP (Local Bus Protocol) control bytes
//!
//! These are the single-byte commands used during identification and by the
//! CPLD on boards whose FPGA has not been configured yet.

/// Value returned by [`CMD_READ_COOKIE`] on an LBP-capable unit
pub const COOKIE: u8 = 0x5A;

/// Read the LBP cookie
pub const CMD_READ_COOKIE: u8 = 0xDF;

/// Read the four device name characters
pub const CMD_READ_DEV_NAME: [u8; 4] = [0xD0, 0xD1, 0xD2, 0xD3];

/// CPLD commands, sent when the LBP cookie is absent
pub mod cpld {
    /// Query status; bit 0 clear means the FPGA is not configured
    pub const CMD_STATUS: u8 = b'1';
    /// Query the fitted FPGA; bit 0 set means the larger part.
    /// Also used as the configuration priming byte.
    pub const CMD_PART: u8 = b'0';
    /// Bit reported by both commands above
    pub const STATUS_BIT: u8 = 0x01;
}
