//! Board identification
//!
//! Boards answer a small, order-dependent sequence of probes:
//!
//! 1. LBP cookie. If present, the four name bytes select the board:
//!    - `7I64`: passive I/O board, no controller mode.
//!    - `7I43`: FPGA already configured. The HostMot2 IDROM is then read
//!      (best effort) to find out which part is fitted.
//!    - anything else is ignored.
//! 2. No cookie: ask the CPLD for its status. Bit 0 clear means a 7I43
//!    whose FPGA is waiting for a bitstream; a second command tells the
//!    two part sizes apart. Bit 0 set is ignored.
//!
//! Finding nothing is not an error. Scans routinely run over empty or
//! foreign devices.

use crate::board::{Board, BoardInfo, BoardMode, BoardName, BoardType, FpgaPart};
use crate::bus::{BoxedBus, BusResult, RegisterBus};
use crate::error::Result;
use crate::hostmot2;
use crate::lbp::{self, cpld};
use crate::registry::BoardRegistry;

/// Connector names on the 7I43
const MESA_7I43_CONNECTORS: [&str; 2] = ["P3", "P4"];
/// Pins per 7I43 connector
const MESA_7I43_PINS_PER_CONNECTOR: usize = 24;
/// User LEDs on the 7I43
const MESA_7I43_LEDS: usize = 8;

/// Parameters of one scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    /// Transport address of the device being scanned
    pub device_address: String,
    /// Copied into every descriptor created by the scan
    pub verbose: bool,
}

impl ScanRequest {
    /// Scan the device at `device_address`
    pub fn new(device_address: impl Into<String>) -> Self {
        Self {
            device_address: device_address.into(),
            verbose: false,
        }
    }

    /// Set the verbosity flag
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Outcome of probing one device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identification {
    /// Passive I/O board (7I64)
    PassiveIo {
        /// Board tag
        name: BoardName,
    },
    /// 7I43 with its FPGA configured
    FpgaLoaded {
        /// Board tag
        name: BoardName,
        /// Part from the IDROM, if it could be read
        part: Option<FpgaPart>,
    },
    /// 7I43 with only the CPLD answering
    CpldOnly {
        /// Board tag
        name: BoardName,
        /// Part reported by the CPLD
        part: FpgaPart,
    },
    /// No known board answered
    Unrecognized,
}

/// Probe the device on `bus`
///
/// Transport failures during probing count as "nothing recognized".
pub fn identify<B: RegisterBus + ?Sized>(bus: &mut B) -> Identification {
    match probe(bus) {
        Ok(id) => id,
        Err(e) => {
            log::debug!("identify: probe aborted: {}", e);
            Identification::Unrecognized
        }
    }
}

fn probe<B: RegisterBus + ?Sized>(bus: &mut B) -> BusResult<Identification> {
    let cookie = match bus.read_ctrl(lbp::CMD_READ_COOKIE) {
        Ok(cookie) => Some(cookie),
        Err(e) => {
            log::debug!("identify: no LBP cookie ({}), trying CPLD", e);
            None
        }
    };

    if cookie == Some(lbp::COOKIE) {
        let mut tag = [0u8; 4];
        for (byte, cmd) in tag.iter_mut().zip(lbp::CMD_READ_DEV_NAME) {
            *byte = bus.read_ctrl(cmd)?;
        }
        let name = BoardName::new(tag);
        log::debug!("identify: LBP device name {}", name);

        return Ok(match name {
            BoardName::MESA_7I64 => Identification::PassiveIo { name },
            BoardName::MESA_7I43 => {
                let part = probe_fpga_part(bus).unwrap_or_else(|e| {
                    log::warn!("{}: can't read IDROM: {}", name, e);
                    None
                });
                Identification::FpgaLoaded { name, part }
            }
            _ => {
                log::debug!("identify: ignoring unsupported device {}", name);
                Identification::Unrecognized
            }
        });
    }

    let status = bus.read_ctrl(cpld::CMD_STATUS)?;
    if status & cpld::STATUS_BIT != 0 {
        log::debug!("identify: CPLD status 0x{:02X}, not a 7I43", status);
        return Ok(Identification::Unrecognized);
    }

    let size = bus.read_ctrl(cpld::CMD_PART)?;
    let part = if size & cpld::STATUS_BIT != 0 {
        FpgaPart::Xc3s400Tq144
    } else {
        FpgaPart::Xc3s200Tq144
    };

    Ok(Identification::CpldOnly {
        name: BoardName::MESA_7I43,
        part,
    })
}

/// Read the fitted part from the HostMot2 IDROM
///
/// `Ok(None)` if the FPGA doesn't carry a HostMot2 cookie.
pub fn probe_fpga_part<B: RegisterBus + ?Sized>(bus: &mut B) -> BusResult<Option<FpgaPart>> {
    let cookie = bus.register_read(hostmot2::COOKIE_REG)?;
    if cookie != hostmot2::COOKIE {
        log::debug!("identify: no HostMot2 cookie (read 0x{:08X})", cookie);
        return Ok(None);
    }

    let idrom = bus.register_read(hostmot2::IDROM_ADDR_REG)?;
    let size_addr =
        ((idrom & hostmot2::ADDR_MASK) + hostmot2::IDROM_FPGA_SIZE_OFFSET) & hostmot2::ADDR_MASK;
    let fpga_size = bus.register_read(size_addr)?;
    log::debug!(
        "identify: IDROM at 0x{:04X}, fpga_size {}",
        idrom & hostmot2::ADDR_MASK,
        fpga_size
    );

    Ok(Some(FpgaPart::from_idrom_size(fpga_size)))
}

fn mesa_7i43(request: &ScanRequest, mode: BoardMode, part: Option<FpgaPart>) -> BoardInfo {
    let mut info = BoardInfo::new(
        BoardName::MESA_7I43,
        request.device_address.clone(),
        request.verbose,
    );
    info.mode = mode;
    info.num_io_connectors = MESA_7I43_CONNECTORS.len();
    info.pins_per_connector = MESA_7I43_PINS_PER_CONNECTOR;
    info.connector_names = MESA_7I43_CONNECTORS.to_vec();
    info.num_leds = MESA_7I43_LEDS;
    info.fpga_part = part;
    info
}

/// Build the descriptor for an identification result
pub fn describe(id: Identification, request: &ScanRequest) -> Option<BoardInfo> {
    match id {
        Identification::PassiveIo { name } => {
            let mut info =
                BoardInfo::new(name, request.device_address.clone(), request.verbose);
            info.board_type = BoardType::Usb;
            Some(info)
        }
        Identification::FpgaLoaded { part, .. } => {
            Some(mesa_7i43(request, BoardMode::FpgaControlled, part))
        }
        Identification::CpldOnly { part, .. } => {
            Some(mesa_7i43(request, BoardMode::CpldControlled, Some(part)))
        }
        Identification::Unrecognized => None,
    }
}

/// Identify the device on `bus` and register it
///
/// Returns `Ok(None)` and releases the bus if nothing was recognized.
/// Fails only if the registry is full.
pub fn scan<'r>(
    mut bus: BoxedBus,
    request: &ScanRequest,
    registry: &'r mut BoardRegistry,
) -> Result<Option<&'r mut Board>> {
    let id = identify(&mut *bus);

    let Some(info) = describe(id, request) else {
        log::debug!("no board recognized at {}", request.device_address);
        bus.release();
        return Ok(None);
    };

    log::info!(
        "Found {} ({:?}) at {}",
        info.name,
        info.mode,
        info.device_address
    );

    let board = Board::new(info, bus);
    registry.push(board).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Capabilities;
    use crate::bus::BusError;
    use crate::error::Error;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Default)]
    struct Script {
        ctrl: HashMap<u8, u8>,
        regs: HashMap<u32, u32>,
        failing_regs: Vec<u32>,
        last_cmd: Option<u8>,
        sent: Vec<u8>,
        releases: usize,
    }

    #[derive(Clone, Default)]
    struct ScriptedBus(Rc<RefCell<Script>>);

    impl RegisterBus for ScriptedBus {
        fn register_read(&mut self, addr: u32) -> BusResult<u32> {
            let s = self.0.borrow();
            if s.failing_regs.contains(&addr) {
                return Err(BusError::Timeout);
            }
            Ok(s.regs.get(&addr).copied().unwrap_or(0))
        }

        fn register_write(&mut self, addr: u32, value: u32) -> BusResult<()> {
            self.0.borrow_mut().regs.insert(addr, value);
            Ok(())
        }

        fn raw_send(&mut self, data: &[u8]) -> BusResult<()> {
            let mut s = self.0.borrow_mut();
            s.sent.extend_from_slice(data);
            s.last_cmd = data.last().copied();
            Ok(())
        }

        fn raw_recv(&mut self, count: usize) -> BusResult<Vec<u8>> {
            let s = self.0.borrow();
            let cmd = s.last_cmd.ok_or(BusError::Timeout)?;
            let byte = *s.ctrl.get(&cmd).ok_or(BusError::Timeout)?;
            Ok(vec![byte; count])
        }

        fn release(&mut self) {
            self.0.borrow_mut().releases += 1;
        }
    }

    impl ScriptedBus {
        fn lbp(name: &[u8; 4]) -> Self {
            let bus = Self::default();
            {
                let mut s = bus.0.borrow_mut();
                s.ctrl.insert(lbp::CMD_READ_COOKIE, lbp::COOKIE);
                for (cmd, &b) in lbp::CMD_READ_DEV_NAME.iter().zip(name) {
                    s.ctrl.insert(*cmd, b);
                }
            }
            bus
        }

        fn with_idrom(self, fpga_size: u32) -> Self {
            {
                let mut s = self.0.borrow_mut();
                s.regs.insert(hostmot2::COOKIE_REG, hostmot2::COOKIE);
                s.regs.insert(hostmot2::IDROM_ADDR_REG, 0x0400);
                s.regs
                    .insert(0x0400 + hostmot2::IDROM_FPGA_SIZE_OFFSET, fpga_size);
            }
            self
        }

        fn cpld(status: u8, part: u8) -> Self {
            let bus = Self::default();
            {
                let mut s = bus.0.borrow_mut();
                s.ctrl.insert(lbp::CMD_READ_COOKIE, 0x00);
                s.ctrl.insert(cpld::CMD_STATUS, status);
                s.ctrl.insert(cpld::CMD_PART, part);
            }
            bus
        }
    }

    fn request() -> ScanRequest {
        ScanRequest::new("usb:0403:6001").verbose(true)
    }

    #[test]
    fn test_passive_io_board() {
        let bus = ScriptedBus::lbp(b"7I64");
        let mut reg = BoardRegistry::new();

        let board = scan(Box::new(bus), &request(), &mut reg).unwrap().unwrap();
        let info = board.info();
        assert_eq!(info.name, BoardName::MESA_7I64);
        assert_eq!(info.board_type, BoardType::Usb);
        assert_eq!(info.mode, BoardMode::Unknown);
        assert_eq!(info.device_address, "usb:0403:6001");
        assert!(info.verbose);
        assert!(!board.capabilities().contains(Capabilities::PROGRAM_FIRMWARE));
        assert!(board.firmware().is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_fpga_board_with_idrom() {
        let bus = ScriptedBus::lbp(b"7I43").with_idrom(400);
        let mut reg = BoardRegistry::new();

        let board = scan(Box::new(bus), &request(), &mut reg).unwrap().unwrap();
        let info = board.info().clone();
        assert_eq!(info.mode, BoardMode::FpgaControlled);
        assert_eq!(info.num_io_connectors, 2);
        assert_eq!(info.pins_per_connector, 24);
        assert_eq!(info.connector_names, ["P3", "P4"]);
        assert_eq!(info.num_leds, 8);
        assert_eq!(info.fpga_part, Some(FpgaPart::Xc3s400Tq144));
        assert_eq!(board.capabilities(), Capabilities::REGISTERS);
        assert!(board.firmware().is_none());
    }

    #[test]
    fn test_idrom_size_exact_match_only() {
        for (size, part) in [
            (400, FpgaPart::Xc3s400Tq144),
            (200, FpgaPart::Xc3s200Tq144),
            (399, FpgaPart::Xc3s200Tq144),
            (1000, FpgaPart::Xc3s200Tq144),
        ] {
            let mut bus = ScriptedBus::lbp(b"7I43").with_idrom(size);
            assert_eq!(
                identify(&mut bus),
                Identification::FpgaLoaded {
                    name: BoardName::MESA_7I43,
                    part: Some(part)
                }
            );
        }
    }

    #[test]
    fn test_idrom_size_address_wraps_in_window() {
        let mut bus = ScriptedBus::lbp(b"7I43");
        {
            let mut s = bus.0.borrow_mut();
            s.regs.insert(hostmot2::COOKIE_REG, hostmot2::COOKIE);
            s.regs.insert(hostmot2::IDROM_ADDR_REG, 0x0001_FFF0);
            // 0xFFF0 + 20 wraps to 0x0004
            s.regs.insert(0x0004, 400);
            s.failing_regs.push(0x0001_0004);
        }

        assert_eq!(probe_fpga_part(&mut bus).unwrap(), Some(FpgaPart::Xc3s400Tq144));
    }

    #[test]
    fn test_fpga_board_without_hostmot2() {
        let mut bus = ScriptedBus::lbp(b"7I43");
        assert_eq!(
            identify(&mut bus),
            Identification::FpgaLoaded {
                name: BoardName::MESA_7I43,
                part: None
            }
        );
    }

    #[test]
    fn test_idrom_failure_keeps_classification() {
        let bus = ScriptedBus::lbp(b"7I43").with_idrom(400);
        bus.0.borrow_mut().failing_regs.push(hostmot2::IDROM_ADDR_REG);
        let mut reg = BoardRegistry::new();

        let board = scan(Box::new(bus), &request(), &mut reg).unwrap().unwrap();
        assert_eq!(board.info().mode, BoardMode::FpgaControlled);
        assert_eq!(board.info().fpga_part, None);
    }

    #[test]
    fn test_cpld_board() {
        let bus = ScriptedBus::cpld(0x00, 0x01);
        let state = bus.0.clone();
        let mut reg = BoardRegistry::new();

        let board = scan(Box::new(bus), &request(), &mut reg).unwrap().unwrap();
        assert_eq!(board.info().name, BoardName::MESA_7I43);
        assert_eq!(board.info().mode, BoardMode::CpldControlled);
        assert_eq!(board.info().fpga_part, Some(FpgaPart::Xc3s400Tq144));
        assert_eq!(board.info().num_io_connectors, 2);
        assert!(board
            .capabilities()
            .contains(Capabilities::PROGRAM_FIRMWARE));
        assert!(board.firmware().is_some());

        // Cookie probe, then status and part commands
        assert_eq!(
            state.borrow().sent,
            [lbp::CMD_READ_COOKIE, cpld::CMD_STATUS, cpld::CMD_PART]
        );
    }

    #[test]
    fn test_cpld_small_part() {
        let mut bus = ScriptedBus::cpld(0xFE, 0xFE);
        assert_eq!(
            identify(&mut bus),
            Identification::CpldOnly {
                name: BoardName::MESA_7I43,
                part: FpgaPart::Xc3s200Tq144
            }
        );
    }

    #[test]
    fn test_cpld_without_cookie_answer() {
        let mut bus = ScriptedBus::cpld(0x00, 0x00);
        bus.0.borrow_mut().ctrl.remove(&lbp::CMD_READ_COOKIE);
        assert!(matches!(
            identify(&mut bus),
            Identification::CpldOnly { .. }
        ));
    }

    #[test]
    fn test_cpld_status_set_is_ignored() {
        let bus = ScriptedBus::cpld(0x01, 0x01);
        let state = bus.0.clone();
        let mut reg = BoardRegistry::new();

        assert!(scan(Box::new(bus), &request(), &mut reg).unwrap().is_none());
        assert_eq!(reg.len(), 0);
        assert_eq!(state.borrow().releases, 1);
        // Part query never issued
        assert!(!state.borrow().sent.contains(&cpld::CMD_PART));
    }

    #[test]
    fn test_unknown_lbp_device_is_ignored() {
        let bus = ScriptedBus::lbp(b"7I90");
        let state = bus.0.clone();
        let mut reg = BoardRegistry::new();

        assert!(scan(Box::new(bus), &request(), &mut reg).unwrap().is_none());
        assert!(reg.is_empty());
        assert_eq!(state.borrow().releases, 1);
        // No fallback to the CPLD probe
        assert!(!state.borrow().sent.contains(&cpld::CMD_STATUS));
    }

    #[test]
    fn test_silent_bus() {
        let mut reg = BoardRegistry::new();
        let result = scan(Box::new(ScriptedBus::default()), &request(), &mut reg);
        assert!(result.unwrap().is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_registry_full() {
        let mut reg = BoardRegistry::with_capacity(1);
        scan(Box::new(ScriptedBus::lbp(b"7I64")), &request(), &mut reg).unwrap();

        let err = scan(Box::new(ScriptedBus::lbp(b"7I43")), &request(), &mut reg).unwrap_err();
        assert!(matches!(err, Error::RegistryFull { capacity: 1 }));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_describe_unrecognized() {
        assert!(describe(Identification::Unrecognized, &request()).is_none());
    }
}
