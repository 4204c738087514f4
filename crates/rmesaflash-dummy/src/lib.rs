//! rmesaflash-dummy - Emulated LBP board
//!
//! This crate provides a bus that behaves like a board attached over LBP.
//! It answers the identification probes, keeps a small register file and
//! captures configuration data sent to a CPLD-controlled board. It's useful
//! for testing and development without real hardware.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use rmesaflash_core::bus::{BusError, BusResult, RegisterBus};
use rmesaflash_core::hostmot2;
use rmesaflash_core::lbp::{self, cpld};
use rmesaflash_core::program::PRIMING_COUNT;

/// IDROM location in the emulated HostMot2 register file
const IDROM_BASE: u32 = 0x0400;

/// Which board to emulate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DummyBoard {
    /// 7I64 passive I/O board
    Mesa7i64,
    /// 7I43 with a configured FPGA running HostMot2
    Mesa7i43 {
        /// `fpga_size` reported by the IDROM
        fpga_size: u32,
    },
    /// 7I43 waiting for a bitstream
    Mesa7i43Cpld {
        /// Whether the CPLD reports the larger FPGA
        large: bool,
    },
    /// LBP device with a name this tool doesn't support
    OtherLbp {
        /// Device name
        name: [u8; 4],
    },
    /// Something that answers, but speaks neither LBP nor the CPLD protocol
    Foreign,
}

/// Configuration for the emulated board
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Board to emulate
    pub board: DummyBoard,
    /// Fail every raw send after this many succeeded
    pub fail_after_sends: Option<usize>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            board: DummyBoard::Mesa7i43Cpld { large: false },
            fail_after_sends: None,
        }
    }
}

impl DummyConfig {
    /// Emulate `board` with no fault injection
    pub fn new(board: DummyBoard) -> Self {
        Self {
            board,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
struct DummyState {
    config: DummyConfig,
    regs: HashMap<u32, u32>,
    replies: VecDeque<u8>,
    unacked_primes: usize,
    configuring: bool,
    config_data: Vec<u8>,
    sends: usize,
    releases: usize,
}

/// Emulated LBP board
///
/// Clones share the same emulated board, so a test can keep one handle
/// while another is owned by a `Board`.
#[derive(Debug, Clone)]
pub struct DummyBus {
    state: Rc<RefCell<DummyState>>,
}

impl DummyBus {
    /// Create a new emulated board
    pub fn new(config: DummyConfig) -> Self {
        let mut regs = HashMap::new();
        if let DummyBoard::Mesa7i43 { fpga_size } = config.board {
            regs.insert(hostmot2::COOKIE_REG, hostmot2::COOKIE);
            regs.insert(hostmot2::IDROM_ADDR_REG, IDROM_BASE);
            regs.insert(IDROM_BASE + hostmot2::IDROM_FPGA_SIZE_OFFSET, fpga_size);
        }

        Self {
            state: Rc::new(RefCell::new(DummyState {
                config,
                regs,
                replies: VecDeque::new(),
                unacked_primes: 0,
                configuring: false,
                config_data: Vec::new(),
                sends: 0,
                releases: 0,
            })),
        }
    }

    /// Emulate `board` with default settings
    pub fn with_board(board: DummyBoard) -> Self {
        Self::new(DummyConfig::new(board))
    }

    /// Configuration bytes received so far, exactly as sent
    pub fn config_data(&self) -> Vec<u8> {
        self.state.borrow().config_data.clone()
    }

    /// Whether the priming sequence has been seen
    pub fn is_configuring(&self) -> bool {
        self.state.borrow().configuring
    }

    /// Number of times `release` was called
    pub fn releases(&self) -> usize {
        self.state.borrow().releases
    }

    /// Board being emulated
    pub fn board(&self) -> DummyBoard {
        self.state.borrow().config.board
    }
}

impl DummyState {
    fn check_open(&self) -> BusResult<()> {
        if self.releases > 0 {
            return Err(BusError::Released);
        }
        Ok(())
    }

    fn lbp_name(&self) -> Option<[u8; 4]> {
        match self.config.board {
            DummyBoard::Mesa7i64 => Some(*b"7I64"),
            DummyBoard::Mesa7i43 { .. } => Some(*b"7I43"),
            DummyBoard::OtherLbp { name } => Some(name),
            DummyBoard::Mesa7i43Cpld { .. } | DummyBoard::Foreign => None,
        }
    }

    fn handle_command(&mut self, cmd: u8) {
        if let Some(name) = self.lbp_name() {
            if cmd == lbp::CMD_READ_COOKIE {
                self.replies.push_back(lbp::COOKIE);
            } else if let Some(i) = lbp::CMD_READ_DEV_NAME.iter().position(|&c| c == cmd) {
                self.replies.push_back(name[i]);
            } else {
                log::trace!("dummy: LBP command 0x{:02X} ignored", cmd);
            }
            return;
        }

        match (self.config.board, cmd) {
            (DummyBoard::Mesa7i43Cpld { .. }, cpld::CMD_STATUS) => {
                self.unacked_primes = 0;
                self.replies.push_back(0x00);
            }
            (DummyBoard::Mesa7i43Cpld { large }, cpld::CMD_PART) => {
                self.unacked_primes += 1;
                if self.unacked_primes >= PRIMING_COUNT {
                    log::debug!("dummy: CPLD primed, expecting configuration data");
                    self.configuring = true;
                    self.replies.clear();
                } else {
                    self.replies.push_back(if large { cpld::STATUS_BIT } else { 0x00 });
                }
            }
            (DummyBoard::Mesa7i43Cpld { .. }, _) => {
                // Unknown CPLD command, echo garbage without the status bit
                self.replies.push_back(0xFE);
            }
            (_, cpld::CMD_STATUS) => self.replies.push_back(0xFF),
            _ => self.replies.push_back(0x00),
        }
    }
}

impl RegisterBus for DummyBus {
    fn register_read(&mut self, addr: u32) -> BusResult<u32> {
        let state = self.state.borrow();
        state.check_open()?;
        if addr % 4 != 0 {
            return Err(BusError::Misaligned { addr });
        }
        Ok(state.regs.get(&addr).copied().unwrap_or(0))
    }

    fn register_write(&mut self, addr: u32, value: u32) -> BusResult<()> {
        let mut state = self.state.borrow_mut();
        state.check_open()?;
        if addr % 4 != 0 {
            return Err(BusError::Misaligned { addr });
        }
        state.regs.insert(addr, value);
        Ok(())
    }

    fn raw_send(&mut self, data: &[u8]) -> BusResult<()> {
        let mut state = self.state.borrow_mut();
        state.check_open()?;

        if let Some(limit) = state.config.fail_after_sends {
            if state.sends >= limit {
                return Err(BusError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "dummy: injected send failure",
                )));
            }
        }
        state.sends += 1;

        if state.configuring {
            state.config_data.extend_from_slice(data);
            return Ok(());
        }

        for &cmd in data {
            state.handle_command(cmd);
        }
        Ok(())
    }

    fn raw_recv(&mut self, count: usize) -> BusResult<Vec<u8>> {
        let mut state = self.state.borrow_mut();
        state.check_open()?;
        state.unacked_primes = 0;

        let got = count.min(state.replies.len());
        if got < count {
            state.replies.clear();
            return Err(BusError::ShortRead {
                expected: count,
                got,
            });
        }
        Ok(state.replies.drain(..count).collect())
    }

    fn release(&mut self) {
        let mut state = self.state.borrow_mut();
        state.releases += 1;
        log::debug!("dummy: released ({} times)", state.releases);
    }
}
