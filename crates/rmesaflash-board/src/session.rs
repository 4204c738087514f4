//! Multi-device scan session

use crate::registry::open_bus;
use rmesaflash_core::identify::{scan, ScanRequest};
use rmesaflash_core::registry::{BoardRegistry, MAX_BOARDS};
use rmesaflash_core::Result;

/// Options for [`scan_devices`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Copied into every board descriptor
    pub verbose: bool,
    /// Registry capacity
    pub max_boards: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            max_boards: MAX_BOARDS,
        }
    }
}

/// Open and scan each device in order
///
/// Devices that fail to open are logged and skipped, as are devices where
/// no board answers. Running out of registry space aborts the session.
pub fn scan_devices(devices: &[String], options: &ScanOptions) -> Result<BoardRegistry> {
    let mut registry = BoardRegistry::with_capacity(options.max_boards);

    for device in devices {
        let opened = match open_bus(device) {
            Ok(opened) => opened,
            Err(e) => {
                log::warn!("Skipping {}: {}", device, e);
                continue;
            }
        };

        let request = ScanRequest::new(opened.address).verbose(options.verbose);
        if scan(opened.bus, &request, &mut registry)?.is_none() {
            log::info!("No board found on {}", device);
        }
    }

    log::debug!("Scan finished, {} board(s) registered", registry.len());
    Ok(registry)
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use rmesaflash_core::board::{BoardMode, BoardName, FpgaPart};
    use rmesaflash_core::program::NoProgress;
    use rmesaflash_core::Error;

    fn devices(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scan_mixed_devices() {
        let list = devices(&[
            "dummy:board=7i64,addr=bus0",
            "nosuchbus",
            "dummy:board=foreign,addr=bus1",
            "dummy:board=7i43,fpga_size=400,addr=bus2",
            "dummy:board=7i43-cpld,addr=bus3",
        ]);
        let options = ScanOptions {
            verbose: true,
            ..ScanOptions::default()
        };

        let boards = scan_devices(&list, &options).unwrap();
        let found: Vec<_> = boards
            .iter()
            .map(|b| (b.info().name, b.info().mode, b.info().device_address.clone()))
            .collect();
        assert_eq!(
            found,
            [
                (BoardName::MESA_7I64, BoardMode::Unknown, "bus0".to_string()),
                (BoardName::MESA_7I43, BoardMode::FpgaControlled, "bus2".to_string()),
                (BoardName::MESA_7I43, BoardMode::CpldControlled, "bus3".to_string()),
            ]
        );
        assert!(boards.iter().all(|b| b.info().verbose));
        assert_eq!(
            boards.get(1).and_then(|b| b.info().fpga_part),
            Some(FpgaPart::Xc3s400Tq144)
        );
    }

    #[test]
    fn test_scan_overflows_registry() {
        let list = devices(&["dummy:board=7i64", "dummy:board=7i43"]);
        let options = ScanOptions {
            max_boards: 1,
            ..ScanOptions::default()
        };

        let err = scan_devices(&list, &options).unwrap_err();
        assert!(matches!(err, Error::RegistryFull { capacity: 1 }));
    }

    #[test]
    fn test_scan_then_program() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.bin");
        let mut image = vec![0xFF; 4];
        image.extend((0u8..=255).cycle().take(10_000));
        std::fs::write(&path, &image).unwrap();

        let mut boards =
            scan_devices(&devices(&["dummy:board=7i43-cpld"]), &ScanOptions::default()).unwrap();
        let board = boards.find(BoardName::MESA_7I43).unwrap();
        let stats = board
            .firmware()
            .unwrap()
            .program(&path, &mut NoProgress)
            .unwrap();

        assert_eq!(stats.bytes_sent, image.len() as u64);
        assert_eq!(stats.chunks, 2);
    }
}
