//! Bus registry and initialization
//!
//! This module handles opening buses by name. Everything it returns is a
//! `Box<dyn RegisterBus>`, so callers never see the concrete backend.

use rmesaflash_core::bus::BoxedBus;
use std::collections::HashMap;

/// Parsed bus parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusParams {
    /// Bus name
    pub name: String,
    /// Key-value parameters
    pub params: HashMap<String, String>,
}

/// Parse a device string into bus name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2". Keys may appear once
/// and neither keys nor values may be empty.
///
/// # Example
/// ```ignore
/// let params = parse_bus_params("dummy:board=7i64")?;
/// assert_eq!(params.name, "dummy");
/// assert_eq!(params.params.get("board"), Some(&"7i64".to_string()));
/// ```
pub fn parse_bus_params(s: &str) -> Result<BusParams, Box<dyn std::error::Error>> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    if name.is_empty() {
        return Err(format!("Missing bus name in '{}'", s).into());
    }

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            let Some((key, value)) = opt.split_once('=') else {
                return Err(
                    format!("Invalid parameter format: '{}' (expected key=value)", opt).into(),
                );
            };
            if key.is_empty() || value.is_empty() {
                return Err(format!("Empty key or value in '{}'", opt).into());
            }
            if params.insert(key.to_string(), value.to_string()).is_some() {
                return Err(format!("Parameter '{}' given more than once in '{}'", key, s).into());
            }
        }
    }

    Ok(BusParams {
        name: name.to_string(),
        params,
    })
}

/// A bus ready to be scanned
pub struct OpenedBus {
    /// The bus itself
    pub bus: BoxedBus,
    /// Device address, as shown in board descriptors
    pub address: String,
}

impl std::fmt::Debug for OpenedBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedBus")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Open a bus from a device string
///
/// # Arguments
/// * `device` - Device specification (e.g., "dummy" or "dummy:board=7i64,addr=bus1")
///
/// # Returns
/// The opened bus and the address its boards will report
pub fn open_bus(device: &str) -> Result<OpenedBus, Box<dyn std::error::Error>> {
    let params = parse_bus_params(device)?;

    match params.name.as_str() {
        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&params),

        _ => Err(format!(
            "Unknown bus: {} (available: {})",
            params.name,
            bus_names_short()
        )
        .into()),
    }
}

#[cfg(feature = "dummy")]
fn open_dummy(params: &BusParams) -> Result<OpenedBus, Box<dyn std::error::Error>> {
    use rmesaflash_dummy::{DummyBoard, DummyBus};

    for key in params.params.keys() {
        if !matches!(key.as_str(), "board" | "fpga_size" | "addr") {
            log::warn!("dummy: ignoring unknown parameter '{}'", key);
        }
    }

    let fpga_size: u32 = match params.params.get("fpga_size") {
        Some(v) => v
            .parse()
            .map_err(|_| format!("Invalid fpga_size: '{}' (expected 200 or 400)", v))?,
        None => 200,
    };

    let board = match params.params.get("board").map(String::as_str) {
        Some("7i64") => DummyBoard::Mesa7i64,
        Some("7i43") => DummyBoard::Mesa7i43 { fpga_size },
        None | Some("7i43-cpld") => DummyBoard::Mesa7i43Cpld {
            large: fpga_size == 400,
        },
        Some("foreign") => DummyBoard::Foreign,
        Some(other) => {
            return Err(format!(
                "Unknown dummy board: '{}' (expected 7i64, 7i43, 7i43-cpld or foreign)",
                other
            )
            .into())
        }
    };

    let address = params
        .params
        .get("addr")
        .cloned()
        .unwrap_or_else(|| "dummy".to_string());

    log::info!("Opening dummy bus emulating {:?} at {}", board, address);

    Ok(OpenedBus {
        bus: Box::new(DummyBus::with_board(board)),
        address,
    })
}

/// Information about a bus backend
#[derive(Debug, Clone)]
pub struct BusInfo {
    /// Name used in device strings
    pub name: &'static str,
    /// Short description
    pub description: &'static str,
}

/// Get information about all available buses (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_buses() -> Vec<BusInfo> {
    let mut buses = Vec::new();

    #[cfg(feature = "dummy")]
    buses.push(BusInfo {
        name: "dummy",
        description: "Emulated LBP board (board=<7i64|7i43|7i43-cpld|foreign>,fpga_size=<200|400>,addr=<name>)",
    });

    buses
}

/// Generate a short list of bus names for CLI help
pub fn bus_names_short() -> String {
    let buses = available_buses();
    if buses.is_empty() {
        return "none (recompile with features)".to_string();
    }
    let names: Vec<&str> = buses.iter().map(|b| b.name).collect();
    names.join(", ")
}
