//! List commands implementation

use rmesaflash_board::available_buses;

/// List all buses compiled into this binary
pub fn list_buses() {
    let buses = available_buses();

    println!("Available buses:");
    println!();
    if buses.is_empty() {
        println!("  none (recompile with features)");
        return;
    }
    for bus in buses {
        println!("  {:<8} - {}", bus.name, bus.description);
    }
}
