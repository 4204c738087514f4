//! Bitfile info command implementation

use rmesaflash_core::bitfile::{BitfileFormat, BitfileHeader};
use std::fs::File;
use std::io::Seek;
use std::path::Path;

/// Print the header fields of a bitstream
pub fn print_header(header: &BitfileHeader) {
    match header.format {
        BitfileFormat::Bin => println!("Raw .bin image (no header)"),
        BitfileFormat::Bit => {
            let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
            println!("Design name: {}", field(&header.design_name));
            println!("Part name:   {}", field(&header.part_name));
            println!("Date:        {}", field(&header.date));
            println!("Time:        {}", field(&header.time));
            if let Some(len) = header.data_length {
                println!("Data length: {} bytes", len);
            }
        }
    }
}

/// Run the bitfile-info command
pub fn run_info(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut file =
        File::open(path).map_err(|e| format!("Can't open {}: {}", path.display(), e))?;
    let header = BitfileHeader::read_from(&mut file)
        .map_err(|e| format!("{}: {}", path.display(), e))?;

    let payload = file
        .metadata()?
        .len()
        .saturating_sub(file.stream_position()?);

    println!("{}:", path.display());
    print_header(&header);
    println!("Payload:     {} bytes", payload);
    if let Some(len) = header.data_length {
        if u64::from(len) != payload {
            log::warn!(
                "header says {} bytes, {} bytes follow it",
                len,
                payload
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_on_bin_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.bin");
        std::fs::write(&path, [0xFF, 0xFF, 0xFF, 0xFF, 0xAA, 0x99]).unwrap();

        assert!(run_info(&path).is_ok());
    }

    #[test]
    fn test_info_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello world").unwrap();

        let err = run_info(&path).unwrap_err();
        assert!(err.to_string().contains("notes.txt"));
        assert!(run_info(&dir.path().join("missing.bit")).is_err());
    }
}
