//! Bitstream files
//!
//! Two formats are accepted:
//!
//! - Xilinx `.bit` containers: a small tagged header (design name, part,
//!   date, time, payload length) followed by the configuration payload.
//! - Raw `.bin` images: payload only, recognised by the `FF FF FF FF` sync
//!   padding at the start.
//!
//! The device shifts configuration data in LSB first while the files store
//! it MSB first, so every payload byte goes through [`reverse_bits`] before
//! it is sent.

use std::io::{self, Read, Seek, SeekFrom};

use thiserror::Error;

/// Field length word and magic at the start of a `.bit` file
const BIT_MAGIC: [u8; 9] = [0x0F, 0xF0, 0x0F, 0xF0, 0x0F, 0xF0, 0x0F, 0xF0, 0x00];

/// Sync padding that starts a `.bin` image
const BIN_PREAMBLE: [u8; 4] = [0xFF; 4];

/// Section keys of the `.bit` header
mod section {
    pub const DESIGN_NAME: u8 = b'a';
    pub const PART_NAME: u8 = b'b';
    pub const DATE: u8 = b'c';
    pub const TIME: u8 = b'd';
    pub const DATA: u8 = b'e';
}

/// Reverse the bit order of a byte (bit 7 becomes bit 0)
#[inline]
pub const fn reverse_bits(byte: u8) -> u8 {
    byte.reverse_bits()
}

/// Apply [`reverse_bits`] to every byte of `buf`
pub fn reverse_bits_in_place(buf: &mut [u8]) {
    for byte in buf.iter_mut() {
        *byte = reverse_bits(*byte);
    }
}

/// Errors while reading a bitstream header
#[derive(Debug, Error)]
pub enum BitfileError {
    /// Underlying read failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// File ended inside the header
    #[error("file too short")]
    Truncated,

    /// Neither a `.bit` container nor a `.bin` image
    #[error("invalid bitfile header")]
    UnknownFormat,

    /// Looked like a `.bit` file but the magic did not match
    #[error("bad .bit magic")]
    BadMagic,

    /// Header contained a section key we don't know
    #[error("unknown header section 0x{0:02X}")]
    UnknownSection(u8),
}

/// Container format of a bitstream file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitfileFormat {
    /// Xilinx `.bit` with metadata header
    Bit,
    /// Raw configuration image
    Bin,
}

/// Metadata from the start of a bitstream file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitfileHeader {
    /// Container format
    pub format: BitfileFormat,
    /// Design name (section `a`)
    pub design_name: Option<String>,
    /// FPGA part name, e.g. `3s200tq144` (section `b`)
    pub part_name: Option<String>,
    /// Build date (section `c`)
    pub date: Option<String>,
    /// Build time (section `d`)
    pub time: Option<String>,
    /// Payload length in bytes (section `e`)
    pub data_length: Option<u32>,
}

impl BitfileHeader {
    fn bin() -> Self {
        Self {
            format: BitfileFormat::Bin,
            design_name: None,
            part_name: None,
            date: None,
            time: None,
            data_length: None,
        }
    }

    /// Read the header and leave `reader` at the first payload byte
    ///
    /// For `.bin` images the reader is rewound to the start, since the
    /// whole file is payload.
    pub fn read_from<R: Read + Seek>(reader: &mut R) -> Result<Self, BitfileError> {
        let mut start = [0u8; 4];
        read_exact(reader, &mut start)?;

        if start == BIN_PREAMBLE {
            reader.seek(SeekFrom::Start(0))?;
            return Ok(Self::bin());
        }

        if start[0..2] != [0x00, 0x09] {
            return Err(BitfileError::UnknownFormat);
        }

        let mut magic = [0u8; 9];
        magic[0..2].copy_from_slice(&start[2..4]);
        read_exact(reader, &mut magic[2..])?;
        if magic != BIT_MAGIC {
            return Err(BitfileError::BadMagic);
        }

        // Length word of the (single byte) key field that follows
        let _ = read_u16(reader)?;

        let mut header = Self {
            format: BitfileFormat::Bit,
            ..Self::bin()
        };

        loop {
            let mut key = [0u8; 1];
            read_exact(reader, &mut key)?;
            match key[0] {
                section::DESIGN_NAME => header.design_name = Some(read_string(reader)?),
                section::PART_NAME => header.part_name = Some(read_string(reader)?),
                section::DATE => header.date = Some(read_string(reader)?),
                section::TIME => header.time = Some(read_string(reader)?),
                section::DATA => {
                    header.data_length = Some(read_u32(reader)?);
                    break;
                }
                other => return Err(BitfileError::UnknownSection(other)),
            }
        }

        log::debug!(
            "bitfile: design={:?} part={:?} length={:?}",
            header.design_name,
            header.part_name,
            header.data_length
        );

        Ok(header)
    }
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), BitfileError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => BitfileError::Truncated,
        _ => BitfileError::Io(e),
    })
}

fn read_u16<R: Read>(reader: &mut R) -> Result<u16, BitfileError> {
    let mut buf = [0u8; 2];
    read_exact(reader, &mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32, BitfileError> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

/// Read a length-prefixed, NUL-terminated string
fn read_string<R: Read>(reader: &mut R) -> Result<String, BitfileError> {
    let len = read_u16(reader)? as usize;
    let mut buf = vec![0u8; len];
    read_exact(reader, &mut buf)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Build a `.bit` file with the given part name around `payload`
    pub(crate) fn make_bitfile(part: &str, payload: &[u8]) -> Vec<u8> {
        fn field(out: &mut Vec<u8>, key: u8, value: &str) {
            out.push(key);
            out.extend_from_slice(&((value.len() + 1) as u16).to_be_bytes());
            out.extend_from_slice(value.as_bytes());
            out.push(0);
        }

        let mut out = vec![0x00, 0x09];
        out.extend_from_slice(&BIT_MAGIC);
        out.extend_from_slice(&[0x00, 0x01]);
        field(&mut out, b'a', "7i43_test.ncd;UserID=0xFFFFFFFF");
        field(&mut out, b'b', part);
        field(&mut out, b'c', "2013/05/21");
        field(&mut out, b'd', "11:38:07");
        out.push(b'e');
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_reverse_bits_table() {
        assert_eq!(reverse_bits(0x00), 0x00);
        assert_eq!(reverse_bits(0xFF), 0xFF);
        assert_eq!(reverse_bits(0x01), 0x80);
        assert_eq!(reverse_bits(0x80), 0x01);
        assert_eq!(reverse_bits(0x0F), 0xF0);
        assert_eq!(reverse_bits(0xAA), 0x55);
        assert_eq!(reverse_bits(0x12), 0x48);
    }

    #[test]
    fn test_reverse_bits_involution() {
        for b in 0..=u8::MAX {
            assert_eq!(reverse_bits(reverse_bits(b)), b);
        }
    }

    #[test]
    fn test_reverse_bits_in_place() {
        let mut buf = [0x01, 0x02, 0xC0];
        reverse_bits_in_place(&mut buf);
        assert_eq!(buf, [0x80, 0x40, 0x03]);
    }

    #[test]
    fn test_parse_bit_header() {
        let data = make_bitfile("3s200tq144", &[0xAA, 0x99, 0x55, 0x66]);
        let mut cursor = Cursor::new(data);
        let header = BitfileHeader::read_from(&mut cursor).unwrap();

        assert_eq!(header.format, BitfileFormat::Bit);
        assert_eq!(header.part_name.as_deref(), Some("3s200tq144"));
        assert_eq!(header.date.as_deref(), Some("2013/05/21"));
        assert_eq!(header.time.as_deref(), Some("11:38:07"));
        assert_eq!(header.data_length, Some(4));

        // Reader sits on the payload
        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, [0xAA, 0x99, 0x55, 0x66]);
    }

    #[test]
    fn test_parse_bin_rewinds() {
        let data = vec![0xFF, 0xFF, 0xFF, 0xFF, 0xAA, 0x99];
        let mut cursor = Cursor::new(data.clone());
        let header = BitfileHeader::read_from(&mut cursor).unwrap();

        assert_eq!(header.format, BitfileFormat::Bin);
        assert!(header.part_name.is_none());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_unknown_format() {
        let mut cursor = Cursor::new(vec![0x12, 0x34, 0x56, 0x78, 0x9A]);
        let err = BitfileHeader::read_from(&mut cursor).unwrap_err();
        assert!(matches!(err, BitfileError::UnknownFormat));
    }

    #[test]
    fn test_truncated_header() {
        let data = make_bitfile("3s400tq144", &[]);
        let mut cursor = Cursor::new(data[..20].to_vec());
        let err = BitfileHeader::read_from(&mut cursor).unwrap_err();
        assert!(matches!(err, BitfileError::Truncated));

        let mut cursor = Cursor::new(vec![0x00]);
        let err = BitfileHeader::read_from(&mut cursor).unwrap_err();
        assert!(matches!(err, BitfileError::Truncated));
    }

    #[test]
    fn test_bad_magic() {
        let mut data = make_bitfile("3s400tq144", &[]);
        data[3] = 0x00;
        let err = BitfileHeader::read_from(&mut Cursor::new(data)).unwrap_err();
        assert!(matches!(err, BitfileError::BadMagic));
    }

    #[test]
    fn test_unknown_section() {
        let mut data = make_bitfile("3s400tq144", &[]);
        // First section key sits right after magic and key length word
        data[13] = b'z';
        let err = BitfileHeader::read_from(&mut Cursor::new(data)).unwrap_err();
        assert!(matches!(err, BitfileError::UnknownSection(b'z')));
    }
}
