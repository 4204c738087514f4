//! Bitstream upload for CPLD-controlled boards
//!
//! The CPLD exposes the FPGA's serial configuration port on the raw byte
//! channel. Loading a bitstream is:
//!
//! 1. Check that the file exists and parse its header.
//! 2. Send four priming bytes. The CPLD does not acknowledge them.
//! 3. Stream the payload in [`CHUNK_SIZE`] pieces, bit-reversing each byte.
//!
//! A failure in step 3 leaves the FPGA partially configured. Nothing is
//! retried here.

use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::Path;

use crate::bitfile::{reverse_bits_in_place, BitfileError, BitfileHeader};
use crate::board::FpgaPart;
use crate::bus::RegisterBus;
use crate::error::{Error, Result};
use crate::lbp::cpld;

/// Bytes sent per chunk
pub const CHUNK_SIZE: usize = 8192;

/// Number of priming bytes sent before the payload
pub const PRIMING_COUNT: usize = 4;

/// Statistics about a completed upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgramStats {
    /// Payload bytes sent
    pub bytes_sent: u64,
    /// Chunks sent
    pub chunks: usize,
}

/// Callback for progress reporting during an upload
pub trait ProgramProgress {
    /// Header parsed; `payload_bytes` is the number of bytes left to send
    fn started(&mut self, header: &BitfileHeader, payload_bytes: u64);

    /// Priming byte `step` (0-based) was sent
    fn priming(&mut self, step: usize);

    /// One chunk of `bytes` bytes was sent
    fn chunk_written(&mut self, bytes: usize);

    /// Upload finished
    fn complete(&mut self, stats: &ProgramStats);
}

/// A no-op progress reporter
pub struct NoProgress;

impl ProgramProgress for NoProgress {
    fn started(&mut self, _header: &BitfileHeader, _payload_bytes: u64) {}
    fn priming(&mut self, _step: usize) {}
    fn chunk_written(&mut self, _bytes: usize) {}
    fn complete(&mut self, _stats: &ProgramStats) {}
}

/// Prints a marker trail: `  |`, one `P` per priming byte, one `W` per
/// chunk, then a newline
pub struct MarkerProgress<W: io::Write> {
    out: W,
    markers: usize,
}

impl<W: io::Write> MarkerProgress<W> {
    /// Report to `out`
    pub fn new(out: W) -> Self {
        Self { out, markers: 0 }
    }

    /// Number of `P` and `W` markers printed so far
    pub fn markers(&self) -> usize {
        self.markers
    }

    /// Give back the writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn mark(&mut self, s: &str) {
        // Marker output never fails the upload
        if let Err(e) = self.out.write_all(s.as_bytes()).and_then(|_| self.out.flush()) {
            log::debug!("progress: can't write marker {:?}: {}", s, e);
        }
    }
}

impl<W: io::Write> ProgramProgress for MarkerProgress<W> {
    fn started(&mut self, _header: &BitfileHeader, _payload_bytes: u64) {
        self.mark("  |");
    }

    fn priming(&mut self, _step: usize) {
        self.markers += 1;
        self.mark("P");
    }

    fn chunk_written(&mut self, _bytes: usize) {
        self.markers += 1;
        self.mark("W");
    }

    fn complete(&mut self, _stats: &ProgramStats) {
        self.mark("\n");
    }
}

/// Load the bitstream at `path` through `bus`
///
/// # Errors
/// - [`Error::ResourceNotFound`] if `path` does not exist. No bus traffic.
/// - [`Error::Io`] if the file can't be opened or a read fails.
/// - [`Error::MalformedBitstream`] if the header is invalid. No bus traffic.
/// - [`Error::Bus`] if the transport fails.
///
/// A header naming a different part than `expected_part` is only warned
/// about.
pub fn program_bitstream<B, P>(
    bus: &mut B,
    path: &Path,
    expected_part: Option<FpgaPart>,
    progress: &mut P,
) -> Result<ProgramStats>
where
    B: RegisterBus + ?Sized,
    P: ProgramProgress + ?Sized,
{
    let io_err = |source: io::Error| Error::Io {
        path: path.to_path_buf(),
        source,
    };

    match fs::metadata(path) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::ResourceNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(io_err(e)),
    }

    let mut file = File::open(path).map_err(io_err)?;

    let header = BitfileHeader::read_from(&mut file).map_err(|source| match source {
        BitfileError::Io(e) => io_err(e),
        source => Error::MalformedBitstream {
            path: path.to_path_buf(),
            source,
        },
    })?;

    if let (Some(expected), Some(found)) = (expected_part, header.part_name.as_deref()) {
        if found != expected.as_str() {
            log::warn!(
                "{} was built for {}, board has {}",
                path.display(),
                found,
                expected
            );
        }
    }

    let file_len = file.metadata().map_err(io_err)?.len();
    let offset = file.stream_position().map_err(io_err)?;
    progress.started(&header, file_len.saturating_sub(offset));

    log::info!("Programming FPGA from {}", path.display());

    upload(bus, &mut file, progress).map_err(|e| match e {
        UploadError::Read(source) => io_err(source),
        UploadError::Bus(e) => Error::Bus(e),
    })
}

enum UploadError {
    Read(io::Error),
    Bus(crate::bus::BusError),
}

/// Send the priming bytes and stream everything left in `reader`
fn upload<B, R, P>(
    bus: &mut B,
    reader: &mut R,
    progress: &mut P,
) -> std::result::Result<ProgramStats, UploadError>
where
    B: RegisterBus + ?Sized,
    R: Read,
    P: ProgramProgress + ?Sized,
{
    for step in 0..PRIMING_COUNT {
        bus.raw_send(&[cpld::CMD_PART]).map_err(UploadError::Bus)?;
        progress.priming(step);
    }

    let mut stats = ProgramStats::default();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = fill_chunk(reader, &mut buf).map_err(UploadError::Read)?;
        if n == 0 {
            break;
        }

        reverse_bits_in_place(&mut buf[..n]);
        bus.raw_send(&buf[..n]).map_err(UploadError::Bus)?;

        stats.bytes_sent += n as u64;
        stats.chunks += 1;
        progress.chunk_written(n);

        if n < CHUNK_SIZE {
            break;
        }
    }

    log::debug!(
        "program: sent {} bytes in {} chunks",
        stats.bytes_sent,
        stats.chunks
    );
    progress.complete(&stats);
    Ok(stats)
}

/// Read until `buf` is full or the reader is exhausted
fn fill_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
