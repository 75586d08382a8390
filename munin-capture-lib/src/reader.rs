//! Classic-pcap file reader for offline replay. The live-capture reader is a
//! separate collaborator with its own drop accounting; file reads never drop.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{CaptureError, Result};
use crate::hooks::{PacketSource, ReaderStats};
use crate::packet::PacketTime;

const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
const PCAP_MAGIC_SWAPPED: u32 = 0xd4c3_b2a1;

/// Ceiling on a single record, far beyond any sane snaplen.
const MAX_RECORD_LEN: usize = 0x40_0000;

pub struct PcapFileReader {
    inner: BufReader<File>,
    /// File fields are big-endian (written on a foreign-endian host).
    swapped: bool,
    link_type: u32,
    read: Arc<AtomicU64>,
}

impl PcapFileReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut inner = BufReader::new(File::open(path)?);
        let mut header = [0u8; 24];
        inner.read_exact(&mut header)?;

        let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let swapped = match magic {
            PCAP_MAGIC => false,
            PCAP_MAGIC_SWAPPED => true,
            other => {
                return Err(CaptureError::CorruptCapture(format!(
                    "unknown pcap magic {other:#010x}"
                )))
            }
        };

        let mut reader = PcapFileReader { inner, swapped, link_type: 0, read: Arc::default() };
        reader.link_type = reader.u32_field(&header[20..24]);
        Ok(reader)
    }

    pub fn link_type(&self) -> u32 {
        self.link_type
    }

    /// Stats handle to plug into the pipeline as its [`PacketSource`].
    pub fn source(&self) -> FileReaderStats {
        FileReaderStats { read: Arc::clone(&self.read) }
    }

    /// Read the next record. `Ok(None)` on clean end of file; a truncated
    /// record is an error.
    pub fn next(&mut self) -> Result<Option<(PacketTime, Vec<u8>)>> {
        let mut hdr = [0u8; 16];
        match self.inner.read_exact(&mut hdr) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let secs = self.u32_field(&hdr[0..4]);
        let usecs = self.u32_field(&hdr[4..8]);
        let incl_len = self.u32_field(&hdr[8..12]) as usize;
        if incl_len > MAX_RECORD_LEN {
            return Err(CaptureError::CorruptCapture(format!(
                "record length {incl_len} exceeds limit"
            )));
        }

        let mut data = vec![0u8; incl_len];
        self.inner
            .read_exact(&mut data)
            .map_err(|e| CaptureError::CorruptCapture(format!("truncated record: {e}")))?;

        self.read.fetch_add(1, Ordering::Relaxed);
        Ok(Some((PacketTime { secs: u64::from(secs), usecs }, data)))
    }

    fn u32_field(&self, b: &[u8]) -> u32 {
        let arr = [b[0], b[1], b[2], b[3]];
        if self.swapped {
            u32::from_be_bytes(arr)
        } else {
            u32::from_le_bytes(arr)
        }
    }
}

/// Drop-free [`PacketSource`] backed by the reader's record counter.
pub struct FileReaderStats {
    read: Arc<AtomicU64>,
}

impl PacketSource for FileReaderStats {
    fn stats(&self) -> Result<ReaderStats> {
        Ok(ReaderStats { total: self.read.load(Ordering::Relaxed), dropped: 0 })
    }
}
