//! Rotating pcap writer: numbered capture files, a global header per file,
//! and a 16-byte record header per frame. The `(file_num, pos)` pair handed
//! back on each write is what downstream index consumers use to locate the
//! stored frame.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{CaptureError, Result};
use crate::hooks::FrameWriter;
use crate::packet::Packet;

const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
const PCAP_VERSION_MAJOR: u16 = 2;
const PCAP_VERSION_MINOR: u16 = 4;
const PCAP_SNAPLEN: u32 = 65536;

const FILE_HEADER_LEN: u64 = 24;
const RECORD_HEADER_LEN: u64 = 16;

pub struct PcapFileWriter {
    dir: PathBuf,
    prefix: String,
    max_file_size: u64,
    link_type: u32,
    state: Mutex<WriterState>,
}

struct WriterState {
    file: Option<BufWriter<File>>,
    file_num: u32,
    pos: u64,
}

impl PcapFileWriter {
    pub fn new<P: AsRef<Path>>(dir: P, max_file_size: u64, link_type: u32) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(PcapFileWriter {
            dir: dir.as_ref().to_path_buf(),
            prefix: "munin".to_string(),
            max_file_size,
            link_type,
            state: Mutex::new(WriterState { file: None, file_num: 0, pos: 0 }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, WriterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open the next numbered file and write its global header.
    fn rotate(&self, state: &mut WriterState) -> Result<()> {
        if let Some(mut old) = state.file.take() {
            old.flush()?;
        }
        state.file_num += 1;
        let path = self.dir.join(format!("{}-{:06}.pcap", self.prefix, state.file_num));
        let mut file = BufWriter::new(File::create(path)?);

        let mut header = [0u8; FILE_HEADER_LEN as usize];
        header[0..4].copy_from_slice(&PCAP_MAGIC.to_le_bytes());
        header[4..6].copy_from_slice(&PCAP_VERSION_MAJOR.to_le_bytes());
        header[6..8].copy_from_slice(&PCAP_VERSION_MINOR.to_le_bytes());
        // thiszone and sigfigs stay zero
        header[16..20].copy_from_slice(&PCAP_SNAPLEN.to_le_bytes());
        header[20..24].copy_from_slice(&self.link_type.to_le_bytes());
        file.write_all(&header)?;

        state.file = Some(file);
        state.pos = FILE_HEADER_LEN;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        let mut state = self.lock();
        if let Some(file) = state.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }

    /// File number the next rotation will produce records under.
    pub fn current_file_num(&self) -> u32 {
        self.lock().file_num
    }
}

impl FrameWriter for PcapFileWriter {
    fn write(&self, packet: &mut Packet) -> Result<()> {
        let mut state = self.lock();
        let record_len = RECORD_HEADER_LEN + packet.frame_len() as u64;
        if state.file.is_none() || state.pos + record_len > self.max_file_size {
            self.rotate(&mut state)?;
        }

        let pos = state.pos;
        let file_num = state.file_num;
        let file = state
            .file
            .as_mut()
            .ok_or_else(|| CaptureError::Io(std::io::Error::other("no capture file open")))?;

        let mut hdr = [0u8; RECORD_HEADER_LEN as usize];
        hdr[0..4].copy_from_slice(&(packet.ts.secs as u32).to_le_bytes());
        hdr[4..8].copy_from_slice(&packet.ts.usecs.to_le_bytes());
        hdr[8..12].copy_from_slice(&(packet.frame_len() as u32).to_le_bytes());
        hdr[12..16].copy_from_slice(&(packet.frame_len() as u32).to_le_bytes());
        file.write_all(&hdr)?;
        file.write_all(&packet.data)?;
        state.pos += record_len;

        packet.writer_file_num = file_num;
        packet.writer_file_pos = pos;
        Ok(())
    }
}
