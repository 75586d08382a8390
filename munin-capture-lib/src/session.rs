use std::collections::{BTreeSet, VecDeque};
use std::net::Ipv6Addr;

use crate::fields::FieldBag;
use crate::flow::{Direction, Transport};
use crate::hooks::StreamParser;
use crate::packet::{Packet, PacketTime};

/// Per-direction TCP close progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TcpState {
    #[default]
    Open,
    Fin,
    FinAck,
}

/// One TCP segment retained in the reassembly buffer. Owns its packet until
/// the bytes are delivered or the session abandons reassembly.
pub(crate) struct TcpSegment {
    pub seq: u32,
    pub ack: u32,
    pub len: u32,
    /// Offset of the segment payload within the owning packet's frame.
    pub data_offset: usize,
    pub packet: Packet,
}

/// One bidirectional flow, owned by exactly one worker thread after creation.
///
/// All `[2]` arrays are indexed by [`Direction::index`]: 0 is the endpoint-1
/// to endpoint-2 direction fixed at creation, 1 the reverse.
pub struct Session {
    pub addr1: Ipv6Addr,
    pub addr2: Ipv6Addr,
    pub port1: u16,
    pub port2: u16,
    pub transport: Transport,
    pub ip_tos: u8,
    pub thread: usize,

    pub first_packet: PacketTime,
    pub last_packet: PacketTime,
    /// Deadline after which the expiry collaborator saves the session.
    pub save_time: u64,

    pub packets: [u32; 2],
    pub bytes: [u64; 2],
    pub databytes: [u64; 2],
    pub total_databytes: [u64; 2],
    pub consumed: [u64; 2],

    pub first_bytes: [[u8; 8]; 2],
    pub first_bytes_len: [usize; 2],

    pub have_tcp_session: bool,
    /// Next expected sequence number per direction.
    pub tcp_seq: [u32; 2],
    pub tcp_state: [TcpState; 2],
    /// Union of every TCP flag byte observed on the flow.
    pub tcp_flags: u8,
    pub(crate) tcp_data: VecDeque<TcpSegment>,

    pub stop_spi: bool,
    pub stop_tcp: bool,
    /// 0 keeps saving; otherwise stop once the session holds this many packets.
    pub stop_saving: u32,
    pub closing: bool,
    pub(crate) write_queued: bool,

    pub(crate) parsers: Vec<Box<dyn StreamParser>>,

    pub tags: BTreeSet<String>,
    pub protocols: BTreeSet<String>,
    pub fields: FieldBag,

    pub file_nums: Vec<u32>,
    /// Byte positions in the capture files; negative entries are rotation
    /// sentinels holding `-file_num`.
    pub file_positions: Vec<i64>,
    pub file_lengths: Vec<u32>,
    pub last_file_num: Option<u32>,
}

impl Session {
    pub fn new(
        thread: usize,
        transport: Transport,
        src: Ipv6Addr,
        dst: Ipv6Addr,
        tos: u8,
        ts: PacketTime,
        save_time: u64,
    ) -> Self {
        Session {
            addr1: src,
            addr2: dst,
            port1: 0,
            port2: 0,
            transport,
            ip_tos: tos,
            thread,
            first_packet: ts,
            last_packet: ts,
            save_time,
            packets: [0; 2],
            bytes: [0; 2],
            databytes: [0; 2],
            total_databytes: [0; 2],
            consumed: [0; 2],
            first_bytes: [[0; 8]; 2],
            first_bytes_len: [0; 2],
            have_tcp_session: false,
            tcp_seq: [0; 2],
            tcp_state: [TcpState::Open; 2],
            tcp_flags: 0,
            tcp_data: VecDeque::new(),
            stop_spi: false,
            stop_tcp: false,
            stop_saving: 0,
            closing: false,
            write_queued: false,
            parsers: Vec::new(),
            tags: BTreeSet::new(),
            protocols: BTreeSet::new(),
            fields: FieldBag::default(),
            file_nums: Vec::new(),
            file_positions: Vec::new(),
            file_lengths: Vec::new(),
            last_file_num: None,
        }
    }

    /// Direction of a frame relative to the endpoint ordering fixed at
    /// creation. Ports are ignored for ICMP.
    pub fn direction_of(&self, packet: &Packet) -> Direction {
        let addrs_match = self.addr1 == packet.src_addr && self.addr2 == packet.dst_addr;
        let matches = match self.transport {
            Transport::Icmp => addrs_match,
            Transport::Tcp | Transport::Udp => {
                addrs_match && self.port1 == packet.src_port && self.port2 == packet.dst_port
            }
        };
        if matches {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }

    pub fn add_tag(&mut self, tag: &str) {
        self.tags.insert(tag.to_string());
    }

    pub fn add_protocol(&mut self, protocol: &str) {
        self.protocols.insert(protocol.to_string());
    }

    /// Install a stream parser; it runs on every subsequently delivered chunk.
    pub fn register_parser(&mut self, parser: Box<dyn StreamParser>) {
        self.parsers.push(parser);
    }

    /// Fill the first-bytes sample for `dir` up to its 8-byte cap. Frozen
    /// once full.
    pub fn sample_first_bytes(&mut self, dir: Direction, data: &[u8]) {
        let w = dir.index();
        let have = self.first_bytes_len[w];
        if have < 8 {
            let copy = (8 - have).min(data.len());
            self.first_bytes[w][have..have + copy].copy_from_slice(&data[..copy]);
            self.first_bytes_len[w] = have + copy;
        }
    }

    /// Number of segments currently held in the reassembly buffer.
    pub fn buffered_segments(&self) -> usize {
        self.tcp_data.len()
    }

    pub(crate) fn clear_tcp_buffer(&mut self) {
        self.tcp_data.clear();
    }
}
