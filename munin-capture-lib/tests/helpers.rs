//! Shared test helpers: raw frame builders and collaborator test doubles.
#![allow(dead_code)]

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use munin_capture_lib::config::Config;
use munin_capture_lib::{
    Direction, FrameDecoder, FrameWriter, LinkType, Packet, PacketTime, ProtocolClassifier,
    Session, SessionObserver, StreamParser,
};

pub const FIN: u8 = 0x01;
pub const SYN: u8 = 0x02;
pub const RST: u8 = 0x04;
pub const PSH: u8 = 0x08;
pub const ACK: u8 = 0x10;

pub const CLIENT_MAC: [u8; 6] = [0x02, 0, 0, 0, 0, 0x0a];
pub const SERVER_MAC: [u8; 6] = [0x02, 0, 0, 0, 0, 0x0b];

/// Ethernet frame: destination MAC, source MAC, optional 802.1Q tags, then
/// the given ethertype and network-layer payload.
pub fn eth_frame(
    src_mac: [u8; 6],
    dst_mac: [u8; 6],
    vlans: &[u16],
    ethertype: u16,
    payload: &[u8],
) -> Vec<u8> {
    let mut f = Vec::with_capacity(14 + 4 * vlans.len() + payload.len());
    f.extend_from_slice(&dst_mac);
    f.extend_from_slice(&src_mac);
    for vlan in vlans {
        f.extend_from_slice(&0x8100u16.to_be_bytes());
        f.extend_from_slice(&vlan.to_be_bytes());
    }
    f.extend_from_slice(&ethertype.to_be_bytes());
    f.extend_from_slice(payload);
    f
}

pub fn ipv4_bytes(src: Ipv4Addr, dst: Ipv4Addr, proto: u8, payload: &[u8]) -> Vec<u8> {
    let mut h = Vec::with_capacity(20 + payload.len());
    h.extend_from_slice(&[0x45, 0]);
    h.extend_from_slice(&((20 + payload.len()) as u16).to_be_bytes());
    h.extend_from_slice(&[0, 0, 0, 0, 64, proto, 0, 0]);
    h.extend_from_slice(&src.octets());
    h.extend_from_slice(&dst.octets());
    h.extend_from_slice(payload);
    h
}

pub fn ipv6_bytes(src: Ipv6Addr, dst: Ipv6Addr, next_header: u8, payload: &[u8]) -> Vec<u8> {
    let mut h = Vec::with_capacity(40 + payload.len());
    h.extend_from_slice(&[0x60, 0, 0, 0]);
    h.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    h.push(next_header);
    h.push(64);
    h.extend_from_slice(&src.octets());
    h.extend_from_slice(&dst.octets());
    h.extend_from_slice(payload);
    h
}

pub fn tcp_bytes(
    sport: u16,
    dport: u16,
    seq: u32,
    ack: u32,
    flags: u8,
    payload: &[u8],
) -> Vec<u8> {
    let mut t = Vec::with_capacity(20 + payload.len());
    t.extend_from_slice(&sport.to_be_bytes());
    t.extend_from_slice(&dport.to_be_bytes());
    t.extend_from_slice(&seq.to_be_bytes());
    t.extend_from_slice(&ack.to_be_bytes());
    t.push(0x50);
    t.push(flags);
    t.extend_from_slice(&0xffffu16.to_be_bytes());
    t.extend_from_slice(&[0, 0, 0, 0]);
    t.extend_from_slice(payload);
    t
}

pub fn udp_bytes(sport: u16, dport: u16, payload: &[u8]) -> Vec<u8> {
    let mut u = Vec::with_capacity(8 + payload.len());
    u.extend_from_slice(&sport.to_be_bytes());
    u.extend_from_slice(&dport.to_be_bytes());
    u.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
    u.extend_from_slice(&[0, 0]);
    u.extend_from_slice(payload);
    u
}

/// Ethernet + IPv4 + TCP frame from the canonical test client to the server.
pub fn tcp_frame(seq: u32, ack: u32, flags: u8, payload: &[u8]) -> Vec<u8> {
    let t = tcp_bytes(1000, 80, seq, ack, flags, payload);
    let ip = ipv4_bytes(Ipv4Addr::new(1, 2, 3, 4), Ipv4Addr::new(5, 6, 7, 8), 6, &t);
    eth_frame(CLIENT_MAC, SERVER_MAC, &[], 0x0800, &ip)
}

/// The reverse direction of [`tcp_frame`].
pub fn tcp_frame_reverse(seq: u32, ack: u32, flags: u8, payload: &[u8]) -> Vec<u8> {
    let t = tcp_bytes(80, 1000, seq, ack, flags, payload);
    let ip = ipv4_bytes(Ipv4Addr::new(5, 6, 7, 8), Ipv4Addr::new(1, 2, 3, 4), 6, &t);
    eth_frame(SERVER_MAC, CLIENT_MAC, &[], 0x0800, &ip)
}

/// Decode one Ethernet frame into an owned packet, as the ingress path does.
pub fn decode_packet(frame: &[u8], ts: PacketTime) -> Packet {
    let decoder = FrameDecoder::new(LinkType::Ethernet, &Config::default());
    let decoded = decoder.decode(frame).expect("test frame must decode");
    Packet::from_decoded(ts, Bytes::copy_from_slice(frame), decoded)
}

/// Observer that collects drained sessions and counts close requests.
#[derive(Default)]
pub struct Collector {
    pub sessions: Mutex<Vec<Session>>,
    pub closes: Mutex<usize>,
}

impl SessionObserver for Collector {
    fn mark_for_close(&self, _session: &mut Session) {
        *self.closes.lock().unwrap() += 1;
    }

    fn on_session_end(&self, session: Session) {
        self.sessions.lock().unwrap().push(session);
    }
}

/// Classifier that counts `classify_tcp` invocations per session stream.
#[derive(Default)]
pub struct CountingClassifier {
    pub tcp_calls: Mutex<Vec<Vec<u8>>>,
}

impl ProtocolClassifier for CountingClassifier {
    fn classify_tcp(&self, _session: &mut Session, data: &[u8], _dir: Direction) {
        self.tcp_calls.lock().unwrap().push(data.to_vec());
    }
}

/// Classifier that installs a tap parser recording every delivered chunk.
pub struct TapClassifier {
    pub streams: Arc<Mutex<[Vec<u8>; 2]>>,
}

impl TapClassifier {
    pub fn new() -> Self {
        TapClassifier { streams: Arc::new(Mutex::new([Vec::new(), Vec::new()])) }
    }
}

impl ProtocolClassifier for TapClassifier {
    fn classify_tcp(&self, session: &mut Session, _data: &[u8], _dir: Direction) {
        session.register_parser(Box::new(TapParser { streams: Arc::clone(&self.streams) }));
    }
}

struct TapParser {
    streams: Arc<Mutex<[Vec<u8>; 2]>>,
}

impl StreamParser for TapParser {
    fn on_data(&mut self, _session: &mut Session, data: &[u8], dir: Direction) -> usize {
        self.streams.lock().unwrap()[dir.index()].extend_from_slice(data);
        0
    }
}

/// In-memory writer handing out sequential positions, rotating to a new file
/// number every `rotate_every` writes.
pub struct MemWriter {
    rotate_every: u64,
    state: Mutex<MemWriterState>,
}

struct MemWriterState {
    writes: u64,
    file_num: u32,
    pos: u64,
}

impl MemWriter {
    pub fn new(rotate_every: u64) -> Self {
        MemWriter {
            rotate_every,
            state: Mutex::new(MemWriterState { writes: 0, file_num: 0, pos: 0 }),
        }
    }
}

impl FrameWriter for MemWriter {
    fn write(&self, packet: &mut Packet) -> munin_capture_lib::Result<()> {
        let mut s = self.state.lock().unwrap();
        if s.writes % self.rotate_every == 0 {
            s.file_num += 1;
            s.pos = 24;
        }
        s.writes += 1;
        packet.writer_file_num = s.file_num;
        packet.writer_file_pos = s.pos;
        s.pos += 16 + packet.frame_len() as u64;
        Ok(())
    }
}
