use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::Bytes;

use crate::decode::DecodedFrame;
use crate::flow::{Direction, FlowKey, Transport};

/// Capture timestamp, pcap resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketTime {
    pub secs: u64,
    pub usecs: u32,
}

/// Outer IPv4 endpoints of a GRE-encapsulated frame, attached to the inner
/// session by the worker as `gre.ip` fields.
#[derive(Debug, Clone, Copy)]
pub struct GreEnvelope {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

/// One captured frame, owned by the pipeline.
///
/// The buffer is copied off the capture source at ingress and travels through
/// the worker queue by value. TCP packets that enter the reassembly buffer
/// move into the session until their bytes are delivered.
#[derive(Debug, Clone)]
pub struct Packet {
    pub data: Bytes,
    pub ts: PacketTime,

    /// Offset of the (innermost) IP header within `data`.
    pub ip_offset: usize,
    /// Offset of the transport header within `data`.
    pub payload_offset: usize,
    /// Transport length as reported by the IP header.
    pub payload_len: usize,

    pub key: FlowKey,
    pub transport: Transport,
    pub tos: u8,
    pub src_addr: Ipv6Addr,
    pub dst_addr: Ipv6Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub gre: Option<GreEnvelope>,

    /// Set by the owning worker before transport processing.
    pub direction: Direction,

    /// Back-filled by the writer after persistence.
    pub writer_file_num: u32,
    pub writer_file_pos: u64,
}

impl Packet {
    pub fn from_decoded(ts: PacketTime, data: Bytes, decoded: DecodedFrame) -> Self {
        Packet {
            data,
            ts,
            ip_offset: decoded.ip_offset,
            payload_offset: decoded.payload_offset,
            payload_len: decoded.payload_len,
            key: decoded.key,
            transport: decoded.transport,
            tos: decoded.tos,
            src_addr: decoded.src_addr,
            dst_addr: decoded.dst_addr,
            src_port: decoded.src_port,
            dst_port: decoded.dst_port,
            gre: decoded.gre,
            direction: Direction::Forward,
            writer_file_num: 0,
            writer_file_pos: 0,
        }
    }

    /// Full captured frame length.
    pub fn frame_len(&self) -> usize {
        self.data.len()
    }
}
