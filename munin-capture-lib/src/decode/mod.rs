//! Link- and network-layer decoding: strip the link layer, walk VLAN tags,
//! decode IPv4/IPv6 headers, and derive the canonical flow key.

mod ethernet;
mod gre;
mod ipv4;
mod ipv6;

use std::net::Ipv6Addr;

use crate::config::Config;
use crate::error::CaptureError;
use crate::flow::{FlowKey, Transport};
use crate::packet::GreEnvelope;

pub(crate) const IPPROTO_ICMP: u8 = 1;
pub(crate) const IPPROTO_TCP: u8 = 6;
pub(crate) const IPPROTO_UDP: u8 = 17;
pub(crate) const IPPROTO_GRE: u8 = 47;
pub(crate) const IPPROTO_ICMPV6: u8 = 58;

pub(crate) const ETHERTYPE_IPV4: u16 = 0x0800;
pub(crate) const ETHERTYPE_IPV6: u16 = 0x86dd;
pub(crate) const ETHERTYPE_VLAN: u16 = 0x8100;

/// Pcap link types the core accepts. Anything else is a configuration error
/// rejected at pipeline construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Null,
    Ethernet,
    Raw,
    LinuxSll,
}

impl LinkType {
    pub fn from_dlt(dlt: u32) -> Result<Self, CaptureError> {
        match dlt {
            0 => Ok(LinkType::Null),
            1 => Ok(LinkType::Ethernet),
            12 => Ok(LinkType::Raw),
            113 => Ok(LinkType::LinuxSll),
            other => Err(CaptureError::UnsupportedLinkType(other)),
        }
    }

    pub fn dlt(self) -> u32 {
        match self {
            LinkType::Null => 0,
            LinkType::Ethernet => 1,
            LinkType::Raw => 12,
            LinkType::LinuxSll => 113,
        }
    }
}

/// Offsets and flow identity extracted from one raw frame. The frame bytes
/// themselves stay borrowed; the ingress dispatcher copies them into an owned
/// [`crate::packet::Packet`] only after a successful decode.
#[derive(Debug)]
pub struct DecodedFrame {
    pub ip_offset: usize,
    pub payload_offset: usize,
    pub payload_len: usize,
    pub transport: Transport,
    pub tos: u8,
    pub src_addr: Ipv6Addr,
    pub dst_addr: Ipv6Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub key: FlowKey,
    pub gre: Option<GreEnvelope>,
}

#[derive(Debug, Clone)]
pub struct FrameDecoder {
    link_type: LinkType,
    log_unknown_protocols: bool,
    parse_gre: bool,
}

impl FrameDecoder {
    pub fn new(link_type: LinkType, config: &Config) -> Self {
        FrameDecoder {
            link_type,
            log_unknown_protocols: config.log_unknown_protocols,
            parse_gre: config.parse_gre,
        }
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    /// Decode one raw frame. `None` means the frame is dropped (truncated,
    /// unknown ethertype, unknown IP protocol).
    pub fn decode(&self, frame: &[u8]) -> Option<DecodedFrame> {
        match self.link_type {
            LinkType::Null => {
                if frame.len() > 4 {
                    ipv4::decode(self, frame, 4)
                } else {
                    None
                }
            }
            LinkType::Ethernet => ethernet::decode(self, frame),
            LinkType::Raw | LinkType::LinuxSll => ipv4::decode(self, frame, 0),
        }
    }

    pub(crate) fn log_unknown_protocols(&self) -> bool {
        self.log_unknown_protocols
    }

    pub(crate) fn parse_gre(&self) -> bool {
        self.parse_gre
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn decoder(link_type: LinkType) -> FrameDecoder {
        let mut config = Config::default();
        config.parse_gre = true;
        FrameDecoder::new(link_type, &config)
    }

    /// Ethernet + IPv4 + TCP frame with the given payload, no options.
    fn tcp_frame(vlans: &[u16], payload: &[u8]) -> Vec<u8> {
        let mut f = vec![0u8; 12];
        for vlan in vlans {
            f.extend_from_slice(&0x8100u16.to_be_bytes());
            f.extend_from_slice(&vlan.to_be_bytes());
        }
        f.extend_from_slice(&0x0800u16.to_be_bytes());
        let ip_len = 20 + 20 + payload.len() as u16;
        f.extend_from_slice(&[0x45, 0]);
        f.extend_from_slice(&ip_len.to_be_bytes());
        f.extend_from_slice(&[0, 0, 0, 0, 64, IPPROTO_TCP, 0, 0]);
        f.extend_from_slice(&Ipv4Addr::new(10, 0, 0, 1).octets());
        f.extend_from_slice(&Ipv4Addr::new(10, 0, 0, 2).octets());
        f.extend_from_slice(&4321u16.to_be_bytes());
        f.extend_from_slice(&80u16.to_be_bytes());
        f.extend_from_slice(&[0u8; 8]); // seq + ack
        f.extend_from_slice(&[0x50, 0x18, 0xff, 0xff, 0, 0, 0, 0]);
        f.extend_from_slice(payload);
        f
    }

    #[test]
    fn decodes_plain_ethernet_tcp() {
        let frame = tcp_frame(&[], b"hello");
        let d = decoder(LinkType::Ethernet).decode(&frame).expect("decode");
        assert_eq!(d.transport, Transport::Tcp);
        assert_eq!(d.ip_offset, 14);
        assert_eq!(d.payload_offset, 34);
        assert_eq!(d.payload_len, 25);
        assert_eq!(d.src_port, 4321);
        assert_eq!(d.dst_port, 80);
        assert_eq!(d.src_addr, Ipv4Addr::new(10, 0, 0, 1).to_ipv6_mapped());
    }

    #[test]
    fn walks_vlan_stack() {
        let frame = tcp_frame(&[100, 200], b"x");
        let d = decoder(LinkType::Ethernet).decode(&frame).expect("decode");
        assert_eq!(d.ip_offset, 14 + 8);
        assert_eq!(d.transport, Transport::Tcp);
    }

    #[test]
    fn rejects_unknown_ethertype() {
        let mut frame = tcp_frame(&[], b"x");
        frame[12] = 0x88;
        frame[13] = 0xcc;
        assert!(decoder(LinkType::Ethernet).decode(&frame).is_none());
    }

    #[test]
    fn rejects_truncated_ip_header() {
        let frame = tcp_frame(&[], b"x");
        assert!(decoder(LinkType::Ethernet).decode(&frame[..20]).is_none());
    }

    #[test]
    fn rejects_frame_shorter_than_total_length() {
        let mut frame = tcp_frame(&[], b"hello");
        // Claim four more bytes than the frame carries.
        let claimed = (20 + 20 + 5 + 4u16).to_be_bytes();
        frame[16] = claimed[0];
        frame[17] = claimed[1];
        assert!(decoder(LinkType::Ethernet).decode(&frame).is_none());
    }

    #[test]
    fn null_link_skips_af_header() {
        let eth = tcp_frame(&[], b"ping");
        let mut frame = vec![2, 0, 0, 0];
        frame.extend_from_slice(&eth[14..]);
        let d = decoder(LinkType::Null).decode(&frame).expect("decode");
        assert_eq!(d.ip_offset, 4);
        assert_eq!(d.transport, Transport::Tcp);
    }

    #[test]
    fn raw_link_is_ip_at_offset_zero() {
        let eth = tcp_frame(&[], b"ping");
        let d = decoder(LinkType::Raw).decode(&eth[14..]).expect("decode");
        assert_eq!(d.ip_offset, 0);
    }

    #[test]
    fn icmp_key_uses_zero_ports() {
        let mut frame = tcp_frame(&[], b"");
        frame[14 + 9] = IPPROTO_ICMP;
        let d = decoder(LinkType::Ethernet).decode(&frame).expect("decode");
        assert_eq!(d.transport, Transport::Icmp);
        assert_eq!((d.src_port, d.dst_port), (0, 0));
    }

    #[test]
    fn unknown_ip_protocol_is_dropped() {
        let mut frame = tcp_frame(&[], b"");
        frame[14 + 9] = 132; // SCTP
        assert!(decoder(LinkType::Ethernet).decode(&frame).is_none());
    }

    #[test]
    fn both_directions_yield_equal_keys() {
        let fwd = tcp_frame(&[], b"x");
        let mut rev = tcp_frame(&[], b"x");
        rev[26..30].copy_from_slice(&Ipv4Addr::new(10, 0, 0, 2).octets());
        rev[30..34].copy_from_slice(&Ipv4Addr::new(10, 0, 0, 1).octets());
        rev[34..36].copy_from_slice(&80u16.to_be_bytes());
        rev[36..38].copy_from_slice(&4321u16.to_be_bytes());
        let dec = decoder(LinkType::Ethernet);
        let a = dec.decode(&fwd).expect("decode fwd");
        let b = dec.decode(&rev).expect("decode rev");
        assert_eq!(a.key, b.key);
    }
}
