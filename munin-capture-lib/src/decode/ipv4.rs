use std::net::Ipv4Addr;

use tracing::debug;

use super::{gre, DecodedFrame, FrameDecoder};
use super::{IPPROTO_GRE, IPPROTO_ICMP, IPPROTO_TCP, IPPROTO_UDP};
use crate::flow::{FlowKey, Transport};

const TCP_HEADER_MIN: usize = 20;
const UDP_HEADER_LEN: usize = 8;

/// Decode an IPv4 header at `off` within `frame`.
pub(super) fn decode(dec: &FrameDecoder, frame: &[u8], off: usize) -> Option<DecodedFrame> {
    let data = frame.get(off..)?;
    if data.len() < 20 {
        return None;
    }

    let ip_len = usize::from(u16::from_be_bytes([data[2], data[3]]));
    if data.len() < ip_len {
        return None;
    }
    let ip_hdr_len = usize::from(data[0] & 0x0f) * 4;
    if data.len() < ip_hdr_len {
        return None;
    }
    let payload_len = ip_len.checked_sub(ip_hdr_len)?;

    let tos = data[1];
    let proto = data[9];
    let src = Ipv4Addr::new(data[12], data[13], data[14], data[15]);
    let dst = Ipv4Addr::new(data[16], data[17], data[18], data[19]);
    let payload_offset = off + ip_hdr_len;

    let transport = match proto {
        IPPROTO_TCP => {
            if data.len() < ip_hdr_len + TCP_HEADER_MIN {
                return None;
            }
            Transport::Tcp
        }
        IPPROTO_UDP => {
            if data.len() < ip_hdr_len + UDP_HEADER_LEN {
                return None;
            }
            Transport::Udp
        }
        IPPROTO_ICMP => Transport::Icmp,
        IPPROTO_GRE if dec.parse_gre() => {
            return gre::decode(dec, frame, src, dst, payload_offset);
        }
        other => {
            if dec.log_unknown_protocols() {
                debug!(protocol = other, "unknown IPv4 protocol");
            }
            return None;
        }
    };

    let (src_port, dst_port) = match transport {
        Transport::Tcp | Transport::Udp => {
            let t = &data[ip_hdr_len..];
            (u16::from_be_bytes([t[0], t[1]]), u16::from_be_bytes([t[2], t[3]]))
        }
        Transport::Icmp => (0, 0),
    };

    let src_addr = src.to_ipv6_mapped();
    let dst_addr = dst.to_ipv6_mapped();
    Some(DecodedFrame {
        ip_offset: off,
        payload_offset,
        payload_len,
        transport,
        tos,
        src_addr,
        dst_addr,
        src_port,
        dst_port,
        key: FlowKey::new(src_addr, src_port, dst_addr, dst_port, transport),
        gre: None,
    })
}
