use std::net::Ipv6Addr;

use tracing::debug;

use super::{DecodedFrame, FrameDecoder};
use super::{IPPROTO_ICMP, IPPROTO_ICMPV6, IPPROTO_TCP, IPPROTO_UDP};
use crate::flow::{FlowKey, Transport};

const IPV6_HEADER_LEN: usize = 40;
const TCP_HEADER_MIN: usize = 20;
const UDP_HEADER_LEN: usize = 8;

/// Decode an IPv6 header at `off` within `frame`. Extension headers are not
/// walked; a next-header value outside TCP/UDP/ICMP rejects the frame.
pub(super) fn decode(dec: &FrameDecoder, frame: &[u8], off: usize) -> Option<DecodedFrame> {
    let data = frame.get(off..)?;
    if data.len() < IPV6_HEADER_LEN {
        return None;
    }

    let payload_len = usize::from(u16::from_be_bytes([data[4], data[5]]));
    if data.len() < IPV6_HEADER_LEN + payload_len {
        return None;
    }

    // Traffic class straddles the first two bytes of the version field.
    let tos = (data[0] & 0x0f) << 4 | data[1] >> 4;
    let next_header = data[6];
    let src_addr = Ipv6Addr::from(<[u8; 16]>::try_from(&data[8..24]).ok()?);
    let dst_addr = Ipv6Addr::from(<[u8; 16]>::try_from(&data[24..40]).ok()?);
    let payload_offset = off + IPV6_HEADER_LEN;

    let transport = match next_header {
        IPPROTO_TCP => {
            if data.len() < IPV6_HEADER_LEN + TCP_HEADER_MIN {
                return None;
            }
            Transport::Tcp
        }
        IPPROTO_UDP => {
            if data.len() < IPV6_HEADER_LEN + UDP_HEADER_LEN {
                return None;
            }
            Transport::Udp
        }
        IPPROTO_ICMP | IPPROTO_ICMPV6 => Transport::Icmp,
        other => {
            if dec.log_unknown_protocols() {
                debug!(protocol = other, "unknown IPv6 next header");
            }
            return None;
        }
    };

    let (src_port, dst_port) = match transport {
        Transport::Tcp | Transport::Udp => {
            let t = &data[IPV6_HEADER_LEN..];
            (u16::from_be_bytes([t[0], t[1]]), u16::from_be_bytes([t[2], t[3]]))
        }
        Transport::Icmp => (0, 0),
    };

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
