use std::net::Ipv4Addr;

use tracing::debug;

use super::{ipv4, DecodedFrame, FrameDecoder, ETHERTYPE_IPV4};
use crate::packet::GreEnvelope;

const GRE_CHECKSUM: u16 = 0x8000;
const GRE_ROUTING: u16 = 0x4000;
const GRE_KEY: u16 = 0x2000;
const GRE_SEQUENCE: u16 = 0x1000;

/// Decode a GRE header at `off` and recursively decode the inner IPv4
/// packet. The outer endpoints travel on the decoded frame so the worker can
/// attach them to whichever session the inner tuple resolves to.
pub(super) fn decode(
    dec: &FrameDecoder,
    frame: &[u8],
    outer_src: Ipv4Addr,
    outer_dst: Ipv4Addr,
    off: usize,
) -> Option<DecodedFrame> {
    let data = frame.get(off..)?;
    if data.len() < 4 {
        return None;
    }

    let flags_version = u16::from_be_bytes([data[0], data[1]]);
    let ethertype = u16::from_be_bytes([data[2], data[3]]);
    if ethertype != ETHERTYPE_IPV4 {
        if dec.log_unknown_protocols() {
            debug!(protocol = ethertype, "unknown GRE protocol");
        }
        return None;
    }

    let mut pos = 4usize;
    // Checksum and routing-offset words are present if either flag is set.
    if flags_version & (GRE_CHECKSUM | GRE_ROUTING) != 0 {
        pos += 4;
    }
    if flags_version & GRE_KEY != 0 {
        pos += 4;
    }
    if flags_version & GRE_SEQUENCE != 0 {
        pos += 4;
    }
    if flags_version & GRE_ROUTING != 0 {
        loop {
            pos += 3;
            let len = usize::from(*data.get(pos)?);
            pos += 1;
            if len == 0 {
                break;
            }
            pos += len;
        }
    }
    if pos > data.len() {
        return None;
    }

    let mut inner = ipv4::decode(dec, frame, off + pos)?;
    inner.gre = Some(GreEnvelope { src: outer_src, dst: outer_dst });
    Some(inner)
}
