use super::{ipv4, ipv6, DecodedFrame, FrameDecoder};
use super::{ETHERTYPE_IPV4, ETHERTYPE_IPV6, ETHERTYPE_VLAN};

/// Walk the ethertype chain starting at byte 12, skipping stacked 802.1Q
/// tags, and hand the inner payload to the matching network-layer decoder.
pub(super) fn decode(dec: &FrameDecoder, frame: &[u8]) -> Option<DecodedFrame> {
    if frame.len() < 14 {
        return None;
    }
    let mut n = 12;
    while n + 2 < frame.len() {
        let ethertype = u16::from_be_bytes([frame[n], frame[n + 1]]);
        n += 2;
        match ethertype {
            ETHERTYPE_IPV4 => return ipv4::decode(dec, frame, n),
            ETHERTYPE_IPV6 => return ipv6::decode(dec, frame, n),
            ETHERTYPE_VLAN => n += 2, // skip the TCI, loop reads the inner ethertype
            _ => return None,
        }
    }
    None
}
