//! Per-flow TCP reassembly: sequence arithmetic with wraparound, duplicate
//! resolution, out-of-order buffering, the FIN/RST lifecycle, and in-order
//! delivery to the parser chain.

use crate::hooks::{PayloadScanner, ProtocolClassifier, SessionObserver};
use crate::packet::Packet;
use crate::session::{Session, TcpSegment, TcpState};

pub(crate) const TH_FIN: u8 = 0x01;
pub(crate) const TH_SYN: u8 = 0x02;
pub(crate) const TH_RST: u8 = 0x04;
pub(crate) const TH_ACK: u8 = 0x10;

/// Segments a session may buffer before reassembly is abandoned and the
/// session is tagged `incomplete-tcp`.
const MAX_BUFFERED_SEGMENTS: usize = 256;

/// The fixed part of a TCP header, as the reassembler needs it.
pub(crate) struct TcpHeader {
    pub seq: u32,
    pub ack: u32,
    pub flags: u8,
    /// Header length in bytes (4 * data offset field).
    pub data_offset: usize,
}

impl TcpHeader {
    pub(crate) fn parse(packet: &Packet) -> Option<TcpHeader> {
        let h = packet.data.get(packet.payload_offset..packet.payload_offset + 20)?;
        Some(TcpHeader {
            seq: u32::from_be_bytes([h[4], h[5], h[6], h[7]]),
            ack: u32::from_be_bytes([h[8], h[9], h[10], h[11]]),
            data_offset: usize::from(h[12] >> 4) * 4,
            flags: h[13],
        })
    }
}

/// Wraparound-safe signed distance from `a` to `b` in 32-bit sequence space.
/// Used for every seq/ack comparison the reassembler makes.
pub(crate) fn sequence_diff(a: u32, b: u32) -> i64 {
    if a > 0xc000_0000 && b < 0x4000_0000 {
        return i64::from(a) + 0xffff_ffff - i64::from(b);
    }
    if b > 0xc000_0000 && a < 0x4000_0000 {
        return i64::from(a) - i64::from(b) - 0xffff_ffff;
    }
    i64::from(b.wrapping_sub(a) as i32)
}

/// Process one just-arrived TCP packet for its session.
///
/// Returns the packet when the caller may free it; `None` when ownership
/// moved into the reassembly buffer (or the packet replaced a buffered
/// duplicate).
pub fn process(
    session: &mut Session,
    packet: Packet,
    observer: &dyn SessionObserver,
) -> Option<Packet> {
    if session.stop_spi || session.stop_tcp {
        return Some(packet);
    }
    let Some(hdr) = TcpHeader::parse(&packet) else {
        return Some(packet);
    };
    let Some(len) = packet.payload_len.checked_sub(hdr.data_offset) else {
        return Some(packet);
    };
    let len = len as u32;
    let w = packet.direction.index();

    if hdr.flags & TH_SYN != 0 {
        session.have_tcp_session = true;
        session.tcp_seq[w] = hdr.seq.wrapping_add(1);
        if !session.write_queued {
            session.write_queued = true;
            observer.on_tcp_start(session);
        }
        return Some(packet);
    }

    if hdr.flags & TH_RST != 0 {
        if sequence_diff(hdr.seq, session.tcp_seq[w]) <= 0 {
            return Some(packet);
        }
        session.tcp_state[w] = TcpState::FinAck;
    }

    if hdr.flags & TH_FIN != 0 {
        session.tcp_state[w] = TcpState::Fin;
    }

    if hdr.flags & (TH_ACK | TH_RST) != 0 {
        let o = packet.direction.opposite().index();
        if session.tcp_state[o] == TcpState::Fin {
            session.tcp_state[o] = TcpState::FinAck;
            if session.tcp_state[w] == TcpState::FinAck {
                if !session.closing {
                    session.closing = true;
                    observer.mark_for_close(session);
                }
                return Some(packet);
            }
        }
    }

    // Empty packet, drop from tcp processing
    if len == 0 || hdr.flags & TH_RST != 0 {
        return Some(packet);
    }

    // Entirely before what has already been delivered.
    if sequence_diff(session.tcp_seq[w], hdr.seq.wrapping_add(len)) <= 0 {
        return Some(packet);
    }

    if let Some(rejected) = insert(session, packet, &hdr, len) {
        return Some(rejected);
    }

    if session.tcp_data.len() > MAX_BUFFERED_SEGMENTS {
        session.clear_tcp_buffer();
        session.add_tag("incomplete-tcp");
        session.stop_tcp = true;
    }
    None
}

/// Insert a payload-bearing segment into the ordered buffer.
///
/// The list reads head-to-tail in delivery order: same-direction segments
/// sort by seq, opposite-direction segments by one side's seq against the
/// other's ack. The walk runs tail-to-head because retransmits cluster near
/// the tail.
/// Returns the packet back when a buffered segment at the same offset already
/// carries at least as many bytes.
fn insert(session: &mut Session, packet: Packet, hdr: &TcpHeader, len: u32) -> Option<Packet> {
    let seg = TcpSegment {
        seq: hdr.seq,
        ack: hdr.ack,
        len,
        data_offset: packet.payload_offset + hdr.data_offset,
        packet,
    };
    let list = &mut session.tcp_data;
    if list.is_empty() {
        list.push_back(seg);
        return None;
    }

    let mut idx = list.len();
    while idx > 0 {
        idx -= 1;
        let e = &list[idx];
        let same_dir = seg.packet.direction == e.packet.direction;
        let sort_b = if same_dir { e.seq } else { e.ack };
        let diff = sequence_diff(sort_b, seg.seq);
        if diff == 0 {
            if same_dir {
                // Same offset twice: keep whichever segment carries more bytes.
                if seg.len > e.len {
                    list[idx] = seg;
                    return None;
                }
                return Some(seg.packet);
            }
            if sequence_diff(seg.ack, e.seq) < 0 {
                list.insert(idx + 1, seg);
                return None;
            }
        } else if diff > 0 {
            list.insert(idx + 1, seg);
            return None;
        }
    }
    list.push_front(seg);
    None
}

/// Deliver buffered bytes in order from the head of the list while the head
/// segment covers the next expected sequence number. Gaps stop delivery and
/// never time out here; session expiry handles them.
pub fn deliver(
    session: &mut Session,
    classifier: &dyn ProtocolClassifier,
    scanner: Option<&dyn PayloadScanner>,
) {
    loop {
        let (dir, start, end) = {
            let Some(front) = session.tcp_data.front() else { return };
            let dir = front.packet.direction;
            let expected = session.tcp_seq[dir.index()];
            if !(expected >= front.seq && expected < front.seq.wrapping_add(front.len)) {
                return;
            }
            let skip = (expected - front.seq) as usize;
            (dir, front.data_offset + skip, front.data_offset + front.len as usize)
        };
        let Some(seg) = session.tcp_data.pop_front() else { return };
        let w = dir.index();

        if let Some(data) = seg.packet.data.get(start..end) {
            let len = data.len();
            session.sample_first_bytes(dir, data);

            if session.total_databytes[w] == session.consumed[w] {
                classifier.classify_tcp(session, data, dir);
            }

            let mut parsers = std::mem::take(&mut session.parsers);
            for parser in parsers.iter_mut() {
                let consumed = parser.on_data(session, data, dir);
                if consumed > 0 {
                    session.consumed[w] += consumed as u64;
                }
                if consumed >= len {
                    break;
                }
            }
            // Anything installed while the chain was detached lands behind it.
            let installed = std::mem::take(&mut session.parsers);
            parsers.extend(installed);
            session.parsers = parsers;

            session.tcp_seq[w] = session.tcp_seq[w].wrapping_add(len as u32);
            session.databytes[w] += len as u64;
            session.total_databytes[w] += len as u64;

            if let Some(scanner) = scanner {
                scanner.scan(session, data);
            }
        }
    }
}
