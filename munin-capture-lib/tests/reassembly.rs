//! End-to-end reassembly scenarios: frames go through the real decoder and
//! the TCP state machine exactly as a worker would drive them.

#[path = "helpers.rs"]
mod helpers;

use std::net::Ipv4Addr;

use helpers::{tcp_frame, tcp_frame_reverse, ACK, FIN, PSH, RST, SYN};
use munin_capture_lib::stream::tcp;
use munin_capture_lib::{
    Direction, NullClassifier, NullObserver, PacketTime, ProtocolClassifier, Session,
    SessionObserver, TcpState, Transport,
};

fn new_session() -> Session {
    let mut s = Session::new(
        0,
        Transport::Tcp,
        Ipv4Addr::new(1, 2, 3, 4).to_ipv6_mapped(),
        Ipv4Addr::new(5, 6, 7, 8).to_ipv6_mapped(),
        0,
        PacketTime::default(),
        0,
    );
    s.port1 = 1000;
    s.port2 = 80;
    s
}

/// Run one frame through TCP processing and in-order delivery, the way the
/// owning worker does. Returns whether the packet was freed (not buffered).
fn feed(
    session: &mut Session,
    observer: &dyn SessionObserver,
    classifier: &dyn ProtocolClassifier,
    frame: &[u8],
) -> bool {
    let mut packet = helpers::decode_packet(frame, PacketTime::default());
    packet.direction = session.direction_of(&packet);
    let freed = tcp::process(session, packet, observer);
    tcp::deliver(session, classifier, None);
    freed.is_some()
}

fn handshake(session: &mut Session, observer: &dyn SessionObserver, cls: &dyn ProtocolClassifier) {
    feed(session, observer, cls, &tcp_frame(100, 0, SYN, b""));
    feed(session, observer, cls, &tcp_frame_reverse(500, 101, SYN | ACK, b""));
    feed(session, observer, cls, &tcp_frame(101, 501, ACK, b""));
}

#[test]
fn handshake_then_in_order_payload() {
    let cls = helpers::CountingClassifier::default();
    let mut s = new_session();

    feed(&mut s, &NullObserver, &cls, &tcp_frame(100, 0, SYN, b""));
    assert!(s.have_tcp_session);
    assert_eq!(s.tcp_seq[0], 101);
    assert_eq!(s.buffered_segments(), 0);

    feed(&mut s, &NullObserver, &cls, &tcp_frame_reverse(500, 101, SYN | ACK, b""));
    assert_eq!(s.tcp_seq[1], 501);

    feed(&mut s, &NullObserver, &cls, &tcp_frame(101, 501, ACK, b""));
    assert_eq!(s.buffered_segments(), 0);

    feed(&mut s, &NullObserver, &cls, &tcp_frame(101, 501, PSH | ACK, b"GET /\r\n"));
    assert_eq!(s.tcp_seq[0], 108);
    assert_eq!(s.buffered_segments(), 0);
    assert_eq!(s.first_bytes_len[0], 7);
    assert_eq!(&s.first_bytes[0][..7], b"GET /\r\n");
    assert_eq!(s.total_databytes[0], 7);

    let calls = cls.tcp_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], b"GET /\r\n");
}

#[test]
fn out_of_order_segment_waits_for_the_gap_to_fill() {
    let tap = helpers::TapClassifier::new();
    let mut s = new_session();
    handshake(&mut s, &NullObserver, &tap);

    // Five bytes past the gap: buffered, nothing delivered.
    assert!(!feed(&mut s, &NullObserver, &tap, &tcp_frame(108, 501, ACK, b"hello")));
    assert_eq!(s.buffered_segments(), 1);
    assert_eq!(s.tcp_seq[0], 101);

    // A retransmit entirely behind the delivery point is dropped.
    assert!(feed(&mut s, &NullObserver, &tap, &tcp_frame(95, 501, ACK, b"abcdef")));
    assert_eq!(s.buffered_segments(), 1);

    // The gap fill releases both segments in order.
    feed(&mut s, &NullObserver, &tap, &tcp_frame(101, 501, ACK, b"GET /\r\n"));
    assert_eq!(s.tcp_seq[0], 113);
    assert_eq!(s.buffered_segments(), 0);
    assert_eq!(tap.streams.lock().unwrap()[0], b"GET /\r\nhello");
}

#[test]
fn duplicate_offsets_keep_the_longer_segment() {
    let mut s = new_session();
    handshake(&mut s, &NullObserver, &NullClassifier);

    // Both past the gap at 101 so neither delivers yet.
    feed(&mut s, &NullObserver, &NullClassifier, &tcp_frame(110, 501, ACK, b"abcd"));
    feed(&mut s, &NullObserver, &NullClassifier, &tcp_frame(110, 501, ACK, b"abcdefg"));
    assert_eq!(s.buffered_segments(), 1);

    let tap = helpers::TapClassifier::new();
    feed(&mut s, &NullObserver, &tap, &tcp_frame(101, 501, ACK, b"123456789"));
    assert_eq!(s.tcp_seq[0], 117);
    assert_eq!(tap.streams.lock().unwrap()[0], b"123456789abcdefg");
}

#[test]
fn fin_in_both_directions_closes_exactly_once() {
    let collector = helpers::Collector::default();
    let mut s = new_session();
    handshake(&mut s, &collector, &NullClassifier);

    feed(&mut s, &collector, &NullClassifier, &tcp_frame(101, 501, FIN | ACK, b""));
    assert_eq!(s.tcp_state[0], TcpState::Fin);

    feed(&mut s, &collector, &NullClassifier, &tcp_frame_reverse(501, 102, ACK, b""));
    assert_eq!(s.tcp_state[0], TcpState::FinAck);
    assert_eq!(*collector.closes.lock().unwrap(), 0);

    feed(&mut s, &collector, &NullClassifier, &tcp_frame_reverse(501, 102, FIN | ACK, b""));
    assert_eq!(s.tcp_state[1], TcpState::Fin);

    feed(&mut s, &collector, &NullClassifier, &tcp_frame(102, 502, ACK, b""));
    assert_eq!(s.tcp_state[1], TcpState::FinAck);
    assert_eq!(*collector.closes.lock().unwrap(), 1);

    // A straggling reset does not request a second close.
    feed(&mut s, &collector, &NullClassifier, &tcp_frame(102, 502, RST, b""));
    assert_eq!(*collector.closes.lock().unwrap(), 1);
}

#[test]
fn buffer_overflow_abandons_reassembly() {
    let mut s = new_session();
    feed(&mut s, &NullObserver, &NullClassifier, &tcp_frame(100, 0, SYN, b""));

    // None of these cover the next expected byte, so they all buffer.
    for i in 0..300u32 {
        let seq = 1000 + i * 10;
        feed(&mut s, &NullObserver, &NullClassifier, &tcp_frame(seq, 501, ACK, b"data"));
    }

    assert!(s.stop_tcp);
    assert!(s.tags.contains("incomplete-tcp"));
    assert_eq!(s.buffered_segments(), 0);

    // Later payload is ignored outright.
    feed(&mut s, &NullObserver, &NullClassifier, &tcp_frame(101, 501, ACK, b"GET /\r\n"));
    assert_eq!(s.tcp_seq[0], 101);
    assert_eq!(s.buffered_segments(), 0);
    assert_eq!(s.total_databytes[0], 0);
}

#[test]
fn direction_is_stable_for_every_frame() {
    let mut s = new_session();
    let fwd = helpers::decode_packet(&tcp_frame(1, 1, ACK, b""), PacketTime::default());
    let rev = helpers::decode_packet(&tcp_frame_reverse(1, 1, ACK, b""), PacketTime::default());
    assert_eq!(s.direction_of(&fwd), Direction::Forward);
    assert_eq!(s.direction_of(&rev), Direction::Reverse);
    // Still stable after TCP state changes.
    handshake(&mut s, &NullObserver, &NullClassifier);
    assert_eq!(s.direction_of(&fwd), Direction::Forward);
    assert_eq!(s.direction_of(&rev), Direction::Reverse);
}
