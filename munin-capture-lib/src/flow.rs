use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Transport protocol of a flow. ICMPv6 collapses into [`Transport::Icmp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Tcp,
    Udp,
    Icmp,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Udp => "udp",
            Transport::Icmp => "icmp",
        }
    }
}

/// Which way a frame travels relative to the session's stored endpoint order.
///
/// `Forward` means the frame's `(src, sport) → (dst, dport)` matches the
/// session's `(addr1, port1) → (addr2, port2)` ordering fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn index(self) -> usize {
        match self {
            Direction::Forward => 0,
            Direction::Reverse => 1,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }
}

/// Canonical flow identifier.
///
/// IPv4 addresses are widened to the IPv4-mapped IPv6 form so both families
/// share one key shape, and the numerically smaller `(addr, port)` endpoint is
/// stored first so the two directions of a conversation hash and compare
/// equal. The initiator-first endpoint ordering of a session is separate state
/// fixed at session creation, not part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub addr_a: Ipv6Addr,
    pub addr_b: Ipv6Addr,
    pub port_a: u16,
    pub port_b: u16,
    pub transport: Transport,
}

impl FlowKey {
    pub fn new(
        src: Ipv6Addr,
        src_port: u16,
        dst: Ipv6Addr,
        dst_port: u16,
        transport: Transport,
    ) -> Self {
        if (src, src_port) <= (dst, dst_port) {
            FlowKey { addr_a: src, addr_b: dst, port_a: src_port, port_b: dst_port, transport }
        } else {
            FlowKey { addr_a: dst, addr_b: src, port_a: dst_port, port_b: src_port, transport }
        }
    }

    pub fn v4(
        src: Ipv4Addr,
        src_port: u16,
        dst: Ipv4Addr,
        dst_port: u16,
        transport: Transport,
    ) -> Self {
        Self::new(src.to_ipv6_mapped(), src_port, dst.to_ipv6_mapped(), dst_port, transport)
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:[{}]:{}-[{}]:{}",
            self.transport.as_str(),
            self.addr_a,
            self.port_a,
            self.addr_b,
            self.port_b
        )
    }
}
