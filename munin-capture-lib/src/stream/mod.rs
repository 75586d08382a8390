//! Transport-layer processing: TCP reassembly and UDP first-bytes capture.
//! ICMP is intentionally untouched beyond session bookkeeping.

pub mod tcp;
pub mod udp;
