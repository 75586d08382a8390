use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Config;
use crate::decode::{LinkType, ETHERTYPE_VLAN};
use crate::fields::CoreFields;
use crate::flow::{Direction, FlowKey, Transport};
use crate::hooks::Hooks;
use crate::packet::Packet;
use crate::session::Session;
use crate::stream::{tcp, udp};

use super::queue::PacketQueue;

/// One packet worker. Owns a queue and the shard of the session space whose
/// flow keys hash to it; no other thread touches those sessions.
pub(crate) struct Worker {
    thread: usize,
    queues: Arc<Vec<PacketQueue>>,
    config: Arc<Config>,
    link_type: LinkType,
    hooks: Hooks,
    core_fields: CoreFields,
    last_packet_secs: Arc<Vec<AtomicU64>>,
    sessions: HashMap<FlowKey, Session, ahash::RandomState>,
}

impl Worker {
    pub(crate) fn new(
        thread: usize,
        queues: Arc<Vec<PacketQueue>>,
        config: Arc<Config>,
        link_type: LinkType,
        hooks: Hooks,
        core_fields: CoreFields,
        last_packet_secs: Arc<Vec<AtomicU64>>,
    ) -> Self {
        Worker {
            thread,
            queues,
            config,
            link_type,
            hooks,
            core_fields,
            last_packet_secs,
            sessions: HashMap::default(),
        }
    }

    pub(crate) fn run(mut self) {
        loop {
            let (packet, shutdown) = self.queues[self.thread].pop_wait();
            self.hooks.observer.process_commands(self.thread);
            match packet {
                Some(packet) => self.process_packet(packet),
                None if shutdown => break,
                None => {}
            }
        }
        for (_, session) in self.sessions.drain() {
            self.hooks.observer.on_session_end(session);
        }
    }

    fn process_packet(&mut self, mut packet: Packet) {
        let Worker {
            thread, config, link_type, hooks, core_fields, last_packet_secs, sessions, ..
        } = self;
        let thread = *thread;
        let link_type = *link_type;
        let core_fields = *core_fields;

        last_packet_secs[thread].store(packet.ts.secs, Ordering::Relaxed);

        if !sessions.contains_key(&packet.key) {
            let session = create_session(thread, config, hooks, &packet);
            sessions.insert(packet.key, session);
        }
        let Some(session) = sessions.get_mut(&packet.key) else {
            return;
        };

        let dir = session.direction_of(&packet);
        packet.direction = dir;
        let w = dir.index();

        match packet.transport {
            Transport::Udp => {
                session.databytes[w] += (packet.frame_len() as u64).saturating_sub(8);
            }
            Transport::Tcp => {
                if let Some(hdr) = tcp::TcpHeader::parse(&packet) {
                    session.tcp_flags |= hdr.flags;
                }
            }
            Transport::Icmp => {}
        }

        // First packet in this direction: consult the "don't save" filters.
        if session.packets[w] == 0
            && session.stop_saving == 0
            && !config.dont_save_bpfs.is_empty()
        {
            if let Some(i) = hooks.source.should_filter(&packet) {
                if let Some(entry) = config.dont_save_bpfs.get(i) {
                    session.stop_saving = entry.stop;
                }
            }
        }

        session.packets[w] += 1;
        session.bytes[w] += packet.frame_len() as u64;
        session.last_packet = packet.ts;

        let packets = session.packets[0] + session.packets[1];
        if session.stop_saving == 0 || packets < session.stop_saving {
            match hooks.writer.write(&mut packet) {
                Ok(()) => {
                    if session.last_file_num != Some(packet.writer_file_num) {
                        session.last_file_num = Some(packet.writer_file_num);
                        session.file_nums.push(packet.writer_file_num);
                        session.file_positions.push(-i64::from(packet.writer_file_num));
                        session.file_lengths.push(0);
                    }
                    session.file_positions.push(packet.writer_file_pos as i64);
                    session.file_lengths.push(16 + packet.frame_len() as u32);
                }
                Err(err) => {
                    warn!(thread, %err, "frame writer failed, dropping persistence record");
                }
            }

            if packets >= config.max_packets {
                hooks.observer.mid_save(session, packet.ts.secs);
            }
        }

        if link_type == LinkType::Ethernet && session.first_bytes_len[w] < 8 {
            attach_link_metadata(session, &packet, dir, core_fields);
        }

        if let Some(env) = packet.gre {
            session.fields.add_int(core_fields.gre_ip, u32::from(env.src));
            session.fields.add_int(core_fields.gre_ip, u32::from(env.dst));
            session.add_protocol("gre");
        }

        match packet.transport {
            Transport::Icmp => {
                // Session bookkeeping only; ICMP payloads are not inspected.
            }
            Transport::Udp => udp::process(session, &packet, hooks.classifier.as_ref()),
            Transport::Tcp => {
                let scanner = if config.yara { hooks.scanner.as_deref() } else { None };
                let freed = tcp::process(session, packet, hooks.observer.as_ref());
                tcp::deliver(session, hooks.classifier.as_ref(), scanner);
                drop(freed);
            }
        }
    }
}

fn create_session(thread: usize, config: &Config, hooks: &Hooks, packet: &Packet) -> Session {
    let save_time = packet.ts.secs + config.tcp_save_timeout;
    let mut session = Session::new(
        thread,
        packet.transport,
        packet.src_addr,
        packet.dst_addr,
        packet.tos,
        packet.ts,
        save_time,
    );
    hooks.classifier.initial_tag(&mut session);

    match packet.transport {
        Transport::Tcp => {
            let flags = tcp::TcpHeader::parse(packet).map_or(0, |h| h.flags);
            if flags & tcp::TH_SYN != 0 && flags & tcp::TH_ACK != 0 && config.anti_syn_drop {
                // First seen frame is a SYN+ACK: assume the SYN was dropped
                // and make endpoint 1 the presumed initiator.
                std::mem::swap(&mut session.addr1, &mut session.addr2);
                session.port1 = packet.dst_port;
                session.port2 = packet.src_port;
            } else {
                session.port1 = packet.src_port;
                session.port2 = packet.dst_port;
            }
            if hooks.observer.is_self_traffic(&packet.key) {
                if config.debug {
                    debug!(key = %packet.key, "ignoring indexer self-traffic");
                }
                session.stop_spi = true;
                session.stop_saving = 1;
            }
        }
        Transport::Udp => {
            session.port1 = packet.src_port;
            session.port2 = packet.dst_port;
        }
        Transport::Icmp => {}
    }

    hooks.observer.on_new(&mut session);
    session
}

fn attach_link_metadata(
    session: &mut Session,
    packet: &Packet,
    dir: Direction,
    fields: CoreFields,
) {
    let Some(eth) = packet.data.get(..12) else {
        return;
    };
    let dst_mac = format_mac(&eth[0..6]);
    let src_mac = format_mac(&eth[6..12]);
    // mac.src accumulates the initiator-side address, mac.dst the responder's.
    if dir == Direction::Reverse {
        session.fields.add_string(fields.mac_src, dst_mac);
        session.fields.add_string(fields.mac_dst, src_mac);
    } else {
        session.fields.add_string(fields.mac_src, src_mac);
        session.fields.add_string(fields.mac_dst, dst_mac);
    }

    let mut n = 12;
    while let (Some(&a), Some(&b)) = (packet.data.get(n), packet.data.get(n + 1)) {
        if u16::from_be_bytes([a, b]) != ETHERTYPE_VLAN {
            break;
        }
        let (Some(&hi), Some(&lo)) = (packet.data.get(n + 2), packet.data.get(n + 3)) else {
            break;
        };
        session.fields.add_int(fields.vlan, u32::from(u16::from_be_bytes([hi, lo]) & 0x0fff));
        n += 4;
    }
}

fn format_mac(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(17);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(':');
        }
        out.push_str(&format!("{b:02x}"));
    }
    out
}
