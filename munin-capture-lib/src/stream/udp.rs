use crate::hooks::ProtocolClassifier;
use crate::packet::Packet;
use crate::session::Session;

/// Process one UDP datagram: sample the first payload bytes on the first
/// observation in a direction and give the classifier one shot at it. No
/// reordering, no delivery chain.
pub fn process(session: &mut Session, packet: &Packet, classifier: &dyn ProtocolClassifier) {
    let Some(len) = packet.payload_len.checked_sub(8) else {
        return;
    };
    if len == 0 {
        return;
    }
    let start = packet.payload_offset + 8;
    let Some(data) = packet.data.get(start..start + len) else {
        return;
    };

    let w = packet.direction.index();
    if session.first_bytes_len[w] == 0 {
        let n = data.len().min(8);
        session.first_bytes[w][..n].copy_from_slice(&data[..n]);
        session.first_bytes_len[w] = n;

        if !session.stop_spi {
            classifier.classify_udp(session, data, packet.direction);
        }
    }
}
