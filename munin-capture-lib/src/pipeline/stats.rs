use std::sync::atomic::{AtomicU64, Ordering};

/// Global ingress counters, incremented on the producer side only.
#[derive(Debug, Default)]
pub(crate) struct PacketCounters {
    total_packets: AtomicU64,
    total_bytes: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineStats {
    pub packets: u64,
    pub bytes: u64,
}

impl PacketCounters {
    /// Record one accepted frame; returns the new packet total.
    pub(crate) fn record(&self, frame_len: u64) -> u64 {
        self.total_bytes.fetch_add(frame_len, Ordering::Relaxed);
        self.total_packets.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    pub(crate) fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            packets: self.total_packets.load(Ordering::Relaxed),
            bytes: self.total_bytes.load(Ordering::Relaxed),
        }
    }
}
