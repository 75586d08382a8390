//! The sharded packet pipeline: ingress decode + dispatch, one queue and one
//! worker per shard, global counters, and the flush/shutdown lifecycle.
//!
//! A packet's flow key deterministically selects its worker, so a session is
//! only ever touched by the thread that created it and needs no locking.

mod queue;
mod stats;
mod worker;

pub use stats::PipelineStats;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use tracing::{info, warn};

use crate::config::Config;
use crate::decode::{FrameDecoder, LinkType};
use crate::error::Result;
use crate::fields::{CoreFields, FieldRegistry};
use crate::hooks::{Hooks, ReaderStats};
use crate::packet::{Packet, PacketTime};

use queue::PacketQueue;
use stats::PacketCounters;
use worker::Worker;

pub struct Pipeline {
    config: Arc<Config>,
    decoder: FrameDecoder,
    hash: ahash::RandomState,
    queues: Arc<Vec<PacketQueue>>,
    counters: PacketCounters,
    initial_dropped: AtomicU64,
    initial_packet_secs: AtomicU64,
    last_packet_secs: Arc<Vec<AtomicU64>>,
    hooks: Hooks,
    fields: Arc<FieldRegistry>,
    core_fields: CoreFields,
    workers: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Validate the capture link type, register the core's session fields,
    /// and spawn one worker per configured thread.
    pub fn new(config: Arc<Config>, dlt: u32, hooks: Hooks) -> Result<Self> {
        let link_type = LinkType::from_dlt(dlt)?;
        let threads = config.packet_threads.max(1);

        let mut registry = FieldRegistry::new();
        let core_fields = CoreFields::register(&mut registry);

        let queues: Arc<Vec<PacketQueue>> =
            Arc::new((0..threads).map(|_| PacketQueue::new()).collect());
        let last_packet_secs: Arc<Vec<AtomicU64>> =
            Arc::new((0..threads).map(|_| AtomicU64::new(0)).collect());

        let mut workers = Vec::with_capacity(threads);
        for t in 0..threads {
            let worker = Worker::new(
                t,
                Arc::clone(&queues),
                Arc::clone(&config),
                link_type,
                hooks.clone(),
                core_fields,
                Arc::clone(&last_packet_secs),
            );
            let handle = std::thread::Builder::new()
                .name(format!("munin-pkt{t}"))
                .spawn(move || worker.run())?;
            workers.push(handle);
        }

        Ok(Pipeline {
            decoder: FrameDecoder::new(link_type, &config),
            config,
            hash: ahash::RandomState::new(),
            queues,
            counters: PacketCounters::default(),
            initial_dropped: AtomicU64::new(0),
            initial_packet_secs: AtomicU64::new(0),
            last_packet_secs,
            hooks,
            fields: Arc::new(registry),
            core_fields,
            workers,
        })
    }

    /// Entry point from the reader: decode one raw frame, copy it into an
    /// owned packet, and route it to the worker owning its flow.
    ///
    /// Returns whether the frame was accepted; rejected frames are dropped
    /// without counting.
    pub fn ingest(&self, ts: PacketTime, frame: &[u8]) -> bool {
        let Some(decoded) = self.decoder.decode(frame) else {
            return false;
        };

        let total = self.counters.record(frame.len() as u64);
        if total == 1 {
            if let Ok(stats) = self.hooks.source.stats() {
                self.initial_dropped.store(stats.dropped, Ordering::Relaxed);
            }
            self.initial_packet_secs.store(ts.secs, Ordering::Relaxed);
            info!(
                secs = ts.secs,
                initial_dropped = self.initial_dropped.load(Ordering::Relaxed),
                "initial packet"
            );
        }
        if total % self.config.log_every_x_packets == 0 {
            self.log_progress(total);
        }

        let packet = Packet::from_decoded(ts, Bytes::copy_from_slice(frame), decoded);
        let thread = (self.hash.hash_one(packet.key) % self.queues.len() as u64) as usize;
        self.queues[thread].push(packet);
        true
    }

    fn log_progress(&self, total: u64) {
        // A failing reader counts as zero drops for this cycle.
        let stats = self.hooks.source.stats().unwrap_or(ReaderStats { total, dropped: 0 });
        let dropped = stats.dropped.saturating_sub(self.initial_dropped.load(Ordering::Relaxed));
        let drop_pct = dropped as f64 * 100.0 / stats.total.max(1) as f64;
        info!(
            packets = total,
            bytes = self.counters.total_bytes(),
            recv = stats.total,
            dropped,
            drop_pct,
            packet_queue = self.outstanding(),
            writer_queue = self.hooks.writer.queue_length(),
            indexer_queue = self.hooks.observer.indexer_queue_length(),
            "progress"
        );
    }

    /// Busy-poll until every worker queue is empty. Main thread only; a
    /// deliberately simple quiesce for shutdown and tests.
    pub fn flush(&self) {
        loop {
            if self.queues.iter().all(|q| q.len() == 0) {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// Packets sitting in worker queues, not yet processed.
    pub fn outstanding(&self) -> usize {
        self.queues.iter().map(PacketQueue::len).sum()
    }

    /// Drops reported by the reader since the first ingested packet.
    pub fn dropped_packets(&self) -> u64 {
        match self.hooks.source.stats() {
            Ok(stats) => stats.dropped.saturating_sub(self.initial_dropped.load(Ordering::Relaxed)),
            Err(_) => 0,
        }
    }

    /// Wake one worker so it drains pending session-management commands.
    pub fn thread_wake(&self, thread: usize) {
        if let Some(q) = self.queues.get(thread) {
            q.wake();
        }
    }

    pub fn link_type(&self) -> LinkType {
        self.decoder.link_type()
    }

    pub fn core_fields(&self) -> CoreFields {
        self.core_fields
    }

    pub fn field_registry(&self) -> &FieldRegistry {
        &self.fields
    }

    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    pub fn last_packet_secs(&self, thread: usize) -> u64 {
        self.last_packet_secs.get(thread).map_or(0, |t| t.load(Ordering::Relaxed))
    }

    pub fn initial_packet_secs(&self) -> u64 {
        self.initial_packet_secs.load(Ordering::Relaxed)
    }

    /// Signal every worker to exit once its queue drains, then join them.
    /// Each worker hands its remaining sessions to the observer's
    /// `on_session_end` before exiting.
    pub fn shutdown(mut self) {
        for q in self.queues.iter() {
            q.shutdown();
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("packet worker panicked during shutdown");
            }
        }
    }
}
