//! Interfaces the capture core consumes from its collaborators: the capture
//! reader, the frame writer, the session-lifecycle owner, the protocol
//! classifiers they install, and the optional payload scanner.

use std::sync::Arc;

use crate::error::Result;
use crate::flow::{Direction, FlowKey};
use crate::packet::Packet;
use crate::session::Session;

/// Counters reported by the capture source.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderStats {
    pub total: u64,
    pub dropped: u64,
}

/// The capture reader, as far as the core is concerned.
pub trait PacketSource: Send + Sync {
    fn stats(&self) -> Result<ReaderStats>;

    /// Which "don't save" BPF filter matches this packet, if any. The index
    /// selects the stop threshold from `dont_save_bpfs` in the configuration.
    fn should_filter(&self, _packet: &Packet) -> Option<usize> {
        None
    }
}

/// Persists one frame and back-fills `writer_file_num` / `writer_file_pos`
/// on the packet.
pub trait FrameWriter: Send + Sync {
    fn write(&self, packet: &mut Packet) -> Result<()>;

    fn queue_length(&self) -> usize {
        0
    }
}

/// Session-lifecycle collaborator: command processing, close/save requests,
/// and the self-traffic predicate. All methods default to no-ops so tests and
/// the offline binary can plug in only what they observe.
pub trait SessionObserver: Send + Sync {
    /// Run pending session-management commands addressed to this worker.
    /// Called once per worker wakeup, packet or not.
    fn process_commands(&self, _thread: usize) {}

    /// A session was just created.
    fn on_new(&self, _session: &mut Session) {}

    /// First SYN observed on a session; fired once. The expiry collaborator
    /// uses this to schedule periodic flushes of long-lived TCP sessions.
    fn on_tcp_start(&self, _session: &mut Session) {}

    /// Both directions reached FIN-ACK (or RST closed the conversation).
    /// Fired at most once per session.
    fn mark_for_close(&self, _session: &mut Session) {}

    /// The session hit the per-session packet limit and should be saved
    /// without being evicted.
    fn mid_save(&self, _session: &mut Session, _ts_secs: u64) {}

    /// Is this flow the indexing pipeline talking to itself? Matching
    /// sessions are neither inspected nor persisted.
    fn is_self_traffic(&self, _key: &FlowKey) -> bool {
        false
    }

    /// A worker is shutting down and hands over its remaining sessions.
    fn on_session_end(&self, _session: Session) {}

    fn indexer_queue_length(&self) -> usize {
        0
    }
}

/// Installed by classifiers; runs on every delivered chunk of a stream.
/// Returns how many bytes it consumed (`0..=len`).
pub trait StreamParser: Send {
    fn on_data(&mut self, session: &mut Session, data: &[u8], dir: Direction) -> usize;
}

/// Protocol classification: `classify_tcp`/`classify_udp` look at the first
/// bytes of a stream and install [`StreamParser`]s on the session.
pub trait ProtocolClassifier: Send + Sync {
    fn initial_tag(&self, _session: &mut Session) {}

    fn classify_tcp(&self, _session: &mut Session, _data: &[u8], _dir: Direction) {}

    fn classify_udp(&self, _session: &mut Session, _data: &[u8], _dir: Direction) {}
}

/// Rule-engine seam; invoked on every delivered TCP chunk when enabled.
pub trait PayloadScanner: Send + Sync {
    fn scan(&self, session: &mut Session, data: &[u8]);
}

/// The collaborator bundle a pipeline is built with.
#[derive(Clone)]
pub struct Hooks {
    pub source: Arc<dyn PacketSource>,
    pub writer: Arc<dyn FrameWriter>,
    pub observer: Arc<dyn SessionObserver>,
    pub classifier: Arc<dyn ProtocolClassifier>,
    pub scanner: Option<Arc<dyn PayloadScanner>>,
}

/// Source with no drop reporting and no filters.
pub struct NullSource;

impl PacketSource for NullSource {
    fn stats(&self) -> Result<ReaderStats> {
        Ok(ReaderStats::default())
    }
}

/// Observer that ignores every notification.
pub struct NullObserver;

impl SessionObserver for NullObserver {}

/// Classifier that installs nothing.
pub struct NullClassifier;

impl ProtocolClassifier for NullClassifier {}
