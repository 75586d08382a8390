use std::path::PathBuf;

use serde::Deserialize;

/// Upper bound on worker threads; the session space is partitioned by worker,
/// so this also caps the shard count.
pub const MAX_PACKET_THREADS: usize = 24;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Number of packet worker threads
    /// Each worker owns one queue and one shard of the session space
    /// Default: 1
    #[serde(default = "default_packet_threads")]
    pub packet_threads: usize,
    /// Per-session packet count after which a mid-session save is requested
    /// Default: 10000
    #[serde(default = "default_max_packets")]
    pub max_packets: u32,
    /// Seconds added to session creation time to form the save deadline
    /// Default: 400
    #[serde(default = "default_tcp_save_timeout")]
    pub tcp_save_timeout: u64,
    /// If true and the first captured packet of a session is a SYN+ACK,
    /// assume the SYN was dropped and swap the endpoints so endpoint 1 is
    /// the presumed initiator
    /// Default: false
    #[serde(default)]
    pub anti_syn_drop: bool,
    /// "Don't save" BPF filters with their per-filter stop thresholds
    /// The expression is consumed by the reader collaborator; the core only
    /// uses the stop threshold of whichever filter the reader reports
    #[serde(default)]
    pub dont_save_bpfs: Vec<DontSaveBpf>,
    /// Emit one progress log line every this many packets
    /// Default: 50000
    #[serde(default = "default_log_every_x_packets")]
    pub log_every_x_packets: u64,
    /// Log rejected frames with unknown IP protocols
    /// Default: false
    #[serde(default)]
    pub log_unknown_protocols: bool,
    /// Run the payload scanner over every delivered TCP chunk
    /// Default: false
    #[serde(default)]
    pub yara: bool,
    /// Decode GRE-in-IPv4 encapsulation recursively
    /// Default: false
    #[serde(default)]
    pub parse_gre: bool,
    /// Verbose logging for ignored (indexer self-traffic) connections
    /// Default: false
    #[serde(default)]
    pub debug: bool,
    /// Rotate capture files when the next record would exceed this size
    /// Default: 2 GiB
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Directory where rotated capture files are written
    /// Default: "raw"
    #[serde(default = "default_pcap_dir")]
    pub pcap_dir: PathBuf,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One "don't save" filter entry
#[derive(Debug, Deserialize, Clone)]
pub struct DontSaveBpf {
    /// BPF expression, matched by the reader collaborator
    pub bpf: String,
    /// Stop persisting the session once it holds this many packets
    /// Default: 1 (save nothing beyond the matching packet's session record)
    #[serde(default = "default_bpf_stop")]
    pub stop: u32,
}

/// Logging configuration
/// Controls application-level structured logging (stdout/stderr)
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    /// Default: "info"
    /// Can be overridden at runtime via RUST_LOG environment variable
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Show module path (target) in log messages
    /// Default: false
    #[serde(default)]
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: default_log_level(), show_target: false }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            packet_threads: default_packet_threads(),
            max_packets: default_max_packets(),
            tcp_save_timeout: default_tcp_save_timeout(),
            anti_syn_drop: false,
            dont_save_bpfs: Vec::new(),
            log_every_x_packets: default_log_every_x_packets(),
            log_unknown_protocols: false,
            yara: false,
            parse_gre: false,
            debug: false,
            max_file_size: default_max_file_size(),
            pcap_dir: default_pcap_dir(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_packet_threads() -> usize {
    1
}

fn default_max_packets() -> u32 {
    10_000
}

fn default_tcp_save_timeout() -> u64 {
    400
}

fn default_log_every_x_packets() -> u64 {
    50_000
}

fn default_max_file_size() -> u64 {
    2 * 1024 * 1024 * 1024
}

fn default_pcap_dir() -> PathBuf {
    PathBuf::from("raw")
}

fn default_bpf_stop() -> u32 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}
