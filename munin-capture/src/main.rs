#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use munin_capture_lib::config::LoggingConfig;
use munin_capture_lib::{
    load_from_path, Config, Hooks, NullClassifier, NullObserver, PcapFileReader, PcapFileWriter,
    Pipeline, Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Munin passive capture core (offline pcap replay)")]
struct Cli {
    /// Path to configuration TOML file; defaults apply when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Pcap file to replay through the pipeline
    #[arg(short = 'r', long, value_name = "PCAP")]
    read_file: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_from_path(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                init_tracing(&LoggingConfig::default());
                error!(%err, "failed to load configuration");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    init_tracing(&config.logging);

    if let Err(err) = replay(Arc::new(config), &cli.read_file) {
        error!(%err, "capture replay failed");
        std::process::exit(1);
    }
}

fn replay(config: Arc<Config>, pcap: &Path) -> Result<()> {
    let mut reader = PcapFileReader::open(pcap)?;
    info!(path = %pcap.display(), link_type = reader.link_type(), "capture file opened");

    let writer = Arc::new(PcapFileWriter::new(
        &config.pcap_dir,
        config.max_file_size,
        reader.link_type(),
    )?);
    let hooks = Hooks {
        source: Arc::new(reader.source()),
        writer: Arc::clone(&writer) as Arc<dyn munin_capture_lib::FrameWriter>,
        observer: Arc::new(NullObserver),
        classifier: Arc::new(NullClassifier),
        scanner: None,
    };
    let pipeline = Pipeline::new(Arc::clone(&config), reader.link_type(), hooks)?;

    let mut rejected: u64 = 0;
    while let Some((ts, frame)) = reader.next()? {
        if !pipeline.ingest(ts, &frame) {
            rejected += 1;
        }
    }

    pipeline.flush();
    writer.flush()?;

    let stats = pipeline.stats();
    info!(
        packets = stats.packets,
        bytes = stats.bytes,
        rejected,
        "replay complete"
    );
    pipeline.shutdown();
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(logging.show_target)
        .init();
}
