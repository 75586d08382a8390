mod loader;
mod root;

pub use loader::load_from_path;
pub use root::{Config, DontSaveBpf, LoggingConfig, MAX_PACKET_THREADS};
