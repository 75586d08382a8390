use std::fs;
use std::path::Path;

use crate::config::{Config, MAX_PACKET_THREADS};
use crate::error::{CaptureError, Result};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| CaptureError::Config(format!("Failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&txt)
        .map_err(|e| CaptureError::Config(format!("Failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.packet_threads == 0 {
        return Err(CaptureError::Config("packet_threads must be at least 1".to_string()));
    }
    if cfg.packet_threads > MAX_PACKET_THREADS {
        return Err(CaptureError::Config(format!(
            "packet_threads must be at most {MAX_PACKET_THREADS}, got {}",
            cfg.packet_threads
        )));
    }
    if cfg.log_every_x_packets == 0 {
        return Err(CaptureError::Config("log_every_x_packets must be non-zero".to_string()));
    }
    if cfg.max_file_size < 1024 {
        return Err(CaptureError::Config(format!(
            "max_file_size too small to hold a capture file header: {}",
            cfg.max_file_size
        )));
    }
    for entry in &cfg.dont_save_bpfs {
        if entry.bpf.trim().is_empty() {
            return Err(CaptureError::Config("dont_save_bpfs entry with empty bpf".to_string()));
        }
    }

    Ok(())
}
