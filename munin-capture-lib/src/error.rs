use thiserror::Error;

/// Errors that can occur in the capture core
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported pcap link type {0}")]
    UnsupportedLinkType(u32),

    #[error("Corrupt capture file: {0}")]
    CorruptCapture(String),

    #[error("Reader error: {0}")]
    Reader(String),
}

pub type Result<T> = std::result::Result<T, CaptureError>;
