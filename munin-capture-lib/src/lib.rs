#![forbid(unsafe_code)]

pub mod config;
pub mod decode;
pub mod error;
pub mod fields;
pub mod flow;
pub mod hooks;
pub mod packet;
pub mod pipeline;
pub mod reader;
pub mod session;
pub mod stream;
pub mod writer;

pub use config::{load_from_path, Config};
pub use decode::{FrameDecoder, LinkType};
pub use error::{CaptureError, Result};
pub use fields::{CoreFields, FieldRegistry};
pub use flow::{Direction, FlowKey, Transport};
pub use hooks::{
    FrameWriter, Hooks, NullClassifier, NullObserver, NullSource, PacketSource, PayloadScanner,
    ProtocolClassifier, ReaderStats, SessionObserver, StreamParser,
};
pub use packet::{Packet, PacketTime};
pub use pipeline::{Pipeline, PipelineStats};
pub use reader::PcapFileReader;
pub use session::{Session, TcpState};
pub use writer::PcapFileWriter;
