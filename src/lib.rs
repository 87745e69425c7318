mod app;
mod catalog;
mod cli;
mod codec;
mod crc;
mod dispatch;
mod error;
mod frame;
mod gateway;
mod message;
mod sink;
mod source;
mod telemetry;
mod terminal;
mod utils;

pub use app::{load_catalog, run, run_with_terminal};
pub use catalog::{
    ByteOrder, CatalogHandle, CatalogInfo, CatalogOptions, CatalogSource, JsonCatalogSource,
    MessageCatalog, MessageDescriptor, MessageRef, SignalDescriptor,
};
pub use cli::{
    Args, Command, DecodeArgs, EncodeArgs, LogLevel, MessageArgs, OutputFormat, ServeArgs,
};
pub use codec::{
    EncodeError, LayoutError, MAX_BIT_LENGTH, SignalCodec, SignalMap, SignalRangeError,
    SignalValues,
};
pub use crc::Crc16Arc;
pub use dispatch::{Dispatcher, GatewayStats, StatsSnapshot};
pub use error::{CatalogError, GatewayError};
pub use frame::{
    DecodedFrame, FRAME_LEN, FrameCodec, FrameError, FrameHeader, MAX_DEVICE_ADDRESS,
    MAX_MESSAGE_ID, PAYLOAD_LEN,
};
pub use gateway::{Gateway, GatewayConfig, GatewayIntake};
pub use message::DecodedMessage;
pub use sink::{JsonLinesSink, MemorySink, OutputSink};
pub use source::{DEFAULT_SOURCE_LABEL, FrameSource, LineFrameSource, SourceError, SourceFrame};
pub use terminal::TerminalClient;
