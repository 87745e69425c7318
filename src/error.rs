use derive_more::From;
use thiserror::Error;

use crate::codec::EncodeError;
use crate::frame::FrameError;

/// Errors returned while loading or querying a message catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog `{path}`")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("catalog `{source_name}` is not a valid catalog document")]
    Parse {
        source_name: String,
        source: serde_json::Error,
    },
    #[error("message id {id} is declared more than once")]
    DuplicateMessageId { id: u32 },
    #[error("message name `{name}` is declared more than once")]
    DuplicateMessageName { name: String },
    #[error("message `{message}` has invalid length {byte_length}; expected 1..=8 bytes")]
    InvalidByteLength { message: String, byte_length: u8 },
    #[error("message `{message}` declares signal `{signal}` more than once")]
    DuplicateSignalName { message: String, signal: String },
    #[error("signal `{message}.{signal}` has invalid bit length {bit_length}; expected 1..=64")]
    InvalidBitLength {
        message: String,
        signal: String,
        bit_length: u8,
    },
    #[error(
        "signal `{message}.{signal}` ({bit_length} bits from bit {start_bit}) does not fit the {byte_length}-byte message"
    )]
    SignalOutOfBounds {
        message: String,
        signal: String,
        start_bit: u16,
        bit_length: u8,
        byte_length: u8,
    },
    #[error("signal `{message}.{signal}` needs a finite, non-zero scale and a finite offset")]
    InvalidScale { message: String, signal: String },
    #[error("signal `{message}.{signal}` has a minimum above its maximum")]
    InvalidBounds { message: String, signal: String },
    #[error("signals `{first}` and `{second}` of message `{message}` share payload bits")]
    OverlappingSignals {
        message: String,
        first: String,
        second: String,
    },
    #[error("no message named or numbered `{reference}` in the catalog")]
    UnknownMessage { reference: String },
}

/// Errors returned when validating command-line input.
#[derive(Debug, Error)]
pub(crate) enum CliConfigError {
    #[error("signal assignment `{value}` must have the form name=value")]
    InvalidSignalAssignment { value: String },
    #[error("signal assignment `{value}` does not carry a number")]
    InvalidSignalValue {
        value: String,
        source: std::num::ParseFloatError,
    },
    #[error("signal `{signal}` is assigned more than once")]
    DuplicateSignalAssignment { signal: String },
    #[error("no message catalog given; pass --catalog or set BUSGATE_CATALOG")]
    MissingCatalog,
}

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Top-level gateway errors wrapping module-specific error types.
#[derive(Debug, Error, From)]
pub enum GatewayError {
    #[error(transparent)]
    #[from(FrameError, Box<FrameError>)]
    Frame(Box<FrameError>),
    #[error(transparent)]
    #[from(CatalogError, Box<CatalogError>)]
    Catalog(Box<CatalogError>),
    #[error(transparent)]
    #[from(EncodeError, Box<EncodeError>)]
    Encode(Box<EncodeError>),
}
