use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::codec::{SignalMap, SignalRangeError, SignalValues};
use crate::frame::DecodedFrame;
use crate::utils::{format_checksum, rfc3339_now};

/// Structured result of processing one frame against the catalog.
///
/// Produced for every frame that passes the CRC check, whether or not its
/// message id is known.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedMessage {
    device_address: u8,
    message_id: u16,
    message_name: Option<String>,
    signals: SignalMap,
    range_violations: Vec<SignalRangeError>,
    raw_payload_hex: String,
    checksum_hex: String,
    parsed: bool,
    error: Option<String>,
    source: String,
    received_at: String,
}

impl DecodedMessage {
    /// Builds a message for a frame whose signals decoded.
    pub(crate) fn parsed(
        source: &str,
        frame: &DecodedFrame,
        message_name: &str,
        decoded: SignalValues,
    ) -> Self {
        let (signals, range_violations) = decoded.into_parts();
        Self {
            message_name: Some(message_name.to_string()),
            signals,
            range_violations,
            parsed: true,
            ..Self::empty(source, frame)
        }
    }

    /// Builds a message for a frame that passed the CRC but could not be decoded.
    pub(crate) fn unparsed(
        source: &str,
        frame: &DecodedFrame,
        message_name: Option<&str>,
        error: String,
    ) -> Self {
        Self {
            message_name: message_name.map(str::to_string),
            error: Some(error),
            ..Self::empty(source, frame)
        }
    }

    fn empty(source: &str, frame: &DecodedFrame) -> Self {
        let header = frame.header();
        Self {
            device_address: header.device_address(),
            message_id: header.message_id(),
            message_name: None,
            signals: SignalMap::new(),
            range_violations: Vec::new(),
            raw_payload_hex: hex::encode_upper(frame.payload()),
            checksum_hex: format_checksum(frame.checksum()),
            parsed: false,
            error: None,
            source: source.to_string(),
            received_at: rfc3339_now(),
        }
    }

    #[must_use]
    pub fn device_address(&self) -> u8 {
        self.device_address
    }

    #[must_use]
    pub fn message_id(&self) -> u16 {
        self.message_id
    }

    /// Returns the catalog name of the message, if the id is known.
    #[must_use]
    pub fn message_name(&self) -> Option<&str> {
        self.message_name.as_deref()
    }

    /// Returns decoded physical values; empty when not parsed.
    #[must_use]
    pub fn signals(&self) -> &SignalMap {
        &self.signals
    }

    #[must_use]
    pub fn signal(&self, name: &str) -> Option<f64> {
        self.signals.get(name).copied()
    }

    /// Returns values that decoded outside their declared bounds.
    #[must_use]
    pub fn range_violations(&self) -> &[SignalRangeError] {
        &self.range_violations
    }

    /// Returns the 8 payload bytes as uppercase hex without separators.
    #[must_use]
    pub fn raw_payload_hex(&self) -> &str {
        &self.raw_payload_hex
    }

    /// Returns the frame checksum as `0xXXXX`.
    #[must_use]
    pub fn checksum_hex(&self) -> &str {
        &self.checksum_hex
    }

    /// Returns whether the signals were decoded.
    #[must_use]
    pub fn is_parsed(&self) -> bool {
        self.parsed
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the label of the input the frame arrived on.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the RFC 3339 UTC receive time.
    #[must_use]
    pub fn received_at(&self) -> &str {
        &self.received_at
    }
}
