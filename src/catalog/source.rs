use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::model::{ByteOrder, MessageDescriptor, SignalDescriptor};
use crate::error::CatalogError;

/// Produces the raw message descriptors a catalog is built from.
pub trait CatalogSource {
    /// Human-readable name of the source, such as a file name.
    fn name(&self) -> &str;

    /// Reads every message descriptor in declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error when the source cannot be read or parsed.
    fn read_messages(&self) -> Result<Vec<MessageDescriptor>, CatalogError>;
}

/// Catalog source backed by a JSON document.
///
/// ```
/// use busgate::{CatalogSource, JsonCatalogSource};
///
/// let source = JsonCatalogSource::from_json(
///     "inline",
///     r#"{ "messages": [ { "id": 100, "name": "Status", "signals": [
///         { "name": "state", "start_bit": 0, "length": 4 } ] } ] }"#,
/// );
/// let messages = source.read_messages()?;
/// assert_eq!("Status", messages[0].name());
/// assert_eq!(8, messages[0].byte_length());
/// # Ok::<(), busgate::CatalogError>(())
/// ```
#[derive(Debug, Clone)]
pub struct JsonCatalogSource {
    name: String,
    document: String,
}

impl JsonCatalogSource {
    /// Creates a source from an in-memory JSON document.
    #[must_use]
    pub fn from_json(name: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            document: document.into(),
        }
    }

    /// Reads the JSON document at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let document = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
        Ok(Self { name, document })
    }
}

impl CatalogSource for JsonCatalogSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_messages(&self) -> Result<Vec<MessageDescriptor>, CatalogError> {
        let document: CatalogDocument =
            serde_json::from_str(&self.document).map_err(|source| CatalogError::Parse {
                source_name: self.name.clone(),
                source,
            })?;
        Ok(document
            .messages
            .into_iter()
            .map(MessageEntry::into_descriptor)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogDocument {
    messages: Vec<MessageEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MessageEntry {
    id: u32,
    name: String,
    #[serde(default = "default_message_length")]
    length: u8,
    #[serde(default)]
    signals: Vec<SignalEntry>,
    #[serde(default)]
    comment: String,
}

impl MessageEntry {
    fn into_descriptor(self) -> MessageDescriptor {
        MessageDescriptor::builder()
            .id(self.id)
            .name(self.name)
            .byte_length(self.length)
            .signals(
                self.signals
                    .into_iter()
                    .map(SignalEntry::into_descriptor)
                    .collect(),
            )
            .comment(self.comment)
            .build()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SignalEntry {
    name: String,
    start_bit: u16,
    length: u8,
    #[serde(default)]
    byte_order: ByteOrder,
    #[serde(default)]
    is_signed: bool,
    #[serde(default = "default_scale")]
    scale: f64,
    #[serde(default)]
    offset: f64,
    minimum: Option<f64>,
    maximum: Option<f64>,
    #[serde(default)]
    unit: String,
    #[serde(default)]
    comment: String,
}

impl SignalEntry {
    fn into_descriptor(self) -> SignalDescriptor {
        SignalDescriptor::builder()
            .name(self.name)
            .start_bit(self.start_bit)
            .bit_length(self.length)
            .byte_order(self.byte_order)
            .is_signed(self.is_signed)
            .scale(self.scale)
            .offset(self.offset)
            .maybe_minimum(self.minimum)
            .maybe_maximum(self.maximum)
            .unit(self.unit)
            .comment(self.comment)
            .build()
    }
}

fn default_message_length() -> u8 {
    8
}

fn default_scale() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn read_messages_applies_defaults() {
        let source = JsonCatalogSource::from_json(
            "test.json",
            r#"{ "messages": [ { "id": 7, "name": "Power", "signals": [
                { "name": "current", "start_bit": 8, "length": 12 } ] } ] }"#,
        );
        let messages = source.read_messages().expect("document should parse");
        let signal = &messages[0].signals()[0];

        assert_eq!(ByteOrder::LittleEndian, signal.byte_order());
        assert!(!signal.is_signed());
        assert_eq!(1.0, signal.scale());
        assert_eq!(0.0, signal.offset());
        assert_eq!(None, signal.minimum());
        assert_eq!("", signal.unit());
    }

    #[test]
    fn read_messages_parses_every_field() {
        let source = JsonCatalogSource::from_json(
            "test.json",
            r#"{ "messages": [ { "id": 300, "name": "Charger", "length": 6, "comment": "dc side",
                "signals": [ { "name": "temp", "start_bit": 7, "length": 12,
                    "byte_order": "big_endian", "is_signed": true, "scale": 0.5,
                    "offset": -40, "minimum": -40, "maximum": 120, "unit": "degC",
                    "comment": "cell" } ] } ] }"#,
        );
        let messages = source.read_messages().expect("document should parse");
        let message = &messages[0];
        let signal = &message.signals()[0];

        assert_eq!(300, message.id());
        assert_eq!(6, message.byte_length());
        assert_eq!("dc side", message.comment());
        assert_eq!(ByteOrder::BigEndian, signal.byte_order());
        assert!(signal.is_signed());
        assert_eq!(Some(-40.0), signal.minimum());
        assert_eq!(Some(120.0), signal.maximum());
        assert_eq!("degC", signal.unit());
    }

    #[test]
    fn read_messages_rejects_unknown_fields() {
        let source = JsonCatalogSource::from_json(
            "test.json",
            r#"{ "messages": [ { "id": 1, "name": "A", "frame_id": 2 } ] }"#,
        );
        assert_matches!(source.read_messages(), Err(CatalogError::Parse { .. }));
    }

    #[test]
    fn from_path_reports_missing_file() {
        let result = JsonCatalogSource::from_path("/nonexistent/catalog.json");
        assert_matches!(result, Err(CatalogError::Io { .. }));
    }
}
