use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{CatalogHandle, MessageRef};
use crate::codec::{SignalCodec, SignalMap};
use crate::error::GatewayError;
use crate::frame::{
    FRAME_LEN, FrameCodec, FrameError, FrameHeader, MAX_MESSAGE_ID, PAYLOAD_LEN, parse_hex,
};
use crate::message::DecodedMessage;
use crate::utils::format_hex;

/// A stats line is logged after this many frames.
const STATS_LOG_INTERVAL: u64 = 1000;

/// Running frame counters shared by every worker.
#[derive(Debug, Default)]
pub struct GatewayStats {
    total: AtomicU64,
    valid: AtomicU64,
    errors: AtomicU64,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl GatewayStats {
    /// Returns a point-in-time copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            valid: self.valid.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_frame(&self, valid: bool) {
        let total = self.total.fetch_add(1, Ordering::Relaxed) + 1;
        if valid {
            self.valid.fetch_add(1, Ordering::Relaxed);
        } else {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        if total % STATS_LOG_INTERVAL == 0 {
            let snapshot = self.snapshot();
            info!(
                total = snapshot.total,
                valid = snapshot.valid,
                errors = snapshot.errors,
                published = snapshot.published,
                dropped = snapshot.dropped,
                "gateway stats"
            );
        }
    }
}

/// Copy of the gateway counters.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Frames seen, including rejected ones.
    pub total: u64,
    /// Frames decoded against a known message.
    pub valid: u64,
    /// Frames rejected or not decodable.
    pub errors: u64,
    /// Messages accepted by the output sink.
    pub published: u64,
    /// Frames or messages discarded because a queue was full or the sink refused them.
    pub dropped: u64,
}

/// Turns raw frames into [`DecodedMessage`]s using the active catalog.
///
/// Cloning is cheap; clones share the catalog handle and counters.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    catalog: CatalogHandle,
    stats: Arc<GatewayStats>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(catalog: CatalogHandle) -> Self {
        Self {
            catalog,
            stats: Arc::new(GatewayStats::default()),
        }
    }

    /// Returns the shared counters.
    #[must_use]
    pub fn stats(&self) -> &Arc<GatewayStats> {
        &self.stats
    }

    /// Returns the catalog handle frames are resolved against.
    #[must_use]
    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    /// Processes one raw frame.
    ///
    /// Frames that fail length or CRC validation are counted and returned as
    /// errors. Frames with an unknown id or an undecodable layout still yield
    /// a message with `parsed == false`.
    ///
    /// # Errors
    ///
    /// Returns the [`FrameError`] of a frame that failed validation.
    #[instrument(skip_all, level = "trace", fields(source = source, len = raw.len()))]
    pub fn process(&self, source: &str, raw: &[u8]) -> Result<DecodedMessage, FrameError> {
        let frame = match FrameCodec::decode(raw) {
            Ok(frame) => frame,
            Err(error) => {
                self.reject(source, &error, Some(raw));
                return Err(error);
            }
        };

        let header = frame.header();
        let catalog = self.catalog.current();
        let Some((descriptor, layouts)) = catalog.lookup_with_layouts(u32::from(header.message_id()))
        else {
            debug!(source, %header, "unknown message id");
            self.stats.record_frame(false);
            return Ok(DecodedMessage::unparsed(
                source,
                &frame,
                None,
                format!("unknown message id {}", header.message_id()),
            ));
        };

        match SignalCodec::decode_with_layouts(frame.payload(), descriptor, layouts) {
            Ok(decoded) => {
                self.stats.record_frame(true);
                Ok(DecodedMessage::parsed(source, &frame, descriptor.name(), decoded))
            }
            Err(error) => {
                warn!(source, %header, %error, "signal decode failed");
                self.stats.record_frame(false);
                Ok(DecodedMessage::unparsed(
                    source,
                    &frame,
                    Some(descriptor.name()),
                    format!("decode error: {error}"),
                ))
            }
        }
    }

    /// Processes one frame given as hexadecimal text.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidHex`] for malformed text, otherwise as
    /// [`Self::process`].
    pub fn process_hex(&self, source: &str, text: &str) -> Result<DecodedMessage, FrameError> {
        match parse_hex(text) {
            Ok(raw) => self.process(source, &raw),
            Err(error) => {
                self.reject(source, &error, None);
                Err(error)
            }
        }
    }

    /// Counts a frame that was rejected before reaching the dispatcher.
    pub fn reject(&self, source: &str, error: &FrameError, raw: Option<&[u8]>) {
        let diagnostic = raw.map_or_else(|| "<unavailable>".to_string(), format_hex);
        warn!(source, %error, raw = %diagnostic, "frame rejected");
        self.stats.record_frame(false);
    }

    /// Encodes signal values into a complete wire frame.
    ///
    /// ```
    /// use busgate::{
    ///     CatalogHandle, CatalogOptions, Dispatcher, JsonCatalogSource, MessageCatalog,
    ///     MessageRef, SignalMap,
    /// };
    ///
    /// let source = JsonCatalogSource::from_json(
    ///     "inline",
    ///     r#"{ "messages": [ { "id": 100, "name": "Voltage", "signals": [
    ///         { "name": "dc_voltage", "start_bit": 0, "length": 16, "scale": 0.1 } ] } ] }"#,
    /// );
    /// let catalog = MessageCatalog::load(&source, CatalogOptions::default())?;
    /// let dispatcher = Dispatcher::new(CatalogHandle::new(catalog));
    ///
    /// let values = SignalMap::from([("dc_voltage".to_string(), 1000.0)]);
    /// let frame = dispatcher.encode(3, &MessageRef::Name("Voltage".to_string()), &values)?;
    /// let message = dispatcher.process("demo", &frame)?;
    /// assert_eq!(Some(1000.0), message.signal("dc_voltage"));
    /// # Ok::<(), busgate::GatewayError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when the message is unknown, the header fields are
    /// out of range, or a value does not encode.
    pub fn encode(
        &self,
        device_address: u8,
        reference: &MessageRef,
        values: &SignalMap,
    ) -> Result<[u8; FRAME_LEN], GatewayError> {
        let catalog = self.catalog.current();
        let (descriptor, layouts) = catalog.resolve_with_layouts(reference)?;
        let message_id = u16::try_from(descriptor.id())
            .ok()
            .filter(|id| *id <= MAX_MESSAGE_ID)
            .ok_or(FrameError::HeaderFieldOutOfRange {
                field: "message_id",
                value: descriptor.id(),
                max: MAX_MESSAGE_ID,
            })?;
        let header = FrameHeader::new(device_address, message_id)?;

        let encoded = SignalCodec::encode_with_layouts(values, descriptor, layouts)?;
        let mut payload = [0_u8; PAYLOAD_LEN];
        payload[..encoded.len()].copy_from_slice(&encoded);
        Ok(FrameCodec::encode(header, payload))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::catalog::{CatalogOptions, MessageCatalog, MessageDescriptor, SignalDescriptor};
    use crate::codec::EncodeError;
    use crate::error::CatalogError;

    fn dispatcher() -> Dispatcher {
        let voltage = MessageDescriptor::builder()
            .id(100)
            .name("Voltage")
            .signals(vec![
                SignalDescriptor::builder()
                    .name("dc_voltage")
                    .start_bit(0)
                    .bit_length(16)
                    .scale(0.1)
                    .maximum(800.0)
                    .unit("V")
                    .build(),
                SignalDescriptor::builder()
                    .name("state")
                    .start_bit(16)
                    .bit_length(4)
                    .build(),
            ])
            .build();
        let wide = MessageDescriptor::builder().id(2000).name("Wide").build();
        let catalog =
            MessageCatalog::from_messages("test", vec![voltage, wide], CatalogOptions::default())
                .expect("test catalog should build");
        Dispatcher::new(CatalogHandle::new(catalog))
    }

    fn frame(device_address: u8, message_id: u16, payload: [u8; PAYLOAD_LEN]) -> [u8; FRAME_LEN] {
        let header = FrameHeader::new(device_address, message_id).expect("header fields in range");
        FrameCodec::encode(header, payload)
    }

    #[test]
    fn process_decodes_known_message() {
        let dispatcher = dispatcher();
        let message = dispatcher
            .process("can0", &frame(3, 100, [0x10, 0x27, 0x05, 0, 0, 0, 0, 0]))
            .expect("valid frame should be processed");

        assert!(message.is_parsed());
        assert_eq!(3, message.device_address());
        assert_eq!(Some("Voltage"), message.message_name());
        assert_eq!(Some(5.0), message.signal("state"));
        // 1000 V is above the declared 800 V maximum but is still reported.
        assert_eq!(Some(1000.0), message.signal("dc_voltage"));
        assert_eq!(1, message.range_violations().len());
        assert_eq!(
            StatsSnapshot {
                total: 1,
                valid: 1,
                ..StatsSnapshot::default()
            },
            dispatcher.stats().snapshot()
        );
    }

    #[test]
    fn process_flags_unknown_message_id() {
        let dispatcher = dispatcher();
        let message = dispatcher
            .process("can0", &frame(1, 7, [0; PAYLOAD_LEN]))
            .expect("crc-valid frame should be processed");

        assert!(!message.is_parsed());
        assert_eq!(Some("unknown message id 7"), message.error());
        assert!(message.signals().is_empty());
        assert_eq!(1, dispatcher.stats().snapshot().errors);
    }

    #[test]
    fn process_counts_rejected_frames() {
        let dispatcher = dispatcher();
        let mut corrupted = frame(1, 100, [0; PAYLOAD_LEN]);
        corrupted[4] ^= 0x01;

        assert_matches!(
            dispatcher.process("can0", &corrupted),
            Err(FrameError::CrcMismatch { .. })
        );
        assert_matches!(
            dispatcher.process("can0", &corrupted[..11]),
            Err(FrameError::WrongLength { actual: 11 })
        );
        assert_matches!(
            dispatcher.process_hex("can0", "not hex"),
            Err(FrameError::InvalidHex { .. })
        );
        assert_eq!(
            StatsSnapshot {
                total: 3,
                errors: 3,
                ..StatsSnapshot::default()
            },
            dispatcher.stats().snapshot()
        );
    }

    #[test]
    fn encode_builds_frame_that_decodes_back() {
        let dispatcher = dispatcher();
        let values = SignalMap::from([("dc_voltage".to_string(), 400.0), ("state".to_string(), 2.0)]);
        let raw = dispatcher
            .encode(4, &MessageRef::Id(100), &values)
            .expect("values are in range");

        let message = dispatcher.process("loop", &raw).expect("encoded frame decodes");
        assert_eq!(4, message.device_address());
        assert_eq!(Some(400.0), message.signal("dc_voltage"));
        assert_eq!(Some(2.0), message.signal("state"));
    }

    #[test]
    fn encode_rejects_unknown_message_and_bad_values() {
        let dispatcher = dispatcher();
        assert_matches!(
            dispatcher.encode(0, &MessageRef::Name("Nope".to_string()), &SignalMap::new()),
            Err(GatewayError::Catalog(error)) if matches!(*error, CatalogError::UnknownMessage { .. })
        );
        assert_matches!(
            dispatcher.encode(0, &MessageRef::Id(100), &SignalMap::new()),
            Err(GatewayError::Encode(error)) if matches!(*error, EncodeError::MissingSignal { .. })
        );
        assert_matches!(
            dispatcher.encode(32, &MessageRef::Id(100), &SignalMap::new()),
            Err(GatewayError::Frame(error))
                if matches!(*error, FrameError::HeaderFieldOutOfRange { field: "device_address", .. })
        );
        assert_matches!(
            dispatcher.encode(0, &MessageRef::Id(2000), &SignalMap::new()),
            Err(GatewayError::Frame(error))
                if matches!(*error, FrameError::HeaderFieldOutOfRange { field: "message_id", value: 2000, .. })
        );
    }

    #[test]
    fn encode_reports_full_width_of_unaddressable_id() {
        let huge = MessageDescriptor::builder().id(70_000).name("Huge").build();
        let catalog = MessageCatalog::from_messages("test", vec![huge], CatalogOptions::default())
            .expect("wide ids are allowed in the catalog");
        let dispatcher = Dispatcher::new(CatalogHandle::new(catalog));

        let error = dispatcher
            .encode(0, &MessageRef::Id(70_000), &SignalMap::new())
            .expect_err("id does not fit the header");
        assert_eq!(
            "header field `message_id` value 70000 exceeds max 1023",
            error.to_string()
        );
        assert_matches!(
            error,
            GatewayError::Frame(error)
                if *error == FrameError::HeaderFieldOutOfRange {
                    field: "message_id",
                    value: 70_000,
                    max: MAX_MESSAGE_ID,
                }
        );
    }

    #[test]
    fn stats_count_published_and_dropped() {
        let stats = GatewayStats::default();
        stats.record_published();
        stats.record_dropped();
        stats.record_dropped();
        assert_eq!(
            StatsSnapshot {
                published: 1,
                dropped: 2,
                ..StatsSnapshot::default()
            },
            stats.snapshot()
        );
    }
}
